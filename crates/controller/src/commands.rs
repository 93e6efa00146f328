//! Thread de comandos: lê um comando por linha do stdin e responde com uma
//! linha JSON no stdout.

use crossbeam_channel::Sender;
use serde::Serialize;
use serde_json::{Value, json};
use std::io::BufRead;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, warn};

use controller_core::CommandSurface;

use crate::Control;

/// Comando reconhecido.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    GetReadings,
    GetConfig,
    SetDisplayInterval(f32),
    SetServerInterval(f32),
    PushNow,
    SoftReset,
}

/// Erros de parse de uma linha de comando.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("Comando desconhecido: {0}")]
    Unknown(String),

    #[error("{0} requer um argumento (minutos)")]
    MissingArgument(&'static str),

    #[error("Argumento inválido: {0:?}")]
    InvalidArgument(String),
}

impl CommandError {
    pub fn reason(&self) -> &'static str {
        match self {
            CommandError::Unknown(_) => "unknown_command",
            CommandError::MissingArgument(_) => "missing_argument",
            CommandError::InvalidArgument(_) => "invalid_argument",
        }
    }
}

/// Aceita `snake_case` ou `PascalCase`: `set_server_interval 5` ou
/// `SetServerInterval 5`.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let mut parts = line.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let normalized = name.to_ascii_lowercase().replace('_', "");

    let minutes = |label: &'static str, arg: Option<&str>| -> Result<f32, CommandError> {
        let arg = arg.ok_or(CommandError::MissingArgument(label))?;
        arg.parse::<f32>()
            .map_err(|_| CommandError::InvalidArgument(arg.to_string()))
    };

    let command = match normalized.as_str() {
        "getreadings" => Ok(Command::GetReadings),
        "getconfig" => Ok(Command::GetConfig),
        "setdisplayinterval" => {
            minutes("set_display_interval", parts.next()).map(Command::SetDisplayInterval)
        }
        "setserverinterval" => {
            minutes("set_server_interval", parts.next()).map(Command::SetServerInterval)
        }
        "pushnow" => Ok(Command::PushNow),
        "softreset" => Ok(Command::SoftReset),
        _ => Err(CommandError::Unknown(name.to_string())),
    }?;

    match parts.next() {
        Some(extra) => Err(CommandError::InvalidArgument(extra.to_string())),
        None => Ok(command),
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value)
        .unwrap_or_else(|e| json!({"status": "error", "error_reason": e.to_string()}))
}

/// Executa o comando e devolve a resposta JSON.
pub fn execute(surface: &CommandSurface, command: Command) -> Value {
    match command {
        Command::GetReadings => to_json(&surface.get_readings()),
        Command::GetConfig => to_json(&surface.get_config()),
        Command::SetDisplayInterval(m) => to_json(&surface.set_display_interval(m)),
        Command::SetServerInterval(m) => to_json(&surface.set_server_interval(m)),
        Command::PushNow => to_json(&surface.push_now()),
        Command::SoftReset => to_json(&surface.soft_reset()),
    }
}

/// Linha vazia não gera resposta.
pub fn handle_line(surface: &CommandSurface, line: &str) -> Option<Value> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(match parse_command(line) {
        Ok(command) => {
            debug!("Comando: {command:?}");
            execute(surface, command)
        }
        Err(e) => {
            warn!("{e}");
            json!({"status": "error", "error_reason": e.reason()})
        }
    })
}

/// Inicia a thread de comandos. No fim do stdin envia [`Control::Shutdown`].
pub fn spawn_command_thread(surface: Arc<CommandSurface>, control: Sender<Control>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("commands".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if let Some(response) = handle_line(&surface, &line) {
                            println!("{response}");
                        }
                    }
                    Err(e) => {
                        warn!("Erro ao ler stdin: {e}");
                        break;
                    }
                }
            }
            let _ = control.send(Control::Shutdown);
        })
        .expect("Falha ao criar thread de comandos")
}
