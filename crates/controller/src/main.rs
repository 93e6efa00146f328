//! # Sensor Controller
//!
//! Mantém os intervalos persistentes, amostra leituras e envia ao endpoint
//! de coleta via HTTP, no ritmo do `server_interval` e sob demanda.
//!
//! ## Uso
//! ```bash
//! sensor_controller                                  # config.toml ao lado do executável
//! sensor_controller --config /etc/controller/config.toml
//! ```
//!
//! Comandos pelo stdin, um por linha: `get_readings`, `get_config`,
//! `set_display_interval <min>`, `set_server_interval <min>`, `push_now`,
//! `soft_reset`.

mod commands;
mod identity;

use crossbeam_channel::{bounded, select};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use controller_core::clock::{Clock, DeviceIdentity, SystemClock};
use controller_core::config::AppConfig;
use controller_core::events::{Event, event_channel};
use controller_core::manager::{ConfigManager, lock_config};
use controller_core::persistence::FileStorage;
use controller_core::sampler::ReadingSampler;
use controller_core::transport::TcpTransport;
use controller_core::{CommandSurface, PushController, Scheduler};

/// Mensagens para o supervisor (thread principal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// `SoftReset`: reinicia o processo
    Reset,
    /// Fim do stdin
    Shutdown,
}

fn main() {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // ── Carregar config ──
    let config_path = config_path_from_args();
    let config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }
    for problem in config.validate() {
        warn!("Configuração: {problem}");
    }

    // ── Estado persistente ──
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let identity: Arc<dyn DeviceIdentity> =
        Arc::new(identity::resolve_identity(&config.device.device_id));

    let storage_path = config.storage_path(&config_path);
    let manager = ConfigManager::shared(Box::new(FileStorage::new(&storage_path)), clock.clone());
    if let Err(e) = lock_config(&manager).record_boot() {
        warn!("Não foi possível gravar o contador de boots: {e}");
    }

    // ── Pipeline de envio ──
    let (event_sink, events_rx) = event_channel(64);
    let sampler = Arc::new(ReadingSampler::new(clock.clone(), identity.clone()));
    let push = Arc::new(PushController::new(
        Box::new(TcpTransport::new(config.endpoint.clone())),
        manager.clone(),
        sampler.clone(),
        Arc::new(event_sink),
    ));

    let (control_tx, control_rx) = bounded::<Control>(4);
    let reset_tx = control_tx.clone();
    let surface = Arc::new(CommandSurface::new(
        manager.clone(),
        sampler,
        push.clone(),
        identity.clone(),
        Box::new(move || {
            let _ = reset_tx.try_send(Control::Reset);
        }),
    ));

    // ── Banner ──
    {
        let cfg = lock_config(&manager);
        eprintln!();
        eprintln!("══════════════════════════════════════════════");
        eprintln!("   ⚡ SENSOR CONTROLLER – ATIVO");
        eprintln!("══════════════════════════════════════════════");
        eprintln!("  Dispositivo: {} (fw {})", identity.device_id(), identity.firmware_version());
        eprintln!("  Boot:        #{}", cfg.boot_count());
        eprintln!(
            "  Destino:     http://{}:{}{}",
            config.endpoint.host, config.endpoint.port, config.endpoint.path
        );
        eprintln!(
            "  Intervalos:  display {:.1} min | envio {:.1} min",
            cfg.display_interval().current_value,
            cfg.server_interval().current_value
        );
        eprintln!("  EEPROM:      {}", storage_path.display());
        eprintln!("══════════════════════════════════════════════");
        eprintln!();
    }

    // ── Scheduler ──
    let (stop_tx, stop_rx) = bounded::<()>(1);
    let scheduler = Scheduler::new(push, manager, clock, config.scheduler.push_on_boot);
    let tick = Duration::from_millis(config.scheduler.tick_ms.max(1));
    let scheduler_handle = std::thread::Builder::new()
        .name("scheduler".into())
        .spawn(move || scheduler.run(tick, &stop_rx))
        .expect("Falha ao criar thread do scheduler");

    // ── Comandos ──
    // Bloqueada no stdin; termina junto com o processo.
    let _commands = commands::spawn_command_thread(surface, control_tx);

    // ── Supervisor ──
    let control = loop {
        select! {
            recv(events_rx) -> event => match event {
                Ok(event) => print_event(&event),
                Err(_) => break Control::Shutdown,
            },
            recv(control_rx) -> msg => break msg.unwrap_or(Control::Shutdown),
        }
    };

    let _ = stop_tx.send(());
    if scheduler_handle.join().is_err() {
        error!("Thread do scheduler terminou com pânico");
    }
    while let Ok(event) = events_rx.try_recv() {
        print_event(&event);
    }

    if control == Control::Reset {
        info!("Reiniciando...");
        if let Err(e) = relaunch() {
            error!("Falha ao reiniciar: {e}");
            std::process::exit(1);
        }
    }
    info!("Encerrado");
}

fn print_event(event: &Event) {
    println!("{}", json!({"event": event.channel, "data": event.data}));
}

/// `--config <path>` ou o caminho padrão.
fn config_path_from_args() -> PathBuf {
    config_arg(std::env::args().skip(1)).unwrap_or_else(AppConfig::default_path)
}

fn config_arg(args: impl IntoIterator<Item = String>) -> Option<PathBuf> {
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            match args.next() {
                Some(path) => return Some(PathBuf::from(path)),
                None => warn!("--config sem caminho, usando o padrão"),
            }
        }
    }
    None
}

/// Relança o executável atual com os mesmos argumentos.
fn relaunch() -> std::io::Result<()> {
    let exe = std::env::current_exe()?;
    std::process::Command::new(exe)
        .args(std::env::args_os().skip(1))
        .spawn()?;
    Ok(())
}
