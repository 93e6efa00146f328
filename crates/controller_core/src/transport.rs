//! Transporte: um POST HTTP bloqueante sobre TCP por chamada.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::EndpointConfig;
use crate::protocol::{build_post_request, parse_status_code};

/// Orçamento de espera pela resposta de cada envio.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Código reportado quando não há resposta HTTP alguma.
pub const CONNECTION_FAILED: u16 = 0;

/// Limite de bytes lidos procurando a linha de status.
const MAX_HEADER_BYTES: usize = 4096;

/// Executa um envio e devolve o código HTTP (`0` = falha de conexão).
pub trait Transport: Send {
    fn post(&mut self, body: &str, timeout: Duration) -> u16;
}

/// Cliente HTTP/1.1 mínimo sobre `TcpStream`.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    endpoint: EndpointConfig,
}

impl TcpTransport {
    pub fn new(endpoint: EndpointConfig) -> Self {
        Self { endpoint }
    }

    fn connect(&self, deadline: Instant) -> std::io::Result<TcpStream> {
        let addr = format!("{}:{}", self.endpoint.host, self.endpoint.port);
        connect_within(addr.to_socket_addrs()?, deadline, |sock_addr, remaining| {
            TcpStream::connect_timeout(sock_addr, remaining)
        })
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                std::io::Error::new(std::io::ErrorKind::NotFound, format!("{addr} não resolvido"))
            }
            _ => e,
        })
    }
}

/// Tenta cada endereço com o tempo que sobra até `deadline`; o orçamento é
/// um só para todos os endereços resolvidos.
fn connect_within<T, F>(
    addrs: impl IntoIterator<Item = SocketAddr>,
    deadline: Instant,
    mut connect: F,
) -> std::io::Result<T>
where
    F: FnMut(&SocketAddr, Duration) -> std::io::Result<T>,
{
    let mut last_err = None;
    for sock_addr in addrs {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "prazo de conexão esgotado",
            ));
        }
        match connect(&sock_addr, remaining) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "nenhum endereço resolvido")
    }))
}

impl Transport for TcpTransport {
    fn post(&mut self, body: &str, timeout: Duration) -> u16 {
        let deadline = Instant::now() + timeout;

        let mut stream = match self.connect(deadline) {
            Ok(s) => s,
            Err(e) => {
                warn!("Falha ao conectar em {}:{}: {e}", self.endpoint.host, self.endpoint.port);
                return CONNECTION_FAILED;
            }
        };

        let request = build_post_request(&self.endpoint, body);
        if let Err(e) = stream.write_all(request.as_bytes()) {
            warn!("Erro ao enviar requisição: {e}");
            return CONNECTION_FAILED;
        }

        read_status(&mut stream, deadline).unwrap_or(CONNECTION_FAILED)
    }
}

/// Lê até achar a linha de status, o peer fechar ou o prazo vencer.
fn read_status(stream: &mut TcpStream, deadline: Instant) -> Option<u16> {
    let mut response = Vec::with_capacity(256);
    let mut chunk = [0u8; 256];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            debug!("Prazo de resposta esgotado");
            return None;
        }
        stream.set_read_timeout(Some(remaining)).ok()?;

        match stream.read(&mut chunk) {
            Ok(0) => return parse_status_code(&response),
            Ok(n) => {
                response.extend_from_slice(&chunk[..n]);
                if let Some(code) = parse_status_code(&response) {
                    return Some(code);
                }
                if response.len() > MAX_HEADER_BYTES {
                    debug!("Resposta sem linha de status em {MAX_HEADER_BYTES} bytes");
                    return None;
                }
            }
            Err(ref e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::Interrupted =>
            {
                // Reavalia o prazo
            }
            Err(e) => {
                debug!("Erro ao ler resposta: {e}");
                return None;
            }
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
