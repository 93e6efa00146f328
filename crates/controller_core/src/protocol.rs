//! Protocolo de saída do push.
//!
//! Corpo JSON enquadrado como um POST HTTP/1.1:
//!
//! ```text
//! POST <path> HTTP/1.1
//! Host: <host>
//! Content-Type: application/json
//! <auth_header>: <api_key>
//! Content-Length: <n>
//! Connection: close
//!
//! {"deviceId":"…","firmwareVersion":"…","timestamp":…,"dummy_value":…}
//! ```
//!
//! Da resposta só interessa a linha de status: os três dígitos depois de
//! `HTTP/1.1 `.

use serde::{Deserialize, Serialize};

use crate::config::EndpointConfig;
use crate::types::ReadingSnapshot;

/// Prefixo da linha de status que precede o código.
pub const STATUS_PREFIX: &[u8] = b"HTTP/1.1 ";

/// Erros do protocolo.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Erro de serialização: {0}")]
    Serialize(String),
}

/// Corpo JSON enviado ao endpoint de coleta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundReading {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "firmwareVersion")]
    pub firmware_version: String,
    /// Epoch, segundos
    pub timestamp: i64,
    pub dummy_value: f32,
}

impl From<&ReadingSnapshot> for OutboundReading {
    fn from(reading: &ReadingSnapshot) -> Self {
        Self {
            device_id: reading.device_id.clone(),
            firmware_version: reading.firmware_version.clone(),
            timestamp: reading.unix_ts,
            dummy_value: reading.dummy_value,
        }
    }
}

/// Serializa a leitura no corpo JSON.
pub fn encode_body(reading: &ReadingSnapshot) -> Result<String, ProtocolError> {
    serde_json::to_string(&OutboundReading::from(reading))
        .map_err(|e| ProtocolError::Serialize(e.to_string()))
}

/// Monta a requisição HTTP completa (cabeçalhos + corpo).
pub fn build_post_request(endpoint: &EndpointConfig, body: &str) -> String {
    let mut request = format!(
        "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\n",
        endpoint.path, endpoint.host
    );
    if !endpoint.auth_header.is_empty() {
        request.push_str(&format!("{}: {}\r\n", endpoint.auth_header, endpoint.api_key));
    }
    request.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    ));
    request.push_str(body);
    request
}

/// Extrai o código de status de uma resposta (possivelmente parcial).
///
/// `None` enquanto o prefixo ou os três dígitos ainda não chegaram.
pub fn parse_status_code(response: &[u8]) -> Option<u16> {
    let start = response
        .windows(STATUS_PREFIX.len())
        .position(|w| w == STATUS_PREFIX)?
        + STATUS_PREFIX.len();
    let digits = response.get(start..start + 3)?;
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(
        digits
            .iter()
            .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0')),
    )
}

/// `200 ≤ status < 300`.
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
