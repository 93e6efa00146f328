//! Tipos de dados do controlador: parâmetros de configuração, leituras e
//! resultados de ações.
//!
//! Todos os payloads expostos pela superfície de comandos derivam `Serialize`
//! e saem como JSON com os mesmos nomes de campo do firmware de referência.

use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clock::iso8601;

// ──────────────────────────────────────────────
// Domínio dos intervalos
// ──────────────────────────────────────────────

/// Menor intervalo aceito (minutos).
pub const INTERVAL_MIN: f32 = 0.1;
/// Maior intervalo aceito (minutos).
pub const INTERVAL_MAX: f32 = 60.0;
/// Intervalo de display usado quando o valor persistido é inválido.
pub const DEFAULT_DISPLAY_INTERVAL: f32 = 1.0;
/// Intervalo de envio usado quando o valor persistido é inválido.
pub const DEFAULT_SERVER_INTERVAL: f32 = 5.0;
/// Diferença abaixo da qual um novo valor é considerado igual ao atual.
pub const CHANGE_EPSILON: f32 = 0.0001;

/// `true` se `minutes` está em `[INTERVAL_MIN, INTERVAL_MAX]`. NaN nunca está.
pub fn interval_in_range(minutes: f32) -> bool {
    (INTERVAL_MIN..=INTERVAL_MAX).contains(&minutes)
}

// ──────────────────────────────────────────────
// ConfigParameter
// ──────────────────────────────────────────────

/// Origem da última alteração de um parâmetro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeSource {
    /// Carregado do armazenamento não-volátil no boot.
    #[serde(rename = "EEPROM")]
    Eeprom,
    /// Alterado por comando externo (nuvem ou interface).
    #[serde(rename = "Cloud/UI")]
    CloudUi,
}

impl ChangeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeSource::Eeprom => "EEPROM",
            ChangeSource::CloudUi => "Cloud/UI",
        }
    }
}

impl fmt::Display for ChangeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parâmetro ajustável (minutos) com metadados de proveniência.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigParameter {
    /// Valor atual, sempre dentro de `[INTERVAL_MIN, INTERVAL_MAX]`
    pub current_value: f32,
    /// Momento da última alteração aceita (epoch, segundos)
    pub last_changed_unix: i64,
    /// Mesmo instante em ISO-8601 UTC
    pub last_changed_iso: String,
    /// Quem fez a última alteração
    pub last_changed_source: ChangeSource,
}

impl ConfigParameter {
    pub fn new(value: f32, at: i64, source: ChangeSource) -> Self {
        Self {
            current_value: value,
            last_changed_unix: at,
            last_changed_iso: iso8601(at),
            last_changed_source: source,
        }
    }

    /// Substitui valor e metadados de uma vez.
    pub(crate) fn stamp(&mut self, value: f32, at: i64, source: ChangeSource) {
        *self = Self::new(value, at, source);
    }
}

// ──────────────────────────────────────────────
// Payloads de consulta
// ──────────────────────────────────────────────

/// Uma amostra imutável: identidade, intervalos atuais e a medição.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingSnapshot {
    /// Sempre `"ok"`
    pub status: String,
    /// Contador monotônico de amostras desde o boot (começa em 1)
    pub sample_id: u32,
    pub device_id: String,
    pub firmware_version: String,
    /// Intervalo de envio (minutos)
    pub server_interval: f32,
    /// Intervalo de display (minutos)
    pub display_interval: f32,
    /// Momento da amostra (epoch, segundos)
    pub unix_ts: i64,
    pub iso_time: String,
    /// Medição placeholder; o hardware de sensor real fica fora deste núcleo
    pub dummy_value: f32,
}

/// Resposta completa de `GetConfig`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigPayload {
    /// Sempre `"ok"`
    pub status: String,
    pub device_id: String,
    pub firmware_version: String,
    pub boot_count: u32,
    pub send_success_count: u32,
    pub send_fail_count: u32,
    pub display_interval: ConfigParameter,
    pub server_interval: ConfigParameter,
}

// ──────────────────────────────────────────────
// Erros e resultado de ações
// ──────────────────────────────────────────────

/// Erros reportáveis ao chamador de um comando.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControllerError {
    #[error("Intervalo fora do domínio: {value} (0.1–60.0 minutos)")]
    OutOfRange { value: f32 },

    /// `status == 0` significa falha de conexão, sem resposta HTTP.
    #[error("Falha no envio (HTTP {status})")]
    SendFailed { status: u16 },
}

/// Código de motivo carregado por [`ActionOutcome::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorReason {
    OutOfRange,
    SendFailed,
}

impl ErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorReason::OutOfRange => "out_of_range",
            ErrorReason::SendFailed => "send_failed",
        }
    }
}

/// Resultado de toda operação que altera estado ou transmite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Ok {
        http_status: Option<u16>,
    },
    Error {
        reason: ErrorReason,
        http_status: Option<u16>,
    },
}

impl ActionOutcome {
    pub fn ok() -> Self {
        ActionOutcome::Ok { http_status: None }
    }

    pub fn ok_with_status(status: u16) -> Self {
        ActionOutcome::Ok {
            http_status: Some(status),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ActionOutcome::Ok { .. })
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            ActionOutcome::Ok { http_status } | ActionOutcome::Error { http_status, .. } => {
                *http_status
            }
        }
    }

    pub fn reason(&self) -> Option<ErrorReason> {
        match self {
            ActionOutcome::Ok { .. } => None,
            ActionOutcome::Error { reason, .. } => Some(*reason),
        }
    }
}

impl From<ControllerError> for ActionOutcome {
    fn from(err: ControllerError) -> Self {
        match err {
            ControllerError::OutOfRange { .. } => ActionOutcome::Error {
                reason: ErrorReason::OutOfRange,
                http_status: None,
            },
            ControllerError::SendFailed { status } => ActionOutcome::Error {
                reason: ErrorReason::SendFailed,
                http_status: Some(status),
            },
        }
    }
}

impl From<Result<(), ControllerError>> for ActionOutcome {
    fn from(result: Result<(), ControllerError>) -> Self {
        match result {
            Ok(()) => ActionOutcome::ok(),
            Err(e) => e.into(),
        }
    }
}

/// Forma JSON: `{"status": "ok"|"error", "error_reason": "...", "http_status": n}`.
#[derive(Serialize)]
struct OutcomeWire {
    status: &'static str,
    error_reason: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    http_status: Option<u16>,
}

impl Serialize for ActionOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            ActionOutcome::Ok { http_status } => OutcomeWire {
                status: "ok",
                error_reason: "",
                http_status: *http_status,
            },
            ActionOutcome::Error {
                reason,
                http_status,
            } => OutcomeWire {
                status: "error",
                error_reason: reason.as_str(),
                http_status: *http_status,
            },
        };
        wire.serialize(serializer)
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_bounds_are_inclusive() {
        assert!(interval_in_range(0.1));
        assert!(interval_in_range(60.0));
        assert!(!interval_in_range(0.099));
        assert!(!interval_in_range(60.01));
        assert!(!interval_in_range(f32::NAN));
        assert!(!interval_in_range(f32::INFINITY));
    }

    #[test]
    fn change_source_serializes_as_tag() {
        assert_eq!(serde_json::to_string(&ChangeSource::Eeprom).unwrap(), "\"EEPROM\"");
        assert_eq!(serde_json::to_string(&ChangeSource::CloudUi).unwrap(), "\"Cloud/UI\"");
    }

    #[test]
    fn parameter_carries_iso_timestamp() {
        let p = ConfigParameter::new(2.5, 86_400, ChangeSource::CloudUi);
        assert_eq!(p.last_changed_iso, "1970-01-02T00:00:00Z");
    }

    #[test]
    fn send_failure_outcome_keeps_status() {
        let outcome: ActionOutcome = ControllerError::SendFailed { status: 500 }.into();
        assert!(!outcome.is_ok());
        assert_eq!(outcome.reason(), Some(ErrorReason::SendFailed));
        assert_eq!(outcome.http_status(), Some(500));
    }

    #[test]
    fn outcome_json_shape() {
        let ok = serde_json::to_value(ActionOutcome::ok_with_status(200)).unwrap();
        assert_eq!(ok["status"], "ok");
        assert_eq!(ok["error_reason"], "");
        assert_eq!(ok["http_status"], 200);

        let err: ActionOutcome = ControllerError::OutOfRange { value: 120.0 }.into();
        let err = serde_json::to_value(err).unwrap();
        assert_eq!(err["status"], "error");
        assert_eq!(err["error_reason"], "out_of_range");
        assert!(err.get("http_status").is_none());
    }
}
