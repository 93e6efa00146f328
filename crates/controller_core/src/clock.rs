//! Fontes de tempo e identidade do dispositivo.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::DateTime;

/// Relógio de parede em segundos desde epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Relógio do sistema operacional.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// Relógio controlado manualmente (testes e simulação).
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, ts: i64) {
        self.now.store(ts, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Formata `ts` como `YYYY-MM-DDTHH:MM:SSZ`.
pub fn iso8601(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| "1970-01-01T00:00:00Z".into())
}

/// Identidade do dispositivo e versão de firmware.
pub trait DeviceIdentity: Send + Sync {
    fn device_id(&self) -> String;
    fn firmware_version(&self) -> String;
}

/// Identidade fixa, definida na construção.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    pub device_id: String,
    pub firmware_version: String,
}

impl StaticIdentity {
    pub fn new(device_id: impl Into<String>, firmware_version: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            firmware_version: firmware_version.into(),
        }
    }
}

impl DeviceIdentity for StaticIdentity {
    fn device_id(&self) -> String {
        self.device_id.clone()
    }

    fn firmware_version(&self) -> String {
        self.firmware_version.clone()
    }
}
