//! Produção de [`ReadingSnapshot`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::clock::{Clock, DeviceIdentity, iso8601};
use crate::manager::ConfigManager;
use crate::types::ReadingSnapshot;

/// Valor da medição enquanto não há hardware de sensor ligado.
pub const PLACEHOLDER_MEASUREMENT: f32 = 0.0;

/// Amostrador compartilhado por `GetReadings` e pelo push; os dois caminhos
/// consomem o mesmo contador de `sample_id`.
pub struct ReadingSampler {
    sample_counter: AtomicU32,
    clock: Arc<dyn Clock>,
    identity: Arc<dyn DeviceIdentity>,
}

impl ReadingSampler {
    pub fn new(clock: Arc<dyn Clock>, identity: Arc<dyn DeviceIdentity>) -> Self {
        Self {
            sample_counter: AtomicU32::new(0),
            clock,
            identity,
        }
    }

    /// Gera uma nova amostra. Nunca falha.
    pub fn sample(&self, config: &ConfigManager) -> ReadingSnapshot {
        let sample_id = self.sample_counter.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        let unix_ts = self.clock.now();

        ReadingSnapshot {
            status: "ok".into(),
            sample_id,
            device_id: self.identity.device_id(),
            firmware_version: self.identity.firmware_version(),
            server_interval: config.server_interval().current_value,
            display_interval: config.display_interval().current_value,
            unix_ts,
            iso_time: iso8601(unix_ts),
            dummy_value: PLACEHOLDER_MEASUREMENT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, StaticIdentity};
    use crate::persistence::MemoryStorage;

    #[test]
    fn sample_ids_start_at_one_and_increase() {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let identity = Arc::new(StaticIdentity::new("dev-01", "2.0.0"));
        let config = ConfigManager::new(Box::new(MemoryStorage::new()), clock.clone());
        let sampler = ReadingSampler::new(clock.clone(), identity);

        let first = sampler.sample(&config);
        clock.advance(30);
        let second = sampler.sample(&config);

        assert_eq!(first.sample_id, 1);
        assert_eq!(second.sample_id, 2);
        assert_eq!(second.unix_ts, first.unix_ts + 30);
        assert_eq!(sampler.sample(&config).sample_id, 3);
    }

    #[test]
    fn sample_mirrors_current_config() {
        let clock = Arc::new(ManualClock::new(0));
        let identity = Arc::new(StaticIdentity::new("dev-01", "2.0.0"));
        let mut config = ConfigManager::new(Box::new(MemoryStorage::new()), clock.clone());
        config.set_server_interval(12.5).unwrap();
        let sampler = ReadingSampler::new(clock, identity);

        let reading = sampler.sample(&config);
        assert_eq!(reading.status, "ok");
        assert_eq!(reading.device_id, "dev-01");
        assert_eq!(reading.firmware_version, "2.0.0");
        assert_eq!(reading.server_interval, 12.5);
        assert_eq!(reading.display_interval, 1.0);
        assert_eq!(reading.iso_time, "1970-01-01T00:00:00Z");
        assert_eq!(reading.dummy_value, PLACEHOLDER_MEASUREMENT);
    }
}
