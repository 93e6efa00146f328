//! Superfície de comandos exposta a chamadores externos.

use std::sync::Arc;
use tracing::info;

use crate::clock::DeviceIdentity;
use crate::manager::{SharedConfig, lock_config};
use crate::push::PushController;
use crate::sampler::ReadingSampler;
use crate::types::{ActionOutcome, ConfigPayload, ReadingSnapshot};

/// Ação executada pelo `SoftReset` (normalmente sinaliza o supervisor).
pub type ResetHook = Box<dyn Fn() + Send + Sync>;

pub struct CommandSurface {
    config: SharedConfig,
    sampler: Arc<ReadingSampler>,
    push: Arc<PushController>,
    identity: Arc<dyn DeviceIdentity>,
    reset: ResetHook,
}

impl CommandSurface {
    pub fn new(
        config: SharedConfig,
        sampler: Arc<ReadingSampler>,
        push: Arc<PushController>,
        identity: Arc<dyn DeviceIdentity>,
        reset: ResetHook,
    ) -> Self {
        Self {
            config,
            sampler,
            push,
            identity,
            reset,
        }
    }

    pub fn get_readings(&self) -> ReadingSnapshot {
        self.sampler.sample(&lock_config(&self.config))
    }

    pub fn get_config(&self) -> ConfigPayload {
        lock_config(&self.config).snapshot(self.identity.as_ref())
    }

    pub fn set_display_interval(&self, minutes: f32) -> ActionOutcome {
        lock_config(&self.config).set_display_interval(minutes).into()
    }

    pub fn set_server_interval(&self, minutes: f32) -> ActionOutcome {
        lock_config(&self.config).set_server_interval(minutes).into()
    }

    pub fn push_now(&self) -> ActionOutcome {
        self.push.push_now()
    }

    /// Sempre `Ok`; o reinício acontece logo depois.
    pub fn soft_reset(&self) -> ActionOutcome {
        info!("SoftReset solicitado");
        (self.reset)();
        ActionOutcome::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, StaticIdentity};
    use crate::events::RecordingEventSink;
    use crate::manager::ConfigManager;
    use crate::persistence::MemoryStorage;
    use crate::transport::Transport;
    use crate::types::{ChangeSource, ErrorReason};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct Always(u16);

    impl Transport for Always {
        fn post(&mut self, _body: &str, _timeout: Duration) -> u16 {
            self.0
        }
    }

    fn surface(status: u16, reset: ResetHook) -> (CommandSurface, MemoryStorage) {
        let spy = MemoryStorage::new();
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let identity: Arc<dyn DeviceIdentity> = Arc::new(StaticIdentity::new("dev-01", "2.0.0"));
        let config = ConfigManager::shared(Box::new(spy.clone()), clock.clone());
        lock_config(&config).record_boot().unwrap();
        let sampler = Arc::new(ReadingSampler::new(clock, identity.clone()));
        let push = Arc::new(PushController::new(
            Box::new(Always(status)),
            config.clone(),
            sampler.clone(),
            Arc::new(RecordingEventSink::new()),
        ));
        (CommandSurface::new(config, sampler, push, identity, reset), spy)
    }

    #[test]
    fn fresh_boot_config() {
        let (surface, _) = surface(200, Box::new(|| {}));
        let config = surface.get_config();
        assert_eq!(config.status, "ok");
        assert_eq!(config.boot_count, 1);
        assert_eq!(config.display_interval.current_value, 1.0);
        assert_eq!(config.server_interval.current_value, 5.0);
        assert_eq!(config.server_interval.last_changed_source, ChangeSource::Eeprom);
    }

    #[test]
    fn rejected_server_interval_keeps_config() {
        let (surface, spy) = surface(200, Box::new(|| {}));
        let writes_after_boot = spy.writes();

        let outcome = surface.set_server_interval(120.0);

        assert_eq!(outcome.reason(), Some(ErrorReason::OutOfRange));
        assert_eq!(surface.get_config().server_interval.current_value, 5.0);
        assert_eq!(spy.writes(), writes_after_boot);
    }

    #[test]
    fn accepted_display_interval_is_reported() {
        let (surface, spy) = surface(200, Box::new(|| {}));
        let writes_after_boot = spy.writes();

        assert!(surface.set_display_interval(3.0).is_ok());

        let config = surface.get_config();
        assert_eq!(config.display_interval.current_value, 3.0);
        assert_eq!(config.display_interval.last_changed_source, ChangeSource::CloudUi);
        assert_eq!(spy.writes(), writes_after_boot + 1);
    }

    #[test]
    fn readings_and_push_share_sample_counter() {
        let (surface, _) = surface(200, Box::new(|| {}));
        assert_eq!(surface.get_readings().sample_id, 1);
        assert!(surface.push_now().is_ok());
        assert_eq!(surface.get_readings().sample_id, 3);
        assert_eq!(surface.get_config().send_success_count, 1);
    }

    #[test]
    fn failed_push_is_counted() {
        let (surface, _) = surface(503, Box::new(|| {}));
        let outcome = surface.push_now();
        assert_eq!(outcome.http_status(), Some(503));
        assert_eq!(surface.get_config().send_fail_count, 1);
    }

    #[test]
    fn soft_reset_reports_ok_and_fires_hook() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let (surface, _) = surface(200, Box::new(move || flag.store(true, Ordering::SeqCst)));

        assert_eq!(surface.soft_reset(), ActionOutcome::ok());
        assert!(fired.load(Ordering::SeqCst));
    }
}
