//! Pipeline de envio protegido por trava exclusiva.
//!
//! Manual e agendado passam pelo mesmo [`PushController::attempt_send`]. A
//! trava guarda o transporte: amostragem, serialização, envio e contadores
//! acontecem com ela tomada, então nunca há dois envios simultâneos.
//!
//! ```text
//!   Idle ──lock()──▶ Sending ──(guard drop)──▶ Idle
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info};

use crate::events::{EventSink, PUSH_EVENT_CHANNEL, PushEvent, Trigger};
use crate::manager::{SharedConfig, lock_config};
use crate::protocol::{encode_body, is_success};
use crate::sampler::ReadingSampler;
use crate::transport::{CONNECTION_FAILED, RESPONSE_TIMEOUT, Transport};
use crate::types::{ActionOutcome, ControllerError};

pub struct PushController {
    transport: Mutex<Box<dyn Transport>>,
    config: SharedConfig,
    sampler: Arc<ReadingSampler>,
    events: Arc<dyn EventSink>,
}

impl PushController {
    pub fn new(
        transport: Box<dyn Transport>,
        config: SharedConfig,
        sampler: Arc<ReadingSampler>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            transport: Mutex::new(transport),
            config,
            sampler,
            events,
        }
    }

    /// Envio sob demanda.
    pub fn push_now(&self) -> ActionOutcome {
        self.attempt_send(Trigger::Manual)
    }

    /// Uma tentativa de envio. Bloqueia enquanto outra estiver em andamento.
    pub fn attempt_send(&self, trigger: Trigger) -> ActionOutcome {
        let mut transport = self.transport.lock().unwrap_or_else(PoisonError::into_inner);

        let reading = self.sampler.sample(&lock_config(&self.config));
        let status = match encode_body(&reading) {
            Ok(body) => transport.post(&body, RESPONSE_TIMEOUT),
            Err(e) => {
                error!("Erro ao serializar leitura #{}: {e}", reading.sample_id);
                CONNECTION_FAILED
            }
        };

        let success = is_success(status);
        lock_config(&self.config).record_send(success);

        let event = PushEvent::new(trigger, success);
        if success {
            info!("→ amostra #{} enviada (HTTP {status}) [{}]", reading.sample_id, event.as_str());
        } else {
            error!("✗ amostra #{} falhou (HTTP {status}) [{}]", reading.sample_id, event.as_str());
        }
        self.events.publish(PUSH_EVENT_CHANNEL, event.as_str());

        if success {
            ActionOutcome::ok_with_status(status)
        } else {
            ControllerError::SendFailed { status }.into()
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, StaticIdentity};
    use crate::events::RecordingEventSink;
    use crate::manager::ConfigManager;
    use crate::persistence::MemoryStorage;
    use crate::types::ErrorReason;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    /// Devolve sempre o mesmo código e guarda os corpos recebidos.
    struct FixedStatus {
        status: u16,
        bodies: Arc<Mutex<Vec<String>>>,
    }

    impl Transport for FixedStatus {
        fn post(&mut self, body: &str, timeout: Duration) -> u16 {
            assert_eq!(timeout, RESPONSE_TIMEOUT);
            self.bodies.lock().unwrap().push(body.to_string());
            self.status
        }
    }

    /// Detecta sobreposição de envios e alterna 200/500.
    struct OverlapDetector {
        in_flight: Arc<AtomicBool>,
        overlaps: Arc<AtomicUsize>,
        calls: usize,
    }

    impl Transport for OverlapDetector {
        fn post(&mut self, _body: &str, _timeout: Duration) -> u16 {
            if self.in_flight.swap(true, Ordering::SeqCst) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            thread::sleep(Duration::from_millis(1));
            self.in_flight.store(false, Ordering::SeqCst);
            self.calls += 1;
            if self.calls % 2 == 0 { 200 } else { 500 }
        }
    }

    struct Fixture {
        push: PushController,
        config: SharedConfig,
        events: Arc<RecordingEventSink>,
    }

    fn fixture(transport: Box<dyn Transport>) -> Fixture {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let identity = Arc::new(StaticIdentity::new("dev-01", "2.0.0"));
        let config = ConfigManager::shared(Box::new(MemoryStorage::new()), clock.clone());
        let sampler = Arc::new(ReadingSampler::new(clock, identity));
        let events = Arc::new(RecordingEventSink::new());
        let push = PushController::new(transport, config.clone(), sampler, events.clone());
        Fixture { push, config, events }
    }

    #[test]
    fn push_now_success_counts_and_publishes() {
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let f = fixture(Box::new(FixedStatus { status: 200, bodies: bodies.clone() }));

        let outcome = f.push.push_now();

        assert_eq!(outcome, ActionOutcome::ok_with_status(200));
        assert_eq!(lock_config(&f.config).send_success_count(), 1);
        assert_eq!(lock_config(&f.config).send_fail_count(), 0);
        assert_eq!(f.events.data(), vec!["manual_ok"]);
        assert_eq!(f.events.events()[0].channel, PUSH_EVENT_CHANNEL);

        let sent: serde_json::Value = serde_json::from_str(&bodies.lock().unwrap()[0]).unwrap();
        assert_eq!(sent["deviceId"], "dev-01");
        assert_eq!(sent["timestamp"], 1_700_000_000);
    }

    #[test]
    fn push_now_server_error_counts_failure() {
        let f = fixture(Box::new(FixedStatus { status: 500, bodies: Arc::default() }));

        let outcome = f.push.push_now();

        assert_eq!(outcome.reason(), Some(ErrorReason::SendFailed));
        assert_eq!(outcome.http_status(), Some(500));
        assert_eq!(lock_config(&f.config).send_fail_count(), 1);
        assert_eq!(lock_config(&f.config).send_success_count(), 0);
        assert_eq!(f.events.data(), vec!["manual_error"]);
    }

    #[test]
    fn connection_failure_reports_zero() {
        let f = fixture(Box::new(FixedStatus { status: CONNECTION_FAILED, bodies: Arc::default() }));

        let outcome = f.push.attempt_send(Trigger::Scheduled);

        assert_eq!(outcome.http_status(), Some(0));
        assert_eq!(outcome.reason(), Some(ErrorReason::SendFailed));
        assert_eq!(f.events.data(), vec!["scheduled_error"]);
    }

    #[test]
    fn redirect_is_not_success() {
        let f = fixture(Box::new(FixedStatus { status: 301, bodies: Arc::default() }));
        assert!(!f.push.push_now().is_ok());
        assert_eq!(lock_config(&f.config).send_fail_count(), 1);
    }

    #[test]
    fn concurrent_triggers_never_overlap() {
        const PER_THREAD: usize = 25;
        let in_flight = Arc::new(AtomicBool::new(false));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let f = Arc::new(fixture(Box::new(OverlapDetector {
            in_flight: in_flight.clone(),
            overlaps: overlaps.clone(),
            calls: 0,
        })));

        let handles: Vec<_> = [Trigger::Manual, Trigger::Scheduled]
            .into_iter()
            .map(|trigger| {
                let f = f.clone();
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        f.push.attempt_send(trigger);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let config = lock_config(&f.config);
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(
            (config.send_success_count() + config.send_fail_count()) as usize,
            2 * PER_THREAD
        );
        assert_eq!(config.send_success_count() as usize, PER_THREAD);
        assert_eq!(f.events.events().len(), 2 * PER_THREAD);
    }
}
