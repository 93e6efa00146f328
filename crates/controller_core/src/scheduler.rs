//! Tick cooperativo que dispara envios agendados.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::events::Trigger;
use crate::manager::{SharedConfig, lock_config};
use crate::push::PushController;
use crate::types::ActionOutcome;

pub struct Scheduler {
    last_push_at: i64,
    push: Arc<PushController>,
    config: SharedConfig,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    /// Com `push_on_boot`, `last_push_at` começa em epoch zero e o primeiro
    /// tick já envia; sem ele, conta a partir do boot.
    pub fn new(
        push: Arc<PushController>,
        config: SharedConfig,
        clock: Arc<dyn Clock>,
        push_on_boot: bool,
    ) -> Self {
        let last_push_at = if push_on_boot { 0 } else { clock.now() };
        Self {
            last_push_at,
            push,
            config,
            clock,
        }
    }

    pub fn last_push_at(&self) -> i64 {
        self.last_push_at
    }

    /// Um passo do loop. Seguro de chamar com qualquer frequência.
    ///
    /// Retorna o resultado quando um envio foi disparado.
    pub fn tick(&mut self) -> Option<ActionOutcome> {
        let now = self.clock.now();
        let minutes = lock_config(&self.config).server_interval().current_value;
        let interval_secs = interval_secs(minutes);

        if now - self.last_push_at < interval_secs {
            return None;
        }

        // Marca antes de enviar: o intervalo conta a partir da intenção.
        self.last_push_at = now;
        debug!("Envio agendado (intervalo {interval_secs}s)");
        Some(self.push.attempt_send(Trigger::Scheduled))
    }

    /// Roda `tick` a cada `period` até `stop` receber algo ou desconectar.
    pub fn run(mut self, period: Duration, stop: &Receiver<()>) {
        info!("Scheduler ativo (tick {}ms)", period.as_millis());
        loop {
            self.tick();
            match stop.recv_timeout(period) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!("Scheduler encerrado");
    }
}

/// Minutos para segundos, arredondando em f64 (2.1 min = 126 s, não 125).
fn interval_secs(minutes: f32) -> i64 {
    (f64::from(minutes) * 60.0).round() as i64
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
