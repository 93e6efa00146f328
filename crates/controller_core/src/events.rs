//! Publicação de eventos do push.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Canal bem-conhecido onde cada tentativa de envio é publicada.
pub const PUSH_EVENT_CHANNEL: &str = "controller/push";

/// Quem disparou a tentativa de envio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// `PushNow` vindo da superfície de comandos
    Manual,
    /// Tick do scheduler
    Scheduled,
}

/// Resultado publicado após cada tentativa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushEvent {
    ManualOk,
    ManualError,
    ScheduledOk,
    ScheduledError,
}

impl PushEvent {
    pub fn new(trigger: Trigger, success: bool) -> Self {
        match (trigger, success) {
            (Trigger::Manual, true) => PushEvent::ManualOk,
            (Trigger::Manual, false) => PushEvent::ManualError,
            (Trigger::Scheduled, true) => PushEvent::ScheduledOk,
            (Trigger::Scheduled, false) => PushEvent::ScheduledError,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PushEvent::ManualOk => "manual_ok",
            PushEvent::ManualError => "manual_error",
            PushEvent::ScheduledOk => "scheduled_ok",
            PushEvent::ScheduledError => "scheduled_error",
        }
    }
}

/// Destino de eventos publicados.
pub trait EventSink: Send + Sync {
    fn publish(&self, channel: &str, data: &str);
}

/// Evento entregue por [`ChannelEventSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub channel: String,
    pub data: String,
}

/// Encaminha eventos para outra thread via channel limitado.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: Sender<Event>,
}

/// Cria o sink e o receiver correspondente.
pub fn event_channel(capacity: usize) -> (ChannelEventSink, Receiver<Event>) {
    let (tx, rx) = bounded(capacity);
    (ChannelEventSink { tx }, rx)
}

impl EventSink for ChannelEventSink {
    fn publish(&self, channel: &str, data: &str) {
        let event = Event {
            channel: channel.into(),
            data: data.into(),
        };
        // Non-blocking: se ninguém consome, descarta em vez de travar o envio
        if self.tx.try_send(event).is_err() {
            debug!("Channel de eventos cheio, descartando {data}");
        }
    }
}

/// Guarda tudo o que foi publicado, na ordem.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Só os payloads, na ordem de publicação.
    pub fn data(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.data).collect()
    }
}

impl EventSink for RecordingEventSink {
    fn publish(&self, channel: &str, data: &str) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Event {
                channel: channel.into(),
                data: data.into(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_tags_follow_trigger_and_result() {
        assert_eq!(PushEvent::new(Trigger::Manual, true).as_str(), "manual_ok");
        assert_eq!(PushEvent::new(Trigger::Manual, false).as_str(), "manual_error");
        assert_eq!(PushEvent::new(Trigger::Scheduled, true).as_str(), "scheduled_ok");
        assert_eq!(PushEvent::new(Trigger::Scheduled, false).as_str(), "scheduled_error");
    }

    #[test]
    fn channel_sink_forwards_and_drops_when_full() {
        let (sink, rx) = event_channel(1);
        sink.publish(PUSH_EVENT_CHANNEL, "manual_ok");
        sink.publish(PUSH_EVENT_CHANNEL, "scheduled_ok");

        let first = rx.try_recv().unwrap();
        assert_eq!(first.channel, PUSH_EVENT_CHANNEL);
        assert_eq!(first.data, "manual_ok");
        assert!(rx.try_recv().is_err());
    }
}
