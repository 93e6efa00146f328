//! # Controller Core
//!
//! Núcleo do controlador de sensor: parâmetros persistentes com metadados,
//! amostragem, protocolo de saída e o pipeline de envio protegido por trava.
//!
//! ## Módulos
//! - [`types`] – ConfigParameter, ReadingSnapshot, ConfigPayload, ActionOutcome
//! - [`clock`] – Relógio e identidade do dispositivo
//! - [`persistence`] – Registro persistente de layout fixo (bincode)
//! - [`manager`] – ConfigManager: validação, load/save, contadores
//! - [`sampler`] – ReadingSampler
//! - [`protocol`] – Corpo JSON, enquadramento HTTP e linha de status
//! - [`transport`] – POST HTTP bloqueante sobre TCP
//! - [`events`] – Eventos `manual_ok` / `scheduled_error` etc.
//! - [`push`] – PushController (envio exclusivo)
//! - [`scheduler`] – Tick cooperativo do envio agendado
//! - [`command`] – Superfície de comandos (Get*/Set*/PushNow/SoftReset)
//! - [`config`] – Configuração unificada via TOML

pub mod clock;
pub mod command;
pub mod config;
pub mod events;
pub mod manager;
pub mod persistence;
pub mod protocol;
pub mod push;
pub mod sampler;
pub mod scheduler;
pub mod transport;
pub mod types;

// Re-exports convenientes
pub use command::CommandSurface;
pub use config::AppConfig;
pub use manager::{ConfigManager, SharedConfig};
pub use push::PushController;
pub use scheduler::Scheduler;
pub use types::{ActionOutcome, ConfigParameter, ConfigPayload, ReadingSnapshot};
