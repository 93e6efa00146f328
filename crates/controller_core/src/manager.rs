//! Autoridade única sobre os dois intervalos, o registro persistente e os
//! contadores de envio.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, DeviceIdentity};
use crate::persistence::{NvStorage, PersistedRecord, StorageError, read_record, write_record};
use crate::types::{
    CHANGE_EPSILON, ChangeSource, ConfigParameter, ConfigPayload, ControllerError,
    DEFAULT_DISPLAY_INTERVAL, DEFAULT_SERVER_INTERVAL, interval_in_range,
};

/// Handle compartilhado entre scheduler, push e superfície de comandos.
pub type SharedConfig = Arc<Mutex<ConfigManager>>;

/// Trava o manager. Um pânico em outra thread não invalida o estado
/// (toda mutação termina antes de liberar), então o envenenamento é ignorado.
pub fn lock_config(config: &Mutex<ConfigManager>) -> MutexGuard<'_, ConfigManager> {
    config.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interval {
    Display,
    Server,
}

impl Interval {
    fn name(self) -> &'static str {
        match self {
            Interval::Display => "display_interval",
            Interval::Server => "server_interval",
        }
    }
}

pub struct ConfigManager {
    storage: Box<dyn NvStorage>,
    clock: Arc<dyn Clock>,
    record: PersistedRecord,
    display: ConfigParameter,
    server: ConfigParameter,
    send_success_count: u32,
    send_fail_count: u32,
}

impl ConfigManager {
    /// Cria o manager e carrega o registro persistente.
    pub fn new(storage: Box<dyn NvStorage>, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let mut manager = Self {
            storage,
            clock,
            record: PersistedRecord::default(),
            display: ConfigParameter::new(DEFAULT_DISPLAY_INTERVAL, now, ChangeSource::Eeprom),
            server: ConfigParameter::new(DEFAULT_SERVER_INTERVAL, now, ChangeSource::Eeprom),
            send_success_count: 0,
            send_fail_count: 0,
        };
        manager.load();
        manager
    }

    /// Constrói já dentro de um [`SharedConfig`].
    pub fn shared(storage: Box<dyn NvStorage>, clock: Arc<dyn Clock>) -> SharedConfig {
        Arc::new(Mutex::new(Self::new(storage, clock)))
    }

    /// Lê o registro do armazenamento e substitui o estado em memória.
    ///
    /// Valores fora de `[0.1, 60.0]` viram o padrão do componente; ambos os
    /// parâmetros ficam com proveniência `EEPROM`. Nada é regravado aqui.
    pub fn load(&mut self) {
        let mut record = match read_record(self.storage.as_mut()) {
            Ok(Some(record)) => {
                debug!("Registro persistente lido: {record:?}");
                record
            }
            Ok(None) => {
                info!("Nenhum registro persistente, usando padrões");
                PersistedRecord::default()
            }
            Err(e) => {
                warn!("Registro persistente ilegível ({e}), usando padrões");
                PersistedRecord::default()
            }
        };

        if !interval_in_range(record.display_interval) {
            warn!(
                "display_interval persistido inválido ({}), usando {DEFAULT_DISPLAY_INTERVAL}",
                record.display_interval
            );
            record.display_interval = DEFAULT_DISPLAY_INTERVAL;
        }
        if !interval_in_range(record.server_interval) {
            warn!(
                "server_interval persistido inválido ({}), usando {DEFAULT_SERVER_INTERVAL}",
                record.server_interval
            );
            record.server_interval = DEFAULT_SERVER_INTERVAL;
        }

        let now = self.clock.now();
        self.display = ConfigParameter::new(record.display_interval, now, ChangeSource::Eeprom);
        self.server = ConfigParameter::new(record.server_interval, now, ChangeSource::Eeprom);
        self.record = record;
    }

    /// Copia os valores atuais para o registro e grava o bloco inteiro.
    pub fn save(&mut self) -> Result<(), StorageError> {
        self.record.display_interval = self.display.current_value;
        self.record.server_interval = self.server.current_value;
        write_record(self.storage.as_mut(), &self.record)
    }

    /// Incrementa o contador de boots e grava o registro. Chamado uma vez
    /// na inicialização, logo após [`ConfigManager::new`].
    pub fn record_boot(&mut self) -> Result<u32, StorageError> {
        self.record.boot_count = self.record.boot_count.wrapping_add(1);
        self.save()?;
        info!("Boot #{}", self.record.boot_count);
        Ok(self.record.boot_count)
    }

    pub fn set_display_interval(&mut self, minutes: f32) -> Result<(), ControllerError> {
        self.set_interval(Interval::Display, minutes)
    }

    pub fn set_server_interval(&mut self, minutes: f32) -> Result<(), ControllerError> {
        self.set_interval(Interval::Server, minutes)
    }

    fn set_interval(&mut self, which: Interval, minutes: f32) -> Result<(), ControllerError> {
        if !interval_in_range(minutes) {
            warn!("{} rejeitado: {minutes} fora de 0.1–60.0", which.name());
            return Err(ControllerError::OutOfRange { value: minutes });
        }

        let now = self.clock.now();
        let param = match which {
            Interval::Display => &mut self.display,
            Interval::Server => &mut self.server,
        };
        if (param.current_value - minutes).abs() < CHANGE_EPSILON {
            debug!("{} inalterado ({minutes})", which.name());
            return Ok(());
        }

        let previous = param.current_value;
        param.stamp(minutes, now, ChangeSource::CloudUi);
        info!("{}: {previous} → {minutes} min", which.name());

        // O valor em memória vale para a sessão mesmo se a gravação falhar.
        if let Err(e) = self.save() {
            error!("Falha ao persistir {}: {e}", which.name());
        }
        Ok(())
    }

    pub fn display_interval(&self) -> &ConfigParameter {
        &self.display
    }

    pub fn server_interval(&self) -> &ConfigParameter {
        &self.server
    }

    pub fn boot_count(&self) -> u32 {
        self.record.boot_count
    }

    pub fn send_success_count(&self) -> u32 {
        self.send_success_count
    }

    pub fn send_fail_count(&self) -> u32 {
        self.send_fail_count
    }

    /// Contabiliza o resultado de uma tentativa de envio.
    pub fn record_send(&mut self, success: bool) {
        if success {
            self.send_success_count = self.send_success_count.wrapping_add(1);
        } else {
            self.send_fail_count = self.send_fail_count.wrapping_add(1);
        }
    }

    /// Payload completo de configuração. Leitura pura.
    pub fn snapshot(&self, identity: &dyn DeviceIdentity) -> ConfigPayload {
        ConfigPayload {
            status: "ok".into(),
            device_id: identity.device_id(),
            firmware_version: identity.firmware_version(),
            boot_count: self.record.boot_count,
            send_success_count: self.send_success_count,
            send_fail_count: self.send_fail_count,
            display_interval: self.display.clone(),
            server_interval: self.server.clone(),
        }
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
