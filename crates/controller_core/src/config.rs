//! Configuração da aplicação via TOML.
//!
//! Só o que não muda em tempo de execução: identidade, endpoint de coleta e
//! ritmo do loop. Os dois intervalos ajustáveis vivem no registro
//! persistente, não aqui.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Erros ao gravar a configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro de serialização TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Erro de I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Identidade e armazenamento do dispositivo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// ID do dispositivo (vazio = hostname)
    pub device_id: String,
    /// Arquivo que emula a EEPROM (relativo ao config.toml)
    pub storage_path: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            storage_path: "controller.eeprom".into(),
        }
    }
}

/// Endpoint de coleta.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
    /// Caminho do POST
    pub path: String,
    /// Nome do cabeçalho do segredo compartilhado (vazio = não envia)
    pub auth_header: String,
    pub api_key: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: "collector.local".into(),
            port: 80,
            path: "/api/readings".into(),
            auth_header: "X-API-Key".into(),
            api_key: String::new(),
        }
    }
}

/// Ritmo do loop do scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Período do tick (ms)
    pub tick_ms: u64,
    /// `true`: primeiro envio logo após o boot
    pub push_on_boot: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_ms: 250,
            push_on_boot: true,
        }
    }
}

/// Configuração raiz.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub endpoint: EndpointConfig,
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Caminho do arquivo de EEPROM, resolvido a partir do config.toml.
    pub fn storage_path(&self, config_path: &Path) -> PathBuf {
        let storage = Path::new(&self.device.storage_path);
        if storage.is_absolute() {
            return storage.to_path_buf();
        }
        config_path
            .parent()
            .unwrap_or(Path::new("."))
            .join(storage)
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.endpoint.host.trim().is_empty() {
            errors.push("Host do endpoint não pode ser vazio".into());
        }
        if self.endpoint.port == 0 {
            errors.push("Porta do endpoint não pode ser 0".into());
        }
        if !self.endpoint.path.starts_with('/') {
            errors.push(format!(
                "Caminho do endpoint inválido: {:?} (deve começar com /)",
                self.endpoint.path
            ));
        }
        if self.device.storage_path.trim().is_empty() {
            errors.push("storage_path não pode ser vazio".into());
        }
        if self.scheduler.tick_ms == 0 {
            errors.push("tick_ms não pode ser 0".into());
        }

        errors
    }
}
