//! Identidade do dispositivo a partir da configuração ou do sistema.

use controller_core::clock::StaticIdentity;
use sysinfo::System;

/// Versão de firmware reportada em leituras e no payload de configuração.
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

const UNKNOWN_DEVICE: &str = "unknown-device";

/// `configured_id` vazio cai para o hostname.
pub fn resolve_identity(configured_id: &str) -> StaticIdentity {
    let configured_id = configured_id.trim();
    let device_id = if configured_id.is_empty() {
        System::host_name()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| UNKNOWN_DEVICE.into())
    } else {
        configured_id.to_string()
    };
    StaticIdentity::new(device_id, FIRMWARE_VERSION)
}
