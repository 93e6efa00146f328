//! Registro persistente de layout fixo.
//!
//! Sombra durável dos dois intervalos mais o contador de boots, gravado
//! sempre como um bloco único no offset [`RECORD_OFFSET`]:
//!
//! ```text
//! ┌──────────┬─────────┬─────────────┬────────────┬────────────────┐
//! │ Magic(1) │ Ver.(1) │ display f32 │ server f32 │ boot_count u32 │
//! └──────────┴─────────┴─────────────┴────────────┴────────────────┘
//! ```
//!
//! O corpo é bincode (inteiros de largura fixa, little-endian), então o
//! registro tem sempre [`RECORD_SIZE`] bytes.

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Magic byte que identifica um registro válido. Armazenamento apagado
/// (0xFF) ou zerado nunca bate com ele.
pub const RECORD_MAGIC: u8 = 0x43; // 'C'

/// Versão atual do layout.
pub const RECORD_VERSION: u8 = 1;

const HEADER_SIZE: usize = 2;
const BODY_SIZE: usize = 12;

/// Tamanho total do registro em bytes.
pub const RECORD_SIZE: usize = HEADER_SIZE + BODY_SIZE;

/// Posição do registro no meio de armazenamento.
pub const RECORD_OFFSET: u64 = 0;

/// Conteúdo do registro persistente.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    /// Intervalo de display (minutos)
    pub display_interval: f32,
    /// Intervalo de envio (minutos)
    pub server_interval: f32,
    /// Incrementado uma vez por boot
    pub boot_count: u32,
}

/// Erros do armazenamento.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Erro de I/O no armazenamento: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registro muito curto ({0} bytes, esperado {RECORD_SIZE})")]
    TooShort(usize),

    #[error("Magic byte inválido: 0x{0:02X} (esperado 0x{RECORD_MAGIC:02X})")]
    InvalidMagic(u8),

    #[error("Versão incompatível: {0} (suportada: {RECORD_VERSION})")]
    VersionMismatch(u8),

    #[error("Erro de codec: {0}")]
    Codec(String),
}

/// Codifica o registro no bloco de tamanho fixo.
pub fn encode_record(record: &PersistedRecord) -> Result<Vec<u8>, StorageError> {
    let body = bincode::serialize(record).map_err(|e| StorageError::Codec(e.to_string()))?;
    debug_assert_eq!(body.len(), BODY_SIZE);

    let mut block = Vec::with_capacity(RECORD_SIZE);
    block.push(RECORD_MAGIC);
    block.push(RECORD_VERSION);
    block.extend_from_slice(&body);
    Ok(block)
}

/// Decodifica um bloco lido do armazenamento.
pub fn decode_record(data: &[u8]) -> Result<PersistedRecord, StorageError> {
    if data.len() < RECORD_SIZE {
        return Err(StorageError::TooShort(data.len()));
    }
    if data[0] != RECORD_MAGIC {
        return Err(StorageError::InvalidMagic(data[0]));
    }
    if data[1] != RECORD_VERSION {
        return Err(StorageError::VersionMismatch(data[1]));
    }
    bincode::deserialize(&data[HEADER_SIZE..RECORD_SIZE])
        .map_err(|e| StorageError::Codec(e.to_string()))
}

// ──────────────────────────────────────────────
// Meio de armazenamento
// ──────────────────────────────────────────────

/// Armazenamento não-volátil endereçado por byte.
pub trait NvStorage: Send {
    /// Lê até `buf.len()` bytes a partir de `offset`. Retorna quantos foram
    /// lidos; `0` quando não há nada gravado.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Grava `data` a partir de `offset` de forma síncrona.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), StorageError>;
}

/// Lê o registro. `Ok(None)` quando o meio está vazio.
pub fn read_record(storage: &mut dyn NvStorage) -> Result<Option<PersistedRecord>, StorageError> {
    let mut buf = [0u8; RECORD_SIZE];
    let n = storage.read_at(RECORD_OFFSET, &mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    decode_record(&buf[..n]).map(Some)
}

/// Grava o registro completo (nunca parcial).
pub fn write_record(storage: &mut dyn NvStorage, record: &PersistedRecord) -> Result<(), StorageError> {
    let block = encode_record(record)?;
    storage.write_at(RECORD_OFFSET, &block)
}

/// Imagem de EEPROM emulada em arquivo.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl NvStorage for FileStorage {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError> {
        let mut file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), StorageError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.sync_data()?;
        Ok(())
    }
}

/// Armazenamento em memória que conta gravações.
///
/// Clones compartilham os mesmos bytes, então um clone serve de espião
/// enquanto o original é entregue ao `ConfigManager`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    bytes: Arc<Mutex<Vec<u8>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Começa com um conteúdo pré-existente.
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(Mutex::new(bytes)),
            writes: Arc::default(),
        }
    }

    /// Número de gravações feitas até agora.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Cópia do conteúdo atual.
    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl NvStorage for MemoryStorage {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError> {
        let bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        let start = (offset as usize).min(bytes.len());
        let n = buf.len().min(bytes.len() - start);
        buf[..n].copy_from_slice(&bytes[start..start + n]);
        Ok(n)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<(), StorageError> {
        let mut bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        let start = offset as usize;
        let end = start + data.len();
        if bytes.len() < end {
            bytes.resize(end, 0xFF);
        }
        bytes[start..end].copy_from_slice(data);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> PersistedRecord {
        PersistedRecord {
            display_interval: 2.5,
            server_interval: 15.0,
            boot_count: 42,
        }
    }

    #[test]
    fn record_has_fixed_size() {
        let block = encode_record(&sample_record()).unwrap();
        assert_eq!(block.len(), RECORD_SIZE);
        assert_eq!(block[0], RECORD_MAGIC);
        assert_eq!(block[1], RECORD_VERSION);
        // boot_count little-endian no final do bloco
        assert_eq!(&block[10..14], &42u32.to_le_bytes());
    }

    #[test]
    fn decode_reads_back_record() {
        let block = encode_record(&sample_record()).unwrap();
        assert_eq!(decode_record(&block).unwrap(), sample_record());
    }

    #[test]
    fn erased_storage_is_rejected() {
        let erased = [0xFFu8; RECORD_SIZE];
        assert!(matches!(
            decode_record(&erased),
            Err(StorageError::InvalidMagic(0xFF))
        ));
    }

    #[test]
    fn short_block_is_rejected() {
        assert!(matches!(
            decode_record(&[RECORD_MAGIC, RECORD_VERSION, 0]),
            Err(StorageError::TooShort(3))
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut block = encode_record(&sample_record()).unwrap();
        block[1] = 9;
        assert!(matches!(
            decode_record(&block),
            Err(StorageError::VersionMismatch(9))
        ));
    }

    #[test]
    fn empty_memory_storage_has_no_record() {
        let mut storage = MemoryStorage::new();
        assert!(read_record(&mut storage).unwrap().is_none());
    }

    #[test]
    fn memory_storage_counts_writes_across_clones() {
        let spy = MemoryStorage::new();
        let mut storage = spy.clone();
        write_record(&mut storage, &sample_record()).unwrap();
        write_record(&mut storage, &sample_record()).unwrap();
        assert_eq!(spy.writes(), 2);
        assert_eq!(spy.contents().len(), RECORD_SIZE);
    }

    #[test]
    fn file_storage_persists_between_instances() {
        let path = std::env::temp_dir().join(format!(
            "controller_core_record_{}.bin",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let mut first = FileStorage::new(&path);
        assert!(read_record(&mut first).unwrap().is_none());
        write_record(&mut first, &sample_record()).unwrap();

        let mut second = FileStorage::new(&path);
        assert_eq!(read_record(&mut second).unwrap(), Some(sample_record()));

        let _ = std::fs::remove_file(&path);
    }
}
