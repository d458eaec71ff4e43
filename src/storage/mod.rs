pub mod file;
pub mod memory;

pub use file::JsonFileStorage;
pub use memory::MemoryStorage;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored data is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("storage is unavailable: {0}")]
    Unavailable(String),

    #[error("storage quota exceeded for key '{0}'")]
    QuotaExceeded(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// String key-value store standing in for a browser's local storage.
pub trait KeyValueStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}
