use thiserror::Error;

/// Errors produced while persisting the metadata cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O failure while reading or writing the cache file
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The cache file content could not be (de)serialized
    #[error("Cache serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
