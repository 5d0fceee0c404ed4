//! External collaborator interfaces: file handlers and the compression
//! boundary.
//!
//! Concrete codecs live outside this crate. A dataset only needs the
//! [`FileHandler`] contract to read, write and inspect files, and the
//! [`Compression`] seam to route path access through transparent
//! (de)compression when a path carries a compression suffix.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::record::RecordInfo;

/// Errors surfaced by handler implementations
#[derive(Debug, Error)]
pub enum HandlerError {
    /// An operation requiring a handler was called without one configured
    #[error("No file handler is configured for this dataset")]
    NoHandler,
    /// The files of a collection do not share the internal structure the
    /// operation requires; re-raised unchanged by the core
    #[error("Files have inhomogeneous structure: {0}")]
    InhomogeneousFiles(String),
    /// I/O failure inside a handler
    #[error("Handler I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Any other handler-specific failure
    #[error("Handler error: {0}")]
    Other(String),
}

/// Codec contract a dataset delegates file access to.
///
/// Handler-specific read/write options (delimiters, field selections, ...)
/// are construction state of the implementing type, not per-call arguments.
pub trait FileHandler: Send + Sync {
    /// The in-memory representation of one file's content.
    type Content: Send;

    /// Read and decode a file.
    ///
    /// # Errors
    /// Returns a [`HandlerError`] when the file cannot be read or decoded.
    fn read(&self, path: &Path) -> Result<Self::Content, HandlerError>;

    /// Encode and write content to a file.
    ///
    /// # Errors
    /// Returns a [`HandlerError`] when the content cannot be written.
    fn write(&self, path: &Path, content: &Self::Content) -> Result<(), HandlerError>;

    /// Inspect a file for coverage times and attributes without fully
    /// decoding it. The default knows nothing.
    ///
    /// # Errors
    /// Returns a [`HandlerError`] when the file cannot be inspected.
    fn get_info(&self, path: &Path) -> Result<RecordInfo, HandlerError> {
        let _ = path;
        Ok(RecordInfo::default())
    }
}

/// Placeholder handler for datasets that never touch file content. Every
/// operation fails with [`HandlerError::NoHandler`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHandler;

impl FileHandler for NoHandler {
    type Content = ();

    fn read(&self, _path: &Path) -> Result<Self::Content, HandlerError> {
        Err(HandlerError::NoHandler)
    }

    fn write(&self, _path: &Path, _content: &Self::Content) -> Result<(), HandlerError> {
        Err(HandlerError::NoHandler)
    }

    fn get_info(&self, _path: &Path) -> Result<RecordInfo, HandlerError> {
        Err(HandlerError::NoHandler)
    }
}

/// Transparent compression seam applied around path access.
///
/// `decompress` maps a compressed path to a readable path (e.g. a
/// temporary extraction); `compress` packs a freshly written file in
/// place.
pub trait Compression: Send + Sync {
    /// # Errors
    /// Returns a [`HandlerError`] when decompression fails.
    fn decompress(&self, path: &Path) -> Result<PathBuf, HandlerError>;

    /// # Errors
    /// Returns a [`HandlerError`] when compression fails.
    fn compress(&self, path: &Path) -> Result<(), HandlerError>;
}

/// Default boundary: passes paths through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl Compression for PassThrough {
    fn decompress(&self, path: &Path) -> Result<PathBuf, HandlerError> {
        Ok(path.to_path_buf())
    }

    fn compress(&self, _path: &Path) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Whether an extension denotes a recognized compression format.
#[must_use]
pub fn is_compression_format(extension: &str) -> bool {
    matches!(
        extension.to_ascii_lowercase().as_str(),
        "zip" | "gz" | "bz2" | "xz" | "zst"
    )
}

/// Whether a path ends in a recognized compression suffix.
#[must_use]
pub fn has_compression_suffix(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(is_compression_format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_handler_fails_everything() {
        let handler = NoHandler;
        assert!(matches!(
            handler.read(Path::new("/d/a.dat")),
            Err(HandlerError::NoHandler)
        ));
        assert!(matches!(
            handler.get_info(Path::new("/d/a.dat")),
            Err(HandlerError::NoHandler)
        ));
    }

    #[test]
    fn test_compression_suffix_detection() {
        assert!(has_compression_suffix(Path::new("/d/file.nc.gz")));
        assert!(has_compression_suffix(Path::new("/d/file.ZIP")));
        assert!(!has_compression_suffix(Path::new("/d/file.nc")));
        assert!(!has_compression_suffix(Path::new("/d/file")));
    }
}
