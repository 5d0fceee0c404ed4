use std::path::PathBuf;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::cache::CacheError;
use crate::handler::HandlerError;
use crate::template::TemplateError;

/// Errors produced by dataset construction, discovery and mapping
#[derive(Debug, Error)]
pub enum DatasetError {
    /// Path template failed to compile or parse
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
    /// Metadata cache persistence failed
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    /// A file handler operation failed
    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),
    /// I/O failure during discovery
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A search directory produced an invalid listing pattern
    #[error("Invalid search pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    /// The worker pool could not be constructed
    #[error("Worker pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    /// No files matched a strict query
    #[error(
        "Found no files for {name} between {start} and {end}! Maybe you misspelled \
         the files path? Or maybe there are no files for this time period?"
    )]
    NoFiles {
        name: String,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    /// A file's start time could not be determined from any configured source
    #[error("Could not retrieve a start time for '{path}'")]
    NoStartTime { path: PathBuf },
    /// A single-file dataset's path does not point to an existing file
    #[error("The path of '{name}' contains no placeholders and is not an existing file")]
    SingleFileMissing { name: String },
    /// The default time coverage does not fit the dataset kind
    #[error("Invalid time coverage: {reason}")]
    InvalidTimeCoverage { reason: String },
}
