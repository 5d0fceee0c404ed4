//! Timedex - a time-range index over file collections
//!
//! This library addresses file collections whose paths encode the time
//! period each file covers, e.g. `/data/2018/01/01/120000-180000.nc`.
//! A path template with placeholders describes the layout; from it the
//! library finds the files overlapping a queried period, pairs files from
//! two collections by temporal overlap, and maps a function over a period's
//! files on a worker pool.

use thiserror::Error;

pub mod cache;
pub mod dataset;
pub mod exclude;
pub mod handler;
pub mod manager;
pub mod overlap;
pub mod record;
pub mod resolution;
pub mod template;

pub use cache::InfoCache;
pub use dataset::{
    Bundle, BundleContent, Dataset, DatasetBuilder, DatasetError, FileBundle, FileFinder,
    FindOptions, InfoVia, MapOptions, MapOutput, MapResult, TimeCoverage,
};
pub use exclude::ExclusionSet;
pub use handler::{Compression, FileHandler, HandlerError, NoHandler};
pub use manager::DatasetManager;
pub use record::FileRecord;
pub use template::PathTemplate;

/// Error enum, contains all failure states of the library
#[derive(Debug, Error)]
pub enum TimedexError {
    /// Template compilation or parsing error
    #[error("Template error: {0}")]
    TemplateError(#[from] template::TemplateError),
    /// Dataset operation error
    #[error("Dataset error: {0}")]
    DatasetError(#[from] dataset::DatasetError),
    /// Metadata cache error
    #[error("Cache error: {0}")]
    CacheError(#[from] cache::CacheError),
    /// File handler error
    #[error("Handler error: {0}")]
    HandlerError(#[from] handler::HandlerError),
    /// Represents an I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
