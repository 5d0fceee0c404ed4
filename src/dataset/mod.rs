//! Datasets: file collections whose paths encode time coverage.
//!
//! A [`Dataset`] owns a compiled path template and an immutable
//! configuration built through [`DatasetBuilder`]. It resolves file records
//! through a per-instance metadata cache, discovers files by time range,
//! joins collections by time overlap and fans work out over a worker pool.
//!
//! Configuration is validated at construction and owned exclusively by one
//! instance; nothing is shared mutable state between datasets.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use log::debug;

use crate::cache::InfoCache;
use crate::exclude::ExclusionSet;
use crate::handler::{
    Compression, FileHandler, HandlerError, NoHandler, PassThrough, has_compression_suffix,
};
use crate::overlap;
use crate::record::{FileRecord, RecordInfo};
use crate::template::PathTemplate;

pub mod discovery;
pub mod error;
pub mod map;

pub use discovery::{Bundle, FileBundle, FileFinder, FindOptions};
pub use error::DatasetError;
pub use map::{BundleContent, MapOptions, MapOutput, MapResult};

/// How [`Dataset::get_info`] retrieves a file's metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InfoVia {
    /// Parse the placeholders in the file's path.
    #[default]
    Filename,
    /// Ask the file handler's `get_info`.
    Handler,
    /// Both; handler information overwrites conflicting filename values.
    Both,
}

/// Default time coverage policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeCoverage {
    /// Absolute coverage of a single-file dataset.
    Absolute(NaiveDateTime, NaiveDateTime),
    /// Fixed duration of each file in a multi-file dataset, used when the
    /// filename encodes only a start time. A zero duration means the end
    /// time defaults to the start time.
    PerFile(Duration),
}

/// A collection of files indexed by the time ranges their paths encode.
pub struct Dataset<H: FileHandler = NoHandler> {
    name: String,
    template: PathTemplate,
    handler: Option<H>,
    info_via: InfoVia,
    time_coverage: TimeCoverage,
    exclude: ExclusionSet,
    pool_size: Option<usize>,
    compress: bool,
    decompress: bool,
    compression: Box<dyn Compression>,
    cache: InfoCache,
    cache_path: Option<PathBuf>,
}

impl<H: FileHandler> fmt::Debug for Dataset<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("name", &self.name)
            .field("template", &self.template)
            .field("info_via", &self.info_via)
            .field("time_coverage", &self.time_coverage)
            .field("exclude", &self.exclude)
            .field("pool_size", &self.pool_size)
            .field("compress", &self.compress)
            .field("decompress", &self.decompress)
            .field("cache", &self.cache)
            .field("cache_path", &self.cache_path)
            .finish_non_exhaustive()
    }
}

impl Dataset<NoHandler> {
    /// Start building a dataset for a path template.
    ///
    /// # Examples
    /// ```no_run
    /// use timedex::Dataset;
    ///
    /// let dataset = Dataset::builder("/data/{year}/{month}/{day}/{hour}{minute}{second}.nc")
    ///     .name("TestData")
    ///     .build()
    ///     .unwrap();
    /// ```
    #[must_use]
    pub fn builder(path: impl Into<String>) -> DatasetBuilder<NoHandler> {
        DatasetBuilder::new(path)
    }
}

impl<H: FileHandler> Dataset<H> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    /// Whether the dataset consists of exactly one physical file.
    #[must_use]
    pub const fn is_single_file(&self) -> bool {
        self.template.is_single_file()
    }

    #[must_use]
    pub const fn time_coverage(&self) -> TimeCoverage {
        self.time_coverage
    }

    #[must_use]
    pub const fn exclude(&self) -> &ExclusionSet {
        &self.exclude
    }

    #[must_use]
    pub const fn cache(&self) -> &InfoCache {
        &self.cache
    }

    pub(crate) const fn pool_size(&self) -> Option<usize> {
        self.pool_size
    }

    /// Resolve the metadata record for a file path.
    ///
    /// Returns the cached record when present. Otherwise the record is
    /// assembled from the filename and/or the handler per the configured
    /// retrieval mode, a missing end time is defaulted from the per-file
    /// coverage, and the result is cached.
    ///
    /// # Errors
    /// * [`DatasetError::NoStartTime`] when no source yields a start time.
    /// * Template, handler or I/O errors from the underlying sources.
    pub fn get_info(&self, path: &Path) -> Result<FileRecord, DatasetError> {
        if let Some(record) = self.cache.get(path) {
            return Ok(record);
        }

        let mut info = RecordInfo::default();
        if let TimeCoverage::Absolute(start, end) = self.time_coverage {
            info.start = Some(start);
            info.end = Some(end);
        }

        if matches!(self.info_via, InfoVia::Filename | InfoVia::Both) {
            info.update(self.template.parse(&path.to_string_lossy())?);
        }
        if matches!(self.info_via, InfoVia::Handler | InfoVia::Both) {
            let handler = self.handler.as_ref().ok_or(HandlerError::NoHandler)?;
            let read_path = self.decompressed_path(path)?;
            info.update(handler.get_info(&read_path)?);
        }

        let Some(start) = info.start else {
            return Err(DatasetError::NoStartTime {
                path: path.to_path_buf(),
            });
        };
        let end = match info.end {
            Some(end) => end,
            None => match self.time_coverage {
                TimeCoverage::PerFile(duration) => start + duration,
                TimeCoverage::Absolute(..) => start,
            },
        };

        let record = FileRecord {
            path: path.to_path_buf(),
            start,
            end,
            attributes: info.attributes,
        };
        self.cache.insert(record.clone());
        Ok(record)
    }

    /// Generate the full path for a time period, filling user placeholders
    /// from `fill`.
    ///
    /// # Errors
    /// Returns a template error when a placeholder cannot be filled.
    pub fn generate_filename(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        fill: &BTreeMap<String, String>,
    ) -> Result<PathBuf, DatasetError> {
        Ok(PathBuf::from(self.template.generate(start, end, fill)?))
    }

    /// Read a file's content through the handler, routing the path through
    /// the decompression boundary when it carries a compression suffix.
    ///
    /// # Errors
    /// [`HandlerError::NoHandler`] when no handler is configured, otherwise
    /// whatever the handler raises.
    pub fn read(&self, path: &Path) -> Result<H::Content, DatasetError> {
        let handler = self.handler.as_ref().ok_or(HandlerError::NoHandler)?;
        let read_path = self.decompressed_path(path)?;
        Ok(handler.read(&read_path)?)
    }

    /// Write content through the handler, creating parent directories and
    /// compressing afterwards when configured.
    ///
    /// # Errors
    /// [`HandlerError::NoHandler`] when no handler is configured, otherwise
    /// whatever the handler or the filesystem raises.
    pub fn write(&self, path: &Path, content: &H::Content) -> Result<(), DatasetError> {
        let handler = self.handler.as_ref().ok_or(HandlerError::NoHandler)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        handler.write(path, content)?;
        if self.compress && has_compression_suffix(path) {
            self.compression.compress(path)?;
        }
        Ok(())
    }

    /// Read the contents of all files in a period, sorted by coverage
    /// start.
    ///
    /// # Errors
    /// [`DatasetError::NoFiles`] when the period is empty, plus any read
    /// error.
    pub fn read_period(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<H::Content>, DatasetError> {
        let records = self.find_files(start, end, FindOptions::new())?.records()?;
        records.iter().map(|rec| self.read(&rec.path)).collect()
    }

    /// Whether any file of the dataset covers the given instant.
    ///
    /// Only meaningful for datasets of files that cover time spans rather
    /// than single timestamps.
    ///
    /// # Errors
    /// Propagates discovery errors.
    pub fn contains(&self, timestamp: NaiveDateTime) -> Result<bool, DatasetError> {
        let end = timestamp + Duration::microseconds(1);
        let options = FindOptions::new().sort(false).strict(false);
        let mut finder = self.find_files(timestamp, end, options)?;
        match finder.next() {
            Some(Ok(_)) => Ok(true),
            Some(Err(e)) => Err(e),
            None => Ok(false),
        }
    }

    /// Join this dataset's files against another dataset's by time overlap.
    ///
    /// Discovers both collections over `[start, end)` (widened by `max_gap`
    /// when given), then pairs every file of this dataset with the files of
    /// `other` whose coverage overlaps it, treating files separated by up
    /// to `max_gap` as overlapping.
    ///
    /// # Errors
    /// [`DatasetError::NoFiles`] when either collection is empty in the
    /// window, plus any discovery error.
    pub fn find_overlapping_files<H2: FileHandler>(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        other: &Dataset<H2>,
        max_gap: Option<Duration>,
    ) -> Result<Vec<(FileRecord, Vec<FileRecord>)>, DatasetError> {
        let (query_start, query_end) = match max_gap {
            Some(gap) => (start - gap, end + gap),
            None => (start, end),
        };
        let primary = self
            .find_files(query_start, query_end, FindOptions::new())?
            .records()?;
        let secondary = other
            .find_files(query_start, query_end, FindOptions::new())?
            .records()?;
        Ok(overlap::match_overlapping(&primary, &secondary, max_gap))
    }

    /// Replace the default time-coverage policy.
    ///
    /// Clears the metadata cache in full, since cached end times may have
    /// been derived from the previous policy.
    ///
    /// # Errors
    /// [`DatasetError::InvalidTimeCoverage`] when the policy does not fit
    /// the dataset kind.
    pub fn set_time_coverage(&mut self, coverage: TimeCoverage) -> Result<(), DatasetError> {
        validate_coverage(self.template.is_single_file(), &coverage)?;
        self.time_coverage = coverage;
        self.cache.clear();
        Ok(())
    }

    /// Persist the metadata cache to the configured cache path, if any.
    ///
    /// This is the explicit flush point; nothing is saved implicitly at
    /// process exit.
    ///
    /// # Errors
    /// Returns a cache error when the write fails.
    pub fn flush_cache(&self) -> Result<(), DatasetError> {
        if let Some(path) = &self.cache_path {
            self.cache.save(path)?;
        }
        Ok(())
    }

    pub(crate) fn decompressed_path(&self, path: &Path) -> Result<PathBuf, DatasetError> {
        if self.decompress && has_compression_suffix(path) {
            Ok(self.compression.decompress(path)?)
        } else {
            Ok(path.to_path_buf())
        }
    }

    pub(crate) fn no_files(&self, start: NaiveDateTime, end: NaiveDateTime) -> DatasetError {
        DatasetError::NoFiles {
            name: self.name.clone(),
            start,
            end,
        }
    }
}

impl<H: FileHandler> fmt::Display for Dataset<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_single_file() {
            "Single-File"
        } else {
            "Multi-File"
        };
        write!(
            f,
            "Name:\t{}\nType:\t{}\nFiles path:\t{}",
            self.name,
            kind,
            self.template.raw()
        )
    }
}

/// Builder for [`Dataset`]; all configuration is validated in
/// [`DatasetBuilder::build`].
pub struct DatasetBuilder<H: FileHandler = NoHandler> {
    path: String,
    name: Option<String>,
    handler: Option<H>,
    info_via: InfoVia,
    time_coverage: Option<TimeCoverage>,
    exclude: Vec<(NaiveDateTime, NaiveDateTime)>,
    placeholders: BTreeMap<String, String>,
    pool_size: Option<usize>,
    compress: bool,
    decompress: bool,
    compression: Option<Box<dyn Compression>>,
    cache_path: Option<PathBuf>,
}

impl DatasetBuilder<NoHandler> {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: None,
            handler: None,
            info_via: InfoVia::default(),
            time_coverage: None,
            exclude: Vec::new(),
            placeholders: BTreeMap::new(),
            pool_size: None,
            compress: true,
            decompress: true,
            compression: None,
            cache_path: None,
        }
    }
}

impl<H: FileHandler> DatasetBuilder<H> {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a file handler; required for the `Handler` and `Both`
    /// retrieval modes and for any content access.
    #[must_use]
    pub fn handler<H2: FileHandler>(self, handler: H2) -> DatasetBuilder<H2> {
        DatasetBuilder {
            path: self.path,
            name: self.name,
            handler: Some(handler),
            info_via: self.info_via,
            time_coverage: self.time_coverage,
            exclude: self.exclude,
            placeholders: self.placeholders,
            pool_size: self.pool_size,
            compress: self.compress,
            decompress: self.decompress,
            compression: self.compression,
            cache_path: self.cache_path,
        }
    }

    #[must_use]
    pub fn info_via(mut self, info_via: InfoVia) -> Self {
        self.info_via = info_via;
        self
    }

    #[must_use]
    pub fn time_coverage(mut self, coverage: TimeCoverage) -> Self {
        self.time_coverage = Some(coverage);
        self
    }

    /// Add time periods to skip during discovery.
    #[must_use]
    pub fn exclude(
        mut self,
        periods: impl IntoIterator<Item = (NaiveDateTime, NaiveDateTime)>,
    ) -> Self {
        self.exclude.extend(periods);
        self
    }

    /// Register a user-defined placeholder with a single-capture regex
    /// fragment, e.g. `("channel", r"(\d+)")`.
    #[must_use]
    pub fn placeholder(mut self, name: impl Into<String>, fragment: impl Into<String>) -> Self {
        self.placeholders.insert(name.into(), fragment.into());
        self
    }

    /// Default worker-pool size for `map`-like calls; the host's logical
    /// core count when unset.
    #[must_use]
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = Some(size);
        self
    }

    #[must_use]
    pub fn compress(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    #[must_use]
    pub fn decompress(mut self, enabled: bool) -> Self {
        self.decompress = enabled;
        self
    }

    /// Replace the pass-through compression boundary.
    #[must_use]
    pub fn compression(mut self, boundary: Box<dyn Compression>) -> Self {
        self.compression = Some(boundary);
        self
    }

    /// Persist resolved records at this path; loaded once now, saved at
    /// [`Dataset::flush_cache`].
    #[must_use]
    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Compile the template and validate the configuration.
    ///
    /// # Errors
    /// * Template compilation errors (unknown/duplicate placeholder, user
    ///   placeholder in the directory portion, broken fragment,
    ///   placeholders on a single-file path).
    /// * [`HandlerError::NoHandler`] when the retrieval mode needs a
    ///   handler and none is configured.
    /// * [`DatasetError::InvalidTimeCoverage`] when the coverage policy
    ///   does not fit the dataset kind.
    pub fn build(self) -> Result<Dataset<H>, DatasetError> {
        let template = PathTemplate::compile(&self.path, &self.placeholders)?;

        if matches!(self.info_via, InfoVia::Handler | InfoVia::Both) && self.handler.is_none() {
            return Err(HandlerError::NoHandler.into());
        }

        let time_coverage = match self.time_coverage {
            Some(coverage) => {
                validate_coverage(template.is_single_file(), &coverage)?;
                coverage
            }
            None if template.is_single_file() => {
                TimeCoverage::Absolute(NaiveDateTime::MIN, NaiveDateTime::MAX)
            }
            None => TimeCoverage::PerFile(Duration::zero()),
        };

        let cache = InfoCache::new();
        if let Some(path) = &self.cache_path {
            cache.load(path);
        }

        let name = self.name.unwrap_or_else(|| self.path.clone());
        debug!("Built dataset '{name}' for template '{}'", self.path);

        Ok(Dataset {
            name,
            template,
            handler: self.handler,
            info_via: self.info_via,
            time_coverage,
            exclude: ExclusionSet::new(self.exclude),
            pool_size: self.pool_size,
            compress: self.compress,
            decompress: self.decompress,
            compression: self.compression.unwrap_or_else(|| Box::new(PassThrough)),
            cache,
            cache_path: self.cache_path,
        })
    }
}

fn validate_coverage(single_file: bool, coverage: &TimeCoverage) -> Result<(), DatasetError> {
    match (single_file, coverage) {
        (true, TimeCoverage::PerFile(_)) => Err(DatasetError::InvalidTimeCoverage {
            reason: "a single-file dataset needs an absolute coverage, not a per-file duration"
                .to_string(),
        }),
        (false, TimeCoverage::Absolute(..)) => Err(DatasetError::InvalidTimeCoverage {
            reason: "a multi-file dataset needs a per-file duration, not an absolute coverage"
                .to_string(),
        }),
        _ => Ok(()),
    }
}
