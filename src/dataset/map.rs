//! Parallel map over a time period.
//!
//! [`Dataset::map`] distributes the files of a period over a dedicated
//! worker pool and applies a caller function to each bundle. The run is
//! fail-fast: the first error cancels outstanding work and is returned.
//! [`Dataset::map_content`] additionally reads each file's content through
//! the handler before invoking the function.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDateTime;
use log::debug;
use rayon::prelude::*;

use super::discovery::{Bundle, FileBundle, FindOptions};
use super::{Dataset, DatasetError};
use crate::handler::FileHandler;

/// Destination for per-bundle results: a filename generator plus a writer.
///
/// Implemented by [`Dataset`] itself so one dataset's processed files can
/// land in another dataset's layout.
pub trait MapOutput<T>: Sync {
    /// The output path for a bundle covering `[start, end]`.
    ///
    /// # Errors
    /// Returns a template error when a placeholder cannot be filled.
    fn generate_filename(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        fill: &BTreeMap<String, String>,
    ) -> Result<PathBuf, DatasetError>;

    /// Persist one result.
    ///
    /// # Errors
    /// Whatever the backing handler or filesystem raises.
    fn write(&self, path: &std::path::Path, value: &T) -> Result<(), DatasetError>;
}

impl<H: FileHandler> MapOutput<H::Content> for Dataset<H> {
    fn generate_filename(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        fill: &BTreeMap<String, String>,
    ) -> Result<PathBuf, DatasetError> {
        Dataset::generate_filename(self, start, end, fill)
    }

    fn write(&self, path: &std::path::Path, value: &H::Content) -> Result<(), DatasetError> {
        Dataset::write(self, path, value)
    }
}

/// Options for [`Dataset::map`] and [`Dataset::map_content`].
#[derive(Default, Clone)]
pub struct MapOptions {
    pub(crate) pool_size: Option<usize>,
    pub(crate) bundle: Option<Bundle>,
    pub(crate) include_file_info: bool,
    pub(crate) worker_init: Option<Arc<dyn Fn(usize) + Send + Sync>>,
}

impl MapOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Worker count for this run, overriding the dataset's configured
    /// size. Zero means one worker per available core.
    #[must_use]
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = Some(size);
        self
    }

    /// Group files into bundles before dispatch; each bundle is one task.
    #[must_use]
    pub fn bundle(mut self, bundle: Bundle) -> Self {
        self.bundle = Some(bundle);
        self
    }

    /// Return results as [`MapResult::WithInfo`], pairing each value with
    /// the bundle it came from. Ignored when an output dataset is given.
    #[must_use]
    pub fn include_file_info(mut self, include: bool) -> Self {
        self.include_file_info = include;
        self
    }

    /// Run once on each worker thread before it takes tasks, receiving the
    /// worker index. Useful for thread-local setup.
    #[must_use]
    pub fn worker_init(mut self, init: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.worker_init = Some(Arc::new(init));
        self
    }
}

impl std::fmt::Debug for MapOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapOptions")
            .field("pool_size", &self.pool_size)
            .field("bundle", &self.bundle)
            .field("include_file_info", &self.include_file_info)
            .field("worker_init", &self.worker_init.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Outcome of one map task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapResult<R> {
    /// The function's return value.
    Value(R),
    /// The value plus the bundle it was computed from.
    WithInfo(FileBundle, R),
    /// The value was written to an output dataset; only the source bundle
    /// is kept.
    Written(FileBundle),
}

/// Content handed to a [`Dataset::map_content`] function, mirroring the
/// bundle shape.
pub enum BundleContent<C> {
    Single(C),
    Group(Vec<C>),
}

impl<H: FileHandler> Dataset<H> {
    /// Apply `func` to every file (or bundle) of `[start, end)` in
    /// parallel.
    ///
    /// Results come back in bundle order. When `output` is given, each
    /// result is written to the path the output generates for the bundle's
    /// span and [`MapResult::Written`] is returned instead of the value.
    ///
    /// # Errors
    /// Discovery errors, plus the first error any task returns; remaining
    /// results are discarded.
    pub fn map<R, F>(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        func: F,
        output: Option<&dyn MapOutput<R>>,
        options: &MapOptions,
    ) -> Result<Vec<MapResult<R>>, DatasetError>
    where
        R: Send,
        F: Fn(&Self, &FileBundle) -> Result<R, DatasetError> + Sync,
    {
        let bundles = self.collect_bundles(start, end, options)?;
        debug!(
            "Mapping {} tasks of '{}' between {start} and {end}",
            bundles.len(),
            self.name()
        );
        let pool = self.build_pool(options)?;
        pool.install(|| {
            bundles
                .into_par_iter()
                .map(|bundle| {
                    let value = func(self, &bundle)?;
                    finish_task(bundle, value, output, options.include_file_info)
                })
                .collect()
        })
    }

    /// Like [`Dataset::map`], but reads each file's content through the
    /// handler first and passes it to `func` alongside the bundle.
    ///
    /// # Errors
    /// Discovery and read errors, plus the first error any task returns.
    pub fn map_content<R, F>(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        func: F,
        output: Option<&dyn MapOutput<R>>,
        options: &MapOptions,
    ) -> Result<Vec<MapResult<R>>, DatasetError>
    where
        R: Send,
        F: Fn(&Self, &FileBundle, BundleContent<H::Content>) -> Result<R, DatasetError> + Sync,
    {
        let bundles = self.collect_bundles(start, end, options)?;
        debug!(
            "Mapping {} content tasks of '{}' between {start} and {end}",
            bundles.len(),
            self.name()
        );
        let pool = self.build_pool(options)?;
        pool.install(|| {
            bundles
                .into_par_iter()
                .map(|bundle| {
                    let content = match &bundle {
                        FileBundle::Single(record) => {
                            BundleContent::Single(self.read(&record.path)?)
                        }
                        FileBundle::Group(records) => BundleContent::Group(
                            records
                                .iter()
                                .map(|record| self.read(&record.path))
                                .collect::<Result<_, _>>()?,
                        ),
                    };
                    let value = func(self, &bundle, content)?;
                    finish_task(bundle, value, output, options.include_file_info)
                })
                .collect()
        })
    }

    fn collect_bundles(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        options: &MapOptions,
    ) -> Result<Vec<FileBundle>, DatasetError> {
        self.find_files(
            start,
            end,
            FindOptions::new().sort(true).bundle(options.bundle),
        )?
        .collect()
    }

    fn build_pool(&self, options: &MapOptions) -> Result<rayon::ThreadPool, DatasetError> {
        let mut builder = rayon::ThreadPoolBuilder::new()
            .num_threads(options.pool_size.or(self.pool_size()).unwrap_or(0));
        if let Some(init) = &options.worker_init {
            let init = Arc::clone(init);
            builder = builder.start_handler(move |index| init(index));
        }
        Ok(builder.build()?)
    }
}

fn finish_task<R>(
    bundle: FileBundle,
    value: R,
    output: Option<&dyn MapOutput<R>>,
    include_file_info: bool,
) -> Result<MapResult<R>, DatasetError> {
    if let Some(output) = output {
        let (start, end) = bundle.span();
        let path = output.generate_filename(start, end, &bundle.fill())?;
        output.write(&path, &value)?;
        Ok(MapResult::Written(bundle))
    } else if include_file_info {
        Ok(MapResult::WithInfo(bundle, value))
    } else {
        Ok(MapResult::Value(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FileRecord;
    use crate::resolution::parse_timestamp;

    #[test]
    fn test_finish_task_variants() {
        let record = FileRecord::new(
            "a",
            parse_timestamp("2017-01-01").unwrap(),
            parse_timestamp("2017-01-02").unwrap(),
        );
        let bundle = FileBundle::Single(record);

        let plain = finish_task::<u32>(bundle.clone(), 7, None, false).unwrap();
        assert_eq!(plain, MapResult::Value(7));

        let with_info = finish_task::<u32>(bundle.clone(), 7, None, true).unwrap();
        assert_eq!(with_info, MapResult::WithInfo(bundle, 7));
    }
}
