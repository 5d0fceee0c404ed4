//! Time-range file discovery.
//!
//! [`Dataset::find_files`] enumerates the search directories spanning the
//! query window, matches entries against the compiled template, resolves
//! each match through the metadata cache and filters by overlap with the
//! semi-open window `[start, end)` and by the exclusion set. Results are
//! optionally sorted by coverage start and grouped into bundles.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::debug;

use super::{Dataset, DatasetError};
use crate::handler::FileHandler;
use crate::record::FileRecord;
use crate::resolution::ResolutionRank;
use crate::template::fill_template;

/// How discovered records are grouped before being yielded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bundle {
    /// Contiguous chunks of this many records; the final chunk may be
    /// shorter. Forces sorting by coverage start.
    Count(usize),
    /// Calendar buckets: records are grouped by their start time truncated
    /// to the given rank's boundary, non-empty buckets are emitted in
    /// ascending order.
    Period(ResolutionRank),
}

/// Options for [`Dataset::find_files`].
#[derive(Debug, Clone, Copy)]
pub struct FindOptions {
    pub(crate) sort: bool,
    pub(crate) bundle: Option<Bundle>,
    pub(crate) strict: bool,
}

impl FindOptions {
    /// Defaults: sorted, unbundled, strict (no files is an error).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sort: true,
            bundle: None,
            strict: true,
        }
    }

    /// Sort yielded records by coverage start (stable, discovery order on
    /// ties). On by default.
    #[must_use]
    pub const fn sort(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub const fn bundle(mut self, bundle: Option<Bundle>) -> Self {
        self.bundle = bundle;
        self
    }

    /// Whether an empty result is an error ([`DatasetError::NoFiles`]) or
    /// an empty sequence. Strict by default.
    #[must_use]
    pub const fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

impl Default for FindOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// One discovery result: a single record, or a group when bundling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileBundle {
    Single(FileRecord),
    Group(Vec<FileRecord>),
}

impl FileBundle {
    #[must_use]
    pub fn records(&self) -> &[FileRecord] {
        match self {
            Self::Single(record) => std::slice::from_ref(record),
            Self::Group(records) => records,
        }
    }

    #[must_use]
    pub fn into_records(self) -> Vec<FileRecord> {
        match self {
            Self::Single(record) => vec![record],
            Self::Group(records) => records,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    /// The combined coverage: minimum start and maximum end over all
    /// records.
    ///
    /// # Panics
    /// Panics on an empty group; discovery never produces one.
    #[must_use]
    pub fn span(&self) -> (NaiveDateTime, NaiveDateTime) {
        let records = self.records();
        let start = records.iter().map(|r| r.start).min().expect("empty bundle");
        let end = records.iter().map(|r| r.end).max().expect("empty bundle");
        (start, end)
    }

    /// Placeholder fill for output-path generation: a single record
    /// contributes its parsed attributes, a group contributes nothing.
    #[must_use]
    pub fn fill(&self) -> BTreeMap<String, String> {
        match self {
            Self::Single(record) => record.attributes.clone(),
            Self::Group(_) => BTreeMap::new(),
        }
    }
}

/// Finite, restartable stream of discovery results.
///
/// Unsorted, unbundled queries stream lazily from the directory scan;
/// sorted or bundled queries are materialized up front. Re-invoking
/// [`Dataset::find_files`] rescans the filesystem.
pub struct FileFinder<'a, H: FileHandler> {
    state: FinderState<'a, H>,
}

enum FinderState<'a, H: FileHandler> {
    Ready(std::vec::IntoIter<FileBundle>),
    Scan(Scan<'a, H>),
}

impl<H: FileHandler> FileFinder<'_, H> {
    fn ready(bundles: Vec<FileBundle>) -> Self {
        FileFinder {
            state: FinderState::Ready(bundles.into_iter()),
        }
    }

    /// Drain the finder into a flat record list.
    ///
    /// # Errors
    /// Propagates the first discovery error.
    pub fn records(self) -> Result<Vec<FileRecord>, DatasetError> {
        let mut records = Vec::new();
        for bundle in self {
            records.extend(bundle?.into_records());
        }
        Ok(records)
    }
}

impl<H: FileHandler> Iterator for FileFinder<'_, H> {
    type Item = Result<FileBundle, DatasetError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.state {
            FinderState::Ready(bundles) => bundles.next().map(Ok),
            FinderState::Scan(scan) => match scan.next_record() {
                Some(Ok(record)) => Some(Ok(FileBundle::Single(record))),
                Some(Err(e)) => Some(Err(e)),
                None => None,
            },
        }
    }
}

/// Lazy walk over the search directories of one query.
struct Scan<'a, H: FileHandler> {
    dataset: &'a Dataset<H>,
    start: NaiveDateTime,
    end: NaiveDateTime,
    dirs: std::vec::IntoIter<String>,
    entries: std::vec::IntoIter<PathBuf>,
    peeked: Option<FileRecord>,
}

impl<H: FileHandler> Scan<'_, H> {
    fn next_record(&mut self) -> Option<Result<FileRecord, DatasetError>> {
        if let Some(record) = self.peeked.take() {
            return Some(Ok(record));
        }
        loop {
            if let Some(path) = self.entries.next() {
                if !self.dataset.template().matches(&path.to_string_lossy()) {
                    continue;
                }
                let record = match self.dataset.get_info(&path) {
                    Ok(record) => record,
                    Err(e) => return Some(Err(e)),
                };
                if record.overlaps(self.start, self.end)
                    && !self.dataset.exclude().is_excluded(record.start, record.end)
                {
                    return Some(Ok(record));
                }
            } else {
                let dir = self.dirs.next()?;
                self.entries = match list_entries(&dir) {
                    Ok(entries) => entries.into_iter(),
                    Err(e) => return Some(Err(e)),
                };
            }
        }
    }
}

/// All entries of one directory, in the listing order of the `glob` crate
/// (alphabetical). Wildcards surviving in the directory path are expanded
/// here as well.
fn list_entries(dir: &str) -> Result<Vec<PathBuf>, DatasetError> {
    let pattern = if dir.is_empty() {
        "*".to_string()
    } else {
        format!("{dir}/*")
    };
    let mut entries = Vec::new();
    for entry in glob::glob(&pattern)? {
        entries.push(entry.map_err(glob::GlobError::into_error)?);
    }
    Ok(entries)
}

impl<H: FileHandler> Dataset<H> {
    /// Find all files overlapping the semi-open window `[start, end)`.
    ///
    /// Files overlapping an excluded period are skipped. With
    /// `options.sort` (or count bundling) results are ordered by coverage
    /// start; otherwise they stream in discovery order.
    ///
    /// # Errors
    /// * [`DatasetError::NoFiles`] in strict mode when nothing matched.
    /// * [`DatasetError::SingleFileMissing`] when a single-file dataset's
    ///   path does not exist.
    /// * Resolution and I/O errors from the scan.
    ///
    /// # Examples
    /// ```no_run
    /// use timedex::{Dataset, FindOptions};
    /// use timedex::resolution::parse_timestamp;
    ///
    /// let dataset = Dataset::builder("/d/{year}/{month}/{day}/{hour}{minute}{second}.nc")
    ///     .build()
    ///     .unwrap();
    /// let finder = dataset
    ///     .find_files(
    ///         parse_timestamp("2017-01-01").unwrap(),
    ///         parse_timestamp("2017-01-02").unwrap(),
    ///         FindOptions::new(),
    ///     )
    ///     .unwrap();
    /// for bundle in finder {
    ///     println!("{:?}", bundle.unwrap());
    /// }
    /// ```
    pub fn find_files(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        options: FindOptions,
    ) -> Result<FileFinder<'_, H>, DatasetError> {
        debug!("Find files of '{}' between {start} and {end}", self.name());

        if self.is_single_file() {
            return self.find_single_file(start, end, options);
        }

        let dirs = self.search_dirs(start, end)?;
        let mut scan = Scan {
            dataset: self,
            start,
            end,
            dirs: dirs.into_iter(),
            entries: Vec::new().into_iter(),
            peeked: None,
        };

        let sort = options.sort || matches!(options.bundle, Some(Bundle::Count(_)));
        if sort || options.bundle.is_some() {
            let mut records = Vec::new();
            while let Some(record) = scan.next_record() {
                records.push(record?);
            }
            if options.strict && records.is_empty() {
                return Err(self.no_files(start, end));
            }
            if sort {
                records.sort_by_key(|r| r.start);
            }
            return Ok(FileFinder::ready(bundle_records(records, options.bundle)));
        }

        // Lazy path: peek one record so strict mode can fail eagerly.
        match scan.next_record() {
            Some(Ok(record)) => scan.peeked = Some(record),
            Some(Err(e)) => return Err(e),
            None if options.strict => return Err(self.no_files(start, end)),
            None => {}
        }
        Ok(FileFinder {
            state: FinderState::Scan(scan),
        })
    }

    fn find_single_file(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        options: FindOptions,
    ) -> Result<FileFinder<'_, H>, DatasetError> {
        let path = Path::new(self.template().raw());
        if !path.is_file() {
            return Err(DatasetError::SingleFileMissing {
                name: self.name().to_string(),
            });
        }
        let record = self.get_info(path)?;
        if record.overlaps(start, end) {
            Ok(FileFinder::ready(vec![FileBundle::Single(record)]))
        } else if options.strict {
            Err(self.no_files(start, end))
        } else {
            Ok(FileFinder::ready(Vec::new()))
        }
    }

    /// Find the file covering a timestamp, or failing that the file
    /// closest to it.
    ///
    /// Tries the exact generated path first, then scans the single
    /// directory relevant to the timestamp. Nearest-match distance is the
    /// smaller offset of either coverage bound; ties go to the earliest
    /// discovered candidate. The exclusion set is ignored.
    ///
    /// Returns `None` when the relevant directory holds no candidates.
    ///
    /// # Errors
    /// * [`DatasetError::SingleFileMissing`] when a single-file dataset's
    ///   path does not exist.
    /// * Resolution and I/O errors from the scan.
    pub fn find_file(
        &self,
        timestamp: NaiveDateTime,
        fill: &BTreeMap<String, String>,
    ) -> Result<Option<FileRecord>, DatasetError> {
        if self.is_single_file() {
            let path = Path::new(self.template().raw());
            if path.is_file() {
                return Ok(Some(self.get_info(path)?));
            }
            return Err(DatasetError::SingleFileMissing {
                name: self.name().to_string(),
            });
        }

        // Maybe a file exists at exactly this timestamp. Generation can
        // fail when the caller did not fill every user placeholder; fall
        // back to scanning in that case.
        if let Ok(path) = self.template().generate(timestamp, timestamp, fill) {
            if Path::new(&path).is_file() {
                return Ok(Some(self.get_info(Path::new(&path))?));
            }
        }

        let dir = self.template().generate_directory(timestamp)?;
        let mut candidates = Vec::new();
        for path in list_entries(&dir)? {
            if self.dataset_matches(&path) {
                candidates.push(self.get_info(&path)?);
            }
        }
        if candidates.is_empty() {
            return Ok(None);
        }

        if let Some(record) = candidates.iter().find(|r| r.contains(timestamp)) {
            return Ok(Some(record.clone()));
        }
        // min_by_key keeps the first minimum, i.e. the lowest discovery
        // index on equal distances.
        Ok(candidates
            .iter()
            .min_by_key(|r| r.distance_to(timestamp))
            .cloned())
    }

    fn dataset_matches(&self, path: &Path) -> bool {
        self.template().matches(&path.to_string_lossy())
    }

    /// The directories to scan for a query window.
    ///
    /// Without a temporal placeholder in the directory portion there is one
    /// fixed directory. Otherwise directories step by the directory
    /// resolution from one unit before `start` (files starting before the
    /// window may still overlap it) up to `end`, skipping directories that
    /// do not exist.
    fn search_dirs(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<String>, DatasetError> {
        let empty = BTreeMap::new();
        let Some(resolution) = self.template().dir_resolution() else {
            debug!("Directory of '{}' has no temporal placeholders", self.name());
            return Ok(vec![fill_template(
                self.template().directory(),
                start,
                start,
                &empty,
            )?]);
        };

        let mut dirs = Vec::new();
        let mut cursor = resolution.truncate(resolution.retreat(start));
        while cursor <= end {
            let dir = fill_template(self.template().directory(), cursor, cursor, &empty)?;
            if Path::new(&dir).is_dir() {
                dirs.push(dir);
            }
            let next = resolution.advance(cursor);
            if next <= cursor {
                break;
            }
            cursor = next;
        }
        debug!("Searching in {} directories", dirs.len());
        Ok(dirs)
    }
}

fn bundle_records(records: Vec<FileRecord>, bundle: Option<Bundle>) -> Vec<FileBundle> {
    match bundle {
        None => records.into_iter().map(FileBundle::Single).collect(),
        Some(Bundle::Count(size)) => records
            .chunks(size.max(1))
            .map(|chunk| FileBundle::Group(chunk.to_vec()))
            .collect(),
        Some(Bundle::Period(rank)) => {
            let mut buckets: BTreeMap<NaiveDateTime, Vec<FileRecord>> = BTreeMap::new();
            for record in records {
                buckets
                    .entry(rank.truncate(record.start))
                    .or_default()
                    .push(record);
            }
            buckets.into_values().map(FileBundle::Group).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolution::parse_timestamp;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn record(path: &str, start: &str, end: &str) -> FileRecord {
        FileRecord::new(path, ts(start), ts(end))
    }

    #[test]
    fn test_bundle_by_count_chunks() {
        let records = vec![
            record("a", "2017-01-01 00:00", "2017-01-01 01:00"),
            record("b", "2017-01-01 01:00", "2017-01-01 02:00"),
            record("c", "2017-01-01 02:00", "2017-01-01 03:00"),
            record("d", "2017-01-01 03:00", "2017-01-01 04:00"),
            record("e", "2017-01-01 04:00", "2017-01-01 05:00"),
        ];
        let bundles = bundle_records(records, Some(Bundle::Count(2)));
        let sizes: Vec<_> = bundles.iter().map(FileBundle::len).collect();
        assert_eq!(sizes, [2, 2, 1]);
    }

    #[test]
    fn test_bundle_by_period_groups_ascending() {
        let records = vec![
            record("late", "2017-01-01 02:10", "2017-01-01 02:20"),
            record("early-a", "2017-01-01 00:10", "2017-01-01 00:20"),
            record("early-b", "2017-01-01 00:40", "2017-01-01 00:50"),
        ];
        let bundles = bundle_records(records, Some(Bundle::Period(ResolutionRank::Hour)));
        assert_eq!(bundles.len(), 2);
        assert_eq!(bundles[0].len(), 2);
        assert_eq!(bundles[0].span().0, ts("2017-01-01 00:10"));
        assert_eq!(bundles[1].len(), 1);
    }

    #[test]
    fn test_bundle_span_and_fill() {
        let single = FileBundle::Single(
            record("a", "2017-01-01 00:00", "2017-01-01 01:00").with_attributes(
                std::collections::BTreeMap::from([("channel".to_string(), "3".to_string())]),
            ),
        );
        assert_eq!(single.fill()["channel"], "3");

        let group = FileBundle::Group(vec![
            record("a", "2017-01-01 02:00", "2017-01-01 03:00"),
            record("b", "2017-01-01 00:00", "2017-01-01 01:00"),
        ]);
        assert_eq!(group.span(), (ts("2017-01-01 00:00"), ts("2017-01-01 03:00")));
        assert!(group.fill().is_empty());
    }
}
