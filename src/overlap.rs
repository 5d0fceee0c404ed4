//! Time-interval overlap joins between two discovered file sets.

use chrono::{Duration, NaiveDateTime};

use crate::record::FileRecord;

/// A static overlap-query index over a set of coverage intervals.
///
/// Intervals are optionally expanded by a gap tolerance on both ends, then
/// kept sorted by start so queries can stop scanning early. Query results
/// are returned in the original insertion order.
#[derive(Debug)]
pub struct IntervalIndex {
    /// `(start, end, original index)`, sorted by start.
    intervals: Vec<(NaiveDateTime, NaiveDateTime, usize)>,
}

impl IntervalIndex {
    /// Build an index over record coverages, each widened by `expand` on
    /// both ends.
    #[must_use]
    pub fn new(records: &[FileRecord], expand: Duration) -> Self {
        let mut intervals: Vec<_> = records
            .iter()
            .enumerate()
            .map(|(index, rec)| {
                (
                    rec.start.checked_sub_signed(expand).unwrap_or(rec.start),
                    rec.end.checked_add_signed(expand).unwrap_or(rec.end),
                    index,
                )
            })
            .collect();
        intervals.sort_by_key(|&(start, _, _)| start);
        Self { intervals }
    }

    /// Indices of all intervals overlapping `[start, end]`, ascending.
    #[must_use]
    pub fn query(&self, start: NaiveDateTime, end: NaiveDateTime) -> Vec<usize> {
        let mut hits = Vec::new();
        for &(i_start, i_end, index) in &self.intervals {
            if i_start > end {
                break;
            }
            if i_end >= start {
                hits.push(index);
            }
        }
        hits.sort_unstable();
        hits
    }
}

/// Join two record sets by time overlap: for every primary record, the
/// secondary records whose (gap-expanded) coverage overlaps it, preserving
/// the secondary set's ordering within each match list.
#[must_use]
pub fn match_overlapping(
    primary: &[FileRecord],
    secondary: &[FileRecord],
    max_gap: Option<Duration>,
) -> Vec<(FileRecord, Vec<FileRecord>)> {
    let index = IntervalIndex::new(secondary, max_gap.unwrap_or_else(Duration::zero));
    primary
        .iter()
        .map(|rec| {
            let matches = index
                .query(rec.start, rec.end)
                .into_iter()
                .map(|i| secondary[i].clone())
                .collect();
            (rec.clone(), matches)
        })
        .collect()
}
