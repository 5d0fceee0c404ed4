//! Excluded time periods.
//!
//! An [`ExclusionSet`] holds disjoint periods that discovery skips: any file
//! whose coverage overlaps an excluded period is dropped from query results.

use chrono::NaiveDateTime;

/// A normalized collection of disjoint `(start, end)` periods.
///
/// Periods are sorted at construction and overlapping or adjacent ones are
/// merged, so membership tests can bail out early.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    periods: Vec<(NaiveDateTime, NaiveDateTime)>,
}

impl ExclusionSet {
    /// Build a set from arbitrary periods. Inverted pairs are reordered,
    /// overlapping and adjacent periods are merged.
    #[must_use]
    pub fn new(periods: impl IntoIterator<Item = (NaiveDateTime, NaiveDateTime)>) -> Self {
        let mut periods: Vec<_> = periods
            .into_iter()
            .map(|(a, b)| if a <= b { (a, b) } else { (b, a) })
            .collect();
        periods.sort();

        let mut merged: Vec<(NaiveDateTime, NaiveDateTime)> = Vec::with_capacity(periods.len());
        for (start, end) in periods {
            match merged.last_mut() {
                Some((_, last_end)) if start <= *last_end => {
                    *last_end = (*last_end).max(end);
                }
                _ => merged.push((start, end)),
            }
        }
        Self { periods: merged }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    /// Whether the given period overlaps any excluded period.
    #[must_use]
    pub fn is_excluded(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        // Periods are sorted by start, so stop once they begin after `end`.
        for (p_start, p_end) in &self.periods {
            if *p_start > end {
                return false;
            }
            if *p_end >= start {
                return true;
            }
        }
        false
    }

    pub fn periods(&self) -> impl Iterator<Item = (NaiveDateTime, NaiveDateTime)> + '_ {
        self.periods.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolution::parse_timestamp;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn test_empty_set_excludes_nothing() {
        let set = ExclusionSet::default();
        assert!(!set.is_excluded(ts("2017-01-01"), ts("2017-12-31")));
    }

    #[test]
    fn test_overlapping_periods_are_merged() {
        let set = ExclusionSet::new([
            (ts("2017-01-05"), ts("2017-01-10")),
            (ts("2017-01-08"), ts("2017-01-12")),
            (ts("2017-03-01"), ts("2017-03-02")),
        ]);
        assert_eq!(set.len(), 2);
        assert!(set.is_excluded(ts("2017-01-11"), ts("2017-01-11 06:00")));
    }

    #[test]
    fn test_membership_is_overlap() {
        let set = ExclusionSet::new([(ts("2017-01-05"), ts("2017-01-10"))]);
        assert!(set.is_excluded(ts("2017-01-09"), ts("2017-01-20")));
        assert!(set.is_excluded(ts("2017-01-01"), ts("2017-01-05")));
        assert!(!set.is_excluded(ts("2017-01-01"), ts("2017-01-04")));
        assert!(!set.is_excluded(ts("2017-01-11"), ts("2017-01-12")));
    }

    #[test]
    fn test_inverted_pairs_are_reordered() {
        let set = ExclusionSet::new([(ts("2017-01-10"), ts("2017-01-05"))]);
        assert!(set.is_excluded(ts("2017-01-06"), ts("2017-01-07")));
    }
}
