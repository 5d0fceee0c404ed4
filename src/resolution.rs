//! Temporal granularity analysis for path placeholders.
//!
//! Every temporal placeholder maps to a [`ResolutionRank`]. The rank order
//! drives two derived quantities:
//!
//! - the *directory resolution*: the finest rank appearing in the directory
//!   portion of a template, used as the stepping unit when enumerating
//!   search directories;
//! - the *superior resolution*: one rank coarser than the coarsest
//!   end-placeholder, used as the wraparound correction when a parsed end
//!   time resolves earlier than the parsed start time (e.g. an end-hour
//!   before the start-hour implies a day rollover).

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Granularity ordering of temporal placeholders, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResolutionRank {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl ResolutionRank {
    /// The next coarser rank, or `None` when already at [`ResolutionRank::Year`].
    #[must_use]
    pub const fn superior(self) -> Option<Self> {
        match self {
            Self::Year => None,
            Self::Month => Some(Self::Year),
            Self::Day => Some(Self::Month),
            Self::Hour => Some(Self::Day),
            Self::Minute => Some(Self::Hour),
            Self::Second => Some(Self::Minute),
            Self::Millisecond => Some(Self::Second),
        }
    }

    /// Advance a timestamp by one unit of this rank.
    ///
    /// Year and month steps are calendar-aware; finer steps are fixed
    /// durations. Saturates at the representable maximum.
    #[must_use]
    pub fn advance(self, ts: NaiveDateTime) -> NaiveDateTime {
        let stepped = match self {
            Self::Year => ts.checked_add_months(Months::new(12)),
            Self::Month => ts.checked_add_months(Months::new(1)),
            Self::Day => ts.checked_add_signed(Duration::days(1)),
            Self::Hour => ts.checked_add_signed(Duration::hours(1)),
            Self::Minute => ts.checked_add_signed(Duration::minutes(1)),
            Self::Second => ts.checked_add_signed(Duration::seconds(1)),
            Self::Millisecond => ts.checked_add_signed(Duration::milliseconds(1)),
        };
        stepped.unwrap_or(NaiveDateTime::MAX)
    }

    /// Move a timestamp back by one unit of this rank, saturating at the
    /// representable minimum.
    #[must_use]
    pub fn retreat(self, ts: NaiveDateTime) -> NaiveDateTime {
        let stepped = match self {
            Self::Year => ts.checked_sub_months(Months::new(12)),
            Self::Month => ts.checked_sub_months(Months::new(1)),
            Self::Day => ts.checked_sub_signed(Duration::days(1)),
            Self::Hour => ts.checked_sub_signed(Duration::hours(1)),
            Self::Minute => ts.checked_sub_signed(Duration::minutes(1)),
            Self::Second => ts.checked_sub_signed(Duration::seconds(1)),
            Self::Millisecond => ts.checked_sub_signed(Duration::milliseconds(1)),
        };
        stepped.unwrap_or(NaiveDateTime::MIN)
    }

    /// Truncate a timestamp down to the boundary of this rank.
    #[must_use]
    pub fn truncate(self, ts: NaiveDateTime) -> NaiveDateTime {
        let date = ts.date();
        let (date, time) = match self {
            Self::Year => (
                NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
                NaiveTime::MIN,
            ),
            Self::Month => (
                NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date),
                NaiveTime::MIN,
            ),
            Self::Day => (date, NaiveTime::MIN),
            Self::Hour => (
                date,
                NaiveTime::from_hms_opt(ts.hour(), 0, 0).unwrap_or(NaiveTime::MIN),
            ),
            Self::Minute => (
                date,
                NaiveTime::from_hms_opt(ts.hour(), ts.minute(), 0).unwrap_or(NaiveTime::MIN),
            ),
            Self::Second => (
                date,
                NaiveTime::from_hms_opt(ts.hour(), ts.minute(), ts.second())
                    .unwrap_or(NaiveTime::MIN),
            ),
            Self::Millisecond => (
                date,
                NaiveTime::from_hms_milli_opt(
                    ts.hour(),
                    ts.minute(),
                    ts.second(),
                    ts.nanosecond() / 1_000_000,
                )
                .unwrap_or(NaiveTime::MIN),
            ),
        };
        NaiveDateTime::new(date, time)
    }
}

/// Temporal field a placeholder can stand for.
///
/// `Year2` and `Doy` are alternative encodings: they alias the ranks of
/// `Year` and `Day` respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeField {
    Year,
    Year2,
    Month,
    Day,
    Doy,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl TimeField {
    /// Look up a field by its placeholder name (without any `end_` prefix).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "year" => Some(Self::Year),
            "year2" => Some(Self::Year2),
            "month" => Some(Self::Month),
            "day" => Some(Self::Day),
            "doy" => Some(Self::Doy),
            "hour" => Some(Self::Hour),
            "minute" => Some(Self::Minute),
            "second" => Some(Self::Second),
            "millisecond" => Some(Self::Millisecond),
            _ => None,
        }
    }

    #[must_use]
    pub const fn rank(self) -> ResolutionRank {
        match self {
            Self::Year | Self::Year2 => ResolutionRank::Year,
            Self::Month => ResolutionRank::Month,
            Self::Day | Self::Doy => ResolutionRank::Day,
            Self::Hour => ResolutionRank::Hour,
            Self::Minute => ResolutionRank::Minute,
            Self::Second => ResolutionRank::Second,
            Self::Millisecond => ResolutionRank::Millisecond,
        }
    }
}

/// The stepping unit for search-directory enumeration: the finest temporal
/// field among the given ones, or `None` when there is none.
pub fn directory_resolution<I>(fields: I) -> Option<ResolutionRank>
where
    I: IntoIterator<Item = TimeField>,
{
    fields.into_iter().map(TimeField::rank).max()
}

/// The overshoot compensation unit: one rank coarser than the coarsest of
/// the given end fields. `None` when there are no fields or the coarsest is
/// already a year.
pub fn superior_resolution<I>(fields: I) -> Option<ResolutionRank>
where
    I: IntoIterator<Item = TimeField>,
{
    fields
        .into_iter()
        .map(TimeField::rank)
        .min()
        .and_then(ResolutionRank::superior)
}

/// Parse a timestamp from common textual forms.
///
/// Accepts `YYYY-MM-DD`, optionally followed by ` hh:mm`, ` hh:mm:ss` or an
/// ISO `T` separator with fractional seconds.
///
/// # Errors
/// Returns the underlying [`chrono::ParseError`] when no form matches.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d",
    ];

    let mut last_err = None;
    for format in FORMATS {
        if format == "%Y-%m-%d" {
            match NaiveDate::parse_from_str(value, format) {
                Ok(date) => return Ok(date.and_time(NaiveTime::MIN)),
                Err(e) => last_err = Some(e),
            }
        } else {
            match NaiveDateTime::parse_from_str(value, format) {
                Ok(ts) => return Ok(ts),
                Err(e) => last_err = Some(e),
            }
        }
    }
    // FORMATS is non-empty, so an error was recorded.
    Err(last_err.unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn test_superior_of_hour_is_day() {
        assert_eq!(ResolutionRank::Hour.superior(), Some(ResolutionRank::Day));
        assert_eq!(ResolutionRank::Year.superior(), None);
    }

    #[test]
    fn test_directory_resolution_picks_finest() {
        let res = directory_resolution([TimeField::Year, TimeField::Month, TimeField::Day]);
        assert_eq!(res, Some(ResolutionRank::Day));
        assert_eq!(directory_resolution([]), None);
    }

    #[test]
    fn test_superior_resolution_of_end_fields() {
        // Coarsest of {hour, minute} is hour, so the compensator is a day.
        let res = superior_resolution([TimeField::Hour, TimeField::Minute]);
        assert_eq!(res, Some(ResolutionRank::Day));
        assert_eq!(superior_resolution([TimeField::Year]), None);
        assert_eq!(superior_resolution([]), None);
    }

    #[test]
    fn test_advance_is_calendar_aware() {
        assert_eq!(
            ResolutionRank::Month.advance(ts("2016-01-31")),
            ts("2016-02-29")
        );
        assert_eq!(
            ResolutionRank::Year.advance(ts("2016-02-29")),
            ts("2017-02-28")
        );
        assert_eq!(
            ResolutionRank::Day.advance(ts("2016-12-31 23:00")),
            ts("2017-01-01 23:00")
        );
    }

    #[test]
    fn test_truncate_to_rank_boundary() {
        let t = ts("2017-06-15 13:45:59");
        assert_eq!(ResolutionRank::Year.truncate(t), ts("2017-01-01"));
        assert_eq!(ResolutionRank::Month.truncate(t), ts("2017-06-01"));
        assert_eq!(ResolutionRank::Day.truncate(t), ts("2017-06-15"));
        assert_eq!(ResolutionRank::Hour.truncate(t), ts("2017-06-15 13:00"));
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert_eq!(ts("2017-01-02"), ts("2017-01-02 00:00:00"));
        assert_eq!(ts("2017-01-02 03:04"), ts("2017-01-02T03:04:00"));
        assert!(parse_timestamp("not a time").is_err());
    }
}
