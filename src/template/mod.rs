//! Path template compiler.
//!
//! A path template is a string with named placeholders such as
//! `/data/{year}/{month}/{day}/{hour}{minute}{second}*.dat`. Compiling a
//! template yields a regex matcher with one capture group per placeholder,
//! the ordered placeholder list and the derived temporal analysis
//! (directory resolution, overshoot compensator, single-file flag).
//!
//! Literal dots are escaped, `*` becomes a lazy wildcard and any other
//! regex metacharacters are passed through, so restricted regular
//! expressions can be embedded directly in the template.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;

use crate::record::RecordInfo;
use crate::resolution::{
    self, ResolutionRank, TimeField, directory_resolution, superior_resolution,
};

pub mod error;

pub use error::TemplateError;

/// Two-digit years below this threshold are based on 2000, the rest on 1900.
const YEAR2_THRESHOLD: i64 = 65;

/// What a placeholder stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// Temporal field of the coverage start.
    Start(TimeField),
    /// Temporal field of the coverage end (`end_` prefix).
    End(TimeField),
    /// User-defined placeholder with a caller-supplied fragment.
    User,
}

/// One placeholder occurrence, in template order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderSpec {
    pub name: String,
    pub fragment: String,
    pub kind: PlaceholderKind,
}

/// A compiled path template.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    raw: String,
    dir_template: String,
    regex: Regex,
    placeholders: Vec<PlaceholderSpec>,
    dir_resolution: Option<ResolutionRank>,
    overshoot: Option<ResolutionRank>,
    single_file: bool,
}

impl PathTemplate {
    /// Compile a template against the built-in temporal placeholders plus
    /// the given user-defined fragments.
    ///
    /// # Errors
    /// * `UnknownPlaceholder` for a name with no known fragment.
    /// * `DuplicatePlaceholder` when a name occurs twice.
    /// * `PlaceholderInDirectory` for a user placeholder before the last
    ///   path separator.
    /// * `PlaceholderOnSingleFile` when a template without temporal
    ///   placeholders and wildcards still contains placeholders.
    /// * `BrokenPlaceholderRegex` when the assembled matcher does not
    ///   compile or a user fragment does not contain exactly one capture
    ///   group.
    pub fn compile(
        raw: &str,
        user_placeholders: &BTreeMap<String, String>,
    ) -> Result<Self, TemplateError> {
        let dir_len = raw.rfind('/').unwrap_or(0);
        let dir_template = raw[..dir_len].to_string();

        let mut pattern = String::with_capacity(raw.len() * 2);
        let mut placeholders = Vec::new();
        let mut seen = BTreeSet::new();
        let mut dir_fields = Vec::new();
        let mut end_fields = Vec::new();
        let mut offset = 0;

        for segment in segments(raw)? {
            match segment {
                Segment::Literal(text) => {
                    for ch in text.chars() {
                        match ch {
                            '.' => pattern.push_str(r"\."),
                            '*' => pattern.push_str(".*?"),
                            _ => pattern.push(ch),
                        }
                    }
                    offset += text.len();
                }
                Segment::Placeholder(name) => {
                    let in_directory = offset < dir_len;
                    offset += name.len() + 2;

                    if !seen.insert(name.clone()) {
                        return Err(TemplateError::DuplicatePlaceholder { name });
                    }

                    let (fragment, kind) = if let Some((field, is_end)) = temporal_field(&name) {
                        let kind = if is_end {
                            end_fields.push(field);
                            PlaceholderKind::End(field)
                        } else {
                            if in_directory {
                                dir_fields.push(field);
                            }
                            PlaceholderKind::Start(field)
                        };
                        (builtin_fragment(field).to_string(), kind)
                    } else if let Some(fragment) = user_placeholders.get(&name) {
                        if in_directory {
                            return Err(TemplateError::PlaceholderInDirectory { name });
                        }
                        (fragment.clone(), PlaceholderKind::User)
                    } else {
                        return Err(TemplateError::UnknownPlaceholder { name });
                    };

                    pattern.push_str(&fragment);
                    placeholders.push(PlaceholderSpec {
                        name,
                        fragment,
                        kind,
                    });
                }
            }
        }

        let regex = Regex::new(&pattern).map_err(|e| TemplateError::BrokenPlaceholderRegex {
            reason: e.to_string(),
        })?;
        // Every placeholder must contribute exactly one capture group,
        // otherwise captures no longer line up with the placeholder list.
        if regex.captures_len() != placeholders.len() + 1 {
            return Err(TemplateError::BrokenPlaceholderRegex {
                reason: format!(
                    "expected {} capture groups, matcher has {}",
                    placeholders.len(),
                    regex.captures_len() - 1
                ),
            });
        }

        let has_temporal = placeholders
            .iter()
            .any(|p| !matches!(p.kind, PlaceholderKind::User));
        let single_file = !has_temporal && !raw.contains('*');
        if single_file && !placeholders.is_empty() {
            return Err(TemplateError::PlaceholderOnSingleFile);
        }

        Ok(Self {
            raw: raw.to_string(),
            dir_template,
            regex,
            placeholders,
            dir_resolution: directory_resolution(dir_fields),
            overshoot: superior_resolution(end_fields),
            single_file,
        })
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The directory portion of the template (everything before the last
    /// path separator).
    #[must_use]
    pub fn directory(&self) -> &str {
        &self.dir_template
    }

    #[must_use]
    pub fn placeholders(&self) -> &[PlaceholderSpec] {
        &self.placeholders
    }

    /// Stepping unit for search-directory enumeration; `None` when the
    /// directory portion has no temporal placeholder.
    #[must_use]
    pub const fn dir_resolution(&self) -> Option<ResolutionRank> {
        self.dir_resolution
    }

    /// Correction unit added to a parsed end time that resolves earlier
    /// than the parsed start time.
    #[must_use]
    pub const fn overshoot(&self) -> Option<ResolutionRank> {
        self.overshoot
    }

    /// Whether the template denotes a single physical file (no temporal
    /// placeholders, no wildcard).
    #[must_use]
    pub const fn is_single_file(&self) -> bool {
        self.single_file
    }

    /// Whether a path matches the template. The match is anchored at the
    /// beginning; trailing characters (e.g. a compression suffix) are
    /// permitted.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.regex.find(path).is_some_and(|m| m.start() == 0)
    }

    /// Parse a path against the template: temporal captures are assembled
    /// into the time coverage (with overshoot compensation), user captures
    /// become attributes.
    ///
    /// # Errors
    /// * `NoMatch` when the path does not match the matcher.
    /// * `NotEnoughPlaceholders` / `InvalidTimeValue` when temporal
    ///   captures do not form a timestamp.
    pub fn parse(&self, path: &str) -> Result<RecordInfo, TemplateError> {
        let captures = self
            .regex
            .captures(path)
            .filter(|c| c.get(0).is_some_and(|m| m.start() == 0))
            .ok_or_else(|| TemplateError::NoMatch {
                path: path.to_string(),
            })?;

        let mut start_fields = TimeFields::default();
        let mut end_fields = TimeFields::default();
        let mut attributes = BTreeMap::new();

        for (index, spec) in self.placeholders.iter().enumerate() {
            let value = captures
                .get(index + 1)
                .ok_or_else(|| TemplateError::BrokenPlaceholderRegex {
                    reason: format!("no capture for placeholder '{}'", spec.name),
                })?
                .as_str();

            match spec.kind {
                PlaceholderKind::Start(field) => {
                    let value: i64 =
                        value.parse().map_err(|_| TemplateError::InvalidTimeValue)?;
                    start_fields.set(field, value);
                }
                PlaceholderKind::End(field) => {
                    let value: i64 =
                        value.parse().map_err(|_| TemplateError::InvalidTimeValue)?;
                    end_fields.set(field, value);
                }
                PlaceholderKind::User => {
                    attributes.insert(spec.name.clone(), value.to_string());
                }
            }
        }

        let start = if start_fields.is_empty() {
            None
        } else {
            Some(start_fields.resolve(None, "start")?)
        };
        let mut end = if end_fields.is_empty() {
            None
        } else {
            Some(end_fields.resolve(start, "end")?)
        };

        // Partial end placeholders may roll over a coarser unit; imagine an
        // end-hour smaller than the start-hour across a day boundary.
        if let (Some(start), Some(end_time)) = (start, end.as_mut()) {
            if *end_time < start {
                if let Some(rank) = self.overshoot {
                    *end_time = rank.advance(*end_time);
                }
                if *end_time < start {
                    *end_time = start;
                }
            }
        }

        Ok(RecordInfo {
            start,
            end,
            attributes,
        })
    }

    /// Generate a concrete path for a time period.
    ///
    /// # Errors
    /// Returns `UnknownPlaceholder` when the template names a placeholder
    /// that is neither temporal nor present in `fill`.
    pub fn generate(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        fill: &BTreeMap<String, String>,
    ) -> Result<String, TemplateError> {
        fill_template(&self.raw, start, end, fill)
    }

    /// Generate the search directory for an instant.
    pub fn generate_directory(&self, timestamp: NaiveDateTime) -> Result<String, TemplateError> {
        fill_template(&self.dir_template, timestamp, timestamp, &BTreeMap::new())
    }
}

/// Fill an arbitrary template string with temporal values and caller
/// supplied fills. Start fields read from `start`, `end_*` fields from
/// `end`.
///
/// # Errors
/// Returns `UnknownPlaceholder` for names absent from the temporal set and
/// from `fill`.
pub fn fill_template(
    template: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
    fill: &BTreeMap<String, String>,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    for segment in segments(template)? {
        match segment {
            Segment::Literal(text) => out.push_str(&text),
            Segment::Placeholder(name) => {
                if let Some((field, is_end)) = temporal_field(&name) {
                    let ts = if is_end { end } else { start };
                    out.push_str(&format_field(field, ts));
                } else if let Some(value) = fill.get(&name) {
                    out.push_str(value);
                } else {
                    return Err(TemplateError::UnknownPlaceholder { name });
                }
            }
        }
    }
    Ok(out)
}

enum Segment {
    Literal(String),
    Placeholder(String),
}

fn segments(template: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars();

    while let Some(ch) = chars.next() {
        if ch != '{' {
            literal.push(ch);
            continue;
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        let mut name = String::new();
        loop {
            match chars.next() {
                Some('}') => break,
                Some(c) => name.push(c),
                None => {
                    return Err(TemplateError::UnclosedPlaceholder {
                        template: template.to_string(),
                    });
                }
            }
        }
        segments.push(Segment::Placeholder(name));
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

/// Resolve a placeholder name to its temporal field, flagging the `end_`
/// prefixed variants.
fn temporal_field(name: &str) -> Option<(TimeField, bool)> {
    if let Some(rest) = name.strip_prefix("end_") {
        TimeField::from_name(rest).map(|f| (f, true))
    } else {
        TimeField::from_name(name).map(|f| (f, false))
    }
}

const fn builtin_fragment(field: TimeField) -> &'static str {
    match field {
        TimeField::Year => r"(\d{4})",
        TimeField::Doy | TimeField::Millisecond => r"(\d{3})",
        _ => r"(\d{2})",
    }
}

fn format_field(field: TimeField, ts: NaiveDateTime) -> String {
    match field {
        TimeField::Year => format!("{:04}", ts.year()),
        TimeField::Year2 => format!("{:02}", ts.year().rem_euclid(100)),
        TimeField::Month => format!("{:02}", ts.month()),
        TimeField::Day => format!("{:02}", ts.day()),
        TimeField::Doy => format!("{:03}", ts.ordinal()),
        TimeField::Hour => format!("{:02}", ts.hour()),
        TimeField::Minute => format!("{:02}", ts.minute()),
        TimeField::Second => format!("{:02}", ts.second()),
        TimeField::Millisecond => format!("{:03}", ts.nanosecond() / 1_000_000),
    }
}

/// Captured temporal values for one side of the coverage, prior to
/// timestamp assembly.
#[derive(Debug, Default)]
struct TimeFields {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
    doy: Option<u32>,
    hour: Option<u32>,
    minute: Option<u32>,
    second: Option<u32>,
    millisecond: Option<u32>,
}

impl TimeFields {
    fn set(&mut self, field: TimeField, value: i64) {
        match field {
            TimeField::Year => self.year = Some(value as i32),
            TimeField::Year2 => {
                let base = if value < YEAR2_THRESHOLD { 2000 } else { 1900 };
                self.year = Some((base + value) as i32);
            }
            TimeField::Month => self.month = Some(value as u32),
            TimeField::Day => self.day = Some(value as u32),
            TimeField::Doy => self.doy = Some(value as u32),
            TimeField::Hour => self.hour = Some(value as u32),
            TimeField::Minute => self.minute = Some(value as u32),
            TimeField::Second => self.second = Some(value as u32),
            TimeField::Millisecond => self.millisecond = Some(value as u32),
        }
    }

    fn is_empty(&self) -> bool {
        self.year.is_none()
            && self.month.is_none()
            && self.day.is_none()
            && self.doy.is_none()
            && self.hour.is_none()
            && self.minute.is_none()
            && self.second.is_none()
            && self.millisecond.is_none()
    }

    /// Assemble a timestamp. Without a base the fields must describe at
    /// least a full date (year plus month/day or day-of-year); with a base
    /// (the already-resolved start time) missing fields inherit from it.
    fn resolve(
        &self,
        base: Option<NaiveDateTime>,
        which: &'static str,
    ) -> Result<NaiveDateTime, TemplateError> {
        let missing = || TemplateError::NotEnoughPlaceholders { which };

        let date = if let Some(doy) = self.doy {
            let year = self
                .year
                .or_else(|| base.map(|b| b.year()))
                .ok_or_else(missing)?;
            NaiveDate::from_yo_opt(year, doy).ok_or(TemplateError::InvalidTimeValue)?
        } else if let Some(base) = base {
            let year = self.year.unwrap_or_else(|| base.year());
            let month = self.month.unwrap_or_else(|| base.month());
            let day = self.day.unwrap_or_else(|| base.day());
            NaiveDate::from_ymd_opt(year, month, day).ok_or(TemplateError::InvalidTimeValue)?
        } else {
            let year = self.year.ok_or_else(missing)?;
            let month = self.month.ok_or_else(missing)?;
            let day = self.day.ok_or_else(missing)?;
            NaiveDate::from_ymd_opt(year, month, day).ok_or(TemplateError::InvalidTimeValue)?
        };

        let (base_hour, base_minute, base_second, base_milli) = base
            .map(|b| (b.hour(), b.minute(), b.second(), b.nanosecond() / 1_000_000))
            .unwrap_or((0, 0, 0, 0));
        let time = NaiveTime::from_hms_milli_opt(
            self.hour.unwrap_or(base_hour),
            self.minute.unwrap_or(base_minute),
            self.second.unwrap_or(base_second),
            self.millisecond.unwrap_or(base_milli),
        )
        .ok_or(TemplateError::InvalidTimeValue)?;

        Ok(NaiveDateTime::new(date, time))
    }
}
