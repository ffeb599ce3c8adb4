//! Date value parsing for vCard date properties.
//!
//! Three textual encodings are accepted, tried in a fixed order and the
//! first rule whose pattern matches decides the outcome:
//!
//! 1. `--MM-DD` / `--MMDD` - year unknown, stored in [`SENTINEL_YEAR`]
//! 2. `YYYY-MM-DD`
//! 3. `YYYYMMDD`
//!
//! A value that matches a pattern but does not form a calendar date is
//! rejected; later rules are not consulted.

use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};

use crate::contact::SENTINEL_YEAR;

/// A successfully parsed date value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate {
    /// The date, in [`SENTINEL_YEAR`] when the year is unknown.
    pub date: NaiveDate,
    /// The real year, if the value carried one.
    pub year: Option<i32>,
}

impl ParsedDate {
    /// A date whose year is unknown.
    pub fn without_year(month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(SENTINEL_YEAR, month, day).map(|date| Self { date, year: None })
    }

    /// A date with a real year.
    pub fn with_year(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(|date| Self {
            date,
            year: Some(year),
        })
    }
}

/// Why a date value produced no entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRejection {
    /// The value was empty.
    Empty,
    /// The value was the literal `unknown`.
    Unknown,
    /// No rule pattern matched.
    NoMatchingFormat,
    /// A rule matched but the numbers are not a calendar date.
    InvalidCalendarDate {
        /// Name of the rule that matched.
        rule: &'static str,
    },
}

impl fmt::Display for DateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty value"),
            Self::Unknown => write!(f, "value is 'unknown'"),
            Self::NoMatchingFormat => write!(f, "no matching date format"),
            Self::InvalidCalendarDate { rule } => {
                write!(f, "not a calendar date (matched {})", rule)
            }
        }
    }
}

/// One date encoding: a pattern and the constructor applied to its captures.
pub struct DateRule {
    name: &'static str,
    pattern: Regex,
    build: fn(&Captures<'_>) -> Option<ParsedDate>,
}

/// Outcome of applying a single rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    /// The pattern did not match.
    NoMatch,
    /// The pattern matched but the date is invalid.
    Invalid,
    /// The pattern matched and produced a date.
    Parsed(ParsedDate),
}

impl DateRule {
    fn new(
        name: &'static str,
        pattern: &str,
        build: fn(&Captures<'_>) -> Option<ParsedDate>,
    ) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("Invalid date rule regex"),
            build,
        }
    }

    /// Returns the rule name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Applies this rule to an already cleaned value.
    pub fn apply(&self, value: &str) -> RuleOutcome {
        match self.pattern.captures(value) {
            None => RuleOutcome::NoMatch,
            Some(caps) => match (self.build)(&caps) {
                Some(parsed) => RuleOutcome::Parsed(parsed),
                None => RuleOutcome::Invalid,
            },
        }
    }
}

impl fmt::Debug for DateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DateRule")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

fn capture_num<T: std::str::FromStr>(caps: &Captures<'_>, index: usize) -> Option<T> {
    caps.get(index)?.as_str().parse().ok()
}

fn build_without_year(caps: &Captures<'_>) -> Option<ParsedDate> {
    ParsedDate::without_year(capture_num(caps, 1)?, capture_num(caps, 2)?)
}

fn build_with_year(caps: &Captures<'_>) -> Option<ParsedDate> {
    ParsedDate::with_year(
        capture_num(caps, 1)?,
        capture_num(caps, 2)?,
        capture_num(caps, 3)?,
    )
}

/// The date rules in priority order.
pub static DATE_RULES: LazyLock<Vec<DateRule>> = LazyLock::new(|| {
    vec![
        DateRule::new("--MM-DD", r"^--(\d{2})-?(\d{2})$", build_without_year),
        DateRule::new("YYYY-MM-DD", r"^(\d{4})-(\d{2})-(\d{2})$", build_with_year),
        DateRule::new("YYYYMMDD", r"^(\d{4})(\d{2})(\d{2})$", build_with_year),
    ]
});

/// Parses a date property value.
///
/// Carriage returns and surrounding whitespace are ignored.
pub fn parse_date_value(value: &str) -> Result<ParsedDate, DateRejection> {
    let cleaned: String = value.chars().filter(|c| *c != '\r').collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return Err(DateRejection::Empty);
    }
    if cleaned.eq_ignore_ascii_case("unknown") {
        return Err(DateRejection::Unknown);
    }

    for rule in DATE_RULES.iter() {
        match rule.apply(cleaned) {
            RuleOutcome::NoMatch => continue,
            RuleOutcome::Invalid => {
                return Err(DateRejection::InvalidCalendarDate { rule: rule.name });
            }
            RuleOutcome::Parsed(parsed) => return Ok(parsed),
        }
    }

    Err(DateRejection::NoMatchingFormat)
}

/// Parses a date property value, discarding the rejection reason.
pub fn parse_date(value: &str) -> Option<ParsedDate> {
    parse_date_value(value).ok()
}
