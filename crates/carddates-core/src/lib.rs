//! Core types: contact dates, vCard parsing, date rules, occurrences.
//!
//! Nothing in this crate touches the network. Providers hand raw vCard text
//! to [`parse_vcard`] and get back [`ContactDate`] entries; presentation code
//! uses [`occurrence`] to project them onto calendar years.

pub mod contact;
pub mod date;
pub mod label;
pub mod occurrence;
pub mod tracing;
pub mod vcard;

pub use contact::{
    ContactDate, LABEL_ANNIVERSARY, LABEL_BIRTHDAY, LABEL_CUSTOM, LABEL_OTHER, SENTINEL_YEAR,
    UNKNOWN_NAME,
};
pub use date::{DATE_RULES, DateRejection, DateRule, ParsedDate, parse_date, parse_date_value};
pub use label::{clean_text, normalize_label};
pub use occurrence::{
    MAX_DAYS_AHEAD, Occurrence, age_in, next_occurrence, occurrence_in_year, occurrences_between,
    upcoming, window_end,
};
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
pub use vcard::{SkippedProperty, VcardParse, parse_vcard, parse_vcard_detailed, split_vcards};
