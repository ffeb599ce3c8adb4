//! The contact date model.
//!
//! A [`ContactDate`] is one recurring date found on a contact: a birthday,
//! an anniversary, or a custom labeled date. Dates whose year is unknown are
//! stored in the sentinel leap year [`SENTINEL_YEAR`] so that Feb 29 stays
//! representable.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Year used for dates whose real year is unknown.
///
/// 2000 is a leap year, so `--0229` maps to a valid date.
pub const SENTINEL_YEAR: i32 = 2000;

/// Label of entries that come from the `BDAY` property.
pub const LABEL_BIRTHDAY: &str = "bday";

/// Label of entries that come from the `ANNIVERSARY` property.
pub const LABEL_ANNIVERSARY: &str = "anniversary";

/// Label of the Apple "other" placeholder.
pub const LABEL_OTHER: &str = "other";

/// Label used for a custom date that has no label property.
pub const LABEL_CUSTOM: &str = "custom";

/// Name used when a vCard has no formatted name.
pub const UNKNOWN_NAME: &str = "Unknown";

/// A recurring date extracted from a contact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactDate {
    /// Display name of the contact.
    pub name: String,
    /// Month and day; the year is [`SENTINEL_YEAR`] when unknown.
    pub date: NaiveDate,
    /// The real year, when the source data carries one.
    pub year_of_birth: Option<i32>,
    /// Normalized date kind (`bday`, `anniversary` or a custom label).
    pub label: String,
}

impl ContactDate {
    /// Creates a new contact date.
    pub fn new(
        name: impl Into<String>,
        date: NaiveDate,
        year_of_birth: Option<i32>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            date,
            year_of_birth,
            label: label.into(),
        }
    }

    /// Returns true if this entry is a birthday.
    pub fn is_birthday(&self) -> bool {
        self.label == LABEL_BIRTHDAY
    }

    /// Returns true if the real year of this date is known.
    pub fn has_year(&self) -> bool {
        self.year_of_birth.is_some()
    }

    /// Returns the month (1-12).
    pub fn month(&self) -> u32 {
        self.date.month()
    }

    /// Returns the day of month (1-31).
    pub fn day(&self) -> u32 {
        self.date.day()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn sentinel_year_allows_leap_day() {
        assert!(NaiveDate::from_ymd_opt(SENTINEL_YEAR, 2, 29).is_some());
    }

    #[test]
    fn birthday_accessors() {
        let entry = ContactDate::new("Jane Doe", date(1990, 2, 28), Some(1990), LABEL_BIRTHDAY);
        assert!(entry.is_birthday());
        assert!(entry.has_year());
        assert_eq!(entry.month(), 2);
        assert_eq!(entry.day(), 28);
    }

    #[test]
    fn custom_label_is_not_birthday() {
        let entry = ContactDate::new("Sam", date(SENTINEL_YEAR, 7, 4), None, "wedding");
        assert!(!entry.is_birthday());
        assert!(!entry.has_year());
    }

    #[test]
    fn serializes_to_json() {
        let entry = ContactDate::new("Sam", date(SENTINEL_YEAR, 7, 4), None, LABEL_BIRTHDAY);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["name"], "Sam");
        assert_eq!(json["date"], "2000-07-04");
        assert!(json["year_of_birth"].is_null());
        assert_eq!(json["label"], "bday");
    }
}
