//! Output rendering for upcoming dates.
//!
//! Text lines look like `2026-10-19  Jane Doe turns 36  (today)`. Labels and
//! phrases come in English and Dutch.

use std::borrow::Cow;

use carddates_core::{LABEL_ANNIVERSARY, LABEL_BIRTHDAY, LABEL_CUSTOM, LABEL_OTHER, Occurrence};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Output language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English.
    #[default]
    En,
    /// Dutch.
    Nl,
}

/// Returns the display name of a normalized label.
pub fn label_name(label: &str, language: Language) -> Cow<'_, str> {
    let known = match (label, language) {
        (LABEL_BIRTHDAY, Language::En) => "birthday",
        (LABEL_BIRTHDAY, Language::Nl) => "verjaardag",
        (LABEL_ANNIVERSARY, Language::En) => "anniversary",
        (LABEL_ANNIVERSARY, Language::Nl) => "trouwdag",
        (LABEL_OTHER, Language::En) => "other",
        (LABEL_OTHER, Language::Nl) => "overig",
        (LABEL_CUSTOM, Language::En) => "date",
        (LABEL_CUSTOM, Language::Nl) => "datum",
        _ => return Cow::Borrowed(label),
    };
    Cow::Borrowed(known)
}

/// Returns "today", "tomorrow" or "in N days".
pub fn relative_day(days: i64, language: Language) -> String {
    match (days, language) {
        (0, Language::En) => "today".to_string(),
        (0, Language::Nl) => "vandaag".to_string(),
        (1, Language::En) => "tomorrow".to_string(),
        (1, Language::Nl) => "morgen".to_string(),
        (n, Language::En) => format!("in {n} days"),
        (n, Language::Nl) => format!("over {n} dagen"),
    }
}

/// Text shown when nothing falls in the window.
pub fn empty_text(language: Language) -> &'static str {
    match language {
        Language::En => "No upcoming dates",
        Language::Nl => "Geen komende datums",
    }
}

/// Describes one occurrence without its date.
pub fn describe(occurrence: &Occurrence<'_>, language: Language, show_age: bool) -> String {
    let entry = occurrence.entry;
    let years = occurrence.years.filter(|_| show_age);

    if entry.is_birthday() {
        return match (years, language) {
            (Some(age), Language::En) => format!("{} turns {age}", entry.name),
            (Some(age), Language::Nl) => format!("{} wordt {age}", entry.name),
            (None, Language::En) => format!("{}'s birthday", entry.name),
            (None, Language::Nl) => format!("verjaardag van {}", entry.name),
        };
    }

    let label = label_name(&entry.label, language);
    match (years, language) {
        (Some(n), Language::En) => format!("{}: {label}, {n} years", entry.name),
        (Some(n), Language::Nl) => format!("{}: {label}, {n} jaar", entry.name),
        (None, _) => format!("{}: {label}", entry.name),
    }
}

/// Renders one occurrence as a text line.
pub fn render_line(
    occurrence: &Occurrence<'_>,
    today: NaiveDate,
    language: Language,
    show_age: bool,
) -> String {
    let days = (occurrence.date - today).num_days();
    format!(
        "{}  {}  ({})",
        occurrence.date.format("%Y-%m-%d"),
        describe(occurrence, language, show_age),
        relative_day(days, language)
    )
}

/// Renders occurrences as text lines, at most `limit` of them.
pub fn render_lines(
    occurrences: &[Occurrence<'_>],
    today: NaiveDate,
    language: Language,
    show_age: bool,
    limit: Option<usize>,
) -> Vec<String> {
    occurrences
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|occurrence| render_line(occurrence, today, language, show_age))
        .collect()
}

/// An occurrence in JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingEntry {
    /// Contact name.
    pub name: String,
    /// Normalized label.
    pub label: String,
    /// Date of the occurrence.
    pub date: NaiveDate,
    /// Days from today.
    pub days_until: i64,
    /// Age or years since, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years: Option<i32>,
}

impl UpcomingEntry {
    /// Builds the JSON form of an occurrence.
    pub fn new(occurrence: &Occurrence<'_>, today: NaiveDate) -> Self {
        Self {
            name: occurrence.entry.name.clone(),
            label: occurrence.entry.label.clone(),
            date: occurrence.date,
            days_until: (occurrence.date - today).num_days(),
            years: occurrence.years,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carddates_core::{ContactDate, upcoming};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        ymd(2026, 10, 19)
    }

    fn contacts() -> Vec<ContactDate> {
        vec![
            ContactDate::new("Alex", ymd(2000, 12, 31), None, "wedding"),
            ContactDate::new("Kim & Lee", ymd(2010, 10, 25), Some(2010), "anniversary"),
            ContactDate::new("Sam", ymd(2000, 10, 20), None, "bday"),
            ContactDate::new("Jane Doe", ymd(1990, 10, 19), Some(1990), "bday"),
        ]
    }

    fn lines(language: Language, show_age: bool, limit: Option<usize>) -> String {
        let entries = contacts();
        let next = upcoming(&entries, today(), ymd(2027, 10, 18));
        render_lines(&next, today(), language, show_age, limit).join("\n")
    }

    #[test]
    fn english_lines() {
        insta::assert_snapshot!(lines(Language::En, true, None), @r"
        2026-10-19  Jane Doe turns 36  (today)
        2026-10-20  Sam's birthday  (tomorrow)
        2026-10-25  Kim & Lee: anniversary, 16 years  (in 6 days)
        2026-12-31  Alex: wedding  (in 73 days)
        ");
    }

    #[test]
    fn dutch_lines() {
        insta::assert_snapshot!(lines(Language::Nl, true, None), @r"
        2026-10-19  Jane Doe wordt 36  (vandaag)
        2026-10-20  verjaardag van Sam  (morgen)
        2026-10-25  Kim & Lee: trouwdag, 16 jaar  (over 6 dagen)
        2026-12-31  Alex: wedding  (over 73 dagen)
        ");
    }

    #[test]
    fn ages_hidden_and_limited() {
        insta::assert_snapshot!(lines(Language::En, false, Some(3)), @r"
        2026-10-19  Jane Doe's birthday  (today)
        2026-10-20  Sam's birthday  (tomorrow)
        2026-10-25  Kim & Lee: anniversary  (in 6 days)
        ");
    }

    #[test]
    fn placeholder_labels_are_translated() {
        assert_eq!(label_name("other", Language::Nl), "overig");
        assert_eq!(label_name("custom", Language::En), "date");
        assert_eq!(label_name("graduation", Language::Nl), "graduation");
    }

    #[test]
    fn json_entry() {
        let entries = contacts();
        let next = upcoming(&entries, today(), ymd(2026, 10, 20));
        let json: Vec<_> = next.iter().map(|o| UpcomingEntry::new(o, today())).collect();
        let value = serde_json::to_value(&json).unwrap();

        assert_eq!(value[0]["name"], "Jane Doe");
        assert_eq!(value[0]["date"], "2026-10-19");
        assert_eq!(value[0]["days_until"], 0);
        assert_eq!(value[0]["years"], 36);
        assert!(value[1].get("years").is_none());
    }

    #[test]
    fn empty_window_text() {
        assert_eq!(empty_text(Language::Nl), "Geen komende datums");
    }
}
