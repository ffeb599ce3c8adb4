//! `carddates dates`.

use carddates_core::{ContactDate, Occurrence, age_in, next_occurrence, upcoming, window_end};
use carddates_providers::DatesProvider;
use chrono::{Datelike, Local, NaiveDate};
use tracing::debug;

use crate::cli::DatesArgs;
use crate::config::{ClientConfig, DisplaySettings};
use crate::error::ClientResult;
use crate::render::{UpcomingEntry, empty_text, render_lines};

/// Fetches once and prints the selected dates.
pub async fn run(config: &ClientConfig, args: DatesArgs) -> ClientResult<()> {
    let provider = super::build_provider(config)?;
    let result = provider.fetch_dates().await?;
    debug!(
        dates = result.dates.len(),
        vcards = result.vcard_count,
        skipped_dates = result.skipped_dates.len(),
        "Fetched"
    );

    let today = Local::now().date_naive();
    let occurrences = if args.all {
        next_for_each(&result.dates, today)
    } else {
        within(&result.dates, today, args.days.unwrap_or(config.display.days_ahead))
    };
    let limit = args.limit.or(config.display.limit);

    println!(
        "{}",
        format_output(&occurrences, today, &config.display, args.json, limit)?
    );
    Ok(())
}

/// Occurrences in `[today, today + days]`, with `days` clamped to the
/// longest supported window.
pub fn within(dates: &[ContactDate], today: NaiveDate, days: i64) -> Vec<Occurrence<'_>> {
    upcoming(dates, today, window_end(today, days))
}

/// The next occurrence of every entry, sorted by date.
pub fn next_for_each(dates: &[ContactDate], today: NaiveDate) -> Vec<Occurrence<'_>> {
    let mut all: Vec<_> = dates
        .iter()
        .filter_map(|entry| {
            let date = next_occurrence(entry.date, today)?;
            Some(Occurrence {
                entry,
                date,
                years: age_in(entry.year_of_birth, date.year()),
            })
        })
        .collect();
    all.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.entry.name.cmp(&b.entry.name)));
    all
}

/// Renders occurrences as text lines or a JSON array.
pub fn format_output(
    occurrences: &[Occurrence<'_>],
    today: NaiveDate,
    display: &DisplaySettings,
    json: bool,
    limit: Option<usize>,
) -> ClientResult<String> {
    if json {
        let entries: Vec<_> = occurrences
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|occurrence| UpcomingEntry::new(occurrence, today))
            .collect();
        return Ok(serde_json::to_string_pretty(&entries)?);
    }

    let lines = render_lines(occurrences, today, display.language, display.show_age, limit);
    if lines.is_empty() {
        return Ok(empty_text(display.language).to_string());
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Language;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn contacts() -> Vec<ContactDate> {
        vec![
            ContactDate::new("Leap", ymd(2000, 2, 29), None, "bday"),
            ContactDate::new("Ann", ymd(1980, 1, 5), Some(1980), "bday"),
            ContactDate::new("Bo", ymd(2000, 11, 2), None, "anniversary"),
        ]
    }

    #[test]
    fn window_excludes_far_dates() {
        let dates = contacts();
        let next = within(&dates, ymd(2026, 10, 19), 30);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].entry.name, "Bo");
    }

    #[test]
    fn huge_window_is_clamped() {
        let dates = contacts();
        let today = ymd(2026, 10, 19);
        assert!(within(&[], today, 200_000_000).is_empty());

        let next = within(&dates, today, i64::MAX);
        // One occurrence per entry per year, for about a century.
        assert!(next.len() >= 3 * 100, "{}", next.len());
        assert!(next.iter().all(|o| o.date.year() <= 2127));
    }

    #[test]
    fn json_output_respects_limit() {
        let dates = contacts();
        let today = ymd(2026, 10, 19);
        let next = next_for_each(&dates, today);
        let output =
            format_output(&next, today, &DisplaySettings::default(), true, Some(1)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
        assert_eq!(value[0]["name"], "Bo");
    }

    #[test]
    fn all_lists_each_entry_once() {
        let dates = contacts();
        let next = next_for_each(&dates, ymd(2026, 10, 19));
        let names: Vec<_> = next.iter().map(|o| o.entry.name.as_str()).collect();
        assert_eq!(names, ["Bo", "Ann", "Leap"]);
        assert_eq!(next[1].years, Some(47));
        assert_eq!(next[2].date, ymd(2027, 2, 28));
    }

    #[test]
    fn text_output_with_limit() {
        let dates = contacts();
        let today = ymd(2026, 10, 19);
        let next = next_for_each(&dates, today);
        let output =
            format_output(&next, today, &DisplaySettings::default(), false, Some(2)).unwrap();
        insta::assert_snapshot!(output, @r"
        2026-11-02  Bo: anniversary  (in 14 days)
        2027-01-05  Ann turns 47  (in 78 days)
        ");
    }

    #[test]
    fn empty_text_is_localized() {
        let display = DisplaySettings {
            language: Language::Nl,
            ..Default::default()
        };
        let output = format_output(&[], ymd(2026, 10, 19), &display, false, None).unwrap();
        assert_eq!(output, "Geen komende datums");
    }

    #[test]
    fn json_output_is_an_array() {
        let dates = contacts();
        let today = ymd(2026, 10, 19);
        let next = within(&dates, today, 30);
        let output = format_output(&next, today, &DisplaySettings::default(), true, None).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
        assert_eq!(value[0]["label"], "anniversary");
        assert_eq!(value[0]["days_until"], 14);

        let empty = format_output(&[], today, &DisplaySettings::default(), true, None).unwrap();
        assert_eq!(empty, "[]");
    }
}
