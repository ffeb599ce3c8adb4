//! vCard record splitting and date extraction.
//!
//! Only the properties that carry recurring dates are interpreted:
//!
//! - `FN` - the contact name
//! - `BDAY` - one entry labeled `bday`
//! - `ANNIVERSARY` - one entry labeled `anniversary`
//! - `itemN.X-ABDATE` with its sibling `itemN.X-ABLabel` - one entry per pair
//!
//! Parsing never fails. A property whose value is not a recognizable date is
//! reported in [`VcardParse::skipped`] and contributes no entry.

use chrono::Datelike;
use tracing::debug;

use crate::contact::{
    ContactDate, LABEL_ANNIVERSARY, LABEL_BIRTHDAY, LABEL_CUSTOM, UNKNOWN_NAME,
};
use crate::date::{DateRejection, ParsedDate, parse_date_value};
use crate::label::{clean_text, normalize_label};

const BEGIN_MARKER: &str = "BEGIN:VCARD";
const END_MARKER: &str = "END:VCARD";

/// Apple parameter naming the placeholder year of a yearless date.
const OMIT_YEAR_PARAM: &str = "X-APPLE-OMIT-YEAR";

/// Returns every `BEGIN:VCARD` ... `END:VCARD` segment of `text`.
///
/// Segments are returned including both markers. Anything around them
/// (XML, CDATA wrappers, whitespace) is ignored, and an unterminated
/// trailing record is dropped.
pub fn split_vcards(text: &str) -> Vec<&str> {
    let mut records = Vec::new();
    let mut rest = text;
    let mut offset = 0;

    while let Some(begin) = rest.find(BEGIN_MARKER) {
        let after_begin = begin + BEGIN_MARKER.len();
        let Some(end) = rest[after_begin..].find(END_MARKER) else {
            break;
        };
        let stop = after_begin + end + END_MARKER.len();
        records.push(&text[offset + begin..offset + stop]);
        rest = &rest[stop..];
        offset += stop;
    }

    records
}

/// Removes vCard line folding (a line break followed by a space or tab).
pub fn unfold(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    let mut out = String::with_capacity(normalized.len());
    let mut chars = normalized.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' && matches!(chars.peek(), Some(' ') | Some('\t')) {
            chars.next();
            continue;
        }
        out.push(c);
    }

    out
}

/// A single content line, split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLine<'a> {
    /// Group prefix such as `item1`, if present.
    pub group: Option<&'a str>,
    /// Property name as written.
    pub name: &'a str,
    /// Parameters as (name, value) pairs.
    pub params: Vec<(&'a str, &'a str)>,
    /// Raw value after the first unquoted colon.
    pub value: &'a str,
}

impl<'a> ContentLine<'a> {
    /// Parses a content line. Returns `None` when the line has no colon.
    pub fn parse(line: &'a str) -> Option<Self> {
        let colon = find_unquoted_colon(line)?;
        let (head, value) = (&line[..colon], &line[colon + 1..]);

        let mut parts = head.split(';');
        let full_name = parts.next()?.trim();
        let (group, name) = match full_name.rsplit_once('.') {
            Some((group, name)) => (Some(group), name),
            None => (None, full_name),
        };
        if name.is_empty() {
            return None;
        }

        let params = parts
            .filter_map(|p| {
                let (k, v) = p.split_once('=')?;
                Some((k.trim(), v.trim().trim_matches('"')))
            })
            .collect();

        Some(Self {
            group,
            name,
            params,
            value,
        })
    }

    /// Case-insensitive property name comparison.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Returns the value of a parameter, compared case-insensitively.
    pub fn param(&self, name: &str) -> Option<&'a str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    /// Returns true if the line belongs to the given group.
    pub fn in_group(&self, group: &str) -> bool {
        self.group.is_some_and(|g| g.eq_ignore_ascii_case(group))
    }

    /// The property name including its group, as used in diagnostics.
    pub fn qualified_name(&self) -> String {
        match self.group {
            Some(group) => format!("{}.{}", group, self.name),
            None => self.name.to_string(),
        }
    }
}

fn find_unquoted_colon(line: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ':' if !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

/// A date property that produced no entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedProperty {
    /// Qualified property name, e.g. `BDAY` or `item2.X-ABDATE`.
    pub property: String,
    /// The raw value.
    pub value: String,
    /// Why the value was rejected.
    pub reason: DateRejection,
}

/// The result of parsing one vCard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VcardParse {
    /// Contact name used for every entry.
    pub name: String,
    /// Extracted dates.
    pub dates: Vec<ContactDate>,
    /// Date properties that were ignored.
    pub skipped: Vec<SkippedProperty>,
}

/// Parses a vCard and returns its dates together with diagnostics.
pub fn parse_vcard_detailed(text: &str) -> VcardParse {
    let unfolded = unfold(text);
    let lines: Vec<ContentLine<'_>> = unfolded
        .lines()
        .filter_map(|l| ContentLine::parse(l.trim_end_matches('\r')))
        .collect();

    let name = lines
        .iter()
        .find(|l| l.is("FN"))
        .map(|l| clean_name(l.value))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());

    let mut parse = VcardParse {
        name,
        ..Default::default()
    };

    if let Some(line) = lines.iter().find(|l| l.is("BDAY")) {
        parse.push(line, LABEL_BIRTHDAY.to_string());
    }

    if let Some(line) = lines.iter().find(|l| l.is("ANNIVERSARY")) {
        parse.push(line, LABEL_ANNIVERSARY.to_string());
    }

    for line in lines.iter().filter(|l| l.is("X-ABDATE")) {
        let Some(group) = line.group else {
            continue;
        };
        let label = lines
            .iter()
            .find(|l| l.is("X-ABLabel") && l.in_group(group))
            .map(|l| normalize_label(l.value))
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| LABEL_CUSTOM.to_string());
        parse.push(line, label);
    }

    parse
}

impl VcardParse {
    fn push(&mut self, line: &ContentLine<'_>, label: String) {
        match parse_property_date(line) {
            Ok(parsed) => self.dates.push(ContactDate::new(
                self.name.clone(),
                parsed.date,
                parsed.year,
                label,
            )),
            Err(reason) => self.skipped.push(SkippedProperty {
                property: line.qualified_name(),
                value: line.value.to_string(),
                reason,
            }),
        }
    }
}

/// Parses the value of a date property, honoring Apple's omit-year marker.
fn parse_property_date(line: &ContentLine<'_>) -> Result<ParsedDate, DateRejection> {
    let parsed = parse_date_value(line.value)?;

    let omitted = line
        .param(OMIT_YEAR_PARAM)
        .and_then(|y| y.parse::<i32>().ok());
    match (parsed.year, omitted) {
        (Some(year), Some(omit)) if year == omit => {
            ParsedDate::without_year(parsed.date.month(), parsed.date.day())
                .ok_or(DateRejection::InvalidCalendarDate { rule: "--MM-DD" })
        }
        _ => Ok(parsed),
    }
}

/// Cleans a text value: control characters and vCard escapes.
fn clean_name(value: &str) -> String {
    clean_text(value)
        .replace("\\,", ",")
        .replace("\\;", ";")
        .replace("\\\\", "\\")
}

/// Parses a vCard into its dates.
///
/// Rejected properties are logged at debug level and otherwise ignored.
pub fn parse_vcard(text: &str) -> Vec<ContactDate> {
    let parse = parse_vcard_detailed(text);
    for skipped in &parse.skipped {
        debug!(
            contact = %parse.name,
            property = %skipped.property,
            value = %skipped.value,
            reason = %skipped.reason,
            "Skipping date property"
        );
    }
    parse.dates
}
