//! Label normalization for custom dated fields.
//!
//! Apple clients store built-in labels as bracketed placeholders such as
//! `_$!<Anniversary>!$_`. Known placeholders map to a canonical label,
//! unknown ones are unwrapped, and free text is lowercased.

use std::sync::LazyLock;

use regex::Regex;

use crate::contact::{LABEL_ANNIVERSARY, LABEL_BIRTHDAY, LABEL_OTHER};

/// Built-in Apple placeholders and their canonical labels.
const APPLE_PLACEHOLDERS: &[(&str, &str)] = &[
    ("_$!<Anniversary>!$_", LABEL_ANNIVERSARY),
    ("_$!<Birthday>!$_", LABEL_BIRTHDAY),
    ("_$!<Other>!$_", LABEL_OTHER),
];

static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"_\$!<(.+?)>!\$_").expect("Invalid placeholder regex")
});

/// Removes carriage returns, control characters and escaped CR entities.
pub fn clean_text(value: &str) -> String {
    value
        .replace("&#13;", "")
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Normalizes a raw `X-ABLabel` value.
pub fn normalize_label(raw: &str) -> String {
    let cleaned = clean_text(raw);

    // Some exporters escape the `$` as `\$`.
    let cleaned = cleaned.replace("\\$", "$");

    if let Some((_, canonical)) = APPLE_PLACEHOLDERS
        .iter()
        .find(|(placeholder, _)| *placeholder == cleaned)
    {
        return (*canonical).to_string();
    }

    PLACEHOLDER_REGEX
        .replace_all(&cleaned, "$1")
        .trim()
        .to_lowercase()
}
