//! Pure per-value normalization rules.
//!
//! Each rule maps one raw field value to its cleaned form; column-to-rule
//! binding lives in the parent module.

use chrono::{NaiveDate, NaiveDateTime};
use common::{Error, Result};

const YEAR_FIRST_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
const YEAR_FIRST_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parses a year-first date string, with or without a time component.
/// Blank or unparseable input becomes `None`.
pub fn parse_year_first_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in YEAR_FIRST_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    for format in YEAR_FIRST_DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime.date());
        }
    }
    None
}

/// Month-first timestamps come in a "seconds included" and a "no seconds"
/// variant. Anything else is a hard failure for the whole column; this is an
/// explicit two-format retry, not a general parser.
pub fn parse_month_first_datetime(raw: &str) -> Result<NaiveDateTime> {
    let trimmed = raw.trim();
    NaiveDateTime::parse_from_str(trimmed, "%m/%d/%Y %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%m/%d/%Y %H:%M"))
        .map_err(|_| Error::Parse(format!("'{raw}' matches neither month-first timestamp format")))
}

pub fn bool_to_yes_no(truthy: bool) -> &'static str {
    if truthy { "Yes" } else { "No" }
}

/// Truthiness of a boolean-ish string field. Empty strings and the usual
/// textual/numeric falsy spellings count as false.
pub fn truthy_string(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "0.0" | "false" | "no"
    )
}

/// Deliberately partial lookup: only the states present in the source data.
/// Unmapped codes pass through unchanged.
pub fn expand_state_code(code: &str) -> &str {
    match code {
        "FL" => "Florida",
        "TX" => "Texas",
        "WA" => "Washington",
        "GA" => "Georgia",
        "OR" => "Oregon",
        other => other,
    }
}

const SENTINELS: [&str; 5] = ["--", "None", "None_1", "{}", "$$"];

/// Trims the value and maps the fixed sentinel set to null.
pub fn scrub_sentinel(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if SENTINELS.contains(&trimmed) {
        None
    } else {
        Some(trimmed)
    }
}
