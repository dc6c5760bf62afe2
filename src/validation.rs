//! Date validation for APOD lookups.

use crate::error::ApiError;
use chrono::{NaiveDate, Utc};
use regex::Regex;
use std::sync::LazyLock;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub const INVALID_DATE_FORMAT: &str = "Invalid date format. Use YYYY-MM-DD";

static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("date pattern is valid"));

/// Date of the first APOD publication.
pub fn first_apod_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1995, 6, 16).unwrap_or(NaiveDate::MIN)
}

/// Validate an optional `YYYY-MM-DD` date against `today`.
///
/// An absent date means "today" and is always valid. Strings that match the
/// pattern but are not real calendar dates (`2024-02-30`) are passed through
/// untouched; the upstream API has the final word on those.
pub fn validate_date(date: Option<&str>, today: NaiveDate) -> Result<(), ApiError> {
    let Some(date) = date else {
        return Ok(());
    };

    if !DATE_PATTERN.is_match(date) {
        return Err(ApiError::validation("date", INVALID_DATE_FORMAT));
    }

    let Ok(parsed) = NaiveDate::parse_from_str(date, DATE_FORMAT) else {
        return Ok(());
    };

    if parsed > today {
        return Err(ApiError::validation("date", "Date cannot be in the future"));
    }

    if parsed < first_apod_date() {
        return Err(ApiError::validation(
            "date",
            "Date must be on or after 1995-06-16 (the first APOD)",
        ));
    }

    Ok(())
}

/// Validate against the current UTC date.
pub fn validate_date_today(date: Option<&str>) -> Result<(), ApiError> {
    validate_date(date, Utc::now().date_naive())
}
