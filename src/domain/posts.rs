use time::{
    Date, Month, OffsetDateTime, Time, UtcOffset, format_description::FormatItem,
    macros::format_description,
};

use super::error::DomainError;

pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");
pub const HUMAN_DATETIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year] [hour]:[minute]");

pub const TITLE_MAX_CHARS: usize = 200;
pub const SLUG_MAX_CHARS: usize = 200;

pub fn format_human_date(date: Date) -> String {
    date.format(HUMAN_DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

/// First `limit` characters of `text`. Never splits a multi-byte character.
pub fn teaser(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// Half-open UTC interval `[start, end)` covering the calendar year.
pub fn year_bounds(year: i32) -> Result<(OffsetDateTime, OffsetDateTime), DomainError> {
    let out_of_range = || DomainError::YearOutOfRange { year };
    let start = Date::from_calendar_date(year, Month::January, 1).map_err(|_| out_of_range())?;
    let next = year.checked_add(1).ok_or_else(out_of_range)?;
    let end = Date::from_calendar_date(next, Month::January, 1).map_err(|_| out_of_range())?;

    Ok((
        start.with_time(Time::MIDNIGHT).assume_offset(UtcOffset::UTC),
        end.with_time(Time::MIDNIGHT).assume_offset(UtcOffset::UTC),
    ))
}

pub fn validate_title(title: &str) -> Result<(), DomainError> {
    if title.trim().is_empty() {
        return Err(DomainError::validation("post title must not be empty"));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(DomainError::validation(format!(
            "post title `{title}` exceeds {TITLE_MAX_CHARS} characters"
        )));
    }
    Ok(())
}

pub fn validate_slug(slug: &str) -> Result<(), DomainError> {
    if slug.is_empty() || slug.chars().count() > SLUG_MAX_CHARS {
        return Err(DomainError::validation(format!(
            "post slug `{slug}` must be between 1 and {SLUG_MAX_CHARS} characters"
        )));
    }

    let valid = slug
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    if !valid {
        return Err(DomainError::validation(format!(
            "post slug `{slug}` may only contain ASCII letters, digits, `-` and `_`"
        )));
    }

    Ok(())
}
