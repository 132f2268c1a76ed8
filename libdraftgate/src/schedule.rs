//! Schedule time parsing
//!
//! Drafts carry an optional publish time entered by a human. Accepted
//! forms: relative durations ("2h", "30m"), natural language ("tomorrow
//! 9am"), and absolute local times ("2026-09-01 15:00"). Absolute and
//! natural-language times without a zone are interpreted in the deployment
//! offset and stored as UTC.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Utc};

use crate::error::{DraftgateError, Result};

/// Parse a schedule string into a UTC publish time.
///
/// `utc_offset_hours` is the local offset applied to zone-less absolute
/// times (see `ReviewConfig::utc_offset_hours`).
///
/// # Errors
///
/// Returns `InvalidInput` if the string cannot be parsed or resolves to a
/// time in the past.
pub fn parse_schedule(input: &str, utc_offset_hours: i32) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(DraftgateError::InvalidInput(
            "Schedule string cannot be empty".to_string(),
        ));
    }

    let resolved = if let Some(dt) = parse_absolute(input, utc_offset_hours) {
        dt
    } else if let Ok(duration) = parse_duration(input) {
        Utc::now() + duration
    } else if let Ok(dt) = parse_natural_language(input, utc_offset_hours) {
        dt
    } else {
        return Err(DraftgateError::InvalidInput(format!(
            "Could not parse schedule string: {}",
            input
        )));
    };

    if resolved <= Utc::now() {
        return Err(DraftgateError::InvalidInput(format!(
            "Schedule time is in the past: {}",
            resolved.format("%Y-%m-%d %H:%M UTC")
        )));
    }

    Ok(resolved)
}

/// Parse "YYYY-MM-DD HH:MM[:SS]" as a local time in the given offset.
fn parse_absolute(input: &str, utc_offset_hours: i32) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S"))
        .ok()?;

    let offset = FixedOffset::east_opt(utc_offset_hours * 3600)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a duration string into a chrono::Duration
fn parse_duration(input: &str) -> Result<Duration> {
    // humantime covers "1h", "30m", "2days 4h"
    if let Ok(std_duration) = humantime::parse_duration(input) {
        let seconds = std_duration.as_secs() as i64;
        return Duration::try_seconds(seconds)
            .ok_or_else(|| DraftgateError::InvalidInput("Duration out of range".to_string()));
    }

    Err(DraftgateError::InvalidInput(format!(
        "Could not parse duration: {}",
        input
    )))
}

/// Parse natural language time expression, anchored to the local offset so
/// "tomorrow 9am" means 09:00 local.
fn parse_natural_language(input: &str, utc_offset_hours: i32) -> Result<DateTime<Utc>> {
    let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
        .ok_or_else(|| DraftgateError::InvalidInput("Offset out of range".to_string()))?;
    let now_local = Utc::now().with_timezone(&offset);

    chrono_english::parse_date_string(input, now_local, chrono_english::Dialect::Us)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DraftgateError::InvalidInput(format!("Could not parse time: {}", e)))
}
