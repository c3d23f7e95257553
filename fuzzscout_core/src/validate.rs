use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use thiserror::Error;

/// How far back a date range reaches when the caller gives no start date.
const DEFAULT_RANGE_DAYS: i64 = 30;

static PROJECT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_-]+$").expect("project name pattern is valid"));

static FUZZ_TARGET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("fuzz target pattern is valid"));

/// Rejections produced by the shared input validators.
///
/// Every variant is an invalid-argument condition: it is surfaced to the
/// immediate caller and never retried or silently defaulted.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Project name cannot be empty")]
    EmptyProjectName,

    #[error(
        "Project name can only contain lowercase letters, numbers, underscores, and hyphens: {0:?}"
    )]
    InvalidProjectName(String),

    #[error("Fuzz target name cannot be empty")]
    EmptyFuzzTarget,

    #[error("Fuzz target name can only contain letters, numbers, underscores, and hyphens: {0:?}")]
    InvalidFuzzTarget(String),

    #[error("Invalid date {0:?}, expected ISO format (YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("Start date {start} cannot be after end date {end}")]
    StartAfterEnd { start: NaiveDate, end: NaiveDate },
}

/// Validates and normalizes a project name.
///
/// Trims surrounding whitespace, lowercases, and requires the result to
/// match `[a-z0-9_-]+`. This is the single gate all project-name inputs
/// pass before touching the filesystem. Idempotent on accepted output.
pub fn validate_project_name(project_name: &str) -> Result<String, ValidationError> {
    if project_name.is_empty() {
        return Err(ValidationError::EmptyProjectName);
    }
    let normalized = project_name.trim().to_lowercase();
    if !PROJECT_NAME_RE.is_match(&normalized) {
        return Err(ValidationError::InvalidProjectName(
            project_name.to_string(),
        ));
    }
    Ok(normalized)
}

/// Validates a fuzz target name.
///
/// Unlike project names, target names keep their case: fuzz binaries on
/// disk are case-sensitive identifiers.
pub fn validate_fuzz_target(fuzz_target: &str) -> Result<String, ValidationError> {
    if fuzz_target.is_empty() {
        return Err(ValidationError::EmptyFuzzTarget);
    }
    let normalized = fuzz_target.trim().to_string();
    if !FUZZ_TARGET_RE.is_match(&normalized) {
        return Err(ValidationError::InvalidFuzzTarget(fuzz_target.to_string()));
    }
    Ok(normalized)
}

/// A concrete start/end pair at calendar-date granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Number of days covered, inclusive of both endpoints.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Validates and normalizes an optional date-range pair.
///
/// Both absent: the last 30 days ending today. Only an end date: a
/// 30-day window ending there. Only a start date: from there to today.
/// Accepts ISO dates (`2023-01-31`) and ISO date-times; the output is
/// always calendar-date granularity.
pub fn validate_date_range(
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<DateRange, ValidationError> {
    let end = match end_date {
        Some(raw) => parse_date(raw)?,
        None => Utc::now().date_naive(),
    };
    let start = match start_date {
        Some(raw) => parse_date(raw)?,
        None => end - TimeDelta::days(DEFAULT_RANGE_DAYS),
    };

    if start > end {
        return Err(ValidationError::StartAfterEnd { start, end });
    }
    Ok(DateRange { start, end })
}

/// Parses an ISO date or date-time string down to a calendar date.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt.date());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.date());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_utc().date());
    }
    Err(ValidationError::InvalidDate(raw.to_string()))
}
