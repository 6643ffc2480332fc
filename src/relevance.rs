//! Time-based relevance predicates and attendance-token interpretation.
//!
//! All times are LMS wall-clock times: the LMS prints dates without an offset,
//! so callers pass "now" as a naive date-time in the LMS's timezone.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

const RANGE_SEPARATOR: &str = " ~ ";

/// Parses `YYYY-MM-DD HH:MM[:SS]` (or with `/` date separators). A bare date
/// means midnight.
pub fn parse_lms_datetime(text: &str) -> Option<NaiveDateTime> {
    let normalized = text.trim().replace('/', "-");
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&normalized, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Splits a `"START ~ END"` range into its two endpoints.
pub fn parse_range(range: &str) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let (start, end) = range.split_once(RANGE_SEPARATOR)?;
    Some((parse_lms_datetime(start)?, parse_lms_datetime(end)?))
}

/// True when `now` lies inside the eligibility range, endpoints included.
/// A missing or unreadable range is never current.
pub fn is_now_in_range(range: Option<&str>, now: NaiveDateTime) -> bool {
    range
        .and_then(parse_range)
        .is_some_and(|(start, end)| start <= now && now <= end)
}

/// True when the deadline has not passed yet. A missing or unreadable
/// deadline is never current.
pub fn is_due_not_past(due_date: Option<&str>, now: NaiveDateTime) -> bool {
    due_date
        .and_then(parse_lms_datetime)
        .is_some_and(|due| now <= due)
}

/// True when the deadline is between now and `days` days from now.
pub fn is_within_days(due_date: Option<&str>, now: NaiveDateTime, days: i64) -> bool {
    let Some(due) = due_date.and_then(parse_lms_datetime) else {
        return false;
    };
    let left = due - now;
    left >= TimeDelta::zero() && left <= TimeDelta::days(days)
}

/// Interpretation of an LMS attendance token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttendanceStatus {
    Attended,
    Absent,
    Unknown,
}

impl AttendanceStatus {
    /// Tokens are matched case-insensitively and by substring: `o` and text
    /// mentioning 출석 mean attended, `x` and text mentioning 결석 or 미출석
    /// mean absent.
    pub fn from_token(token: &str) -> Self {
        let token = token.trim().to_lowercase();
        if token == "x" || token.contains("결석") || token.contains("미출석") {
            AttendanceStatus::Absent
        } else if token == "o" || token.contains("출석") {
            AttendanceStatus::Attended
        } else {
            AttendanceStatus::Unknown
        }
    }

    pub fn is_attended(token: &str) -> bool {
        Self::from_token(token) == AttendanceStatus::Attended
    }
}
