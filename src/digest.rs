//! Read-side helpers over the merged collections: progress summaries, list
//! filtering and the "refreshed N minutes ago" indicator.

use crate::models::{Assign, Quiz, Vod};
use crate::relevance::AttendanceStatus;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Done/total counts for one kind of item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub done: usize,
    pub total: usize,
}

/// Lectures are counted per `courseId|subject|range` group; a group is done
/// when its weekly attendance reads `o`.
pub fn summarize_vods(vods: &[Vod]) -> Summary {
    let mut groups: HashMap<String, &Vod> = HashMap::new();
    for vod in vods {
        let key = format!(
            "{}|{}|{}",
            vod.course.course_id,
            vod.subject,
            vod.range.as_deref().unwrap_or("")
        );
        groups.entry(key).or_insert(vod);
    }
    Summary {
        done: groups
            .values()
            .filter(|vod| vod.weekly_attendance.trim().eq_ignore_ascii_case("o"))
            .count(),
        total: groups.len(),
    }
}

pub fn summarize_assigns(assigns: &[Assign]) -> Summary {
    Summary {
        done: assigns.iter().filter(|a| a.is_submit).count(),
        total: assigns.len(),
    }
}

/// The quiz index exposes no attempt state, so nothing counts as done.
pub fn summarize_quizzes(quizzes: &[Quiz]) -> Summary {
    Summary {
        done: 0,
        total: quizzes.len(),
    }
}

/// Elapsed time split into whole days, hours and minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Elapsed {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
}

impl Elapsed {
    pub fn is_just_now(&self) -> bool {
        self.days == 0 && self.hours == 0 && self.minutes == 0
    }
}

/// Time between the last refresh and now, both Unix milliseconds.
pub fn time_ago(last_refresh_ms: i64, now_ms: i64) -> Elapsed {
    const MINUTE: i64 = 60 * 1000;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;

    let diff = (now_ms - last_refresh_ms).max(0);
    Elapsed {
        days: diff / DAY,
        hours: (diff % DAY) / HOUR,
        minutes: (diff % HOUR) / MINUTE,
    }
}

/// Sort order of item lists. Attended/submitted items always come first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    Title,
    #[default]
    Deadline,
}

/// Narrowing applied to item lists. Empty criteria match everything.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub course_titles: Vec<String>,
    pub attendance: Vec<AttendanceStatus>,
    pub submitted: Vec<bool>,
    pub search: String,
}

impl ItemFilter {
    fn course_matches(&self, course_title: &str) -> bool {
        self.course_titles.is_empty() || self.course_titles.iter().any(|t| t == course_title)
    }

    fn search_matches(&self, fields: &[&str]) -> bool {
        if self.search.is_empty() {
            return true;
        }
        let needle = self.search.to_lowercase();
        fields.iter().any(|f| f.to_lowercase().contains(&needle))
    }
}

pub fn filter_vods(vods: &[Vod], filter: &ItemFilter, sort: SortKey) -> Vec<Vod> {
    let mut data: Vec<Vod> = vods
        .iter()
        .filter(|v| filter.course_matches(&v.course.course_title))
        .filter(|v| {
            filter.attendance.is_empty()
                || filter.attendance.contains(&attendance_bucket(&v.is_attendance))
        })
        .filter(|v| {
            filter.search_matches(&[
                v.course.course_title.as_str(),
                v.title.as_str(),
                v.course.professor.as_str(),
            ])
        })
        .cloned()
        .collect();

    data.sort_by(|a, b| {
        let attended_a = AttendanceStatus::is_attended(&a.is_attendance);
        let attended_b = AttendanceStatus::is_attended(&b.is_attendance);
        attended_b.cmp(&attended_a).then_with(|| match sort {
            SortKey::Title => a.title.cmp(&b.title),
            SortKey::Deadline => optional_cmp(a.range.as_deref(), b.range.as_deref()),
        })
    });
    data
}

pub fn filter_assigns(assigns: &[Assign], filter: &ItemFilter, sort: SortKey) -> Vec<Assign> {
    let mut data: Vec<Assign> = assigns
        .iter()
        .filter(|a| filter.course_matches(&a.course.course_title))
        .filter(|a| filter.submitted.is_empty() || filter.submitted.contains(&a.is_submit))
        .filter(|a| {
            filter.search_matches(&[
                a.course.course_title.as_str(),
                a.title.as_str(),
                a.course.professor.as_str(),
            ])
        })
        .cloned()
        .collect();

    data.sort_by(|a, b| {
        b.is_submit.cmp(&a.is_submit).then_with(|| match sort {
            SortKey::Title => a.title.cmp(&b.title),
            SortKey::Deadline => optional_cmp(a.due_date.as_deref(), b.due_date.as_deref()),
        })
    });
    data
}

pub fn filter_quizzes(quizzes: &[Quiz], filter: &ItemFilter, sort: SortKey) -> Vec<Quiz> {
    let mut data: Vec<Quiz> = quizzes
        .iter()
        .filter(|q| filter.course_matches(&q.course.course_title))
        .filter(|q| {
            filter.search_matches(&[
                q.course.course_title.as_str(),
                q.title.as_str(),
                q.course.professor.as_str(),
            ])
        })
        .cloned()
        .collect();

    data.sort_by(|a, b| match sort {
        SortKey::Title => a.title.cmp(&b.title),
        SortKey::Deadline => optional_cmp(a.due_date.as_deref(), b.due_date.as_deref()),
    });
    data
}

/// Lists only distinguish attended from everything else.
fn attendance_bucket(token: &str) -> AttendanceStatus {
    if AttendanceStatus::is_attended(token) {
        AttendanceStatus::Attended
    } else {
        AttendanceStatus::Absent
    }
}

/// Known values first, in text order.
fn optional_cmp(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
