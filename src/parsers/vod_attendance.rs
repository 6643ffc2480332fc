use crate::error::Result;
use crate::models::{Parsed, VodAttendanceRecord};
use crate::parsers::table::{SpanCell, SpanGrid, element_text, leading_number};
use crate::parsers::vocabulary::Vocabulary;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

/// Column positions of the attendance table, resolved from its header row.
#[derive(Debug, Default, Clone, Copy)]
struct AttendanceColumns {
    title: Option<usize>,
    is_attendance: Option<usize>,
    weekly_attendance: Option<usize>,
}

impl AttendanceColumns {
    fn from_headers(headers: &[String], vocabulary: &Vocabulary) -> Self {
        let mut columns = Self::default();
        for (index, text) in headers.iter().enumerate() {
            if vocabulary.attendance_title.matches(text) {
                columns.title = Some(index);
            } else if vocabulary.attendance_status.matches(text) {
                columns.is_attendance = Some(index);
            } else if vocabulary.attendance_weekly.matches(text) {
                columns.weekly_attendance = Some(index);
            }
        }
        columns
    }

    fn is_usable(&self) -> bool {
        self.title.is_some() && self.is_attendance.is_some()
    }
}

/// Parses the online attendance report (`.user_progress_table`).
///
/// The table merges week, attendance and weekly-attendance cells vertically,
/// so rows are rebuilt with a [`SpanGrid`] before fields are read. A row with
/// an empty week cell inherits the last week number seen, and an empty weekly
/// attendance inherits the last non-empty one.
pub fn parse_vod_attendance_from_html(html: &str) -> Result<Parsed<VodAttendanceRecord>> {
    parse_vod_attendance_with(html, &Vocabulary::default())
}

pub fn parse_vod_attendance_with(
    html: &str,
    vocabulary: &Vocabulary,
) -> Result<Parsed<VodAttendanceRecord>> {
    let document = Html::parse_document(html);
    let header_selector = Selector::parse(".user_progress_table > thead > tr > th").unwrap();
    let row_selector = Selector::parse(".user_progress_table > tbody > tr").unwrap();

    let headers: Vec<String> = document
        .select(&header_selector)
        .map(|th| element_text(&th))
        .collect();
    let columns = AttendanceColumns::from_headers(&headers, vocabulary);

    let mut parsed = Parsed::empty();
    if !columns.is_usable() {
        warn!(
            headers = headers.len(),
            "attendance table or its title/attendance headers not found"
        );
        return Ok(parsed);
    }

    let mut grid = SpanGrid::new();
    let mut current_week = 0u32;
    let mut last_weekly = String::new();

    for (index, row) in document.select(&row_selector).enumerate() {
        let values = grid.push_row(row_cells(&row));
        let value_at = |column: Option<usize>| -> String {
            column
                .and_then(|c| values.get(c).cloned().flatten())
                .unwrap_or_default()
        };

        let mut weekly = value_at(columns.weekly_attendance);
        if weekly.is_empty() {
            weekly = last_weekly.clone();
        } else {
            last_weekly = weekly.clone();
        }
        if weekly.contains(vocabulary.batch_attendance) {
            weekly = "o".to_string();
        }

        let title = value_at(columns.title);
        let is_attendance = value_at(columns.is_attendance);

        if let Some(week) = values
            .first()
            .cloned()
            .flatten()
            .and_then(|w| leading_number(&w))
        {
            current_week = week;
        }

        if title.is_empty() {
            parsed.skip(index, "attendance row without a lecture title");
            continue;
        }
        if is_attendance.is_empty() {
            parsed.skip(index, "attendance row without an attendance status");
            continue;
        }

        parsed.records.push(VodAttendanceRecord {
            title,
            is_attendance,
            weekly_attendance: weekly,
            week: current_week,
        });
    }

    Ok(parsed)
}

fn row_cells(row: &ElementRef<'_>) -> Vec<SpanCell> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "td")
        .map(|td| SpanCell::from_element(&td))
        .collect()
}
