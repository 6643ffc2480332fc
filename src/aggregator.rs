use crate::client::{Page, PageSource};
use crate::error::Result;
use crate::models::{CourseData, Parsed, SkippedEntry};
use crate::parsers;
use tracing::{debug, info};

/// Fetches and parses the four pages of one course concurrently.
///
/// Fails as soon as any page fails; there is no partial result and no
/// caching at this level.
pub async fn request_data(source: &dyn PageSource, course_id: &str) -> Result<CourseData> {
    let (vod_attendance, vod_lectures, assigns, quizzes) = tokio::try_join!(
        async {
            let html = source.fetch_page(Page::VodAttendance, course_id).await?;
            parsers::parse_vod_attendance_from_html(&html)
        },
        async {
            let url = source.page_url(Page::VodIndex, course_id)?;
            let html = source.fetch_page(Page::VodIndex, course_id).await?;
            parsers::parse_vod_index_from_html(&html, &url)
        },
        async {
            let url = source.page_url(Page::Assignments, course_id)?;
            let html = source.fetch_page(Page::Assignments, course_id).await?;
            parsers::parse_assigns_from_html(&html, &url)
        },
        async {
            let url = source.page_url(Page::Quizzes, course_id)?;
            let html = source.fetch_page(Page::Quizzes, course_id).await?;
            parsers::parse_quizzes_from_html(&html, &url)
        },
    )?;

    let skipped = log_skipped(course_id, Page::VodAttendance, &vod_attendance)
        + log_skipped(course_id, Page::VodIndex, &vod_lectures)
        + log_skipped(course_id, Page::Assignments, &assigns)
        + log_skipped(course_id, Page::Quizzes, &quizzes);

    debug!(
        course_id,
        attendance = vod_attendance.records.len(),
        lectures = vod_lectures.records.len(),
        assigns = assigns.records.len(),
        quizzes = quizzes.records.len(),
        "course pages parsed"
    );

    Ok(CourseData {
        vod_attendance: vod_attendance.records,
        vod_lectures: vod_lectures.records,
        assigns: assigns.records,
        quizzes: quizzes.records,
        skipped,
    })
}

fn log_skipped<T>(course_id: &str, page: Page, parsed: &Parsed<T>) -> usize {
    for SkippedEntry { index, reason } in &parsed.skipped {
        debug!(course_id, page = page.name(), index, reason, "entry skipped");
    }
    if !parsed.skipped.is_empty() {
        info!(
            course_id,
            page = page.name(),
            skipped = parsed.skipped.len(),
            "malformed entries dropped"
        );
    }
    parsed.skipped.len()
}
