use serde::{Deserialize, Serialize};

/// A course the student is enrolled in, as listed on the LMS dashboard.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CourseRef {
    /// The LMS course id (the `id` query parameter of the course link).
    pub course_id: String,
    /// Course title with the "new" badge and bracketed prefixes removed.
    pub course_title: String,
    /// The professor's display name.
    pub professor: String,
}

/// A video lecture entry from the course index page.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VodLectureItem {
    /// 1-based position of the week block on the index page.
    pub week: u32,
    /// The section name of the week block.
    pub subject: String,
    pub title: String,
    pub url: String,
    /// Raw `"START ~ END"` attendance-eligibility window.
    pub range: Option<String>,
    pub length: String,
}

/// A row of the online attendance table.
///
/// Status fields hold the LMS tokens verbatim (`"o"`, `"x"`, free text), see
/// [`crate::relevance::AttendanceStatus`] for their interpretation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VodAttendanceRecord {
    pub title: String,
    pub is_attendance: String,
    pub weekly_attendance: String,
    pub week: u32,
}

/// A lecture joined with its attendance record.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Vod {
    #[serde(flatten)]
    pub course: CourseRef,
    pub week: u32,
    pub title: String,
    pub subject: String,
    pub url: String,
    pub range: Option<String>,
    pub length: String,
    pub is_attendance: String,
    pub weekly_attendance: String,
}

impl Vod {
    /// Builds the joined record. Callers are responsible for only pairing a
    /// lecture with an attendance row of the same title and week.
    pub fn join(
        course: &CourseRef,
        lecture: &VodLectureItem,
        attendance: &VodAttendanceRecord,
    ) -> Self {
        Self {
            course: course.clone(),
            week: lecture.week,
            title: lecture.title.clone(),
            subject: lecture.subject.clone(),
            url: lecture.url.clone(),
            range: lecture.range.clone(),
            length: lecture.length.clone(),
            is_attendance: attendance.is_attendance.clone(),
            weekly_attendance: attendance.weekly_attendance.clone(),
        }
    }

    /// Composite identity: `courseId|title|week`.
    pub fn key(&self) -> String {
        format!("{}|{}|{}", self.course.course_id, self.title, self.week)
    }
}

/// A row of the assignment index page.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AssignItem {
    pub subject: String,
    pub title: String,
    pub url: String,
    pub is_submit: bool,
    pub due_date: Option<String>,
}

/// An assignment tagged with its course.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Assign {
    #[serde(flatten)]
    pub course: CourseRef,
    pub subject: String,
    pub title: String,
    pub url: String,
    pub is_submit: bool,
    pub due_date: Option<String>,
}

impl Assign {
    pub fn new(course: &CourseRef, item: AssignItem) -> Self {
        Self {
            course: course.clone(),
            subject: item.subject,
            title: item.title,
            url: item.url,
            is_submit: item.is_submit,
            due_date: item.due_date,
        }
    }

    /// Composite identity: `courseId|title|dueDate`.
    pub fn key(&self) -> String {
        dated_key(&self.course, &self.title, self.due_date.as_deref())
    }
}

/// A row of the quiz index page.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizItem {
    pub subject: String,
    pub title: String,
    pub url: String,
    pub due_date: Option<String>,
}

/// A quiz tagged with its course. The index page exposes no attempt state.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    #[serde(flatten)]
    pub course: CourseRef,
    pub subject: String,
    pub title: String,
    pub url: String,
    pub due_date: Option<String>,
}

impl Quiz {
    pub fn new(course: &CourseRef, item: QuizItem) -> Self {
        Self {
            course: course.clone(),
            subject: item.subject,
            title: item.title,
            url: item.url,
            due_date: item.due_date,
        }
    }

    /// Composite identity: `courseId|title|dueDate`.
    pub fn key(&self) -> String {
        dated_key(&self.course, &self.title, self.due_date.as_deref())
    }
}

fn dated_key(course: &CourseRef, title: &str, due_date: Option<&str>) -> String {
    format!("{}|{}|{}", course.course_id, title, due_date.unwrap_or(""))
}

/// Everything scraped for one course in one aggregation.
#[derive(Debug, Clone, Default)]
pub struct CourseData {
    pub vod_attendance: Vec<VodAttendanceRecord>,
    pub vod_lectures: Vec<VodLectureItem>,
    pub assigns: Vec<AssignItem>,
    pub quizzes: Vec<QuizItem>,
    /// Number of entries the parsers dropped as malformed, across all four pages.
    pub skipped: usize,
}

/// An entry a parser dropped instead of turning into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Position of the row/entry in document order.
    pub index: usize,
    pub reason: &'static str,
}

/// Parser output: the records that could be extracted plus what was dropped.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub skipped: Vec<SkippedEntry>,
}

impl<T> Parsed<T> {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub(crate) fn skip(&mut self, index: usize, reason: &'static str) {
        self.skipped.push(SkippedEntry { index, reason });
    }
}

impl<T> Default for Parsed<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// How a course color is painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorType {
    #[default]
    Solid,
    Gradient,
}

/// Per-course color preference, persisted under its own storage key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseColorSetting {
    pub course_id: String,
    pub color: String,
    #[serde(default)]
    pub color_type: ColorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f32>,
}

impl CourseColorSetting {
    pub const DEFAULT_COLOR: &'static str = "#6366f1";

    /// The setting a course gets before the user picks anything.
    pub fn default_for(course_id: &str) -> Self {
        Self {
            course_id: course_id.to_string(),
            color: Self::DEFAULT_COLOR.to_string(),
            color_type: ColorType::Solid,
            gradient: None,
            opacity: Some(1.0),
        }
    }
}

/// Configuration for spacing out requests to the LMS with randomized delays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayConfig {
    /// Minimum sleep duration in milliseconds before a request.
    pub min_delay_ms: u64,
    /// Maximum sleep duration in milliseconds before a request.
    pub max_delay_ms: u64,
    /// Whether the randomized delay logic is active.
    pub enabled: bool,
}

impl Default for DelayConfig {
    /// Default configuration: 200ms - 800ms, disabled.
    fn default() -> Self {
        Self {
            min_delay_ms: 200,
            max_delay_ms: 800,
            enabled: false,
        }
    }
}
