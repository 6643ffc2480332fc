//! Every literal the parsers compare page text against.
//!
//! The LMS exposes no machine-readable schema, so columns and statuses are
//! recognised by their localized labels. Keeping them in one table means a UI
//! language change on the LMS side touches this file only.

/// How a header cell's text is compared with a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatch {
    /// Trimmed text must equal the label.
    Exact(&'static str),
    /// Trimmed text must contain the label.
    Contains(&'static str),
}

impl TextMatch {
    pub fn matches(&self, text: &str) -> bool {
        let text = text.trim();
        match self {
            TextMatch::Exact(label) => text == *label,
            TextMatch::Contains(label) => text.contains(label),
        }
    }
}

/// Localized labels and tokens for one LMS UI language.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    /// Attendance table: lecture title column.
    pub attendance_title: TextMatch,
    /// Attendance table: per-lecture attendance column.
    pub attendance_status: TextMatch,
    /// Attendance table: per-week attendance column.
    pub attendance_weekly: TextMatch,

    /// Index tables: section/topic column.
    pub subject_column: TextMatch,
    /// Assignment index: title column.
    pub assign_title_column: TextMatch,
    /// Quiz index: title column.
    pub quiz_title_column: TextMatch,
    /// Index tables: deadline column.
    pub due_date_column: TextMatch,
    /// Assignment index: submission status column.
    pub submit_column: TextMatch,

    /// Exact submission-status text meaning "not submitted".
    pub not_submitted: &'static str,
    /// Weekly attendance text for attendance granted in bulk.
    pub batch_attendance: &'static str,
    /// Course-card label of non-credit community sections.
    pub community_label: &'static str,
    /// Suffix of the generated label for week blocks without a section name.
    pub week_suffix: &'static str,
}

impl Vocabulary {
    /// Labels of the Korean LMS UI.
    pub fn korean() -> Self {
        Self {
            attendance_title: TextMatch::Exact("강의 자료"),
            attendance_status: TextMatch::Exact("출석"),
            attendance_weekly: TextMatch::Exact("주차 출석"),
            subject_column: TextMatch::Contains("주제"),
            assign_title_column: TextMatch::Contains("과제"),
            quiz_title_column: TextMatch::Contains("제목"),
            due_date_column: TextMatch::Contains("종료 일시"),
            submit_column: TextMatch::Contains("제출"),
            not_submitted: "미제출",
            batch_attendance: "일괄출석인정",
            community_label: "커뮤니티",
            week_suffix: "주차",
        }
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::korean()
    }
}
