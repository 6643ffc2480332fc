//! Page parsers. Each one turns a single LMS page into typed records and
//! returns an empty result, not an error, when the expected structure is
//! missing from the page.

pub mod assign;
pub mod courses;
pub mod index_table;
pub mod quiz;
pub mod table;
pub mod vocabulary;
pub mod vod_attendance;
pub mod vod_index;

pub use assign::parse_assigns_from_html;
pub use courses::parse_courses_from_html;
pub use quiz::parse_quizzes_from_html;
pub use vocabulary::{TextMatch, Vocabulary};
pub use vod_attendance::parse_vod_attendance_from_html;
pub use vod_index::parse_vod_index_from_html;
