use crate::error::Result;
use crate::models::{Parsed, QuizItem};
use crate::parsers::index_table::{ColumnSelectors, Field, StickySubject, body_rows, resolve_link};
use crate::parsers::vocabulary::Vocabulary;
use reqwest::Url;
use scraper::Html;
use tracing::warn;

const QUIZ_SEGMENT: &str = "mod/quiz/";

/// Parses the quiz index page (`mod/quiz/index.php`).
pub fn parse_quizzes_from_html(html: &str, page_url: &Url) -> Result<Parsed<QuizItem>> {
    parse_quizzes_with(html, page_url, &Vocabulary::default())
}

pub fn parse_quizzes_with(
    html: &str,
    page_url: &Url,
    vocabulary: &Vocabulary,
) -> Result<Parsed<QuizItem>> {
    let document = Html::parse_document(html);
    let columns = ColumnSelectors::from_document(
        &document,
        &[
            (Field::Subject, vocabulary.subject_column),
            (Field::Title, vocabulary.quiz_title_column),
            (Field::DueDate, vocabulary.due_date_column),
        ],
    )?;

    let mut parsed = Parsed::empty();
    if !columns.has(Field::Title) {
        warn!(page = %page_url, "quiz table or its title header not found");
        return Ok(parsed);
    }

    let mut sticky = StickySubject::default();
    for (index, row) in body_rows(&document).iter().enumerate() {
        let subject = sticky.update(columns.text(row, Field::Subject));

        let Some(title) = columns.text(row, Field::Title) else {
            parsed.skip(index, "quiz row without a title");
            continue;
        };
        let Some(url) = columns
            .title_href(row)
            .and_then(|href| resolve_link(page_url, href))
            .map(|url| quiz_link(&url))
        else {
            parsed.skip(index, "quiz row without a link");
            continue;
        };
        let Some(due_date) = columns.text(row, Field::DueDate) else {
            parsed.skip(index, "quiz row without a due date");
            continue;
        };

        parsed.records.push(QuizItem {
            subject,
            title,
            url,
            due_date: Some(due_date),
        });
    }

    Ok(parsed)
}

/// Quiz index rows link to `view.php` relative to the quiz module. When that
/// link was resolved against anything but the module path, the `mod/quiz/`
/// segment is put back in front of `view` so the link opens the quiz.
pub fn quiz_link(url: &str) -> String {
    if url.contains(QUIZ_SEGMENT) {
        return url.to_string();
    }
    match url.find("view.php") {
        Some(at) => format!("{}{}{}", &url[..at], QUIZ_SEGMENT, &url[at..]),
        None => url.to_string(),
    }
}
