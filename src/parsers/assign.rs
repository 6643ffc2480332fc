use crate::error::Result;
use crate::models::{AssignItem, Parsed};
use crate::parsers::index_table::{ColumnSelectors, Field, StickySubject, body_rows, resolve_link};
use crate::parsers::vocabulary::Vocabulary;
use reqwest::Url;
use scraper::Html;
use tracing::warn;

/// Parses the assignment index page (`mod/assign/index.php`).
///
/// `is_submit` is false only when the status cell reads exactly the
/// localized "not submitted" text; every other status counts as submitted.
pub fn parse_assigns_from_html(html: &str, page_url: &Url) -> Result<Parsed<AssignItem>> {
    parse_assigns_with(html, page_url, &Vocabulary::default())
}

pub fn parse_assigns_with(
    html: &str,
    page_url: &Url,
    vocabulary: &Vocabulary,
) -> Result<Parsed<AssignItem>> {
    let document = Html::parse_document(html);
    let columns = ColumnSelectors::from_document(
        &document,
        &[
            (Field::Subject, vocabulary.subject_column),
            (Field::Title, vocabulary.assign_title_column),
            (Field::DueDate, vocabulary.due_date_column),
            (Field::SubmitStatus, vocabulary.submit_column),
        ],
    )?;

    let mut parsed = Parsed::empty();
    if !columns.has(Field::Title) {
        warn!(page = %page_url, "assignment table or its title header not found");
        return Ok(parsed);
    }

    let mut sticky = StickySubject::default();
    for (index, row) in body_rows(&document).iter().enumerate() {
        let subject = sticky.update(columns.text(row, Field::Subject));

        let Some(title) = columns.text(row, Field::Title) else {
            parsed.skip(index, "assignment row without a title");
            continue;
        };
        let Some(url) = columns
            .title_href(row)
            .and_then(|href| resolve_link(page_url, href))
        else {
            parsed.skip(index, "assignment row without a link");
            continue;
        };
        let Some(due_date) = columns.text(row, Field::DueDate) else {
            parsed.skip(index, "assignment row without a due date");
            continue;
        };
        let status = columns.text(row, Field::SubmitStatus).unwrap_or_default();

        parsed.records.push(AssignItem {
            subject,
            title,
            url,
            is_submit: is_submitted(&status, vocabulary),
            due_date: Some(due_date),
        });
    }

    Ok(parsed)
}

/// The binary submission heuristic: anything but the exact "not submitted"
/// text, including an empty cell, is treated as submitted.
pub fn is_submitted(status: &str, vocabulary: &Vocabulary) -> bool {
    status.trim() != vocabulary.not_submitted
}
