use crate::error::Result;
use crate::models::{CourseRef, Parsed};
use crate::parsers::table::element_text;
use crate::parsers::vocabulary::Vocabulary;
use regex::Regex;
use reqwest::Url;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::warn;

static BRACKETED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[^\]]*\]").unwrap());
// ASCII boundaries: Hangul next to the badge still counts as a boundary,
// English words containing "new" do not.
static NEW_BADGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?-u:\b)new(?-u:\b)").unwrap());

/// Parses the enrolled courses from the LMS dashboard course cards.
///
/// Community sections and cards without a label are left out, as are cards
/// missing an id, a title or a professor.
pub fn parse_courses_from_html(html: &str, page_url: &Url) -> Result<Parsed<CourseRef>> {
    parse_courses_with(html, page_url, &Vocabulary::default())
}

pub fn parse_courses_with(
    html: &str,
    page_url: &Url,
    vocabulary: &Vocabulary,
) -> Result<Parsed<CourseRef>> {
    let document = Html::parse_document(html);
    let card_selector = Selector::parse(".course_box").unwrap();
    let label_selector = Selector::parse(".label .label-course").unwrap();
    let link_selector = Selector::parse("a").unwrap();
    let title_section_selector =
        Selector::parse(".course_link .course-name .course-title").unwrap();
    let professor_selector = Selector::parse("p").unwrap();
    let heading_selector = Selector::parse("h1, h2, h3").unwrap();

    let mut parsed = Parsed::empty();
    let cards: Vec<_> = document.select(&card_selector).collect();
    if cards.is_empty() {
        warn!(page = %page_url, "no course cards found on the dashboard");
        return Ok(parsed);
    }

    for (index, card) in cards.iter().enumerate() {
        let label = card
            .select(&label_selector)
            .next()
            .map(|l| element_text(&l))
            .filter(|l| !l.is_empty());
        match label {
            Some(label) if label != vocabulary.community_label => {}
            _ => continue,
        }

        let course_id = card
            .select(&link_selector)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| page_url.join(href).ok())
            .and_then(|url| {
                url.query_pairs()
                    .find(|(key, _)| key == "id")
                    .map(|(_, value)| value.into_owned())
            })
            .unwrap_or_default();

        let title_section = card.select(&title_section_selector).next();
        let professor = title_section
            .and_then(|s| s.select(&professor_selector).next())
            .map(|p| element_text(&p))
            .unwrap_or_default();
        let course_title = title_section
            .and_then(|s| s.select(&heading_selector).next())
            .map(|h| clean_course_title(&h.text().collect::<String>()))
            .unwrap_or_default();

        if course_id.is_empty() {
            parsed.skip(index, "course card without an id");
        } else if course_title.is_empty() {
            parsed.skip(index, "course card without a title");
        } else if professor.is_empty() {
            parsed.skip(index, "course card without a professor");
        } else {
            parsed.records.push(CourseRef {
                course_id,
                course_title,
                professor,
            });
        }
    }

    Ok(parsed)
}

/// Drops the "new" badge and bracketed prefixes such as `[1분반]`.
pub fn clean_course_title(raw: &str) -> String {
    let without_badge = NEW_BADGE.replace(raw, "");
    BRACKETED
        .replace_all(without_badge.trim(), "")
        .trim()
        .to_string()
}
