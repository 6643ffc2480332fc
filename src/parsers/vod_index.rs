use crate::error::Result;
use crate::models::{Parsed, VodLectureItem};
use crate::parsers::table::element_text;
use crate::parsers::vocabulary::Vocabulary;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

/// Parses the course index page (`course/view.php`) into video lecture items.
///
/// Week numbers follow the order of the week blocks on the page. Activities
/// inside a `.dimmed` element are not released yet and are left out.
pub fn parse_vod_index_from_html(html: &str, page_url: &Url) -> Result<Parsed<VodLectureItem>> {
    parse_vod_index_with(html, page_url, &Vocabulary::default())
}

pub fn parse_vod_index_with(
    html: &str,
    page_url: &Url,
    vocabulary: &Vocabulary,
) -> Result<Parsed<VodLectureItem>> {
    let document = Html::parse_document(html);
    let week_selector =
        Selector::parse("#region-main > div > div > div.total_sections > div > ul > li").unwrap();
    let section_name_selector = Selector::parse(".content .sectionname").unwrap();
    let activity_selector = Selector::parse(".content .vod .activityinstance").unwrap();

    let weeks: Vec<ElementRef> = document.select(&week_selector).collect();
    let mut parsed = Parsed::empty();
    if weeks.is_empty() {
        warn!(page = %page_url, "weekly sections container not found, no lectures parsed");
        return Ok(parsed);
    }

    let mut entry_index = 0;
    for (index, week_element) in weeks.iter().enumerate() {
        let subject = week_element
            .select(&section_name_selector)
            .next()
            .map(|e| element_text(&e))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("{}{}", index, vocabulary.week_suffix));

        for activity in week_element.select(&activity_selector) {
            let position = entry_index;
            entry_index += 1;

            if is_dimmed(&activity) {
                continue;
            }

            let Some(title) = lecture_title(&activity) else {
                parsed.skip(position, "lecture entry without a title");
                continue;
            };
            let Some(url) = first_link(&activity, page_url) else {
                parsed.skip(position, "lecture entry without a link");
                continue;
            };

            let range = child_text(&activity, ".text-ubstrap").filter(|r| !r.is_empty());
            let length = child_text(&activity, ".text-info")
                .map(|l| l.replacen(',', "", 1).trim().to_string())
                .unwrap_or_default();

            parsed.records.push(VodLectureItem {
                week: index as u32 + 1,
                subject: subject.clone(),
                title,
                url,
                range,
                length,
            });
        }
    }

    Ok(parsed)
}

/// True when the activity or any of its ancestors carries the `dimmed` class.
fn is_dimmed(activity: &ElementRef<'_>) -> bool {
    std::iter::once(*activity)
        .chain(activity.ancestors().filter_map(ElementRef::wrap))
        .any(|e| e.value().classes().any(|class| class == "dimmed"))
}

/// The `.instancename` text without its screen-reader-only type label
/// (the trailing "video" suffix lives in a nested `.accesshide`).
fn lecture_title(activity: &ElementRef<'_>) -> Option<String> {
    let name_selector = Selector::parse(".instancename").unwrap();
    let hidden_selector = Selector::parse(".accesshide").unwrap();

    let name = activity.select(&name_selector).next()?;
    let mut title: String = name.text().collect();
    for hidden in name.select(&hidden_selector) {
        let label: String = hidden.text().collect();
        if let Some(at) = title.rfind(&label).filter(|_| !label.is_empty()) {
            title.replace_range(at..at + label.len(), "");
        }
    }

    let title = title.trim().to_string();
    (!title.is_empty()).then_some(title)
}

fn first_link(activity: &ElementRef<'_>, page_url: &Url) -> Option<String> {
    let link_selector = Selector::parse("a").unwrap();
    let href = activity
        .select(&link_selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|h| !h.is_empty())?;
    page_url.join(href).ok().map(String::from)
}

fn child_text(activity: &ElementRef<'_>, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    activity.select(&selector).next().map(|e| element_text(&e))
}
