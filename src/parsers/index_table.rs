//! The generic `table.generaltable` layout of Moodle activity index pages.
//!
//! Header cells and body cells share a column class (`c0`, `c1`, ...), so a
//! logical field is located by matching header text and then selecting the
//! body cell with the same class.

use crate::error::Result;
use crate::parsers::table::{column_class, element_text, selector};
use crate::parsers::vocabulary::TextMatch;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;

/// Logical columns of an activity index table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Subject,
    Title,
    DueDate,
    SubmitStatus,
}

/// Field selectors resolved from one document's header row.
#[derive(Debug)]
pub struct ColumnSelectors {
    cells: HashMap<Field, Selector>,
    title_link: Option<Selector>,
}

impl ColumnSelectors {
    /// Matches every header against `rules` in order; the first rule that
    /// matches a header claims it.
    pub fn from_document(document: &Html, rules: &[(Field, TextMatch)]) -> Result<Self> {
        let header_selector = Selector::parse("table.generaltable thead tr th").unwrap();
        let mut cells = HashMap::new();
        let mut title_link = None;

        for header in document.select(&header_selector) {
            let text = element_text(&header);
            let Some(class) = column_class(&header) else {
                continue;
            };
            if text.is_empty() {
                continue;
            }
            let Some((field, _)) = rules.iter().find(|(_, rule)| rule.matches(&text)) else {
                continue;
            };
            let cell_css = format!(".cell.{}", class);
            if *field == Field::Title {
                title_link = Some(selector(&format!("{} a", cell_css))?);
            }
            cells.insert(*field, selector(&cell_css)?);
        }

        Ok(Self { cells, title_link })
    }

    pub fn has(&self, field: Field) -> bool {
        self.cells.contains_key(&field)
    }

    /// Trimmed text of a field's cell in `row`, `None` when absent or empty.
    pub fn text(&self, row: &ElementRef<'_>, field: Field) -> Option<String> {
        let selector = self.cells.get(&field)?;
        row.select(selector)
            .next()
            .map(|cell| element_text(&cell))
            .filter(|text| !text.is_empty())
    }

    /// Raw `href` of the link inside the title cell.
    pub fn title_href<'a>(&self, row: &ElementRef<'a>) -> Option<&'a str> {
        let selector = self.title_link.as_ref()?;
        row.select(selector)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
    }
}

/// Body rows of the index table.
pub fn body_rows(document: &Html) -> Vec<ElementRef<'_>> {
    let row_selector = Selector::parse("table.generaltable tbody tr").unwrap();
    document.select(&row_selector).collect()
}

/// Remembers the last non-empty subject so grouped rows inherit it.
#[derive(Debug, Default)]
pub struct StickySubject(String);

impl StickySubject {
    pub fn update(&mut self, cell: Option<String>) -> String {
        if let Some(subject) = cell {
            self.0 = subject;
        }
        self.0.clone()
    }
}

/// Resolves an `href` against the page it was found on.
pub fn resolve_link(page_url: &Url, href: &str) -> Option<String> {
    page_url.join(href).ok().map(String::from)
}
