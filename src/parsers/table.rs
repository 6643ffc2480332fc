//! Table helpers shared by the page parsers.

use crate::error::{Result, ScraperError};
use scraper::{ElementRef, Selector};

/// Largest `colspan` a browser honours; bigger values are clamped.
pub const MAX_COLSPAN: usize = 1000;
/// Largest `rowspan` a browser honours; bigger values are clamped.
pub const MAX_ROWSPAN: usize = 65534;

/// One `<td>` as the span-carry grid sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanCell {
    pub text: String,
    pub rowspan: usize,
    pub colspan: usize,
}

impl SpanCell {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rowspan: 1,
            colspan: 1,
        }
    }

    pub fn with_rowspan(mut self, rowspan: usize) -> Self {
        self.rowspan = rowspan.clamp(1, MAX_ROWSPAN);
        self
    }

    pub fn with_colspan(mut self, colspan: usize) -> Self {
        self.colspan = colspan.clamp(1, MAX_COLSPAN);
        self
    }

    /// Reads text and span attributes off a table cell. Missing or invalid
    /// spans count as 1, oversized ones are clamped.
    pub fn from_element(cell: &ElementRef<'_>) -> Self {
        let span = |name: &str| {
            cell.value()
                .attr(name)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(1)
        };
        Self::new(element_text(cell))
            .with_rowspan(span("rowspan"))
            .with_colspan(span("colspan"))
    }
}

/// Rebuilds the logical grid of a table whose markup merges cells with
/// `rowspan`/`colspan`.
///
/// For every column the grid remembers how many more rows a vertically merged
/// cell still covers and the value it carries. Rows are fed top to bottom;
/// columns under an active span are filled from the carry before the row's
/// own cells are consumed.
#[derive(Debug, Default)]
pub struct SpanGrid {
    remaining: Vec<usize>,
    carried: Vec<Option<String>>,
}

impl SpanGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the logical values of the next row. Columns no cell reached
    /// are `None`.
    pub fn push_row<I>(&mut self, cells: I) -> Vec<Option<String>>
    where
        I: IntoIterator<Item = SpanCell>,
    {
        let mut row = Vec::with_capacity(self.remaining.len());

        for cell in cells {
            self.fill_spanned(&mut row);

            for _ in 0..cell.colspan {
                let col = row.len();
                if col >= self.remaining.len() {
                    self.remaining.resize(col + 1, 0);
                    self.carried.resize(col + 1, None);
                }
                row.push(Some(cell.text.clone()));
                if cell.rowspan > 1 {
                    self.remaining[col] = cell.rowspan - 1;
                    self.carried[col] = Some(cell.text.clone());
                } else {
                    self.remaining[col] = 0;
                    self.carried[col] = None;
                }
            }
        }

        while row.len() < self.remaining.len() {
            let col = row.len();
            if self.remaining[col] > 0 {
                self.remaining[col] -= 1;
                row.push(self.carried[col].clone());
            } else {
                row.push(None);
            }
        }

        row
    }

    fn fill_spanned(&mut self, row: &mut Vec<Option<String>>) {
        while let Some(left) = self.remaining.get_mut(row.len()) {
            if *left == 0 {
                break;
            }
            *left -= 1;
            row.push(self.carried[row.len()].clone());
        }
    }
}

/// Trimmed text content of an element.
pub fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Builds a selector from a runtime string.
pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| ScraperError::ParsingError(format!("invalid selector `{}`: {}", css, e)))
}

/// The Moodle column class (`c0`, `c1`, ...) of a header or body cell.
pub fn column_class(element: &ElementRef<'_>) -> Option<String> {
    element
        .value()
        .classes()
        .find(|class| {
            class.len() > 1
                && class.starts_with('c')
                && class[1..].chars().all(|ch| ch.is_ascii_digit())
        })
        .map(str::to_string)
}

/// Leading decimal digits of `text`, like a lenient integer parse.
pub fn leading_number(text: &str) -> Option<u32> {
    let digits: String = text
        .trim()
        .chars()
        .take_while(|ch| ch.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
