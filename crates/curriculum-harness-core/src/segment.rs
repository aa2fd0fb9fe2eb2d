//! Layout-aware segmentation of positioned page text into two columns.
//!
//! Course documents print capability statements in a left column and
//! knowledge topics in a right column of the same page. A PDF text layer
//! gives us loose fragments with coordinates, so the page is rebuilt here:
//!
//! 1. Split fragments at a fixed horizontal threshold (left: `x < threshold`).
//! 2. Bucket fragments into visual lines by rounding `y / line_tolerance`,
//!    which absorbs sub-pixel jitter inside one printed line.
//! 3. Order each bucket left-to-right, and buckets top-to-bottom.
//!
//! Rows keep the left and right halves of a visual line side by side so a
//! full-width heading split across the threshold can still be read whole.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A literal piece of text at a position on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub x: f64,
    pub y: f64,
    pub text: String,
}

/// One page of fragments, in extraction order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    #[serde(default)]
    pub fragments: Vec<TextFragment>,
}

/// Where `y = 0` sits on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalOrigin {
    /// PDF user space: larger `y` is higher on the page.
    #[default]
    Bottom,
    /// Screen space: larger `y` is lower on the page.
    Top,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentParams {
    /// Fragments with `x` below this value belong to the left column.
    #[serde(default = "default_column_threshold")]
    pub column_threshold: f64,
    /// Vertical rounding increment used to group fragments into lines.
    #[serde(default = "default_line_tolerance")]
    pub line_tolerance: f64,
    #[serde(default)]
    pub vertical_origin: VerticalOrigin,
}

fn default_column_threshold() -> f64 {
    300.0
}
fn default_line_tolerance() -> f64 {
    4.0
}

impl Default for SegmentParams {
    fn default() -> Self {
        Self {
            column_threshold: default_column_threshold(),
            line_tolerance: default_line_tolerance(),
            vertical_origin: VerticalOrigin::default(),
        }
    }
}

/// One visual line, split at the column threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Line bucket key (rounded vertical position).
    pub line: i64,
    pub left: String,
    pub right: String,
}

impl Row {
    /// Both halves of the line joined with a space.
    pub fn joined(&self) -> String {
        match (self.left.is_empty(), self.right.is_empty()) {
            (false, false) => format!("{} {}", self.left, self.right),
            (false, true) => self.left.clone(),
            _ => self.right.clone(),
        }
    }
}

/// A page rebuilt into reading-order rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentedPage {
    pub page: u32,
    pub rows: Vec<Row>,
}

impl SegmentedPage {
    /// Left column text, one line per row. Empty when the side has no text.
    pub fn left_text(&self) -> String {
        column_text(self.rows.iter().map(|r| r.left.as_str()))
    }

    /// Right column text, one line per row. Empty when the side has no text.
    pub fn right_text(&self) -> String {
        column_text(self.rows.iter().map(|r| r.right.as_str()))
    }
}

fn column_text<'a>(lines: impl Iterator<Item = &'a str>) -> String {
    lines.filter(|l| !l.is_empty()).collect::<Vec<_>>().join("\n")
}

/// Segment one page into rows.
///
/// Pure and idempotent: the same fragment list always yields the same rows.
/// Whitespace-only fragments carry no text and are skipped.
pub fn segment_page(page: &Page, params: &SegmentParams) -> SegmentedPage {
    let tolerance = if params.line_tolerance > 0.0 {
        params.line_tolerance
    } else {
        default_line_tolerance()
    };

    let mut buckets: BTreeMap<i64, (Vec<&TextFragment>, Vec<&TextFragment>)> = BTreeMap::new();
    for frag in &page.fragments {
        if frag.text.trim().is_empty() {
            continue;
        }
        let key = (frag.y / tolerance).round() as i64;
        let entry = buckets.entry(key).or_default();
        if frag.x < params.column_threshold {
            entry.0.push(frag);
        } else {
            entry.1.push(frag);
        }
    }

    let mut rows: Vec<Row> = buckets
        .into_iter()
        .map(|(line, (mut left, mut right))| Row {
            line,
            left: join_line(&mut left),
            right: join_line(&mut right),
        })
        .collect();

    if params.vertical_origin == VerticalOrigin::Bottom {
        rows.reverse();
    }

    SegmentedPage {
        page: page.page,
        rows,
    }
}

fn join_line(frags: &mut [&TextFragment]) -> String {
    frags.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
    frags
        .iter()
        .map(|f| f.text.trim())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(x: f64, y: f64, text: &str) -> TextFragment {
        TextFragment {
            x,
            y,
            text: text.to_string(),
        }
    }

    fn two_column_page() -> Page {
        Page {
            page: 3,
            fragments: vec![
                frag(340.0, 700.2, "ALGORITMOS"),
                frag(50.0, 700.0, "Aplicar"),
                frag(320.0, 699.6, "1"),
                frag(95.0, 700.9, "estruturas"),
                frag(320.0, 680.0, "1.1"),
                frag(345.0, 680.3, "Variáveis"),
                frag(50.0, 680.0, "de repetição."),
            ],
        }
    }

    #[test]
    fn test_split_and_order() {
        let seg = segment_page(&two_column_page(), &SegmentParams::default());
        assert_eq!(seg.page, 3);
        assert_eq!(seg.left_text(), "Aplicar estruturas\nde repetição.");
        assert_eq!(seg.right_text(), "1 ALGORITMOS\n1.1 Variáveis");
        assert_eq!(seg.rows[0].joined(), "Aplicar estruturas 1 ALGORITMOS");
    }

    #[test]
    fn test_top_origin_reverses_lines() {
        let params = SegmentParams {
            vertical_origin: VerticalOrigin::Top,
            ..SegmentParams::default()
        };
        let seg = segment_page(&two_column_page(), &params);
        assert_eq!(seg.left_text(), "de repetição.\nAplicar estruturas");
    }

    #[test]
    fn test_empty_side_is_empty_string() {
        let page = Page {
            page: 1,
            fragments: vec![frag(10.0, 100.0, "Somente"), frag(60.0, 100.0, "esquerda")],
        };
        let seg = segment_page(&page, &SegmentParams::default());
        assert_eq!(seg.left_text(), "Somente esquerda");
        assert_eq!(seg.right_text(), "");
    }

    #[test]
    fn test_empty_page() {
        let page = Page {
            page: 9,
            fragments: Vec::new(),
        };
        let seg = segment_page(&page, &SegmentParams::default());
        assert!(seg.rows.is_empty());
        assert_eq!(seg.left_text(), "");
        assert_eq!(seg.right_text(), "");
    }

    #[test]
    fn test_idempotent() {
        let page = two_column_page();
        let params = SegmentParams::default();
        let a = segment_page(&page, &params);
        let b = segment_page(&page, &params);
        assert_eq!(a.left_text(), b.left_text());
        assert_eq!(a.right_text(), b.right_text());
        assert_eq!(a, b);
    }

    #[test]
    fn test_every_fragment_lands_in_exactly_one_column() {
        let fragments: Vec<TextFragment> = (0..60)
            .map(|i| {
                let x = (i * 37 % 600) as f64;
                let y = 800.0 - (i / 4) as f64 * 13.7;
                frag(x, y, &format!("w{}", i))
            })
            .collect();
        let page = Page { page: 1, fragments };
        let seg = segment_page(&page, &SegmentParams::default());
        let left = seg.left_text();
        let right = seg.right_text();
        let left_words: Vec<&str> = left.split_whitespace().collect();
        let right_words: Vec<&str> = right.split_whitespace().collect();
        assert_eq!(left_words.len() + right_words.len(), 60);
        for i in 0..60 {
            let w = format!("w{}", i);
            let in_left = left_words.contains(&w.as_str());
            let in_right = right_words.contains(&w.as_str());
            assert!(in_left ^ in_right, "fragment {} misplaced", w);
            assert_eq!(in_left, (i * 37 % 600) < 300);
        }
    }
}
