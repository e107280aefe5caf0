use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

use super::items::ItemPatterns;
use super::text;

pub const HEADING_CLASSES: &[&str] = &[
    "sectionHeading",
    "itemHeading",
    "item-heading",
    "heading",
    "sHeading",
    "hd",
];

/// Longer text is body copy that happens to mention an item, not a heading.
pub const MAX_HEADING_CHARS: usize = 200;

const BOLD_RATIO: f64 = 0.7;

static BOLD_STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)font-weight\s*:\s*(bold|[6-9]\d{2})").unwrap());
static BOLD_TAGS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("b, strong").unwrap());

/// A styling signal that marks a paragraph-like element as a heading.
pub type HeadingSignal = fn(ElementRef<'_>, &str, &[String]) -> bool;

/// Checked in order; any one is enough.
pub const HEADING_SIGNALS: &[(&str, HeadingSignal)] = &[
    ("bold-tags", mostly_bold_tags as HeadingSignal),
    ("bold-style", has_bold_style as HeadingSignal),
    ("heading-class", has_heading_class as HeadingSignal),
];

/// A `<p>`, `<div>` or `<span>` that reads as a regulatory item heading.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemHeading {
    pub text: String,
    pub item: String,
}

pub fn detect_item_heading(
    element: ElementRef<'_>,
    items: &ItemPatterns,
    heading_classes: &[String],
) -> Option<ItemHeading> {
    let text = text::clean(&element.text().collect::<String>());
    if text.is_empty() || text::char_len(&text) > MAX_HEADING_CHARS {
        return None;
    }
    let item = items.detect(&text)?.to_string();

    let (signal, _) = HEADING_SIGNALS
        .iter()
        .find(|(_, check)| check(element, &text, heading_classes))?;
    tracing::trace!(heading = %text, signal = %signal, "item heading detected");
    Some(ItemHeading { text, item })
}

/// Traditional filings wrap headings in `<b>`/`<strong>`.
fn mostly_bold_tags(element: ElementRef<'_>, text: &str, _: &[String]) -> bool {
    let bold_chars: usize = element
        .select(&BOLD_TAGS)
        .map(|b| b.text().map(|t| t.chars().count()).sum::<usize>())
        .sum();
    bold_chars as f64 > text::char_len(text) as f64 * BOLD_RATIO
}

/// Inline XBRL filings use `font-weight` on the element or a nested span.
fn has_bold_style(element: ElementRef<'_>, _: &str, _: &[String]) -> bool {
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter_map(|el| el.value().attr("style"))
        .any(|style| BOLD_STYLE_RE.is_match(style))
}

fn has_heading_class(element: ElementRef<'_>, _: &str, heading_classes: &[String]) -> bool {
    element
        .value()
        .classes()
        .any(|c| heading_classes.iter().any(|h| h == c))
}
