use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::text;
use crate::error::ExtractError;

/// Where the filing body usually lives, most specific first.
pub const CONTENT_ROOT_SELECTORS: &[&str] = &[
    "div#document",
    "div.formContent",
    "div#main-content",
    "main",
    "article",
    "div#content",
    "body",
];

/// A candidate root needs at least this much visible text to count.
pub const MIN_ROOT_CHARS: usize = 200;

pub const BOILERPLATE_SELECTORS: &[&str] = &[
    "header",
    "footer",
    "nav",
    "aside",
    "#header",
    "#footer",
    ".banner",
    ".nav-bar",
    ".formGrouping",
    "[class*='header']",
    "[class*='footer']",
    "[class*='navbar']",
    ".toc",
    "#toc",
    "[class*='table-of-contents']",
    ".page-number",
    "[class*='pagenum']",
];

/// Matched by element name; inline XBRL metadata never renders.
pub const BOILERPLATE_TAGS: &[&str] = &["script", "style", "noscript", "ix:header", "ix:hidden"];

pub const BREADCRUMB_SELECTORS: &[&str] = &[
    ".breadcrumb",
    ".breadcrumbs",
    "#breadcrumb",
    "[aria-label='breadcrumb']",
    ".crumbs",
];

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());
static LINKS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static HREF_LINKS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static TABLES: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static CODE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("pre, code").unwrap());

pub fn compile(selectors: &[&str]) -> Result<Vec<Selector>, ExtractError> {
    selectors
        .iter()
        .map(|s| {
            Selector::parse(s).map_err(|e| ExtractError::Selector {
                selector: s.to_string(),
                message: e.to_string(),
            })
        })
        .collect()
}

pub fn decode_body(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Characters of visible text, ignoring whitespace around each text node.
pub fn visible_chars(element: ElementRef<'_>) -> usize {
    element.text().map(|t| t.trim().chars().count()).sum()
}

/// First candidate (by selector order) with enough visible text.
pub fn find_content_root<'a>(
    document: &'a Html,
    candidates: &[Selector],
    min_chars: usize,
) -> Option<ElementRef<'a>> {
    candidates
        .iter()
        .filter_map(|sel| document.select(sel).next())
        .find(|el| visible_chars(*el) >= min_chars)
}

/// Descendants of `root` that are page chrome rather than filing content.
/// The root itself is never included.
pub fn boilerplate_elements<'a>(
    root: ElementRef<'a>,
    selectors: &[Selector],
    tags: &[String],
) -> Vec<ElementRef<'a>> {
    let mut found: Vec<ElementRef<'a>> = Vec::new();
    for sel in selectors {
        found.extend(root.select(sel).filter(|el| *el != root));
    }
    found.extend(
        root.descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|el| tags.iter().any(|t| t == el.value().name())),
    );
    found
}

pub fn breadcrumbs(document: &Html, selectors: &[Selector]) -> Vec<String> {
    for sel in selectors {
        let Some(container) = document.select(sel).next() else {
            continue;
        };
        let crumbs: Vec<String> = container
            .select(&LINKS)
            .map(|a| text::clean(&a.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .collect();
        if !crumbs.is_empty() {
            return crumbs;
        }
    }
    Vec::new()
}

/// `<title>` unless it is a generic EDGAR page title, then the first `<h1>`,
/// then "{company} — Form {type}".
pub fn title(document: &Html, company_name: &str, filing_type: &str) -> String {
    if let Some(t) = document.select(&TITLE).next() {
        let title = text::clean(&t.text().collect::<String>());
        if !title.to_uppercase().contains("EDGAR") && text::char_len(&title) > 5 {
            return title;
        }
    }
    if let Some(h) = document.select(&H1).next() {
        let title = text::clean(&h.text().collect::<String>());
        if text::char_len(&title) > 3 {
            return title;
        }
    }
    format!("{company_name} — Form {filing_type}")
}

pub struct ContentCounts {
    pub tables: usize,
    pub code_chars: usize,
    pub links: usize,
}

pub fn counts(root: ElementRef<'_>) -> ContentCounts {
    ContentCounts {
        tables: root.select(&TABLES).count(),
        code_chars: root
            .select(&CODE)
            .map(|el| el.text().map(|t| t.chars().count()).sum::<usize>())
            .sum(),
        links: root.select(&HREF_LINKS).count(),
    }
}
