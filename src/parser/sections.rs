use scraper::ElementRef;

use super::headings::detect_item_heading;
use super::items::ItemPatterns;
use super::text;
use crate::model::ExtractedSection;

/// Sections whose body is shorter than this are folded into the previous one.
pub const MERGE_BELOW_CHARS: usize = 50;

/// Fragments shorter than this are layout noise (bullets, stray punctuation).
const MIN_FRAGMENT_CHARS: usize = 3;

const BLOCK_CHILDREN: &[&str] = &[
    "p", "div", "table", "ul", "ol", "section", "article", "blockquote", "h1", "h2", "h3", "h4",
];
const SKIPPED: &[&str] = &["head", "title", "script", "style", "noscript", "template"];

/// A section under construction: heading seen, body fragments accumulating.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingSection {
    pub heading: String,
    pub level: u8,
    pub fragments: Vec<String>,
}

impl PendingSection {
    pub fn new(heading: String, level: u8) -> Self {
        Self {
            heading,
            level,
            fragments: Vec::new(),
        }
    }
}

/// What flushing a pending section produces.
#[derive(Debug, Clone, PartialEq)]
pub enum Flushed {
    Section(ExtractedSection),
    /// Body text to append to the previous section.
    Merge(String),
    Discard,
}

/// Turn a pending section into its output. `position` is the index the new
/// section would take; merged and discarded sections do not consume one.
pub fn flush(
    pending: PendingSection,
    has_previous: bool,
    position: usize,
    items: &ItemPatterns,
) -> Flushed {
    let body = text::clean(&pending.fragments.join(" "));
    if body.is_empty() {
        return Flushed::Discard;
    }
    if has_previous && text::char_len(&body) < MERGE_BELOW_CHARS {
        return Flushed::Merge(body);
    }
    Flushed::Section(ExtractedSection {
        item: items.detect(&pending.heading).map(str::to_string),
        heading: pending.heading,
        level: pending.level,
        body,
        position,
    })
}

/// Walks the content root and splits it into sections at heading boundaries.
/// Text before the first heading has no section to belong to and is dropped.
pub struct SectionBuilder<'r> {
    items: &'r ItemPatterns,
    heading_classes: &'r [String],
    sections: Vec<ExtractedSection>,
    current: Option<PendingSection>,
}

impl<'r> SectionBuilder<'r> {
    pub fn new(items: &'r ItemPatterns, heading_classes: &'r [String]) -> Self {
        Self {
            items,
            heading_classes,
            sections: Vec::new(),
            current: None,
        }
    }

    pub fn build(mut self, root: ElementRef<'_>) -> Vec<ExtractedSection> {
        self.walk(root);
        self.flush_current();
        self.sections
    }

    fn walk(&mut self, node: ElementRef<'_>) {
        for child in node.children() {
            if let Some(element) = ElementRef::wrap(child) {
                self.visit(element);
            } else if let Some(text) = child.value().as_text() {
                self.push_fragment(text);
            }
        }
    }

    fn visit(&mut self, element: ElementRef<'_>) {
        let name = element.value().name();
        match name {
            _ if SKIPPED.contains(&name) => {}
            "h1" | "h2" | "h3" | "h4" => {
                let heading = text::clean(&element.text().collect::<String>());
                if !heading.is_empty() {
                    let level = name[1..].parse().unwrap_or(2);
                    self.start_section(heading, level);
                }
            }
            "p" | "div" | "span" => {
                if let Some(heading) = detect_item_heading(element, self.items, self.heading_classes) {
                    self.start_section(heading.text, 2);
                } else {
                    self.visit_container(element);
                }
            }
            "li" | "td" | "th" | "caption" => self.push_element_text(element),
            "table" | "thead" | "tbody" | "tfoot" | "tr" | "ul" | "ol" => self.walk(element),
            _ => self.visit_container(element),
        }
    }

    /// Recurse into structural containers; collect text at leaves.
    fn visit_container(&mut self, element: ElementRef<'_>) {
        let has_block_children = element
            .children()
            .filter_map(ElementRef::wrap)
            .any(|c| BLOCK_CHILDREN.contains(&c.value().name()));
        if has_block_children {
            self.walk(element);
        } else {
            self.push_element_text(element);
        }
    }

    fn push_element_text(&mut self, element: ElementRef<'_>) {
        let text: String = element.text().collect();
        self.push_fragment(&text);
    }

    fn push_fragment(&mut self, raw: &str) {
        let Some(current) = self.current.as_mut() else {
            return;
        };
        let cleaned = text::clean(raw);
        if text::char_len(&cleaned) >= MIN_FRAGMENT_CHARS {
            current.fragments.push(cleaned);
        }
    }

    fn start_section(&mut self, heading: String, level: u8) {
        self.flush_current();
        self.current = Some(PendingSection::new(heading, level));
    }

    fn flush_current(&mut self) {
        let Some(pending) = self.current.take() else {
            return;
        };
        let position = self.sections.len();
        match flush(pending, !self.sections.is_empty(), position, self.items) {
            Flushed::Section(section) => self.sections.push(section),
            Flushed::Merge(body) => {
                if let Some(prev) = self.sections.last_mut() {
                    prev.body.push(' ');
                    prev.body.push_str(&body);
                }
            }
            Flushed::Discard => {}
        }
    }
}
