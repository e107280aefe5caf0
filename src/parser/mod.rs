pub mod dom;
pub mod headings;
pub mod items;
pub mod sections;
pub mod text;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::model::{ExtractedDocument, ExtractedSection, RawDocument};
use items::ItemPatterns;
use sections::SectionBuilder;

/// Documents whose assembled body text is shorter than this are skipped.
pub const MIN_BODY_CHARS: usize = 200;

const FALLBACK_HEADING: &str = "Full Document";

/// Compiled pattern tables driving extraction.
pub struct ExtractRules {
    pub content_roots: Vec<Selector>,
    pub min_root_chars: usize,
    pub boilerplate: Vec<Selector>,
    pub boilerplate_tags: Vec<String>,
    pub breadcrumbs: Vec<Selector>,
    pub items: ItemPatterns,
    pub heading_classes: Vec<String>,
    pub min_body_chars: usize,
}

impl ExtractRules {
    pub fn sec() -> Result<Self, ExtractError> {
        Ok(Self {
            content_roots: dom::compile(dom::CONTENT_ROOT_SELECTORS)?,
            min_root_chars: dom::MIN_ROOT_CHARS,
            boilerplate: dom::compile(dom::BOILERPLATE_SELECTORS)?,
            boilerplate_tags: dom::BOILERPLATE_TAGS.iter().map(|t| t.to_string()).collect(),
            breadcrumbs: dom::compile(dom::BREADCRUMB_SELECTORS)?,
            items: ItemPatterns::sec(),
            heading_classes: headings::HEADING_CLASSES.iter().map(|c| c.to_string()).collect(),
            min_body_chars: MIN_BODY_CHARS,
        })
    }
}

/// Turns fetched filing HTML into a title, clean body text and sections.
pub struct Extractor {
    rules: ExtractRules,
}

impl Extractor {
    pub fn new(rules: ExtractRules) -> Self {
        Self { rules }
    }

    pub fn sec() -> Result<Self, ExtractError> {
        Ok(Self::new(ExtractRules::sec()?))
    }

    pub fn extract(&self, raw: RawDocument) -> Result<ExtractedDocument, ExtractError> {
        if raw.body.iter().all(u8::is_ascii_whitespace) {
            return Err(ExtractError::EmptyBody);
        }
        let url = raw.provenance.url.as_str();
        let html = dom::decode_body(&raw.body);
        let raw_char_count = html.chars().count();
        let mut document = Html::parse_document(&html);

        let breadcrumbs = dom::breadcrumbs(&document, &self.rules.breadcrumbs);

        let root_id = match dom::find_content_root(&document, &self.rules.content_roots, self.rules.min_root_chars) {
            Some(root) => {
                debug!(url, root = root.value().name(), id = root.value().id().unwrap_or(""), "content root");
                root.id()
            }
            None => {
                warn!(url, "No content root found, using the full document");
                document.root_element().id()
            }
        };

        let doomed: Vec<_> = {
            let root = document
                .tree
                .get(root_id)
                .and_then(ElementRef::wrap)
                .unwrap_or_else(|| document.root_element());
            dom::boilerplate_elements(root, &self.rules.boilerplate, &self.rules.boilerplate_tags)
                .iter()
                .map(|el| el.id())
                .collect()
        };
        for id in doomed {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }

        let root = document
            .tree
            .get(root_id)
            .and_then(ElementRef::wrap)
            .unwrap_or_else(|| document.root_element());

        let company = &raw.provenance.company;
        let filing_type = &raw.provenance.filing.filing_type;
        let title = dom::title(&document, &company.name, filing_type);

        let mut sections =
            SectionBuilder::new(&self.rules.items, &self.rules.heading_classes).build(root);
        if sections.is_empty() {
            let full_text = text::clean(&root.text().collect::<String>());
            if full_text.is_empty() {
                warn!(url, "Insufficient content (0 chars), skipping");
                return Err(ExtractError::InsufficientContent { chars: 0 });
            }
            sections.push(ExtractedSection {
                heading: FALLBACK_HEADING.to_string(),
                level: 1,
                body: full_text,
                position: 0,
                item: None,
            });
        }

        let body_text = assemble_body(&sections);
        let chars = text::char_len(&body_text);
        if chars < self.rules.min_body_chars {
            warn!(url, chars, "Insufficient content, skipping");
            return Err(ExtractError::InsufficientContent { chars });
        }

        let counts = dom::counts(root);
        let headings = sections.iter().map(|s| s.heading.clone()).collect();
        Ok(ExtractedDocument {
            provenance: raw.provenance,
            title,
            body_text,
            headings,
            sections,
            breadcrumbs,
            raw_char_count,
            table_count: counts.tables,
            code_char_count: counts.code_chars,
            link_count: counts.links,
        })
    }
}

/// Headings and bodies joined by blank lines, then normalized.
pub fn assemble_body(sections: &[ExtractedSection]) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(sections.len() * 2);
    for s in sections {
        parts.push(&s.heading);
        if !s.body.is_empty() {
            parts.push(&s.body);
        }
    }
    text::clean(&parts.join("\n\n"))
}
