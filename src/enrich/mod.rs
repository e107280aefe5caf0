pub mod language;
pub mod quality;
pub mod tags;

use chrono::Datelike;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EnrichError;
use crate::model::{EnrichedDocument, EnrichedSection, ExtractedDocument};
use language::{Detection, LanguageDetector, WhatlangDetector};
use quality::{round_to, QualitySignals};

pub const SCHEMA_VERSION: u32 = 1;
pub const READING_WPM: f64 = 238.0;
pub const MIN_CONTENT_WORDS: usize = 50;
/// Language detection only looks at the start of the document.
pub const LANGUAGE_SAMPLE_CHARS: usize = 5000;
pub const FALLBACK_LANGUAGE: &str = "en";

/// Derives counts, language, classification, quality and tags for an
/// extracted document.
pub struct Enricher {
    detector: Box<dyn LanguageDetector>,
    min_words: usize,
}

impl Enricher {
    pub fn new(detector: Box<dyn LanguageDetector>, min_words: usize) -> Self {
        Self { detector, min_words }
    }

    pub fn with_min_words(min_words: usize) -> Self {
        Self::new(Box::new(WhatlangDetector), min_words)
    }

    pub fn enrich(&self, doc: ExtractedDocument) -> Result<EnrichedDocument, EnrichError> {
        let url = doc.provenance.url.as_str();
        let word_count = doc.body_text.split_whitespace().count();
        let char_count = doc.body_text.chars().count();
        if word_count < self.min_words {
            warn!(url, words = word_count, "Document too short, skipping");
            return Err(EnrichError::BelowMinimumWords {
                words: word_count,
                min: self.min_words,
            });
        }

        let detection = self.detect_language(&doc.body_text);
        let language_confidence = round_to(detection.confidence, 4);
        let filing_type = doc.provenance.filing.filing_type.as_str();
        let content_type = tags::content_type(filing_type).unwrap_or(tags::OTHER_CONTENT_TYPE);

        let code_ratio = if char_count == 0 {
            0.0
        } else {
            round_to((doc.code_char_count as f64 / char_count as f64).min(1.0), 4)
        };

        let quality = quality::score(&QualitySignals {
            word_count,
            language_confidence,
            body_chars: char_count,
            raw_chars: doc.raw_char_count,
            section_count: doc.sections.len(),
        });

        let items: Vec<&str> = doc.sections.iter().filter_map(|s| s.item.as_deref()).collect();
        let tags = tags::generate(filing_type, doc.provenance.company.sic_code, &items);

        let fiscal_year = doc.provenance.filing.period_of_report.map(|d| d.year());
        let depth_in_site = site_depth(url);
        let content_hash = content_hash(&doc.body_text);

        info!(
            url,
            filing_type,
            company = %doc.provenance.company.name,
            words = word_count,
            quality = quality.score,
            language = %detection.language,
            sections = doc.sections.len(),
            tags = ?tags,
            "Enriched document"
        );

        let sections = doc
            .sections
            .into_iter()
            .map(|s| EnrichedSection {
                word_count: s.body.split_whitespace().count(),
                char_count: s.body.chars().count(),
                heading: s.heading,
                level: s.level,
                body: s.body,
                position: s.position,
                item: s.item,
            })
            .collect();

        Ok(EnrichedDocument {
            id: Uuid::now_v7(),
            title: doc.title,
            body_text: doc.body_text,
            headings: doc.headings,
            sections,
            breadcrumbs: doc.breadcrumbs,
            raw_char_count: doc.raw_char_count,
            code_char_count: doc.code_char_count,
            has_tables: doc.table_count > 0,
            table_count: doc.table_count,
            link_count: doc.link_count,
            word_count,
            char_count,
            reading_time_minutes: round_to(word_count as f64 / READING_WPM, 2),
            language: detection.language,
            language_confidence,
            content_type: content_type.to_string(),
            code_ratio,
            quality,
            content_hash,
            tags,
            fiscal_year,
            depth_in_site,
            schema_version: SCHEMA_VERSION,
            provenance: doc.provenance,
        })
    }

    fn detect_language(&self, body: &str) -> Detection {
        let sample: String = body.chars().take(LANGUAGE_SAMPLE_CHARS).collect();
        self.detector.detect(&sample).unwrap_or_else(|| Detection {
            language: FALLBACK_LANGUAGE.to_string(),
            confidence: 0.0,
        })
    }
}

/// Hex SHA-256 of the body text; the content-level dedup key.
pub fn content_hash(body_text: &str) -> String {
    format!("{:x}", Sha256::digest(body_text.as_bytes()))
}

/// Non-empty path segments in the URL. Unparsable URLs have depth 0.
pub fn site_depth(url: &str) -> usize {
    url::Url::parse(url)
        .map(|u| u.path().split('/').filter(|s| !s.is_empty()).count())
        .unwrap_or(0)
}
