use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

// ── Source entities ──

/// A registrant as described by its submissions document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Company {
    /// Zero-padded, 10 digits.
    pub cik: String,
    pub name: String,
    pub tickers: Vec<String>,
    pub exchanges: Vec<String>,
    pub sic_code: Option<u32>,
    pub sic_description: Option<String>,
    pub state_of_incorporation: Option<String>,
    /// MMDD, e.g. "0930".
    pub fiscal_year_end: Option<String>,
    pub entity_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Filing {
    pub accession_number: String,
    pub filing_type: String,
    pub filing_date: NaiveDate,
    pub period_of_report: Option<NaiveDate>,
    pub primary_document: String,
    pub url: String,
}

/// Identity of a fetched document, carried unchanged through every stage.
#[derive(Debug, Clone, Serialize)]
pub struct Provenance {
    pub company: Arc<Company>,
    pub filing: Filing,
    pub url: String,
    pub http_status: u16,
    pub fetched_at: DateTime<Utc>,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct RawDocument {
    pub provenance: Provenance,
    pub body: Vec<u8>,
}

// ── Extraction ──

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedSection {
    pub heading: String,
    pub level: u8,
    pub body: String,
    pub position: usize,
    /// Regulatory item code detected from the heading, e.g. `item_1a`.
    pub item: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub provenance: Provenance,
    pub title: String,
    pub body_text: String,
    /// Section headings in document order.
    pub headings: Vec<String>,
    pub sections: Vec<ExtractedSection>,
    pub breadcrumbs: Vec<String>,
    pub raw_char_count: usize,
    pub table_count: usize,
    pub code_char_count: usize,
    pub link_count: usize,
}

// ── Enrichment ──

#[derive(Debug, Clone, Serialize)]
pub struct EnrichedSection {
    pub heading: String,
    pub level: u8,
    pub body: String,
    pub position: usize,
    pub item: Option<String>,
    pub word_count: usize,
    pub char_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct QualityBreakdown {
    pub length: f64,
    pub language: f64,
    pub density: f64,
    pub structure: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichedDocument {
    pub id: Uuid,
    #[serde(flatten)]
    pub provenance: Provenance,
    pub title: String,
    pub body_text: String,
    pub headings: Vec<String>,
    pub sections: Vec<EnrichedSection>,
    pub breadcrumbs: Vec<String>,
    pub raw_char_count: usize,
    pub code_char_count: usize,
    pub has_tables: bool,
    pub table_count: usize,
    pub link_count: usize,
    pub word_count: usize,
    pub char_count: usize,
    pub reading_time_minutes: f64,
    pub language: String,
    pub language_confidence: f64,
    pub content_type: String,
    pub code_ratio: f64,
    pub quality: QualityBreakdown,
    pub content_hash: String,
    pub tags: Vec<String>,
    pub fiscal_year: Option<i32>,
    pub depth_in_site: usize,
    pub schema_version: u32,
}
