use std::collections::HashSet;
use std::ops::RangeInclusive;

/// Filing type to content-type vocabulary. Anything missing is `other`.
pub const CONTENT_TYPES: &[(&str, &str)] = &[
    ("10-K", "annual_report"),
    ("10-Q", "quarterly_report"),
    ("8-K", "current_report"),
    ("DEF 14A", "proxy_statement"),
    ("S-1", "registration_statement"),
    ("20-F", "annual_report"),
    ("6-K", "current_report"),
];

pub const OTHER_CONTENT_TYPE: &str = "other";

/// SIC code ranges to sector tags. First matching range wins, so the narrow
/// software range sits ahead of the services division that contains it.
pub const SIC_SECTORS: &[(RangeInclusive<u32>, &str)] = &[
    (100..=999, "agriculture"),
    (1000..=1499, "mining"),
    (1500..=1799, "construction"),
    (2000..=3999, "manufacturing"),
    (4000..=4999, "transportation"),
    (5000..=5199, "wholesale-trade"),
    (5200..=5999, "retail-trade"),
    (6000..=6799, "finance"),
    (7370..=7379, "technology"),
    (7000..=7999, "services"),
    (8000..=8999, "healthcare"),
    (9000..=9999, "public-administration"),
];

/// Item codes that imply a retrieval-friendly topic tag.
pub const SEMANTIC_TAGS: &[(&[&str], &str)] = &[
    (&["item_1a"], "risk-factors"),
    (&["item_7", "item_2_10q"], "mda"),
    (&["item_8", "item_1_10q"], "financial-statements"),
];

pub fn content_type(filing_type: &str) -> Option<&'static str> {
    CONTENT_TYPES
        .iter()
        .find(|(t, _)| *t == filing_type)
        .map(|(_, c)| *c)
}

pub fn sector(sic_code: u32) -> Option<&'static str> {
    SIC_SECTORS
        .iter()
        .find(|(range, _)| range.contains(&sic_code))
        .map(|(_, tag)| *tag)
}

/// Structural tags only: content type, filing type, sector, detected items
/// (in section order) and the topics those items imply. Deduplicated, first
/// occurrence kept.
pub fn generate(filing_type: &str, sic_code: Option<u32>, items: &[&str]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();

    if let Some(ct) = content_type(filing_type) {
        tags.push(ct.replace('_', "-"));
    }
    tags.push(filing_type.to_lowercase().replace(' ', "-"));

    if let Some(sector) = sic_code.and_then(sector) {
        tags.push(sector.to_string());
    }

    tags.extend(items.iter().map(|item| item.replace('_', "-")));

    for (codes, tag) in SEMANTIC_TAGS {
        if codes.iter().any(|c| items.contains(c)) {
            tags.push(tag.to_string());
        }
    }

    let mut seen = HashSet::new();
    tags.retain(|t| seen.insert(t.clone()));
    tags
}
