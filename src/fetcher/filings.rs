use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{ARCHIVES_URL, FOREIGN_ISSUER_FORMS};
use crate::model::{Company, Filing};

const SKIP_EXTENSIONS: &[&str] = &[
    ".xsd", ".xml", ".xbrl", ".zip", ".pdf", ".gif", ".jpg", ".jpeg", ".png", ".css", ".js", ".json",
];
const SKIP_PATHS: &[&str] = &["/cgi-bin/browse-edgar", "/cgi-bin/viewer"];

// ── Submissions document ──

/// `data.sec.gov/submissions/CIK##########.json`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Submissions {
    pub name: String,
    pub tickers: Vec<String>,
    pub exchanges: Vec<Option<String>>,
    pub sic: String,
    pub sic_description: Option<String>,
    pub state_of_incorporation: Option<String>,
    pub fiscal_year_end: Option<String>,
    pub entity_type: Option<String>,
    pub filings: SubmissionFilings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SubmissionFilings {
    pub recent: RecentFilings,
}

/// Parallel columns, one entry per filing, newest first.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecentFilings {
    pub accession_number: Vec<String>,
    pub form: Vec<String>,
    pub filing_date: Vec<String>,
    pub report_date: Vec<String>,
    pub primary_document: Vec<String>,
}

impl Submissions {
    pub fn company(&self, cik: &str) -> Company {
        Company {
            cik: cik.to_string(),
            name: self.name.clone(),
            tickers: self.tickers.clone(),
            exchanges: self.exchanges.iter().flatten().cloned().collect(),
            sic_code: self.sic.trim().parse().ok(),
            sic_description: non_empty(&self.sic_description),
            state_of_incorporation: non_empty(&self.state_of_incorporation),
            fiscal_year_end: non_empty(&self.fiscal_year_end),
            entity_type: non_empty(&self.entity_type),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
}

// ── Entity resolution ──

#[derive(Debug, Deserialize)]
struct TickerEntry {
    cik_str: u64,
    ticker: String,
}

/// Parse `company_tickers.json` into an uppercase ticker → padded CIK map.
pub fn parse_ticker_table(bytes: &[u8]) -> Result<HashMap<String, String>, serde_json::Error> {
    let entries: HashMap<String, TickerEntry> = serde_json::from_slice(bytes)?;
    Ok(entries
        .into_values()
        .map(|e| (e.ticker.to_uppercase(), pad_cik(&e.cik_str.to_string())))
        .collect())
}

/// All-digit identifiers are CIKs already; anything else is a ticker.
pub fn numeric_cik(identifier: &str) -> Option<String> {
    let id = identifier.trim();
    (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())).then(|| pad_cik(id))
}

pub fn pad_cik(cik: &str) -> String {
    format!("{cik:0>10}")
}

// ── Filing selection ──

#[derive(Debug, Clone, Default)]
pub struct FilingQuery {
    pub filing_types: Vec<String>,
    /// Per entity.
    pub max_filings: usize,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// Zip the columnar listing into filings matching the query: type filter,
/// inclusive date range, most recent first, capped per entity. Rows with an
/// unparsable filing date are skipped.
pub fn select_filings(cik: &str, recent: &RecentFilings, query: &FilingQuery) -> Vec<Filing> {
    let rows = [
        recent.accession_number.len(),
        recent.form.len(),
        recent.filing_date.len(),
        recent.report_date.len(),
        recent.primary_document.len(),
    ]
    .into_iter()
    .max()
    .unwrap_or(0);
    fn col(v: &[String], i: usize) -> &str {
        v.get(i).map(String::as_str).unwrap_or("")
    }

    let mut filings = Vec::new();
    for i in 0..rows {
        let form = col(&recent.form, i);
        if !query.filing_types.iter().any(|t| t == form) {
            continue;
        }
        let raw_date = col(&recent.filing_date, i);
        let Ok(filing_date) = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d") else {
            warn!(cik, filing_date = raw_date, "Could not parse filing date, skipping");
            continue;
        };
        if query.date_from.is_some_and(|from| filing_date < from)
            || query.date_to.is_some_and(|to| filing_date > to)
        {
            continue;
        }
        let primary_document = col(&recent.primary_document, i);
        if primary_document.is_empty() {
            debug!(cik, accession = col(&recent.accession_number, i), "No primary document, skipping");
            continue;
        }

        let accession = col(&recent.accession_number, i);
        filings.push(Filing {
            accession_number: format_accession(accession),
            filing_type: form.to_string(),
            filing_date,
            period_of_report: NaiveDate::parse_from_str(col(&recent.report_date, i), "%Y-%m-%d").ok(),
            primary_document: primary_document.to_string(),
            url: document_url(cik, accession, primary_document),
        });
    }

    filings.sort_by(|a, b| b.filing_date.cmp(&a.filing_date));
    filings.truncate(query.max_filings);
    filings
}

/// Foreign-private-issuer forms present in the listing, for a hint when a
/// domestic-form query finds nothing.
pub fn foreign_issuer_forms(recent: &RecentFilings) -> Vec<&str> {
    let mut found: Vec<&str> = FOREIGN_ISSUER_FORMS
        .iter()
        .copied()
        .filter(|f| recent.form.iter().any(|form| form == f))
        .collect();
    found.dedup();
    found
}

/// `0000320193-23-000106` regardless of whether the input has dashes.
pub fn format_accession(accession: &str) -> String {
    let digits: String = accession.chars().filter(|c| *c != '-').collect();
    if digits.len() == 18 && digits.is_ascii() {
        format!("{}-{}-{}", &digits[..10], &digits[10..12], &digits[12..])
    } else {
        accession.to_string()
    }
}

pub fn document_url(cik: &str, accession: &str, primary_document: &str) -> String {
    let cik = cik.trim_start_matches('0');
    let cik = if cik.is_empty() { "0" } else { cik };
    let accession: String = accession.chars().filter(|c| *c != '-').collect();
    format!("{ARCHIVES_URL}/{cik}/{accession}/{primary_document}")
}

/// Only sec.gov content documents; skips binaries, structured data and
/// EDGAR navigation pages.
pub fn is_valid_document_url(url: &str) -> bool {
    let Ok(parsed) = url::Url::parse(url) else {
        return false;
    };
    if !parsed.host_str().is_some_and(|h| h == "sec.gov" || h.ends_with(".sec.gov")) {
        return false;
    }
    let path = parsed.path().to_lowercase();
    if SKIP_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return false;
    }
    !SKIP_PATHS.iter().any(|p| path.starts_with(p))
}
