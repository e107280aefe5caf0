use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::ErrorEvent;
use crate::model::{Company, EnrichedDocument};
use crate::pipeline::context::CounterSnapshot;
use crate::pipeline::{DocumentSink, RunStatus, WriteOutcome};

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let conn = Connection::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS crawl_runs (
            id             TEXT PRIMARY KEY,
            started_at     TEXT NOT NULL DEFAULT (datetime('now')),
            finished_at    TEXT,
            status         TEXT NOT NULL
                           CHECK(status IN ('running','completed','partial','failed','cancelled')),
            identifiers    TEXT NOT NULL,
            filing_types   TEXT NOT NULL,
            max_filings    INTEGER NOT NULL,
            config         TEXT,
            pages_crawled  INTEGER NOT NULL DEFAULT 0,
            pages_saved    INTEGER NOT NULL DEFAULT 0,
            pages_skipped  INTEGER NOT NULL DEFAULT 0,
            pages_errored  INTEGER NOT NULL DEFAULT 0,
            error_summary  TEXT
        );

        CREATE TABLE IF NOT EXISTS companies (
            id                     INTEGER PRIMARY KEY,
            cik                    TEXT UNIQUE NOT NULL,
            name                   TEXT NOT NULL,
            tickers                TEXT NOT NULL DEFAULT '[]',
            exchanges              TEXT NOT NULL DEFAULT '[]',
            sic_code               INTEGER,
            sic_description        TEXT,
            state_of_incorporation TEXT,
            fiscal_year_end        TEXT,
            entity_type            TEXT,
            created_at             TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at             TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS documents (
            id                   TEXT PRIMARY KEY,
            run_id               TEXT NOT NULL REFERENCES crawl_runs(id),
            company_id           INTEGER NOT NULL REFERENCES companies(id),
            url                  TEXT UNIQUE NOT NULL,
            accession_number     TEXT NOT NULL,
            filing_type          TEXT NOT NULL,
            filing_date          TEXT NOT NULL,
            period_of_report     TEXT,
            fiscal_year          INTEGER,
            http_status          INTEGER NOT NULL,
            fetched_at           TEXT NOT NULL,
            last_modified        TEXT,
            title                TEXT NOT NULL,
            body_text            TEXT NOT NULL,
            headings             TEXT NOT NULL DEFAULT '[]',
            breadcrumbs          TEXT NOT NULL DEFAULT '[]',
            raw_char_count       INTEGER NOT NULL,
            code_char_count      INTEGER NOT NULL,
            word_count           INTEGER NOT NULL,
            char_count           INTEGER NOT NULL,
            reading_time_minutes REAL NOT NULL,
            has_tables           BOOLEAN NOT NULL,
            table_count          INTEGER NOT NULL,
            link_count           INTEGER NOT NULL,
            code_ratio           REAL NOT NULL,
            language             TEXT NOT NULL,
            language_confidence  REAL NOT NULL,
            content_type         TEXT NOT NULL,
            quality_score        REAL NOT NULL,
            quality_length       REAL NOT NULL,
            quality_language     REAL NOT NULL,
            quality_density      REAL NOT NULL,
            quality_structure    REAL NOT NULL,
            content_hash         TEXT UNIQUE NOT NULL,
            tags                 TEXT NOT NULL DEFAULT '[]',
            depth_in_site        INTEGER NOT NULL,
            schema_version       INTEGER NOT NULL,
            created_at           TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_documents_company ON documents(company_id);
        CREATE INDEX IF NOT EXISTS idx_documents_type ON documents(filing_type);
        CREATE INDEX IF NOT EXISTS idx_documents_run ON documents(run_id);

        CREATE TABLE IF NOT EXISTS document_sections (
            id          INTEGER PRIMARY KEY,
            document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
            position    INTEGER NOT NULL,
            heading     TEXT NOT NULL,
            level       INTEGER NOT NULL,
            item        TEXT,
            body        TEXT NOT NULL,
            word_count  INTEGER NOT NULL,
            char_count  INTEGER NOT NULL,
            UNIQUE(document_id, position)
        );
        CREATE INDEX IF NOT EXISTS idx_sections_item ON document_sections(item);

        CREATE TABLE IF NOT EXISTS crawl_errors (
            id          INTEGER PRIMARY KEY,
            run_id      TEXT NOT NULL REFERENCES crawl_runs(id),
            url         TEXT NOT NULL,
            error_type  TEXT NOT NULL,
            http_status INTEGER,
            message     TEXT NOT NULL,
            detail      TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_errors_run ON crawl_errors(run_id);
        ",
    )?;
    Ok(())
}

// ── Runs ──

pub struct NewRun<'a> {
    pub id: Uuid,
    pub identifiers: &'a [String],
    pub filing_types: &'a [String],
    pub max_filings: usize,
    /// Settings snapshot as JSON.
    pub config: String,
}

pub fn create_run(conn: &Connection, run: &NewRun<'_>) -> Result<()> {
    conn.execute(
        "INSERT INTO crawl_runs (id, status, identifiers, filing_types, max_filings, config)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            run.id.to_string(),
            RunStatus::Running.as_str(),
            serde_json::to_string(run.identifiers)?,
            serde_json::to_string(run.filing_types)?,
            run.max_filings,
            run.config,
        ],
    )?;
    Ok(())
}

pub fn update_run_counters(conn: &Connection, run_id: Uuid, counters: &CounterSnapshot) -> Result<()> {
    conn.execute(
        "UPDATE crawl_runs
         SET pages_crawled = ?2, pages_saved = ?3, pages_skipped = ?4, pages_errored = ?5
         WHERE id = ?1",
        rusqlite::params![
            run_id.to_string(),
            counters.attempted,
            counters.stored,
            counters.skipped,
            counters.errored,
        ],
    )?;
    Ok(())
}

pub fn finish_run(
    conn: &Connection,
    run_id: Uuid,
    status: RunStatus,
    counters: &CounterSnapshot,
    error_summary: Option<&str>,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE crawl_runs
         SET status = ?2, finished_at = datetime('now'), error_summary = ?3,
             pages_crawled = ?4, pages_saved = ?5, pages_skipped = ?6, pages_errored = ?7
         WHERE id = ?1",
        rusqlite::params![
            run_id.to_string(),
            status.as_str(),
            error_summary,
            counters.attempted,
            counters.stored,
            counters.skipped,
            counters.errored,
        ],
    )?;
    anyhow::ensure!(updated == 1, "run {run_id} not found");
    Ok(())
}

pub struct RunRow {
    pub id: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: String,
    pub identifiers: Vec<String>,
    pub crawled: usize,
    pub saved: usize,
    pub skipped: usize,
    pub errored: usize,
    pub error_summary: Option<String>,
}

/// Most recent first. UUIDv7 ids sort by creation time.
pub fn fetch_runs(conn: &Connection, limit: usize) -> Result<Vec<RunRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, started_at, finished_at, status, identifiers,
                pages_crawled, pages_saved, pages_skipped, pages_errored, error_summary
         FROM crawl_runs
         ORDER BY id DESC
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit], |row| {
            let identifiers: String = row.get(4)?;
            Ok(RunRow {
                id: row.get(0)?,
                started_at: row.get(1)?,
                finished_at: row.get(2)?,
                status: row.get(3)?,
                identifiers: serde_json::from_str(&identifiers).unwrap_or_default(),
                crawled: row.get(5)?,
                saved: row.get(6)?,
                skipped: row.get(7)?,
                errored: row.get(8)?,
                error_summary: row.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Documents ──

/// Every URL already stored, for seeding a run's seen-set.
pub fn load_seen_urls(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT url FROM documents")?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn upsert_company(conn: &Connection, company: &Company) -> Result<i64> {
    let id = conn.query_row(
        "INSERT INTO companies
         (cik, name, tickers, exchanges, sic_code, sic_description,
          state_of_incorporation, fiscal_year_end, entity_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(cik) DO UPDATE SET
            name = excluded.name,
            tickers = excluded.tickers,
            exchanges = excluded.exchanges,
            sic_code = excluded.sic_code,
            sic_description = excluded.sic_description,
            state_of_incorporation = excluded.state_of_incorporation,
            fiscal_year_end = excluded.fiscal_year_end,
            entity_type = excluded.entity_type,
            updated_at = datetime('now')
         RETURNING id",
        rusqlite::params![
            company.cik,
            company.name,
            serde_json::to_string(&company.tickers)?,
            serde_json::to_string(&company.exchanges)?,
            company.sic_code,
            company.sic_description,
            company.state_of_incorporation,
            company.fiscal_year_end,
            company.entity_type,
        ],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Store a document and its sections in one transaction. A document whose
/// content hash or URL is already present is left alone and reported as a
/// duplicate.
pub fn save_document(conn: &Connection, run_id: Uuid, doc: &EnrichedDocument) -> Result<WriteOutcome> {
    let tx = conn.unchecked_transaction()?;
    let company_id = upsert_company(&tx, &doc.provenance.company)?;
    let p = &doc.provenance;
    let q = &doc.quality;
    let inserted = tx.execute(
        "INSERT INTO documents
         (id, run_id, company_id, url, accession_number, filing_type, filing_date,
          period_of_report, fiscal_year, http_status, fetched_at, last_modified,
          title, body_text, headings, breadcrumbs, raw_char_count, code_char_count,
          word_count, char_count,
          reading_time_minutes, has_tables, table_count, link_count, code_ratio,
          language, language_confidence, content_type,
          quality_score, quality_length, quality_language, quality_density, quality_structure,
          content_hash, tags, depth_in_site, schema_version)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,
                 ?19,?20,?21,?22,?23,?24,?25,?26,?27,?28,?29,?30,?31,?32,?33,?34,?35,?36,?37)
         ON CONFLICT DO NOTHING",
        rusqlite::params![
            doc.id.to_string(),
            run_id.to_string(),
            company_id,
            p.url,
            p.filing.accession_number,
            p.filing.filing_type,
            p.filing.filing_date.to_string(),
            p.filing.period_of_report.map(|d| d.to_string()),
            doc.fiscal_year,
            p.http_status,
            p.fetched_at.to_rfc3339(),
            p.last_modified.map(|d| d.to_rfc3339()),
            doc.title,
            doc.body_text,
            serde_json::to_string(&doc.headings)?,
            serde_json::to_string(&doc.breadcrumbs)?,
            doc.raw_char_count,
            doc.code_char_count,
            doc.word_count,
            doc.char_count,
            doc.reading_time_minutes,
            doc.has_tables,
            doc.table_count,
            doc.link_count,
            doc.code_ratio,
            doc.language,
            doc.language_confidence,
            doc.content_type,
            q.score,
            q.length,
            q.language,
            q.density,
            q.structure,
            doc.content_hash,
            serde_json::to_string(&doc.tags)?,
            doc.depth_in_site,
            doc.schema_version,
        ],
    )?;

    if inserted == 0 {
        tx.commit()?;
        return Ok(WriteOutcome::Duplicate);
    }

    {
        let mut stmt = tx.prepare(
            "INSERT INTO document_sections
             (document_id, position, heading, level, item, body, word_count, char_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        let document_id = doc.id.to_string();
        for s in &doc.sections {
            stmt.execute(rusqlite::params![
                document_id, s.position, s.heading, s.level, s.item, s.body, s.word_count, s.char_count,
            ])?;
        }
    }
    tx.commit()?;
    Ok(WriteOutcome::Stored)
}

pub fn log_error(conn: &Connection, run_id: Uuid, event: &ErrorEvent) -> Result<()> {
    conn.execute(
        "INSERT INTO crawl_errors (run_id, url, error_type, http_status, message, detail)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            run_id.to_string(),
            event.url,
            event.kind.as_str(),
            event.http_status,
            event.message,
            event.detail,
        ],
    )?;
    Ok(())
}

/// Section headings of a stored document, in position order.
pub fn fetch_section_headings(conn: &Connection, url: &str) -> Result<Option<Vec<String>>> {
    let document_id: Option<String> = conn
        .query_row("SELECT id FROM documents WHERE url = ?1", [url], |r| r.get(0))
        .optional()?;
    let Some(document_id) = document_id else {
        return Ok(None);
    };
    let mut stmt = conn.prepare(
        "SELECT heading FROM document_sections WHERE document_id = ?1 ORDER BY position",
    )?;
    let rows = stmt
        .query_map([document_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(rows))
}

/// `DocumentSink` over a SQLite connection.
pub struct SqliteSink<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteSink<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl DocumentSink for SqliteSink<'_> {
    fn write_document(&mut self, run_id: Uuid, doc: &EnrichedDocument) -> Result<WriteOutcome> {
        save_document(self.conn, run_id, doc)
    }

    fn record_error(&mut self, run_id: Uuid, event: &ErrorEvent) -> Result<()> {
        log_error(self.conn, run_id, event)
    }

    fn record_progress(&mut self, run_id: Uuid, counters: &CounterSnapshot) -> Result<()> {
        update_run_counters(self.conn, run_id, counters)
    }

    fn finish_run(
        &mut self,
        run_id: Uuid,
        status: RunStatus,
        counters: &CounterSnapshot,
        error_summary: Option<&str>,
    ) -> Result<()> {
        finish_run(self.conn, run_id, status, counters, error_summary)
    }
}

// ── Stats ──

pub struct Stats {
    pub documents: usize,
    pub sections: usize,
    pub companies: usize,
    pub runs: usize,
    pub errors: usize,
    pub skips: usize,
    pub by_filing_type: Vec<(String, usize)>,
    pub avg_quality: Option<f64>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let documents: usize = conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0))?;
    let sections: usize =
        conn.query_row("SELECT COUNT(*) FROM document_sections", [], |r| r.get(0))?;
    let companies: usize = conn.query_row("SELECT COUNT(*) FROM companies", [], |r| r.get(0))?;
    let runs: usize = conn.query_row("SELECT COUNT(*) FROM crawl_runs", [], |r| r.get(0))?;
    let skips: usize = conn.query_row(
        "SELECT COUNT(*) FROM crawl_errors WHERE error_type IN ('empty_content', 'below_min_length')",
        [],
        |r| r.get(0),
    )?;
    let total_events: usize = conn.query_row("SELECT COUNT(*) FROM crawl_errors", [], |r| r.get(0))?;
    let avg_quality: Option<f64> =
        conn.query_row("SELECT AVG(quality_score) FROM documents", [], |r| r.get(0))?;

    let mut stmt = conn.prepare(
        "SELECT filing_type, COUNT(*) FROM documents GROUP BY filing_type ORDER BY COUNT(*) DESC, filing_type",
    )?;
    let by_filing_type = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Stats {
        documents,
        sections,
        companies,
        runs,
        errors: total_events - skips,
        skips,
        by_filing_type,
        avg_quality,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::language::{Detection, FixedLanguage};
    use crate::enrich::Enricher;
    use crate::error::ErrorKind;
    use crate::parser::tests::raw_document;
    use crate::parser::Extractor;

    fn setup() -> (Connection, Uuid) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        init_schema(&conn).unwrap();
        let run_id = Uuid::now_v7();
        let ids = vec!["AAPL".to_string()];
        let types = vec!["10-K".to_string()];
        create_run(
            &conn,
            &NewRun {
                id: run_id,
                identifiers: &ids,
                filing_types: &types,
                max_filings: 10,
                config: "{}".into(),
            },
        )
        .unwrap();
        (conn, run_id)
    }

    fn enriched(fixture: &str, filing_type: &str) -> EnrichedDocument {
        let html = std::fs::read_to_string(format!("tests/fixtures/{fixture}")).unwrap();
        let extracted = Extractor::sec().unwrap().extract(raw_document(&html, filing_type)).unwrap();
        let english = FixedLanguage(Detection {
            language: "en".into(),
            confidence: 0.99,
        });
        Enricher::new(Box::new(english), 50).enrich(extracted).unwrap()
    }

    #[test]
    fn schema_is_idempotent() {
        let (conn, _) = setup();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn stores_document_with_ordered_sections() {
        let (conn, run_id) = setup();
        let doc = enriched("apple_10k.html", "10-K");
        assert_eq!(save_document(&conn, run_id, &doc).unwrap(), WriteOutcome::Stored);

        let headings = fetch_section_headings(&conn, &doc.provenance.url).unwrap().unwrap();
        let expected: Vec<String> = doc.sections.iter().map(|s| s.heading.clone()).collect();
        assert_eq!(headings, expected);

        let (hash, quality, tags, stored_headings, code_chars): (String, f64, String, String, usize) = conn
            .query_row(
                "SELECT content_hash, quality_score, tags, headings, code_char_count
                 FROM documents WHERE url = ?1",
                [&doc.provenance.url],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
            )
            .unwrap();
        assert_eq!(serde_json::from_str::<Vec<String>>(&stored_headings).unwrap(), headings);
        assert_eq!(code_chars, doc.code_char_count);
        assert_eq!(hash, doc.content_hash);
        assert_eq!(quality, doc.quality.score);
        assert_eq!(serde_json::from_str::<Vec<String>>(&tags).unwrap(), doc.tags);
        assert_eq!(fetch_section_headings(&conn, "https://www.sec.gov/missing.htm").unwrap(), None);
    }

    #[test]
    fn same_content_from_another_url_is_duplicate() {
        let (conn, run_id) = setup();
        let doc = enriched("apple_10k.html", "10-K");
        save_document(&conn, run_id, &doc).unwrap();

        let mut copy = doc.clone();
        copy.id = Uuid::now_v7();
        copy.provenance.url = "https://www.sec.gov/Archives/edgar/data/320193/x/copy.htm".into();
        assert_eq!(save_document(&conn, run_id, &copy).unwrap(), WriteOutcome::Duplicate);

        let documents: usize = conn.query_row("SELECT COUNT(*) FROM documents", [], |r| r.get(0)).unwrap();
        let sections: usize =
            conn.query_row("SELECT COUNT(*) FROM document_sections", [], |r| r.get(0)).unwrap();
        assert_eq!(documents, 1);
        assert_eq!(sections, doc.sections.len());
    }

    #[test]
    fn same_url_with_new_content_is_duplicate() {
        let (conn, run_id) = setup();
        let doc = enriched("acme_8k.html", "8-K");
        save_document(&conn, run_id, &doc).unwrap();

        let mut changed = doc.clone();
        changed.id = Uuid::now_v7();
        changed.content_hash = "0".repeat(64);
        assert_eq!(save_document(&conn, run_id, &changed).unwrap(), WriteOutcome::Duplicate);
    }

    #[test]
    fn company_upsert_refreshes_metadata() {
        let (conn, _) = setup();
        let mut company = Company {
            cik: "0000320193".into(),
            name: "Apple Computer, Inc.".into(),
            ..Company::default()
        };
        let first = upsert_company(&conn, &company).unwrap();
        company.name = "Apple Inc.".into();
        company.tickers = vec!["AAPL".into()];
        let second = upsert_company(&conn, &company).unwrap();
        assert_eq!(first, second);

        let (name, tickers): (String, String) = conn
            .query_row("SELECT name, tickers FROM companies WHERE cik = '0000320193'", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(name, "Apple Inc.");
        assert_eq!(tickers, r#"["AAPL"]"#);
    }

    #[test]
    fn run_lifecycle() {
        let (conn, run_id) = setup();
        let counters = CounterSnapshot {
            attempted: 4,
            stored: 2,
            skipped: 1,
            errored: 1,
        };
        update_run_counters(&conn, run_id, &counters).unwrap();
        let runs = fetch_runs(&conn, 20).unwrap();
        assert_eq!(runs[0].status, "running");
        assert_eq!(runs[0].crawled, 4);
        assert!(runs[0].finished_at.is_none());

        finish_run(&conn, run_id, RunStatus::Partial, &counters, None).unwrap();
        let runs = fetch_runs(&conn, 20).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, "partial");
        assert_eq!(runs[0].identifiers, vec!["AAPL"]);
        assert_eq!((runs[0].saved, runs[0].skipped, runs[0].errored), (2, 1, 1));
        assert!(runs[0].finished_at.is_some());

        assert!(finish_run(&conn, Uuid::now_v7(), RunStatus::Failed, &counters, Some("x")).is_err());
    }

    #[test]
    fn stored_urls_seed_the_seen_set() {
        let (conn, run_id) = setup();
        assert!(load_seen_urls(&conn).unwrap().is_empty());
        let doc = enriched("acme_8k.html", "8-K");
        save_document(&conn, run_id, &doc).unwrap();
        assert_eq!(load_seen_urls(&conn).unwrap(), vec![doc.provenance.url.clone()]);
    }

    #[test]
    fn stats_separate_skips_from_errors() {
        let (conn, run_id) = setup();
        save_document(&conn, run_id, &enriched("apple_10k.html", "10-K")).unwrap();
        let url = "https://www.sec.gov/x.htm";
        log_error(&conn, run_id, &ErrorEvent::new(url, ErrorKind::HttpError, "HTTP 404").with_status(Some(404)))
            .unwrap();
        log_error(&conn, run_id, &ErrorEvent::new(url, ErrorKind::EmptyContent, "insufficient")).unwrap();

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.companies, 1);
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.skips, 1);
        assert_eq!(stats.by_filing_type, vec![("10-K".to_string(), 1)]);
        assert!(stats.sections > 0);
        assert!(stats.avg_quality.is_some());
    }

    #[test]
    fn sink_writes_through() {
        let (conn, run_id) = setup();
        let mut sink = SqliteSink::new(&conn);
        let doc = enriched("acme_8k.html", "8-K");
        assert_eq!(sink.write_document(run_id, &doc).unwrap(), WriteOutcome::Stored);
        assert_eq!(sink.write_document(run_id, &doc).unwrap(), WriteOutcome::Duplicate);
        sink.finish_run(run_id, RunStatus::Completed, &CounterSnapshot::default(), None)
            .unwrap();
        assert_eq!(fetch_runs(&conn, 1).unwrap()[0].status, "completed");
    }

    #[test]
    fn connect_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("edgar.sqlite");
        let conn = connect(&path).unwrap();
        init_schema(&conn).unwrap();
        assert!(path.exists());
    }
}
