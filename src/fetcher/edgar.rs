use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::LAST_MODIFIED;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::filings::{self, Submissions};
use super::{FetchedPage, FilingSource};
use crate::config::{self, Settings, SUBMISSIONS_URL, TICKERS_URL};
use crate::error::FetchError;

/// HTTP client for the public EDGAR endpoints.
pub struct EdgarClient {
    http: reqwest::Client,
    tickers: OnceCell<HashMap<String, String>>,
}

impl EdgarClient {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(settings.require_user_agent()?)
            .connect_timeout(config::CONNECT_TIMEOUT)
            .timeout(settings.request_timeout())
            .pool_idle_timeout(config::POOL_IDLE_TIMEOUT)
            .gzip(true)
            .build()?;
        Ok(Self {
            http,
            tickers: OnceCell::new(),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self.http.get(url).send().await.map_err(|e| transport(url, e))?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.get(url).await?;
        let bytes = response.bytes().await.map_err(|e| transport(url, e))?;
        Ok(bytes.to_vec())
    }

    /// Downloaded once per client; later lookups hit the cached map.
    async fn ticker_table(&self) -> Result<&HashMap<String, String>, FetchError> {
        self.tickers
            .get_or_try_init(|| async {
                let bytes = self.get_bytes(TICKERS_URL).await?;
                let table = filings::parse_ticker_table(&bytes).map_err(|e| FetchError::Decode {
                    url: TICKERS_URL.to_string(),
                    message: e.to_string(),
                })?;
                info!("Loaded {} tickers", table.len());
                Ok::<_, FetchError>(table)
            })
            .await
    }
}

#[async_trait]
impl FilingSource for EdgarClient {
    async fn lookup_ticker(&self, ticker: &str) -> Result<Option<String>, FetchError> {
        let table = self.ticker_table().await?;
        Ok(table.get(&ticker.trim().to_uppercase()).cloned())
    }

    async fn submissions(&self, cik: &str) -> Result<Submissions, FetchError> {
        let url = format!("{SUBMISSIONS_URL}/CIK{cik}.json");
        let bytes = self.get_bytes(&url).await?;
        debug!(url = %url, bytes = bytes.len(), "submissions");
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode {
            url,
            message: e.to_string(),
        })
    }

    async fn fetch_document(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self.get(url).await?;
        let status = response.status().as_u16();
        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date);
        let body = response.bytes().await.map_err(|e| transport(url, e))?;
        Ok(FetchedPage {
            status,
            body: body.to_vec(),
            last_modified,
        })
    }
}

fn transport(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout { url: url.to_string() }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

/// `Last-Modified` uses the RFC 2822 style date; anything else is dropped.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}
