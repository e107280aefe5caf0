use thiserror::Error;

/// Failure talking to the filing source.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("no entity found for identifier {identifier:?}")]
    NotFound { identifier: String },

    #[error("malformed response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl FetchError {
    /// Transport failures, timeouts and 5xx responses are worth another attempt.
    /// 4xx responses never are.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport { .. } | FetchError::Timeout { .. } => true,
            FetchError::Status { status, .. } => *status >= 500,
            FetchError::NotFound { .. } | FetchError::Decode { .. } => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Status { .. } => ErrorKind::HttpError,
            _ => ErrorKind::FetchError,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("document body is empty")]
    EmptyBody,

    #[error("insufficient content ({chars} chars)")]
    InsufficientContent { chars: usize },

    #[error("invalid selector {selector:?}: {message}")]
    Selector { selector: String, message: String },
}

impl ExtractError {
    /// Insufficient or empty content is a skip, not a failure.
    pub fn is_skip(&self) -> bool {
        matches!(self, ExtractError::EmptyBody | ExtractError::InsufficientContent { .. })
    }
}

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("{words} words is below the minimum of {min}")]
    BelowMinimumWords { words: usize, min: usize },
}

/// Error event categories reported to the error sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    HttpError,
    FetchError,
    ParseError,
    EmptyContent,
    BelowMinLength,
    TransformError,
    WriteError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::HttpError => "http_error",
            ErrorKind::FetchError => "fetch_error",
            ErrorKind::ParseError => "parse_error",
            ErrorKind::EmptyContent => "empty_content",
            ErrorKind::BelowMinLength => "below_min_length",
            ErrorKind::TransformError => "transform_error",
            ErrorKind::WriteError => "write_error",
        }
    }

    /// Skip categories are recorded for diagnostics but do not count as errors.
    pub fn is_skip(self) -> bool {
        matches!(self, ErrorKind::EmptyContent | ErrorKind::BelowMinLength)
    }
}

/// One entry for the error sink.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub url: String,
    pub kind: ErrorKind,
    pub http_status: Option<u16>,
    pub message: String,
    pub detail: Option<String>,
}

impl ErrorEvent {
    pub fn new(url: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind,
            http_status: None,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_status(mut self, status: Option<u16>) -> Self {
        self.http_status = status;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
