//! Connector contract and request/error types.
//!
//! Every market-data source implements [`DataSource`]. The aggregator never
//! looks a connector up by string; it asks the
//! [`SourceRegistry`](crate::SourceRegistry) for the connector registered under a
//! [`SourceClass`].
//!
//! # Pagination
//!
//! | Mode | Caller behaviour |
//! |------|------------------|
//! | [`Pagination::Batch`] | one call returns the full raw history |
//! | [`Pagination::Paged`] | repeated calls with a moving `since` cursor until an empty page |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Interval, RawBar, SourceClass, Symbol, UtcDateTime};

/// How a connector delivers history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum Pagination {
    Batch,
    Paged { max_page_size: usize },
}

impl Pagination {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::Paged { .. } => "paged",
        }
    }
}

/// Connector-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Unavailable,
    RateLimited,
    NotFound,
    InvalidRequest,
    Internal,
}

/// Structured connector error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::NotFound,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::NotFound => "source.not_found",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// One connector call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub symbol: Symbol,
    pub interval: Interval,
    /// Inclusive lower bound for paged sources; ignored by batch sources.
    pub since: Option<UtcDateTime>,
    /// Page size cap for paged sources.
    pub limit: Option<usize>,
    /// Transport timeout budget for this call.
    pub timeout: Duration,
}

impl FetchRequest {
    pub fn new(symbol: Symbol, interval: Interval, timeout: Duration) -> Self {
        Self {
            symbol,
            interval,
            since: None,
            limit: None,
            timeout,
        }
    }

    pub fn with_cursor(mut self, since: UtcDateTime, limit: usize) -> Result<Self, SourceError> {
        if limit == 0 {
            return Err(SourceError::invalid_request(
                "page limit must be greater than zero",
            ));
        }
        self.since = Some(since);
        self.limit = Some(limit);
        Ok(self)
    }
}

/// Connector contract.
///
/// Implementations must be `Send + Sync`; the aggregator shares one instance
/// across all concurrently running fetch tasks of its source class.
///
/// Retries, proxies and authentication are connector concerns and stay behind
/// this trait.
pub trait DataSource: Send + Sync {
    /// Source class served by this connector.
    fn id(&self) -> SourceClass;

    /// Human readable connector name.
    fn name(&self) -> &'static str;

    fn pagination(&self) -> Pagination;

    /// Fetches raw bars, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if:
    /// - The symbol or interval is not supported by the source
    /// - The transport fails or the upstream answers with an error status
    /// - The payload cannot be parsed into bars
    fn fetch<'a>(
        &'a self,
        req: FetchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawBar>, SourceError>> + Send + 'a>>;
}
