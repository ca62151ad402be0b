//! Concurrent multi-source acquisition and date-aligned merge.
//!
//! One tokio task is spawned per requested instrument. All tasks live in a
//! single [`JoinSet`], so awaiting the aggregation waits for every task and
//! dropping it aborts every task still in flight. A failing instrument is
//! recorded in the report and never affects its siblings.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::adjust::{AdjustError, PriceAdjuster};
use crate::data_source::{DataSource, FetchRequest, Pagination, SourceError, SourceErrorKind};
use crate::matrix::PriceMatrix;
use crate::registry::SourceRegistry;
use crate::{Bar, BarSeries, Instrument, Interval, RawBar, SourceClass, SymbolSpec, UtcDateTime};

/// Per-request acquisition settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorConfig {
    pub interval: Interval,
    /// Budget of every single connector call.
    pub request_timeout: Duration,
    /// Requested page size for paged sources, capped by the source maximum.
    pub page_size: usize,
    /// First cursor of paged sources; the unix epoch when unset.
    pub history_start: Option<UtcDateTime>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            interval: Interval::OneDay,
            request_timeout: Duration::from_secs(30),
            page_size: 1000,
            history_start: None,
        }
    }
}

impl AggregatorConfig {
    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_history_start(mut self, start: UtcDateTime) -> Self {
        self.history_start = Some(start);
        self
    }
}

/// Why one instrument could not be fetched.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchFailure {
    #[error("no data: {reason}")]
    DataUnavailable { reason: String },

    #[error("connector failure: {0}")]
    Connector(#[from] SourceError),

    #[error("connector call timed out after {timeout_ms} ms")]
    TimedOut { timeout_ms: u64 },

    #[error("no connector registered for source class '{0}'")]
    NotRegistered(SourceClass),

    #[error("paged source did not advance past cursor {cursor}")]
    StalledCursor { cursor: UtcDateTime },

    #[error("fetch task ended abnormally: {0}")]
    TaskAborted(String),

    #[error("malformed series: {0}")]
    MalformedSeries(#[from] AdjustError),

    #[error("malformed series: bar at {current} does not come after {previous}")]
    OutOfOrder {
        previous: UtcDateTime,
        current: UtcDateTime,
    },
}

impl FetchFailure {
    /// Stable failure category.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DataUnavailable { .. } => "data_unavailable",
            Self::MalformedSeries(_) | Self::OutOfOrder { .. } => "malformed_series",
            Self::Connector(_)
            | Self::TimedOut { .. }
            | Self::NotRegistered(_)
            | Self::StalledCursor { .. }
            | Self::TaskAborted(_) => "connector_failure",
        }
    }
}

/// An instrument excluded from the merge, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedSymbol {
    pub ticker: String,
    pub source: SourceClass,
    pub code: &'static str,
    pub reason: String,
    #[serde(skip)]
    pub failure: FetchFailure,
}

impl FailedSymbol {
    pub fn new(instrument: &Instrument, failure: FetchFailure) -> Self {
        Self {
            ticker: instrument.ticker().to_owned(),
            source: instrument.source,
            code: failure.code(),
            reason: failure.to_string(),
            failure,
        }
    }
}

/// Full outcome of one aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchReport {
    pub prices: PriceMatrix,
    pub failed: Vec<FailedSymbol>,
    /// Adjusted histories of the instruments that succeeded, in request order.
    #[serde(skip)]
    pub series: Vec<BarSeries>,
}

/// Fetches every instrument of a [`SymbolSpec`] and merges the closes.
#[derive(Clone)]
pub struct MarketDataAggregator {
    registry: Arc<SourceRegistry>,
    config: AggregatorConfig,
}

impl MarketDataAggregator {
    pub fn new(registry: Arc<SourceRegistry>, config: AggregatorConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Merged price matrix plus the instruments that failed.
    pub async fn fetch_all(&self, spec: &SymbolSpec) -> (PriceMatrix, Vec<FailedSymbol>) {
        let report = self.fetch_report(spec).await;
        (report.prices, report.failed)
    }

    /// Like [`fetch_all`](Self::fetch_all), keeping the adjusted series.
    ///
    /// Cancel-safe: dropping the returned future aborts all fetch tasks.
    pub async fn fetch_report(&self, spec: &SymbolSpec) -> FetchReport {
        let instruments = spec.instruments();
        let mut tasks = JoinSet::new();
        let mut positions = HashMap::new();

        for (position, instrument) in instruments.iter().cloned().enumerate() {
            let source = self.registry.get(instrument.source);
            let config = self.config.clone();
            let handle = tasks.spawn(async move {
                let outcome = match source {
                    Some(source) => fetch_series(source, &instrument, &config).await,
                    None => Err(FetchFailure::NotRegistered(instrument.source)),
                };
                (position, outcome)
            });
            positions.insert(handle.id(), position);
        }
        debug!(tasks = instruments.len(), "spawned fetch tasks");

        let mut outcomes: Vec<Option<Result<BarSeries, FetchFailure>>> =
            vec![None; instruments.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, outcome)) => outcomes[position] = Some(outcome),
                Err(error) => {
                    let Some(position) = positions.get(&error.id()).copied() else {
                        continue;
                    };
                    let reason = if error.is_panic() {
                        panic_message(error.into_panic())
                    } else {
                        String::from("task cancelled")
                    };
                    outcomes[position] = Some(Err(FetchFailure::TaskAborted(reason)));
                }
            }
        }

        let mut series = Vec::new();
        let mut failed = Vec::new();
        for (instrument, outcome) in instruments.iter().zip(outcomes) {
            let outcome = outcome.unwrap_or_else(|| {
                Err(FetchFailure::TaskAborted(String::from("task result missing")))
            });
            match outcome {
                Ok(adjusted) => series.push(adjusted),
                Err(failure) => {
                    warn!(
                        instrument = %instrument,
                        code = failure.code(),
                        error = %failure,
                        "excluding symbol from merge"
                    );
                    failed.push(FailedSymbol::new(instrument, failure));
                }
            }
        }

        let prices = PriceMatrix::outer_join(
            series
                .iter()
                .map(|adjusted| (adjusted.instrument.clone(), adjusted.closes())),
        );
        info!(
            requested = instruments.len(),
            merged = prices.n_cols(),
            failed = failed.len(),
            rows = prices.n_rows(),
            "aggregation finished"
        );

        FetchReport {
            prices,
            failed,
            series,
        }
    }
}

async fn fetch_series(
    source: Arc<dyn DataSource>,
    instrument: &Instrument,
    config: &AggregatorConfig,
) -> Result<BarSeries, FetchFailure> {
    let raw = match source.pagination() {
        Pagination::Batch => {
            let request = FetchRequest::new(
                instrument.symbol.clone(),
                config.interval,
                config.request_timeout,
            );
            call_with_timeout(source.as_ref(), request, config.request_timeout).await?
        }
        Pagination::Paged { max_page_size } => {
            fetch_pages(source.as_ref(), instrument, config, max_page_size).await?
        }
    };

    if raw.is_empty() {
        return Err(FetchFailure::DataUnavailable {
            reason: format!("{} returned no bars", source.name()),
        });
    }

    let bars = if instrument.source.requires_adjustment() {
        PriceAdjuster.adjust(&raw)?
    } else {
        ensure_ascending(&raw)?;
        raw.into_iter().map(RawBar::into_bar).collect::<Vec<Bar>>()
    };

    debug!(instrument = %instrument, bars = bars.len(), "series ready");
    Ok(BarSeries::new(instrument.clone(), config.interval, bars))
}

async fn fetch_pages(
    source: &dyn DataSource,
    instrument: &Instrument,
    config: &AggregatorConfig,
    max_page_size: usize,
) -> Result<Vec<RawBar>, FetchFailure> {
    let limit = config.page_size.min(max_page_size).max(1);
    let mut cursor = config.history_start.unwrap_or(UtcDateTime::UNIX_EPOCH);
    let mut collected: Vec<RawBar> = Vec::new();

    loop {
        let request = FetchRequest::new(
            instrument.symbol.clone(),
            config.interval,
            config.request_timeout,
        )
        .with_cursor(cursor, limit)?;
        let page = call_with_timeout(source, request, config.request_timeout).await?;

        let Some(last) = page.last().map(|bar| bar.ts) else {
            break;
        };
        if last < cursor {
            return Err(FetchFailure::StalledCursor { cursor });
        }
        if let (Some(previous), Some(first)) = (collected.last(), page.first()) {
            if first.ts <= previous.ts {
                return Err(FetchFailure::OutOfOrder {
                    previous: previous.ts,
                    current: first.ts,
                });
            }
        }

        debug!(
            instrument = %instrument,
            cursor = cursor.unix_millis(),
            bars = page.len(),
            "received page"
        );
        collected.extend(page);
        cursor = last.plus_millis(1);
    }

    Ok(collected)
}

async fn call_with_timeout(
    source: &dyn DataSource,
    request: FetchRequest,
    timeout: Duration,
) -> Result<Vec<RawBar>, FetchFailure> {
    match tokio::time::timeout(timeout, source.fetch(request)).await {
        Ok(Ok(bars)) => Ok(bars),
        Ok(Err(error)) if error.kind() == SourceErrorKind::NotFound => {
            Err(FetchFailure::DataUnavailable {
                reason: error.message().to_owned(),
            })
        }
        Ok(Err(error)) => Err(FetchFailure::Connector(error)),
        Err(_) => Err(FetchFailure::TimedOut {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

fn ensure_ascending(bars: &[RawBar]) -> Result<(), FetchFailure> {
    match bars.windows(2).find(|pair| pair[1].ts <= pair[0].ts) {
        Some(pair) => Err(FetchFailure::OutOfOrder {
            previous: pair[0].ts,
            current: pair[1].ts,
        }),
        None => Ok(()),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("task panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("task panicked: {message}")
    } else {
        String::from("task panicked")
    }
}
