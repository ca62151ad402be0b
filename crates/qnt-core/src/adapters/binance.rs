use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::adapters::execute_with_retry;
use crate::data_source::{DataSource, FetchRequest, Pagination, SourceError};
use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient};
use crate::retry::RetryConfig;
use crate::{RawBar, SourceClass, Symbol, UtcDateTime};

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Upper bound Binance accepts for `limit` on the klines endpoint.
pub const MAX_PAGE_SIZE: usize = 1000;

const SOURCE: &str = "binance";

/// Binance spot klines connector.
///
/// Paged source: each call returns at most [`MAX_PAGE_SIZE`] bars starting at
/// the request cursor. Klines are already continuous and carry no adjustment
/// inputs.
#[derive(Clone)]
pub struct BinanceAdapter {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    retry: RetryConfig,
}

impl Default for BinanceAdapter {
    fn default() -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()))
    }
}

impl BinanceAdapter {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            base_url: DEFAULT_BASE_URL.to_owned(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn klines_url(&self, req: &FetchRequest) -> String {
        let mut url = format!(
            "{}/api/v3/klines?symbol={}&interval={}",
            self.base_url,
            urlencoding::encode(&market_symbol(&req.symbol)),
            req.interval.as_str()
        );
        if let Some(since) = req.since {
            url.push_str(&format!("&startTime={}", since.unix_millis()));
        }
        let limit = req.limit.unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE);
        url.push_str(&format!("&limit={limit}"));
        url
    }

    async fn fetch_page(&self, req: FetchRequest) -> Result<Vec<RawBar>, SourceError> {
        let request = HttpRequest::get(self.klines_url(&req)).with_timeout(req.timeout);
        let response =
            execute_with_retry(self.http_client.as_ref(), request, &self.retry, SOURCE).await?;
        let bars = parse_klines(&response.body)?;
        debug!(
            symbol = %req.symbol,
            since = ?req.since.map(UtcDateTime::unix_millis),
            bars = bars.len(),
            "fetched binance page"
        );
        Ok(bars)
    }
}

impl DataSource for BinanceAdapter {
    fn id(&self) -> SourceClass {
        SourceClass::Crypto
    }

    fn name(&self) -> &'static str {
        SOURCE
    }

    fn pagination(&self) -> Pagination {
        Pagination::Paged {
            max_page_size: MAX_PAGE_SIZE,
        }
    }

    fn fetch<'a>(
        &'a self,
        req: FetchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawBar>, SourceError>> + Send + 'a>> {
        Box::pin(self.fetch_page(req))
    }
}

/// `BTC/USDT` becomes `BTCUSDT`; bare market symbols pass through.
fn market_symbol(symbol: &Symbol) -> String {
    match symbol.pair() {
        Some((base, quote)) => format!("{base}{quote}"),
        None => symbol.as_str().to_owned(),
    }
}

fn parse_klines(body: &str) -> Result<Vec<RawBar>, SourceError> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(body)
        .map_err(|e| SourceError::internal(format!("failed to parse binance klines: {e}")))?;

    rows.iter()
        .map(|row| {
            if row.len() < 6 {
                return Err(SourceError::internal(format!(
                    "binance kline has {} fields, expected at least 6",
                    row.len()
                )));
            }
            let open_time = row[0]
                .as_i64()
                .ok_or_else(|| SourceError::internal("binance kline open time is not an integer"))?;
            let ts = UtcDateTime::from_unix_millis(open_time)
                .map_err(|e| SourceError::internal(format!("invalid binance open time: {e}")))?;

            RawBar::new(
                ts,
                decimal(&row[1], "open")?,
                decimal(&row[2], "high")?,
                decimal(&row[3], "low")?,
                decimal(&row[4], "close")?,
                decimal(&row[5], "volume")?,
            )
            .map_err(|e| SourceError::internal(format!("invalid binance kline: {e}")))
        })
        .collect()
}

/// Binance encodes prices as decimal strings.
fn decimal(value: &Value, field: &str) -> Result<f64, SourceError> {
    let parsed = match value {
        Value::String(raw) => raw.parse::<f64>().ok(),
        Value::Number(number) => number.as_f64(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        SourceError::internal(format!("binance kline {field} is not a number: {value}"))
    })
}
