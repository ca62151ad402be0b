use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::adapters::execute_with_retry;
use crate::data_source::{DataSource, FetchRequest, Pagination, SourceError};
use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient};
use crate::retry::RetryConfig;
use crate::{Interval, RawBar, SourceClass, Symbol, UtcDateTime};

pub const DEFAULT_BASE_URL: &str = "https://cdn.tsetmc.com";

const SOURCE: &str = "tsetmc";

/// Tehran Stock Exchange connector.
///
/// Batch source: one call resolves the ticker to its instrument code and
/// downloads the complete daily history, including the vendor-adjusted close
/// and the prior close the price adjuster needs.
#[derive(Clone)]
pub struct TsetmcAdapter {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    retry: RetryConfig,
}

impl Default for TsetmcAdapter {
    fn default() -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()))
    }
}

impl TsetmcAdapter {
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

    async fn get(&self, url: String, req: &FetchRequest) -> Result<String, SourceError> {
        let request = HttpRequest::get(url)
            .with_header("accept", "application/json")
            .with_timeout(req.timeout);
        let response =
            execute_with_retry(self.http_client.as_ref(), request, &self.retry, SOURCE).await?;
        Ok(response.body)
    }

    async fn resolve_instrument_code(&self, req: &FetchRequest) -> Result<String, SourceError> {
        let url = format!(
            "{}/api/Instrument/GetInstrumentSearch/{}",
            self.base_url,
            urlencoding::encode(req.symbol.as_str())
        );
        let body = self.get(url, req).await?;
        let payload: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| SourceError::internal(format!("failed to parse tsetmc search: {e}")))?;

        let wanted = normalize_ticker(req.symbol.as_str());
        payload
            .instrument_search
            .into_iter()
            .find(|entry| normalize_ticker(&entry.ticker) == wanted)
            .map(|entry| entry.ins_code)
            .ok_or_else(|| {
                SourceError::not_found(format!("tsetmc has no instrument '{}'", req.symbol))
            })
    }

    async fn fetch_history(&self, req: FetchRequest) -> Result<Vec<RawBar>, SourceError> {
        if req.interval != Interval::OneDay {
            return Err(SourceError::invalid_request(format!(
                "tsetmc only serves daily bars, got '{}'",
                req.interval
            )));
        }

        let ins_code = self.resolve_instrument_code(&req).await?;
        debug!(symbol = %req.symbol, ins_code = %ins_code, "resolved tsetmc instrument");

        let url = format!(
            "{}/api/ClosingPrice/GetClosingPriceDailyList/{}/0",
            self.base_url,
            urlencoding::encode(&ins_code)
        );
        let body = self.get(url, &req).await?;
        let bars = parse_daily_history(&body, &req.symbol)?;
        debug!(symbol = %req.symbol, bars = bars.len(), "downloaded tsetmc history");
        Ok(bars)
    }
}

impl DataSource for TsetmcAdapter {
    fn id(&self) -> SourceClass {
        SourceClass::Equity
    }

    fn name(&self) -> &'static str {
        SOURCE
    }

    fn pagination(&self) -> Pagination {
        Pagination::Batch
    }

    fn fetch<'a>(
        &'a self,
        req: FetchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawBar>, SourceError>> + Send + 'a>> {
        Box::pin(self.fetch_history(req))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    instrument_search: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    #[serde(rename = "insCode")]
    ins_code: String,
    #[serde(rename = "lVal18AFC")]
    ticker: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DailyHistoryResponse {
    #[serde(default)]
    closing_price_daily: Vec<DailyRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DailyRow {
    d_even: u32,
    price_first: f64,
    price_max: f64,
    price_min: f64,
    p_dr_cot_val: f64,
    p_closing: Option<f64>,
    price_yesterday: Option<f64>,
    #[serde(rename = "qTotTran5J")]
    volume: f64,
}

/// Parses the closing-price list (newest first) into oldest-first raw bars.
fn parse_daily_history(body: &str, symbol: &Symbol) -> Result<Vec<RawBar>, SourceError> {
    let payload: DailyHistoryResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::internal(format!("failed to parse tsetmc history: {e}")))?;

    let mut bars = payload
        .closing_price_daily
        .into_iter()
        .map(|row| {
            let ts = parse_deven(row.d_even)?;
            RawBar::new(
                ts,
                row.price_first,
                row.price_max,
                row.price_min,
                row.p_dr_cot_val,
                row.volume,
            )
            .map(|bar| bar.with_adjustment_inputs(row.p_closing, row.price_yesterday))
            .map_err(|e| SourceError::internal(format!("invalid tsetmc bar for {symbol}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    bars.sort_by_key(|bar| bar.ts);
    Ok(bars)
}

/// `yyyymmdd` trading date to midnight UTC.
fn parse_deven(value: u32) -> Result<UtcDateTime, SourceError> {
    let year = (value / 10_000) as i32;
    let month = ((value / 100) % 100) as u8;
    let day = (value % 100) as u8;
    UtcDateTime::from_ymd(year, month, day)
        .map_err(|_| SourceError::internal(format!("invalid tsetmc trading date {value}")))
}

/// Folds Arabic yeh/kaf into their Persian forms; the exchange mixes both.
fn normalize_ticker(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|ch| match ch {
            'ي' => 'ی',
            'ك' => 'ک',
            other => other,
        })
        .collect()
}
