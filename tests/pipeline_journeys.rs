//! End-to-end journeys: symbol request to allocation, through the real
//! TSETMC and Binance connectors talking to an in-memory exchange.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use qnt_core::{
    AggregatorConfig, BinanceAdapter, DataSource, HttpClient, HttpError, HttpRequest,
    HttpResponse, MarketDataAggregator, Method, OptimizationRequest, PortfolioOptimizer,
    RetryConfig, SourceRegistry, SymbolSpec, TsetmcAdapter,
};
use serde_json::{json, Value};

const DAY_MS: i64 = 86_400_000;
/// 2024-01-01T00:00:00Z
const START_MS: i64 = 1_704_067_200_000;

/// Serves the TSETMC search/history endpoints and Binance klines from fixed
/// tables. Binance honours `startTime` and `limit`.
struct FakeExchange {
    equities: HashMap<&'static str, (&'static str, Vec<f64>)>,
    klines: HashMap<&'static str, Vec<f64>>,
    unavailable_responses: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl FakeExchange {
    fn new() -> Self {
        let mut equities = HashMap::new();
        equities.insert("فولاد", ("46348559193224090", vec![1000.0, 1030.0, 1010.0, 1060.0]));
        equities.insert("وبصادر", ("7745894403636165", vec![300.0, 294.0, 305.0, 310.0]));

        let mut klines = HashMap::new();
        klines.insert("BTCUSDT", vec![42000.0, 43500.0, 42800.0, 44100.0, 45000.0]);
        klines.insert("ETHUSDT", vec![2200.0, 2250.0, 2300.0, 2210.0, 2290.0]);

        Self {
            equities,
            klines,
            unavailable_responses: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    /// The next `count` Binance requests answer 503.
    fn with_binance_outage(self, count: usize) -> Self {
        self.unavailable_responses.store(count, Ordering::SeqCst);
        self
    }

    fn urls_containing(&self, fragment: &str) -> Vec<String> {
        self.urls
            .lock()
            .expect("lock")
            .iter()
            .filter(|url| url.contains(fragment))
            .cloned()
            .collect()
    }

    fn route(&self, url: &str) -> HttpResponse {
        if url.contains("/api/Instrument/GetInstrumentSearch/") {
            let entries = self
                .equities
                .iter()
                .map(|(ticker, (code, _))| json!({ "insCode": code, "lVal18AFC": ticker }))
                .collect::<Vec<_>>();
            return HttpResponse::ok_json(json!({ "instrumentSearch": entries }).to_string());
        }

        if url.contains("/api/ClosingPrice/GetClosingPriceDailyList/") {
            let code = url.rsplit('/').nth(1).unwrap_or_default();
            let closes = self
                .equities
                .values()
                .find(|(candidate, _)| *candidate == code)
                .map(|(_, closes)| closes.clone())
                .unwrap_or_default();
            return HttpResponse::ok_json(daily_history(&closes).to_string());
        }

        if url.contains("/api/v3/klines") {
            if self
                .unavailable_responses
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok()
            {
                return HttpResponse {
                    status: 503,
                    body: String::from("maintenance"),
                };
            }
            let symbol = query_param(url, "symbol").unwrap_or_default();
            let since = query_param(url, "startTime")
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(0);
            let limit = query_param(url, "limit")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(500);
            let closes = self.klines.get(symbol.as_str()).cloned().unwrap_or_default();
            return HttpResponse::ok_json(kline_page(&closes, since, limit).to_string());
        }

        HttpResponse {
            status: 404,
            body: String::new(),
        }
    }
}

impl HttpClient for FakeExchange {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            self.urls.lock().expect("lock").push(request.url.clone());
            Ok(self.route(&request.url))
        })
    }
}

fn query_param(url: &str, key: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == key)
        .map(|(_, value)| value.to_owned())
}

/// Newest-first daily rows without corporate actions.
fn daily_history(closes: &[f64]) -> Value {
    let rows = closes
        .iter()
        .enumerate()
        .map(|(offset, close)| {
            let yesterday = if offset == 0 { *close } else { closes[offset - 1] };
            json!({
                "dEven": 20240101 + offset as u32,
                "priceFirst": yesterday,
                "priceMax": close.max(yesterday),
                "priceMin": close.min(yesterday),
                "pDrCotVal": close,
                "pClosing": close,
                "priceYesterday": yesterday,
                "qTotTran5J": 10_000.0,
            })
        })
        .rev()
        .collect::<Vec<_>>();
    json!({ "closingPriceDaily": rows })
}

fn kline_page(closes: &[f64], since: i64, limit: usize) -> Value {
    let rows = closes
        .iter()
        .enumerate()
        .map(|(offset, close)| (START_MS + offset as i64 * DAY_MS, close))
        .filter(|(open_time, _)| *open_time >= since)
        .take(limit)
        .map(|(open_time, close)| {
            let price = format!("{close:.2}");
            json!([open_time, price, price, price, price, "12.5", open_time + DAY_MS - 1])
        })
        .collect::<Vec<_>>();
    Value::Array(rows)
}

fn pipeline(exchange: Arc<FakeExchange>, config: AggregatorConfig) -> MarketDataAggregator {
    let quick_retry = RetryConfig::fixed(Duration::from_millis(1), 2);
    let sources: Vec<Arc<dyn DataSource>> = vec![
        Arc::new(
            TsetmcAdapter::with_http_client(exchange.clone())
                .with_base_url("http://tsetmc.test")
                .with_retry(quick_retry.clone()),
        ),
        Arc::new(
            BinanceAdapter::with_http_client(exchange)
                .with_base_url("http://binance.test")
                .with_retry(quick_retry),
        ),
    ];
    MarketDataAggregator::new(Arc::new(SourceRegistry::new(sources)), config)
}

#[tokio::test]
async fn mixed_request_is_fetched_merged_and_allocated() {
    // Given: Two TSETMC equities and one crypto pair
    let exchange = Arc::new(FakeExchange::new());
    let aggregator = pipeline(exchange.clone(), AggregatorConfig::default().with_page_size(2));
    let spec = SymbolSpec::from_entries(vec![
        ("tsetmc", vec!["فولاد", "وبصادر"]),
        ("crypto", vec!["BTC/USDT"]),
    ])
    .expect("valid spec");

    // When: Fetching and optimizing with a budget
    let (prices, failed) = aggregator.fetch_all(&spec).await;
    let request = OptimizationRequest::new(0.2, Method::Gmv, 1_000.0).expect("valid request");
    let result = PortfolioOptimizer::default()
        .optimize(&prices, &request)
        .expect("optimizes");

    // Then: Every instrument is merged over the union of dates
    assert!(failed.is_empty(), "{failed:?}");
    assert_eq!(prices.tickers(), vec!["فولاد", "وبصادر", "BTC/USDT"]);
    assert_eq!(prices.n_rows(), 5);
    assert_eq!(prices.get(4, 0), None);
    assert_eq!(prices.get(4, 2), Some(45000.0));

    // Then: Binance was walked page by page until an empty page
    let kline_calls = exchange.urls_containing("/api/v3/klines");
    assert_eq!(kline_calls.len(), 4);
    assert!(kline_calls[0].contains("startTime=0&limit=2"));

    // Then: Amounts follow the rounded weights
    assert!(!result.allocations.is_empty());
    assert!((result.total_weight() - 1.0).abs() <= 0.02);
    for allocation in &result.allocations {
        assert_eq!(allocation.amount, Some(allocation.weight * 1_000.0));
    }
}

#[tokio::test]
async fn unknown_equity_is_reported_and_the_rest_is_optimized() {
    // Given: One ticker TSETMC does not list
    let exchange = Arc::new(FakeExchange::new());
    let aggregator = pipeline(exchange, AggregatorConfig::default());
    let spec = SymbolSpec::from_entries(vec![
        ("tsetmc", vec!["ناموجود"]),
        ("crypto", vec!["BTC/USDT", "ETH/USDT"]),
    ])
    .expect("valid spec");

    // When
    let (prices, failed) = aggregator.fetch_all(&spec).await;
    let result = PortfolioOptimizer::default()
        .optimize(&prices, &OptimizationRequest::default())
        .expect("optimizes");

    // Then
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].ticker, "ناموجود");
    assert_eq!(failed[0].code, "data_unavailable");
    assert_eq!(prices.tickers(), vec!["BTC/USDT", "ETH/USDT"]);
    assert!(result
        .allocations
        .iter()
        .all(|a| a.ticker == "BTC/USDT" || a.ticker == "ETH/USDT"));
    assert!(result.allocations.iter().all(|a| a.amount.is_none()));
}

#[tokio::test]
async fn transient_exchange_outage_is_retried() {
    // Given: Binance answers 503 twice before recovering
    let exchange = Arc::new(FakeExchange::new().with_binance_outage(2));
    let aggregator = pipeline(exchange.clone(), AggregatorConfig::default());
    let spec = SymbolSpec::from_entries(vec![("crypto", vec!["ETH/USDT"])]).expect("valid spec");

    // When
    let (prices, failed) = aggregator.fetch_all(&spec).await;

    // Then: The retries are invisible to the caller
    assert!(failed.is_empty(), "{failed:?}");
    assert_eq!(prices.n_rows(), 5);
    assert_eq!(exchange.urls_containing("startTime=0&").len(), 3);
}

#[tokio::test]
async fn exhausted_retries_fail_only_the_crypto_symbols() {
    // Given: A Binance outage longer than the retry budget
    let exchange = Arc::new(FakeExchange::new().with_binance_outage(100));
    let aggregator = pipeline(exchange, AggregatorConfig::default());
    let spec = SymbolSpec::from_entries(vec![
        ("tsetmc", vec!["فولاد", "وبصادر"]),
        ("crypto", vec!["BTC/USDT"]),
    ])
    .expect("valid spec");

    // When
    let (prices, failed) = aggregator.fetch_all(&spec).await;
    let result = PortfolioOptimizer::default()
        .optimize(
            &prices,
            &OptimizationRequest::new(0.0, Method::Msr, 0.0).expect("valid request"),
        )
        .expect("optimizes");

    // Then
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].ticker, "BTC/USDT");
    assert_eq!(failed[0].code, "connector_failure");
    assert_eq!(prices.n_cols(), 2);
    assert!(result
        .allocations
        .iter()
        .all(|a| a.ticker == "فولاد" || a.ticker == "وبصادر"));
}

#[tokio::test]
async fn report_serializes_for_the_caller() {
    // Given
    let exchange = Arc::new(FakeExchange::new());
    let aggregator = pipeline(exchange, AggregatorConfig::default());
    let spec = SymbolSpec::from_entries(vec![("crypto", vec!["BTC/USDT", "XRP/USDT"])])
        .expect("valid spec");

    // When
    let report = aggregator.fetch_report(&spec).await;
    let json = serde_json::to_value(&report).expect("json");

    // Then
    assert_eq!(json["prices"]["columns"], json!(["BTC/USDT"]));
    assert_eq!(json["prices"]["index"].as_array().map(Vec::len), Some(5));
    assert_eq!(json["failed"][0]["ticker"], "XRP/USDT");
    assert_eq!(json["failed"][0]["code"], "data_unavailable");
    assert!(json.get("series").is_none());
}
