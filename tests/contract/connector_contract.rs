//! Contract every connector must honour, checked against each adapter with a
//! canned HTTP transport.

#[path = "../support/mod.rs"]
mod support;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use qnt_core::{
    BinanceAdapter, DataSource, FetchRequest, HttpClient, HttpError, HttpRequest, HttpResponse,
    Interval, Pagination, RetryConfig, SourceClass, SourceErrorKind, SourceRegistry,
    SourceRegistryBuilder, Symbol, TsetmcAdapter,
};
use support::{FakeSource, Script};

/// Answers every request with the same response.
struct CannedHttpClient(Result<HttpResponse, HttpError>);

impl HttpClient for CannedHttpClient {
    fn execute<'a>(
        &'a self,
        _request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let outcome = self.0.clone();
        Box::pin(async move { outcome })
    }
}

struct ConnectorCase {
    class: SourceClass,
    name: &'static str,
    pagination: Pagination,
    symbol: &'static str,
    make: fn(Arc<dyn HttpClient>) -> Arc<dyn DataSource>,
}

fn tsetmc(client: Arc<dyn HttpClient>) -> Arc<dyn DataSource> {
    Arc::new(TsetmcAdapter::with_http_client(client).with_retry(RetryConfig::no_retry()))
}

fn binance(client: Arc<dyn HttpClient>) -> Arc<dyn DataSource> {
    Arc::new(BinanceAdapter::with_http_client(client).with_retry(RetryConfig::no_retry()))
}

fn connector_cases() -> Vec<ConnectorCase> {
    vec![
        ConnectorCase {
            class: SourceClass::Equity,
            name: "tsetmc",
            pagination: Pagination::Batch,
            symbol: "فولاد",
            make: tsetmc,
        },
        ConnectorCase {
            class: SourceClass::Crypto,
            name: "binance",
            pagination: Pagination::Paged {
                max_page_size: 1000,
            },
            symbol: "BTC/USDT",
            make: binance,
        },
    ]
}

fn answering(case: &ConnectorCase, outcome: Result<HttpResponse, HttpError>) -> Arc<dyn DataSource> {
    (case.make)(Arc::new(CannedHttpClient(outcome)))
}

fn request(case: &ConnectorCase) -> FetchRequest {
    FetchRequest::new(
        Symbol::parse(case.symbol).expect("valid symbol"),
        Interval::OneDay,
        Duration::from_secs(5),
    )
}

#[test]
fn connectors_describe_themselves() {
    for case in connector_cases() {
        let source = answering(&case, Ok(HttpResponse::ok_json("[]")));

        assert_eq!(source.id(), case.class, "connector '{}': class", case.name);
        assert_eq!(source.name(), case.name);
        assert_eq!(
            source.pagination(),
            case.pagination,
            "connector '{}': pagination",
            case.name
        );
    }
}

#[tokio::test]
async fn upstream_statuses_map_to_the_same_error_kinds() {
    let table = [
        (404, SourceErrorKind::NotFound),
        (400, SourceErrorKind::InvalidRequest),
        (429, SourceErrorKind::RateLimited),
        (418, SourceErrorKind::RateLimited),
        (503, SourceErrorKind::Unavailable),
    ];

    for case in connector_cases() {
        for (status, expected) in table {
            let source = answering(
                &case,
                Ok(HttpResponse {
                    status,
                    body: String::new(),
                }),
            );

            let error = source
                .fetch(request(&case))
                .await
                .expect_err("non-2xx must fail");
            assert_eq!(
                error.kind(),
                expected,
                "connector '{}' status {status}",
                case.name
            );
        }
    }
}

#[tokio::test]
async fn transport_errors_are_unavailable_and_retryable() {
    for case in connector_cases() {
        let source = answering(&case, Err(HttpError::connect("connection refused")));

        let error = source
            .fetch(request(&case))
            .await
            .expect_err("transport failure");

        assert_eq!(error.kind(), SourceErrorKind::Unavailable, "{}", case.name);
        assert!(error.retryable(), "{}", case.name);
        assert!(error.message().contains("connection refused"));
    }
}

#[tokio::test]
async fn unparseable_bodies_are_internal_errors() {
    for case in connector_cases() {
        let source = answering(&case, Ok(HttpResponse::ok_json("<html>maintenance</html>")));

        let error = source
            .fetch(request(&case))
            .await
            .expect_err("garbage body");

        assert_eq!(error.kind(), SourceErrorKind::Internal, "{}", case.name);
        assert!(!error.retryable());
    }
}

#[test]
fn default_registry_serves_every_source_class() {
    let registry = SourceRegistryBuilder::new().build().expect("registry");

    for class in SourceClass::ALL {
        let source = registry
            .get(class)
            .unwrap_or_else(|| panic!("no connector for '{class}'"));
        assert_eq!(source.id(), class);
    }
    let names = registry
        .snapshot()
        .iter()
        .map(|snapshot| snapshot.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["tsetmc", "binance"]);
}

#[test]
fn later_connector_replaces_earlier_one_for_the_same_class() {
    let first: Arc<dyn DataSource> = Arc::new(BinanceAdapter::default());
    let second: Arc<dyn DataSource> = Arc::new(
        FakeSource::paged(SourceClass::Crypto, 10).with("BTC/USDT", Script::Panic),
    );

    let registry = SourceRegistry::new(vec![first, second]);

    assert_eq!(registry.len(), 1);
    let snapshot = registry.snapshot();
    assert_eq!(snapshot[0].name, "fake");
    assert_eq!(
        snapshot[0].pagination,
        Pagination::Paged { max_page_size: 10 }
    );
}

#[test]
fn snapshot_serializes_for_the_sources_command() {
    let registry = SourceRegistryBuilder::new()
        .with_binance_enabled(false)
        .build()
        .expect("registry");

    let json = serde_json::to_value(registry.snapshot()).expect("json");

    assert_eq!(
        json,
        serde_json::json!([
            { "class": "equity", "name": "tsetmc", "pagination": { "mode": "batch" } }
        ])
    );
}
