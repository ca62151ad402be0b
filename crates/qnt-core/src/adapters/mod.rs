//! Concrete connectors.
//!
//! | Connector | Class | Pagination |
//! |-----------|-------|------------|
//! | [`TsetmcAdapter`] | [`SourceClass::Equity`](crate::SourceClass::Equity) | batch |
//! | [`BinanceAdapter`] | [`SourceClass::Crypto`](crate::SourceClass::Crypto) | paged, 1000 bars |

mod binance;
mod tsetmc;

pub use binance::BinanceAdapter;
pub use tsetmc::TsetmcAdapter;

use tracing::{debug, warn};

use crate::data_source::SourceError;
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::retry::RetryConfig;

/// Executes `request`, retrying transport failures and retryable statuses.
///
/// Returns the first successful response, or the error describing the last
/// attempt once the retry budget is spent.
pub(crate) async fn execute_with_retry(
    client: &dyn HttpClient,
    request: HttpRequest,
    retry: &RetryConfig,
    source: &'static str,
) -> Result<HttpResponse, SourceError> {
    let mut attempt = 0_u32;

    loop {
        let outcome = client.execute(request.clone()).await;

        let retry_allowed = match &outcome {
            Ok(response) if response.is_success() => false,
            Ok(response) => retry.should_retry_status(response.status),
            Err(error) => retry.should_retry_error(error),
        };

        if !retry_allowed || !retry.can_retry(attempt) {
            return match outcome {
                Ok(response) if response.is_success() => Ok(response),
                Ok(response) => Err(status_error(source, response.status)),
                Err(error) => Err(SourceError::unavailable(format!(
                    "{source} transport error: {}",
                    error.message()
                ))),
            };
        }

        let delay = retry.delay_for_attempt(attempt);
        match &outcome {
            Ok(response) => warn!(
                source,
                status = response.status,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "retrying after error status"
            ),
            Err(error) => warn!(
                source,
                error = %error,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "retrying after transport error"
            ),
        }

        tokio::time::sleep(delay).await;
        attempt += 1;
        debug!(source, attempt, url = %request.url, "retry attempt");
    }
}

/// Maps a non-2xx upstream status to a connector error.
pub(crate) fn status_error(source: &'static str, status: u16) -> SourceError {
    let message = format!("{source} returned status {status}");
    match status {
        404 => SourceError::not_found(message),
        400 => SourceError::invalid_request(message),
        418 | 429 => SourceError::rate_limited(message),
        _ => SourceError::unavailable(message),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use crate::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse};

    /// Replays canned responses in order and records every request URL.
    #[derive(Default)]
    pub(crate) struct ScriptedHttpClient {
        responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
        urls: Mutex<Vec<String>>,
    }

    impl ScriptedHttpClient {
        pub(crate) fn new(responses: Vec<Result<HttpResponse, HttpError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                urls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn urls(&self) -> Vec<String> {
            self.urls.lock().expect("lock").clone()
        }
    }

    impl HttpClient for ScriptedHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            Box::pin(async move {
                self.urls.lock().expect("lock").push(request.url);
                self.responses
                    .lock()
                    .expect("lock")
                    .pop_front()
                    .unwrap_or_else(|| Err(HttpError::other("no scripted response left")))
            })
        }
    }

    pub(crate) fn status(status: u16) -> Result<HttpResponse, HttpError> {
        Ok(HttpResponse {
            status,
            body: String::new(),
        })
    }
}
