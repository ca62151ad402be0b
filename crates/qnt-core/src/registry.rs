use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::adapters::{BinanceAdapter, TsetmcAdapter};
use crate::data_source::{DataSource, Pagination};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::retry::RetryConfig;
use crate::{SourceClass, ValidationError};

/// Connector registry keyed by source class.
///
/// Built once at startup and shared read-only by every aggregation.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<SourceClass, Arc<dyn DataSource>>,
}

/// Registered connector description used by the `sources` CLI command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceSnapshot {
    pub class: SourceClass,
    pub name: &'static str,
    pub pagination: Pagination,
}

impl SourceRegistry {
    /// Registers each connector under its own [`DataSource::id`]; a later
    /// connector for the same class replaces an earlier one.
    pub fn new(sources: Vec<Arc<dyn DataSource>>) -> Self {
        let sources = sources
            .into_iter()
            .map(|source| (source.id(), source))
            .collect();
        Self { sources }
    }

    pub fn get(&self, class: SourceClass) -> Option<Arc<dyn DataSource>> {
        self.sources.get(&class).cloned()
    }

    pub fn contains(&self, class: SourceClass) -> bool {
        self.sources.contains_key(&class)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Registered connectors in [`SourceClass::ALL`] order.
    pub fn snapshot(&self) -> Vec<SourceSnapshot> {
        SourceClass::ALL
            .iter()
            .filter_map(|class| {
                self.sources.get(class).map(|source| SourceSnapshot {
                    class: *class,
                    name: source.name(),
                    pagination: source.pagination(),
                })
            })
            .collect()
    }
}

/// Builder for a [`SourceRegistry`] backed by real HTTP connectors.
///
/// # Environment Variables
///
/// | Variable | Effect |
/// |----------|--------|
/// | `QNT_PROXY_URL` | proxy for every connector (`http://`, `https://`, `socks5://`) |
/// | `QNT_TSETMC_BASE_URL` | TSETMC API base url |
/// | `QNT_BINANCE_BASE_URL` | Binance API base url |
/// | `QNT_TIMEOUT_MS` | default per-call timeout, read by [`SourceRegistryBuilder::timeout`] |
///
/// Values set explicitly on the builder win over the environment.
///
/// # Example
///
/// ```rust,no_run
/// use qnt_core::{SourceClass, SourceRegistryBuilder};
///
/// let registry = SourceRegistryBuilder::new()
///     .with_env()
///     .with_proxy("socks5://localhost:10808")
///     .build()?;
/// assert!(registry.contains(SourceClass::Crypto));
/// # Ok::<(), qnt_core::ValidationError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SourceRegistryBuilder {
    proxy_url: Option<String>,
    tsetmc_base_url: Option<String>,
    binance_base_url: Option<String>,
    timeout: Option<Duration>,
    retry: RetryConfig,
    enable_tsetmc: bool,
    enable_binance: bool,
    env_proxy_url: Option<String>,
    env_tsetmc_base_url: Option<String>,
    env_binance_base_url: Option<String>,
    env_timeout: Option<Duration>,
}

impl Default for SourceRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceRegistryBuilder {
    pub fn new() -> Self {
        Self {
            proxy_url: None,
            tsetmc_base_url: None,
            binance_base_url: None,
            timeout: None,
            retry: RetryConfig::default(),
            enable_tsetmc: true,
            enable_binance: true,
            env_proxy_url: None,
            env_tsetmc_base_url: None,
            env_binance_base_url: None,
            env_timeout: None,
        }
    }

    /// Reads `QNT_*` variables as fallbacks for unset options.
    pub fn with_env(mut self) -> Self {
        let non_empty = |name: &str| env::var(name).ok().filter(|value| !value.trim().is_empty());
        self.env_proxy_url = non_empty("QNT_PROXY_URL");
        self.env_tsetmc_base_url = non_empty("QNT_TSETMC_BASE_URL");
        self.env_binance_base_url = non_empty("QNT_BINANCE_BASE_URL");
        self.env_timeout = non_empty("QNT_TIMEOUT_MS")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|millis| *millis > 0)
            .map(Duration::from_millis);
        self
    }

    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    pub fn with_tsetmc_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.tsetmc_base_url = Some(base_url.into());
        self
    }

    pub fn with_binance_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.binance_base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_tsetmc_enabled(mut self, enabled: bool) -> Self {
        self.enable_tsetmc = enabled;
        self
    }

    pub fn with_binance_enabled(mut self, enabled: bool) -> Self {
        self.enable_binance = enabled;
        self
    }

    /// Effective per-call timeout: explicit, then `QNT_TIMEOUT_MS`.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.or(self.env_timeout)
    }

    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url
            .as_deref()
            .or(self.env_proxy_url.as_deref())
    }

    /// Proxy url safe to print: credentials are masked.
    pub fn redacted_proxy_url(&self) -> Option<String> {
        self.proxy_url().map(redact_userinfo)
    }

    /// Builds the registry. Fails only on an unusable proxy url.
    pub fn build(self) -> Result<SourceRegistry, ValidationError> {
        let http_client: Arc<dyn HttpClient> = match self.proxy_url() {
            Some(proxy_url) => Arc::new(ReqwestHttpClient::with_proxy(proxy_url)?),
            None => Arc::new(ReqwestHttpClient::new()),
        };
        debug!(proxy = ?self.redacted_proxy_url(), "building source registry");

        let mut sources: Vec<Arc<dyn DataSource>> = Vec::new();

        if self.enable_tsetmc {
            let mut adapter =
                TsetmcAdapter::with_http_client(http_client.clone()).with_retry(self.retry.clone());
            if let Some(base_url) = self.tsetmc_base_url.or(self.env_tsetmc_base_url) {
                adapter = adapter.with_base_url(base_url);
            }
            sources.push(Arc::new(adapter));
        }

        if self.enable_binance {
            let mut adapter =
                BinanceAdapter::with_http_client(http_client).with_retry(self.retry);
            if let Some(base_url) = self.binance_base_url.or(self.env_binance_base_url) {
                adapter = adapter.with_base_url(base_url);
            }
            sources.push(Arc::new(adapter));
        }

        Ok(SourceRegistry::new(sources))
    }
}

fn redact_userinfo(raw: &str) -> String {
    match reqwest::Url::parse(raw) {
        Ok(mut url) if !url.username().is_empty() || url.password().is_some() => {
            if url.set_username("***").is_err() || url.set_password(None).is_err() {
                return String::from("<redacted>");
            }
            url.to_string()
        }
        Ok(_) => raw.to_owned(),
        Err(_) => String::from("<redacted>"),
    }
}
