//! # qnt Core
//!
//! Market-data acquisition and long-only portfolio optimization.
//!
//! ## Overview
//!
//! - **Domain models** for symbols, source classes, bars and symbol requests
//! - **Connector contract** with TSETMC (equity) and Binance (crypto) adapters
//! - **Price adjustment** removing corporate-action gaps from equity histories
//! - **Aggregation** of many instruments into one date-aligned price matrix
//! - **Optimization** of minimum-variance and maximum-Sharpe portfolios
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | TSETMC and Binance connectors |
//! | [`adjust`] | Continuity back-adjustment |
//! | [`aggregator`] | Concurrent fetch, failure isolation, outer-join merge |
//! | [`allocation`] | Weights to currency amounts |
//! | [`data_source`] | Connector trait and request/error types |
//! | [`domain`] | Domain models |
//! | [`error`] | Validation and umbrella errors |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`matrix`] | Price matrix, returns and covariance |
//! | [`optimizer`] | GMV / MSR solver |
//! | [`registry`] | Connector registry and builder |
//! | [`retry`] | Connector retry policy |
//! | [`source`] | Source classes |
//!
//! ## Pipeline
//!
//! ```text
//! SymbolSpec
//!     │
//!     ▼
//! ┌──────────────────────┐     ┌────────────────┐
//! │ MarketDataAggregator │────▶│ SourceRegistry │──▶ TSETMC / Binance
//! └──────────┬───────────┘     └────────────────┘
//!            │  PriceAdjuster (equity only)
//!            ▼
//!      PriceMatrix ──▶ PortfolioOptimizer ──▶ AllocationComputer
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use qnt_core::{
//!     AggregatorConfig, MarketDataAggregator, OptimizationRequest, PortfolioOptimizer,
//!     SourceRegistryBuilder, SymbolSpec,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let spec = SymbolSpec::from_entries(vec![
//!         ("tsetmc", vec!["فولاد", "وبصادر"]),
//!         ("crypto", vec!["BTC/USDT"]),
//!     ])?;
//!
//!     let registry = Arc::new(SourceRegistryBuilder::new().with_env().build()?);
//!     let aggregator = MarketDataAggregator::new(registry, AggregatorConfig::default());
//!     let (prices, failed) = aggregator.fetch_all(&spec).await;
//!     for failure in &failed {
//!         eprintln!("skipped {}: {}", failure.ticker, failure.reason);
//!     }
//!
//!     let request = OptimizationRequest::new(0.2, "msr".parse()?, 1_000.0)?;
//!     let result = PortfolioOptimizer::default().optimize(&prices, &request)?;
//!     for allocation in &result.allocations {
//!         println!("{} {:.2} {:?}", allocation.ticker, allocation.weight, allocation.amount);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Acquisition is partial-success: every failed instrument is returned as a
//! [`FailedSymbol`] and the rest are merged. Optimization is all-or-nothing:
//!
//! ```rust
//! use qnt_core::OptimizeError;
//!
//! fn exit_code(error: &OptimizeError) -> u8 {
//!     match error {
//!         OptimizeError::InsufficientData { .. } => 3,
//!         OptimizeError::DidNotConverge { .. } => 4,
//!         OptimizeError::Invalid(_) => 2,
//!     }
//! }
//! # assert_eq!(exit_code(&OptimizeError::InsufficientData { reason: String::new() }), 3);
//! ```

pub mod adapters;
pub mod adjust;
pub mod aggregator;
pub mod allocation;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod matrix;
pub mod optimizer;
pub mod registry;
pub mod retry;
pub mod source;

// Adapter implementations
pub use adapters::{BinanceAdapter, TsetmcAdapter};

// Adjustment
pub use adjust::{AdjustError, PriceAdjuster};

// Aggregation
pub use aggregator::{
    AggregatorConfig, FailedSymbol, FetchFailure, FetchReport, MarketDataAggregator,
};

// Allocation
pub use allocation::{Allocation, AllocationComputer};

// Data source trait and types
pub use data_source::{DataSource, FetchRequest, Pagination, SourceError, SourceErrorKind};

// Domain models
pub use domain::{
    Bar, BarSeries, Instrument, Interval, RawBar, Symbol, SymbolGroup, SymbolSpec, UtcDateTime,
};

// Error types
pub use error::{CoreError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse, ReqwestHttpClient,
};

// Matrices and statistics
pub use matrix::{CovarianceMatrix, PriceMatrix, ReturnStatistics, ReturnsMatrix};

// Optimization
pub use optimizer::{
    Method, OptimizationRequest, OptimizationResult, OptimizeError, OptimizerConfig,
    PortfolioOptimizer, PortfolioStats, Solution, TRADING_DAYS,
};

// Registry
pub use registry::{SourceRegistry, SourceRegistryBuilder, SourceSnapshot};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Source classes
pub use source::SourceClass;
