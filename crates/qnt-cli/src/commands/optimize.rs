use std::sync::Arc;
use std::time::Duration;

use qnt_core::{
    AggregatorConfig, Allocation, FailedSymbol, Interval, MarketDataAggregator, Method,
    OptimizationRequest, OptimizationResult, PortfolioOptimizer, PortfolioStats, PriceMatrix,
    SourceRegistryBuilder, UtcDateTime,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::cli::OptimizeArgs;
use crate::error::CliError;
use crate::symbols;

/// Output of `qnt optimize`.
#[derive(Debug, Serialize)]
pub struct OptimizeReport {
    pub portfolio: Vec<Allocation>,
    pub failed: Vec<FailedSymbol>,
    pub stats: ReportStats,
}

#[derive(Debug, Serialize)]
pub struct ReportStats {
    pub method: Method,
    pub iterations: usize,
    /// Merged price columns.
    pub symbols: usize,
    /// Rows of the merged price matrix.
    pub observations: usize,
    #[serde(flatten)]
    pub portfolio: PortfolioStats,
}

impl OptimizeReport {
    fn new(result: OptimizationResult, failed: Vec<FailedSymbol>, prices: &PriceMatrix) -> Self {
        Self {
            portfolio: result.allocations,
            failed,
            stats: ReportStats {
                method: result.method,
                iterations: result.iterations,
                symbols: prices.n_cols(),
                observations: prices.n_rows(),
                portfolio: result.stats,
            },
        }
    }
}

pub async fn run(
    args: &OptimizeArgs,
    builder: SourceRegistryBuilder,
) -> Result<OptimizeReport, CliError> {
    let spec = symbols::load(&args.file)?;
    let request = OptimizationRequest::new(args.risk_free_rate, args.method.into(), args.budget)?;
    let config = aggregator_config(args, builder.timeout())?;
    debug!(symbols = spec.len(), ?config, "loaded symbol file");

    let registry = Arc::new(builder.build()?);
    let aggregator = MarketDataAggregator::new(registry, config);
    let (prices, failed) = aggregator.fetch_all(&spec).await;

    let result = match PortfolioOptimizer::default().optimize(&prices, &request) {
        Ok(result) => result,
        Err(error) => {
            // the report is never rendered on failure, so surface skipped symbols here
            for failure in &failed {
                eprintln!(
                    "warning: skipped {} ({}): {}",
                    failure.ticker, failure.code, failure.reason
                );
            }
            return Err(error.into());
        }
    };

    info!(
        retained = result.allocations.len(),
        failed = failed.len(),
        "optimize command finished"
    );
    Ok(OptimizeReport::new(result, failed, &prices))
}

fn aggregator_config(
    args: &OptimizeArgs,
    timeout: Option<Duration>,
) -> Result<AggregatorConfig, CliError> {
    let mut config = AggregatorConfig::default()
        .with_interval(args.interval.parse::<Interval>()?)
        .with_page_size(args.page_size);

    if let Some(timeout) = timeout {
        config = config.with_request_timeout(timeout);
    }
    if let Some(since) = &args.since {
        config = config.with_history_start(UtcDateTime::parse(since)?);
    }

    Ok(config)
}
