//! CLI argument definitions for qnt.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `optimize` | Fetch prices for a symbol file and allocate a portfolio |
//! | `sources` | List registered connectors |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `table` | Output format (table, json) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Fail when any symbol could not be fetched |
//! | `--proxy` | `QNT_PROXY_URL` | Proxy for every connector |
//! | `--timeout-ms` | `QNT_TIMEOUT_MS` or 30000 | Per-call connector timeout |
//! | `--verbose` | `false` | Debug logging on stderr |
//!
//! # Examples
//!
//! ```bash
//! # Minimum-variance weights
//! qnt optimize --file symbols.yaml
//!
//! # Maximum-Sharpe allocation of a budget, as JSON
//! qnt optimize --file symbols.yaml --method msr --budget 1000000 --format json --pretty
//!
//! # Route connectors through a local SOCKS proxy
//! qnt optimize --file symbols.yaml --proxy socks5://localhost:10808
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use qnt_core::Method;

/// qnt - market data aggregation and long-only portfolio optimization
#[derive(Debug, Parser)]
#[command(
    name = "qnt",
    author,
    version,
    about = "Multi-source price aggregation and portfolio optimization",
    long_about = "qnt fetches daily price histories from TSETMC (equities) and Binance \
(crypto), merges them by date and computes a long-only portfolio:\n\
\n\
  • gmv: global minimum variance\n\
  • msr: maximum Sharpe ratio\n\
\n\
Use 'qnt <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat symbols that could not be fetched as a failure (exit code 5).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Proxy url for every connector (http://, https:// or socks5://).
    #[arg(long, global = true)]
    pub proxy: Option<String>,

    /// Per-call connector timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Log debug output to stderr.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned text for terminal display.
    Table,
    /// Single JSON object.
    Json,
}

/// Optimization objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    /// Global minimum variance.
    Gmv,
    /// Maximum Sharpe ratio.
    Msr,
}

impl From<MethodArg> for Method {
    fn from(value: MethodArg) -> Self {
        match value {
            MethodArg::Gmv => Method::Gmv,
            MethodArg::Msr => Method::Msr,
        }
    }
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch, merge and optimize the symbols listed in a YAML file.
    ///
    /// The file maps a source class to its identifiers:
    ///
    ///   tsetmc: [فولاد, وبصادر]
    ///   crypto: [BTC/USDT, ETH/USDT]
    ///
    /// # Examples
    ///
    ///   qnt optimize --file symbols.yaml
    ///   qnt optimize --file symbols.yaml --method msr --risk-free-rate 0.25
    Optimize(OptimizeArgs),

    /// List registered source classes and their connectors.
    Sources,
}

/// Arguments for the `optimize` command.
#[derive(Debug, Args)]
pub struct OptimizeArgs {
    /// YAML file mapping source classes to identifiers.
    #[arg(long, short = 'f')]
    pub file: PathBuf,

    /// Optimization objective.
    #[arg(long, value_enum, default_value_t = MethodArg::Gmv)]
    pub method: MethodArg,

    /// Annual risk-free rate used by the Sharpe ratio.
    #[arg(long, default_value_t = 0.2, allow_negative_numbers = true)]
    pub risk_free_rate: f64,

    /// Amount to allocate; 0 reports weights only.
    #[arg(long, default_value_t = 0.0)]
    pub budget: f64,

    /// Bar interval.
    ///
    /// Supported intervals: 1m, 5m, 15m, 1h, 1d (default). TSETMC only
    /// serves daily bars.
    #[arg(long, default_value = "1d")]
    pub interval: String,

    /// Page size requested from paginated sources.
    #[arg(long, default_value_t = 1000)]
    pub page_size: usize,

    /// First timestamp requested from paginated sources (RFC3339, UTC).
    #[arg(long)]
    pub since: Option<String>,
}
