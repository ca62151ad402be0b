use std::fmt::Write as _;

use crate::cli::OutputFormat;
use crate::commands::{CommandOutput, OptimizeReport, SourcesReport};
use crate::error::CliError;

pub fn render(output: &CommandOutput, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    let text = match format {
        OutputFormat::Json => to_json(output, pretty)?,
        OutputFormat::Table => match output {
            CommandOutput::Optimize(report) => optimize_table(report),
            CommandOutput::Sources(report) => sources_table(report),
        },
    };
    println!("{text}");
    Ok(())
}

fn to_json(output: &CommandOutput, pretty: bool) -> Result<String, serde_json::Error> {
    match (output, pretty) {
        (CommandOutput::Optimize(report), true) => serde_json::to_string_pretty(report),
        (CommandOutput::Optimize(report), false) => serde_json::to_string(report),
        (CommandOutput::Sources(report), true) => serde_json::to_string_pretty(report),
        (CommandOutput::Sources(report), false) => serde_json::to_string(report),
    }
}

fn optimize_table(report: &OptimizeReport) -> String {
    let stats = &report.stats;
    let mut out = String::new();

    let _ = writeln!(out, "method      : {}", stats.method);
    let _ = writeln!(out, "iterations  : {}", stats.iterations);
    let _ = writeln!(
        out,
        "data        : {} symbols x {} dates",
        stats.symbols, stats.observations
    );
    let _ = writeln!(out, "exp. return : {:.4}", stats.portfolio.expected_return);
    let _ = writeln!(out, "volatility  : {:.4}", stats.portfolio.volatility);
    match stats.portfolio.sharpe_ratio {
        Some(sharpe) => {
            let _ = writeln!(out, "sharpe      : {sharpe:.4}");
        }
        None => {
            let _ = writeln!(out, "sharpe      : n/a");
        }
    }

    let width = report
        .portfolio
        .iter()
        .map(|allocation| allocation.ticker.chars().count())
        .max()
        .unwrap_or(0)
        .max("ticker".len());
    let with_amounts = report.portfolio.iter().any(|a| a.amount.is_some());

    let _ = writeln!(out);
    if with_amounts {
        let _ = writeln!(out, "{:<width$}  {:>6}  {:>16}", "ticker", "weight", "amount");
    } else {
        let _ = writeln!(out, "{:<width$}  {:>6}", "ticker", "weight");
    }
    for allocation in &report.portfolio {
        let _ = write!(out, "{:<width$}  {:>6.2}", allocation.ticker, allocation.weight);
        if let Some(amount) = allocation.amount {
            let _ = write!(out, "  {amount:>16.2}");
        }
        let _ = writeln!(out);
    }

    if !report.failed.is_empty() {
        let _ = writeln!(out, "\nwarnings:");
        for failure in &report.failed {
            let _ = writeln!(
                out,
                "  - {} [{}] {}: {}",
                failure.ticker, failure.source, failure.code, failure.reason
            );
        }
    }

    out.trim_end().to_owned()
}

fn sources_table(report: &SourcesReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<8}  {:<8}  pagination", "class", "name");
    for source in &report.sources {
        let pagination = match source.pagination {
            qnt_core::Pagination::Batch => String::from("batch"),
            qnt_core::Pagination::Paged { max_page_size } => {
                format!("paged (max {max_page_size})")
            }
        };
        let _ = writeln!(
            out,
            "{:<8}  {:<8}  {pagination}",
            source.class.as_str(),
            source.name
        );
    }
    if let Some(proxy) = &report.proxy {
        let _ = writeln!(out, "\nproxy: {proxy}");
    }
    out.trim_end().to_owned()
}
