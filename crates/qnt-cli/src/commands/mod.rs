mod optimize;
mod sources;

use std::time::Duration;

use qnt_core::{SourceRegistryBuilder, ValidationError};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub use optimize::{OptimizeReport, ReportStats};
pub use sources::SourcesReport;

/// Result of one command, ready to render.
#[derive(Debug)]
pub enum CommandOutput {
    Optimize(OptimizeReport),
    Sources(SourcesReport),
}

impl CommandOutput {
    /// Symbols that were requested but could not be fetched.
    pub fn failed_count(&self) -> usize {
        match self {
            Self::Optimize(report) => report.failed.len(),
            Self::Sources(_) => 0,
        }
    }
}

pub async fn run(cli: &Cli) -> Result<CommandOutput, CliError> {
    let builder = registry_builder(cli)?;

    match &cli.command {
        Command::Optimize(args) => optimize::run(args, builder)
            .await
            .map(CommandOutput::Optimize),
        Command::Sources => sources::run(builder).map(CommandOutput::Sources),
    }
}

/// Environment first, explicit flags on top.
fn registry_builder(cli: &Cli) -> Result<SourceRegistryBuilder, CliError> {
    let mut builder = SourceRegistryBuilder::new().with_env();

    if let Some(proxy) = &cli.proxy {
        builder = builder.with_proxy(proxy.clone());
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        if timeout_ms == 0 {
            return Err(ValidationError::NonPositiveValue {
                field: "timeout_ms",
            }
            .into());
        }
        builder = builder.with_timeout(Duration::from_millis(timeout_ms));
    }

    Ok(builder)
}
