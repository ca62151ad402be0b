use qnt_core::{SourceRegistryBuilder, SourceSnapshot};
use serde::Serialize;

use crate::error::CliError;

/// Output of `qnt sources`.
#[derive(Debug, Serialize)]
pub struct SourcesReport {
    pub sources: Vec<SourceSnapshot>,
    pub proxy: Option<String>,
}

pub fn run(builder: SourceRegistryBuilder) -> Result<SourcesReport, CliError> {
    let proxy = builder.redacted_proxy_url();
    let registry = builder.build()?;

    Ok(SourcesReport {
        sources: registry.snapshot(),
        proxy,
    })
}
