use std::path::PathBuf;

use qnt_core::OptimizeError;
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] qnt_core::ValidationError),

    #[error("invalid symbol file '{path}': {source}")]
    SymbolFile {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Optimize(#[from] OptimizeError),

    #[error("strict mode failed: {failed_count} symbol(s) could not be fetched")]
    StrictModeViolation { failed_count: usize },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::SymbolFile { .. } => 2,
            Self::Optimize(OptimizeError::Invalid(_)) => 2,
            Self::Optimize(OptimizeError::InsufficientData { .. }) => 3,
            Self::Optimize(OptimizeError::DidNotConverge { .. }) => 4,
            Self::StrictModeViolation { .. } => 5,
            Self::Serialization(_) => 10,
            Self::Io(_) => 10,
        }
    }
}
