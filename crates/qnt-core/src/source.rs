use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Closed set of source classes a symbol request may name.
///
/// The class decides which connector serves a symbol and whether its raw
/// history needs continuity adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceClass {
    /// Equity-exchange style (TSETMC): batch download, vendor adjustment inputs.
    #[serde(alias = "tsetmc")]
    Equity,
    /// Crypto-exchange style: paginated klines, already continuous.
    Crypto,
}

impl SourceClass {
    pub const ALL: [Self; 2] = [Self::Equity, Self::Crypto];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equity => "equity",
            Self::Crypto => "crypto",
        }
    }

    /// Whether raw bars from this class go through the price adjuster.
    pub const fn requires_adjustment(self) -> bool {
        matches!(self, Self::Equity)
    }
}

impl Display for SourceClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceClass {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "equity" | "tsetmc" => Ok(Self::Equity),
            "crypto" => Ok(Self::Crypto),
            other => Err(ValidationError::InvalidSourceClass {
                value: other.to_owned(),
            }),
        }
    }
}
