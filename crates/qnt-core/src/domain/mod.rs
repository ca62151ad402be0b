//! # Domain Models
//!
//! Canonical domain types shared by the acquisition pipeline and the optimizer.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Validated instrument identifier |
//! | [`Instrument`] | Identifier tagged with its [`SourceClass`](crate::SourceClass) |
//! | [`SymbolSpec`] | Validated request, one [`SymbolGroup`] per source class |
//! | [`RawBar`] | Bar as delivered by a connector, with adjustment inputs |
//! | [`Bar`] | Adjusted OHLCV bar |
//! | [`BarSeries`] | Adjusted history of one instrument |
//! | [`Interval`] | Bar interval (1m, 5m, 15m, 1h, 1d) |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! All constructors validate their invariants:
//!
//! ```rust
//! use qnt_core::{SymbolSpec, ValidationError};
//!
//! let spec = SymbolSpec::from_entries(vec![("crypto", vec!["BTC/USDT", "ETH/USDT"])])?;
//! assert_eq!(spec.len(), 2);
//!
//! let err = SymbolSpec::from_entries(vec![("bonds", vec!["X"])]).unwrap_err();
//! assert!(matches!(err, ValidationError::InvalidSourceClass { .. }));
//! # Ok::<(), ValidationError>(())
//! ```

mod interval;
mod models;
mod request;
mod symbol;
mod timestamp;

pub use interval::Interval;
pub use models::{Bar, BarSeries, Instrument, RawBar};
pub use request::{SymbolGroup, SymbolSpec};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
