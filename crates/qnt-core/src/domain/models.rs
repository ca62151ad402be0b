use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{Interval, SourceClass, Symbol, UtcDateTime, ValidationError};

/// An identifier tagged with the source class that serves it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: Symbol,
    pub source: SourceClass,
}

impl Instrument {
    pub fn new(symbol: Symbol, source: SourceClass) -> Self {
        Self { symbol, source }
    }

    pub fn ticker(&self) -> &str {
        self.symbol.as_str()
    }
}

impl Display for Instrument {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source, self.symbol)
    }
}

/// Bar exactly as a connector delivered it.
///
/// `adj_close` and `prior_close` are only populated by equity-style sources and
/// only feed the continuity adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub ts: UtcDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub adj_close: Option<f64>,
    pub prior_close: Option<f64>,
}

impl RawBar {
    pub fn new(
        ts: UtcDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;
        validate_non_negative("volume", volume)?;

        Ok(Self {
            ts,
            open,
            high,
            low,
            close,
            volume,
            adj_close: None,
            prior_close: None,
        })
    }

    /// Attaches the vendor-adjusted close and the prior raw close. Either may
    /// be absent; the adjuster decides whether that is fatal.
    pub fn with_adjustment_inputs(
        mut self,
        adj_close: impl Into<Option<f64>>,
        prior_close: impl Into<Option<f64>>,
    ) -> Self {
        self.adj_close = adj_close.into();
        self.prior_close = prior_close.into();
        self
    }

    /// Drops the adjustment-only fields.
    pub fn into_bar(self) -> Bar {
        Bar {
            ts: self.ts,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

/// OHLCV bar after continuity adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ts: UtcDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Ordered-by-date adjusted history of one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    pub instrument: Instrument,
    pub interval: Interval,
    pub bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(instrument: Instrument, interval: Interval, bars: Vec<Bar>) -> Self {
        Self {
            instrument,
            interval,
            bars,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// `(timestamp, close)` pairs feeding the price matrix.
    pub fn closes(&self) -> Vec<(UtcDateTime, f64)> {
        self.bars.iter().map(|bar| (bar.ts, bar.close)).collect()
    }
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}
