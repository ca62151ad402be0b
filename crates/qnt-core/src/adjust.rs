//! Back-adjustment of equity histories for corporate actions.
//!
//! Equity-style sources report, for every trading day, the raw close, a
//! vendor-adjusted close and the close of the previous day as the exchange
//! restated it after any split or dividend. Whenever the restated prior close
//! of day `t+1` differs from the adjusted close of day `t`, a corporate action
//! happened in between and every bar up to `t` must be scaled by their ratio.
//!
//! The scale factor of a bar is the product of all ratios from the most recent
//! bar back to it, so the most recent bar is never changed and each older bar
//! accumulates every correction that happened after it.

use thiserror::Error;

use crate::{Bar, RawBar, UtcDateTime};

/// Malformed adjustment input. Fails the affected symbol only.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AdjustError {
    #[error("bar {index} ({ts}) has no vendor-adjusted close")]
    MissingAdjustedClose { index: usize, ts: UtcDateTime },
    #[error("bar {index} ({ts}) has no prior close")]
    MissingPriorClose { index: usize, ts: UtcDateTime },
    #[error("bar {index} ({ts}) has non-positive {field}: {value}")]
    NonPositiveInput {
        index: usize,
        ts: UtcDateTime,
        field: &'static str,
        value: f64,
    },
    #[error("bar {index} ({current}) does not come after {previous}")]
    NonMonotonicDates {
        index: usize,
        previous: UtcDateTime,
        current: UtcDateTime,
    },
}

/// Continuity adjuster for batch (equity-style) histories.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceAdjuster;

impl PriceAdjuster {
    pub fn new() -> Self {
        Self
    }

    /// Scales OHLC by the continuity multiplier and divides volume by it.
    ///
    /// `raw` must be ordered oldest first with strictly increasing dates. The
    /// vendor-adjusted close is required on every bar but the newest, the prior
    /// close on every bar but the oldest. An empty input yields an empty output.
    pub fn adjust(&self, raw: &[RawBar]) -> Result<Vec<Bar>, AdjustError> {
        let multipliers = self.multipliers(raw)?;

        Ok(raw
            .iter()
            .zip(multipliers)
            .map(|(bar, multiplier)| Bar {
                ts: bar.ts,
                open: bar.open * multiplier,
                high: bar.high * multiplier,
                low: bar.low * multiplier,
                close: bar.close * multiplier,
                volume: bar.volume / multiplier,
            })
            .collect())
    }

    /// Per-bar continuity multipliers, aligned with `raw`.
    pub fn multipliers(&self, raw: &[RawBar]) -> Result<Vec<f64>, AdjustError> {
        for (index, pair) in raw.windows(2).enumerate() {
            if pair[1].ts <= pair[0].ts {
                return Err(AdjustError::NonMonotonicDates {
                    index: index + 1,
                    previous: pair[0].ts,
                    current: pair[1].ts,
                });
            }
        }

        let mut multipliers = vec![1.0; raw.len()];
        // newest bar anchors the series at 1.0
        for index in (0..raw.len().saturating_sub(1)).rev() {
            let bar = &raw[index];
            let next = &raw[index + 1];

            let adj_close = bar.adj_close.ok_or(AdjustError::MissingAdjustedClose {
                index,
                ts: bar.ts,
            })?;
            let prior_close = next.prior_close.ok_or(AdjustError::MissingPriorClose {
                index: index + 1,
                ts: next.ts,
            })?;
            require_positive(index, bar.ts, "adj_close", adj_close)?;
            require_positive(index + 1, next.ts, "prior_close", prior_close)?;

            multipliers[index] = multipliers[index + 1] * (prior_close / adj_close);
        }

        Ok(multipliers)
    }
}

fn require_positive(
    index: usize,
    ts: UtcDateTime,
    field: &'static str,
    value: f64,
) -> Result<(), AdjustError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AdjustError::NonPositiveInput {
            index,
            ts,
            field,
            value,
        })
    }
}
