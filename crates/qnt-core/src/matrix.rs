//! Date-aligned price matrix and the return statistics derived from it.

use std::collections::{BTreeMap, BTreeSet};

use ndarray::{Array1, Array2};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::optimizer::OptimizeError;
use crate::{Instrument, UtcDateTime};

/// Symmetric N x N matrix of per-period return covariances.
pub type CovarianceMatrix = Array2<f64>;

/// Date-indexed table of adjusted closes, one column per instrument.
///
/// The row index is the union of every column's dates. A `None` cell means the
/// instrument has no observation on that date; nothing is ever filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceMatrix {
    index: Vec<UtcDateTime>,
    columns: Vec<Instrument>,
    values: Array2<Option<f64>>,
}

impl Default for PriceMatrix {
    fn default() -> Self {
        Self::empty()
    }
}

impl PriceMatrix {
    pub fn empty() -> Self {
        Self {
            index: Vec::new(),
            columns: Vec::new(),
            values: Array2::from_elem((0, 0), None),
        }
    }

    /// Outer-joins per-instrument `(date, close)` series on date.
    ///
    /// Columns keep the iteration order. A date repeated within one series
    /// keeps its last value.
    pub fn outer_join<I>(series: I) -> Self
    where
        I: IntoIterator<Item = (Instrument, Vec<(UtcDateTime, f64)>)>,
    {
        let series = series.into_iter().collect::<Vec<_>>();

        let index = series
            .iter()
            .flat_map(|(_, points)| points.iter().map(|(ts, _)| *ts))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        let row_of = index
            .iter()
            .enumerate()
            .map(|(row, ts)| (*ts, row))
            .collect::<BTreeMap<_, _>>();

        let mut values = Array2::from_elem((index.len(), series.len()), None);
        let mut columns = Vec::with_capacity(series.len());
        for (col, (instrument, points)) in series.into_iter().enumerate() {
            for (ts, close) in points {
                if let Some(row) = row_of.get(&ts) {
                    values[[*row, col]] = Some(close);
                }
            }
            columns.push(instrument);
        }

        Self {
            index,
            columns,
            values,
        }
    }

    pub fn index(&self) -> &[UtcDateTime] {
        &self.index
    }

    pub fn columns(&self) -> &[Instrument] {
        &self.columns
    }

    pub fn tickers(&self) -> Vec<&str> {
        self.columns.iter().map(Instrument::ticker).collect()
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values.get([row, col]).copied().flatten()
    }

    pub fn column_position(&self, instrument: &Instrument) -> Option<usize> {
        self.columns.iter().position(|column| column == instrument)
    }

    /// Cells of one column, aligned with [`PriceMatrix::index`].
    pub fn column(&self, col: usize) -> Vec<Option<f64>> {
        self.values.column(col).to_vec()
    }

    pub fn returns(&self) -> ReturnsMatrix {
        ReturnsMatrix::from_prices(self)
    }
}

impl Serialize for PriceMatrix {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let rows = self
            .values
            .rows()
            .into_iter()
            .map(|row| row.to_vec())
            .collect::<Vec<_>>();

        let mut state = serializer.serialize_struct("PriceMatrix", 3)?;
        state.serialize_field("index", &self.index)?;
        state.serialize_field("columns", &self.tickers())?;
        state.serialize_field("rows", &rows)?;
        state.end()
    }
}

/// Simple per-period returns of a [`PriceMatrix`], one row shorter.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnsMatrix {
    index: Vec<UtcDateTime>,
    columns: Vec<Instrument>,
    values: Array2<Option<f64>>,
}

impl ReturnsMatrix {
    /// `r_t = (p_t - p_last) / p_last`, where `p_last` is the column's last
    /// observed price before row `t`. A return spans any gap in between; it is
    /// missing when `p_t` is missing, when nothing was observed earlier, or
    /// when `p_last` is zero.
    pub fn from_prices(prices: &PriceMatrix) -> Self {
        let rows = prices.n_rows().saturating_sub(1);
        let cols = prices.n_cols();

        let mut values = Array2::from_elem((rows, cols), None);
        for col in 0..cols {
            let mut last = prices.get(0, col);
            for row in 0..rows {
                let Some(current) = prices.get(row + 1, col) else {
                    continue;
                };
                values[[row, col]] = match last {
                    Some(previous) if previous != 0.0 => Some((current - previous) / previous),
                    _ => None,
                };
                last = Some(current);
            }
        }

        Self {
            index: prices.index.iter().skip(1).copied().collect(),
            columns: prices.columns.clone(),
            values,
        }
    }

    pub fn index(&self) -> &[UtcDateTime] {
        &self.index
    }

    pub fn columns(&self) -> &[Instrument] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values.get([row, col]).copied().flatten()
    }

    /// Rows where both columns have a return.
    fn joint(&self, i: usize, j: usize) -> Vec<(f64, f64)> {
        (0..self.n_rows())
            .filter_map(|row| Some((self.get(row, i)?, self.get(row, j)?)))
            .collect()
    }

    pub fn statistics(&self) -> Result<ReturnStatistics, OptimizeError> {
        ReturnStatistics::from_returns(self)
    }
}

/// Per-period mean returns and pairwise-complete sample covariance.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStatistics {
    pub mean: Array1<f64>,
    pub covariance: CovarianceMatrix,
    /// Jointly observed periods per pair.
    pub observations: Array2<usize>,
}

impl ReturnStatistics {
    /// Means use each column's own returns; each covariance entry uses only
    /// the periods both columns observed, centred on the means of that
    /// overlap, with an `n - 1` denominator.
    ///
    /// # Errors
    ///
    /// [`OptimizeError::InsufficientData`] when there are no columns or any
    /// pair (a column with itself included) shares fewer than two returns.
    pub fn from_returns(returns: &ReturnsMatrix) -> Result<Self, OptimizeError> {
        let n = returns.n_cols();
        if n == 0 {
            return Err(OptimizeError::InsufficientData {
                reason: String::from("no symbols with price data"),
            });
        }

        let mut mean = Array1::zeros(n);
        for col in 0..n {
            let observed = (0..returns.n_rows())
                .filter_map(|row| returns.get(row, col))
                .collect::<Vec<_>>();
            if observed.len() < 2 {
                return Err(OptimizeError::InsufficientData {
                    reason: format!(
                        "{} has {} return observation(s), need at least 2",
                        returns.columns[col],
                        observed.len()
                    ),
                });
            }
            mean[col] = observed.iter().sum::<f64>() / observed.len() as f64;
        }

        let mut covariance = Array2::zeros((n, n));
        let mut observations = Array2::zeros((n, n));
        for i in 0..n {
            for j in i..n {
                let pairs = returns.joint(i, j);
                if pairs.len() < 2 {
                    return Err(OptimizeError::InsufficientData {
                        reason: format!(
                            "{} and {} overlap on {} return observation(s), need at least 2",
                            returns.columns[i],
                            returns.columns[j],
                            pairs.len()
                        ),
                    });
                }

                let count = pairs.len() as f64;
                let mean_i = pairs.iter().map(|(a, _)| a).sum::<f64>() / count;
                let mean_j = pairs.iter().map(|(_, b)| b).sum::<f64>() / count;
                let value = pairs
                    .iter()
                    .map(|(a, b)| (a - mean_i) * (b - mean_j))
                    .sum::<f64>()
                    / (count - 1.0);

                covariance[[i, j]] = value;
                covariance[[j, i]] = value;
                observations[[i, j]] = pairs.len();
                observations[[j, i]] = pairs.len();
            }
        }

        Ok(Self {
            mean,
            covariance,
            observations,
        })
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }
}
