//! Long-only mean-variance portfolio optimizer.
//!
//! Weights live on the probability simplex (`sum w = 1`, `0 <= w <= 1`). Both
//! objectives are minimised by projected gradient descent starting from equal
//! weights; every iterate is projected back onto the simplex exactly.
//!
//! | Method | Objective |
//! |--------|-----------|
//! | [`Method::Gmv`] | annualised volatility `sqrt(w'Sw) * sqrt(252)` |
//! | [`Method::Msr`] | negative annualised Sharpe `-(252 w'mu - rf) / (sqrt(252) sqrt(w'Sw))` |
//!
//! Volatility is monotone in variance, so GMV descends on `w'Sw` directly with
//! an accelerated fixed step of `1 / L`, `L` bounding the curvature of `2S`.
//! MSR uses a backtracking line search.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::allocation::{Allocation, AllocationComputer};
use crate::matrix::{PriceMatrix, ReturnStatistics};
use crate::ValidationError;

/// Periods per year used to annualise daily statistics.
pub const TRADING_DAYS: f64 = 252.0;

/// Below this curvature bound the variance surface is treated as flat.
const FLAT_CURVATURE: f64 = 1e-18;

/// Sum-to-one tolerance checked on every solution.
const FEASIBILITY_TOLERANCE: f64 = 1e-6;

const MIN_LINE_SEARCH_STEP: f64 = 1e-24;

/// Largest unit-step projected-gradient residual accepted when the MSR line
/// search can no longer make progress.
const STALL_RESIDUAL: f64 = 1e-6;

/// Optimization objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Global minimum variance.
    #[default]
    Gmv,
    /// Maximum Sharpe ratio.
    Msr,
}

impl Method {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gmv => "gmv",
            Self::Msr => "msr",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gmv" => Ok(Self::Gmv),
            "msr" => Ok(Self::Msr),
            other => Err(ValidationError::InvalidMethod {
                value: other.to_owned(),
            }),
        }
    }
}

/// Whole-call optimization failure. No partial weights are ever returned.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptimizeError {
    #[error("insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("{method} optimization did not converge after {iterations} iterations: {reason}")]
    DidNotConverge {
        method: Method,
        iterations: usize,
        reason: String,
    },

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl OptimizeError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InsufficientData { .. } => "insufficient_data",
            Self::DidNotConverge { .. } => "optimization_did_not_converge",
            Self::Invalid(_) => "invalid_request",
        }
    }
}

/// Solver budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerConfig {
    pub max_iterations: usize,
    /// Largest weight change accepted as converged.
    pub tolerance: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100_000,
            tolerance: 1e-10,
        }
    }
}

impl OptimizerConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Caller-facing optimization parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationRequest {
    /// Annual risk-free rate.
    pub risk_free_rate: f64,
    pub method: Method,
    /// `0` reports percentages only.
    pub budget: f64,
}

impl Default for OptimizationRequest {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.2,
            method: Method::Gmv,
            budget: 0.0,
        }
    }
}

impl OptimizationRequest {
    pub fn new(risk_free_rate: f64, method: Method, budget: f64) -> Result<Self, ValidationError> {
        let request = Self {
            risk_free_rate,
            method,
            budget,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.risk_free_rate.is_finite() {
            return Err(ValidationError::NonFiniteValue {
                field: "risk_free_rate",
            });
        }
        if !self.budget.is_finite() {
            return Err(ValidationError::NonFiniteValue { field: "budget" });
        }
        if self.budget < 0.0 {
            return Err(ValidationError::NegativeValue { field: "budget" });
        }
        Ok(())
    }
}

/// Annualised statistics of the unrounded portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStats {
    pub expected_return: f64,
    pub volatility: f64,
    /// Absent when volatility is zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharpe_ratio: Option<f64>,
}

impl PortfolioStats {
    fn compute(stats: &ReturnStatistics, weights: &Array1<f64>, risk_free_rate: f64) -> Self {
        let expected_return = weights.dot(&stats.mean) * TRADING_DAYS;
        let variance = weights.dot(&stats.covariance.dot(weights)).max(0.0);
        let volatility = variance.sqrt() * TRADING_DAYS.sqrt();
        let sharpe_ratio =
            (volatility > 0.0).then(|| (expected_return - risk_free_rate) / volatility);
        Self {
            expected_return,
            volatility,
            sharpe_ratio,
        }
    }
}

/// Unrounded solver output, aligned with the price matrix columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub method: Method,
    pub tickers: Vec<String>,
    pub weights: Vec<f64>,
    pub iterations: usize,
    pub stats: PortfolioStats,
}

/// Final optimization artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub method: Method,
    pub allocations: Vec<Allocation>,
    pub stats: PortfolioStats,
    pub iterations: usize,
}

impl OptimizationResult {
    /// Sum of the reported (rounded, filtered) weights; may be below 1.
    pub fn total_weight(&self) -> f64 {
        self.allocations.iter().map(|allocation| allocation.weight).sum()
    }
}

/// Stateless optimizer; safe to reuse across calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortfolioOptimizer {
    config: OptimizerConfig,
}

impl PortfolioOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> OptimizerConfig {
        self.config
    }

    /// Solves, rounds to two decimals, drops non-positive weights and attaches
    /// amounts when `budget > 0`.
    pub fn optimize(
        &self,
        prices: &PriceMatrix,
        request: &OptimizationRequest,
    ) -> Result<OptimizationResult, OptimizeError> {
        request.validate()?;
        let solution = self.solve(prices, request.risk_free_rate, request.method)?;

        let retained = solution
            .tickers
            .iter()
            .zip(&solution.weights)
            .map(|(ticker, weight)| (ticker.clone(), round_weight(*weight)))
            .filter(|(_, weight)| *weight > 0.0)
            .collect::<Vec<_>>();

        let allocations = AllocationComputer::allocate(retained, request.budget)?;

        info!(
            method = %solution.method,
            assets = solution.tickers.len(),
            retained = allocations.len(),
            iterations = solution.iterations,
            "portfolio optimized"
        );

        Ok(OptimizationResult {
            method: solution.method,
            allocations,
            stats: solution.stats,
            iterations: solution.iterations,
        })
    }

    /// Pre-filter weights for every column of `prices`.
    pub fn solve(
        &self,
        prices: &PriceMatrix,
        risk_free_rate: f64,
        method: Method,
    ) -> Result<Solution, OptimizeError> {
        if !risk_free_rate.is_finite() {
            return Err(ValidationError::NonFiniteValue {
                field: "risk_free_rate",
            }
            .into());
        }

        let stats = prices.returns().statistics()?;
        let (weights, iterations) = self.solve_statistics(&stats, risk_free_rate, method)?;
        let portfolio = PortfolioStats::compute(&stats, &weights, risk_free_rate);

        Ok(Solution {
            method,
            tickers: prices.tickers().into_iter().map(str::to_owned).collect(),
            weights: weights.to_vec(),
            iterations,
            stats: portfolio,
        })
    }

    /// Solves directly on return statistics. Returns the weights and the
    /// number of iterations used.
    pub fn solve_statistics(
        &self,
        stats: &ReturnStatistics,
        risk_free_rate: f64,
        method: Method,
    ) -> Result<(Array1<f64>, usize), OptimizeError> {
        let n = stats.len();
        if n == 0 {
            return Err(OptimizeError::InsufficientData {
                reason: String::from("no symbols to optimize"),
            });
        }
        if n == 1 {
            return Ok((Array1::ones(1), 0));
        }

        let (weights, iterations) = match method {
            Method::Gmv => self.minimize_variance(stats)?,
            Method::Msr => self.maximize_sharpe(stats, risk_free_rate)?,
        };
        check_feasible(method, &weights, iterations)?;

        debug!(%method, iterations, weights = ?weights.to_vec(), "solver finished");
        Ok((weights, iterations))
    }

    fn minimize_variance(
        &self,
        stats: &ReturnStatistics,
    ) -> Result<(Array1<f64>, usize), OptimizeError> {
        let n = stats.len();
        let sigma = &stats.covariance;
        let mut x = equal_weights(n);

        let lipschitz = sigma
            .rows()
            .into_iter()
            .map(|row| row.iter().map(|value| 2.0 * value.abs()).sum::<f64>())
            .fold(0.0_f64, f64::max);
        if !lipschitz.is_finite() {
            return Err(not_converged(Method::Gmv, 0, "covariance is not finite"));
        }
        if lipschitz < FLAT_CURVATURE {
            return Ok((x, 0));
        }
        let step = 1.0 / lipschitz;
        let gradient = |w: &Array1<f64>| sigma.dot(w) * 2.0;

        let mut y = x.clone();
        let mut momentum = 1.0_f64;

        for iteration in 1..=self.config.max_iterations {
            let next = project_onto_simplex(&(&y - &(gradient(&y) * step)));

            let residual = &next - &project_onto_simplex(&(&next - &(gradient(&next) * step)));
            if max_abs(&residual) < self.config.tolerance {
                return Ok((next, iteration));
            }

            let delta = &next - &x;
            if (&y - &next).dot(&delta) > 0.0 {
                // momentum is pushing uphill, restart from the plain step
                momentum = 1.0;
                y = next.clone();
            } else {
                let next_momentum = (1.0 + (1.0 + 4.0 * momentum * momentum).sqrt()) / 2.0;
                y = &next + &(delta * ((momentum - 1.0) / next_momentum));
                momentum = next_momentum;
            }
            x = next;
        }

        Err(not_converged(
            Method::Gmv,
            self.config.max_iterations,
            "iteration budget exhausted",
        ))
    }

    fn maximize_sharpe(
        &self,
        stats: &ReturnStatistics,
        risk_free_rate: f64,
    ) -> Result<(Array1<f64>, usize), OptimizeError> {
        let objective = SharpeObjective {
            stats,
            risk_free_rate,
        };

        let mut x = equal_weights(stats.len());
        let mut value = objective.value(&x).ok_or_else(|| {
            not_converged(Method::Msr, 0, "portfolio volatility is zero at the initial guess")
        })?;
        let mut step = 1.0_f64;

        for iteration in 1..=self.config.max_iterations {
            let gradient = objective.gradient(&x).ok_or_else(|| {
                not_converged(Method::Msr, iteration, "objective gradient is undefined")
            })?;

            step = (step * 2.0).min(1e6);
            let (next, next_value) = loop {
                let candidate = project_onto_simplex(&(&x - &(&gradient * step)));
                let delta = &candidate - &x;
                let bound = value + gradient.dot(&delta) + delta.dot(&delta) / (2.0 * step);
                match objective.value(&candidate) {
                    Some(candidate_value) if candidate_value <= bound => {
                        break (candidate, candidate_value)
                    }
                    _ if step < MIN_LINE_SEARCH_STEP => {
                        if is_stationary(&x, &gradient) {
                            return Ok((x, iteration));
                        }
                        return Err(not_converged(
                            Method::Msr,
                            iteration,
                            "line search stalled away from a stationary point",
                        ));
                    }
                    _ => step *= 0.5,
                }
            };

            let change = max_abs(&(&next - &x));
            x = next;
            value = next_value;
            if change < self.config.tolerance {
                return Ok((x, iteration));
            }
        }

        Err(not_converged(
            Method::Msr,
            self.config.max_iterations,
            "iteration budget exhausted",
        ))
    }
}

/// Negative annualised Sharpe ratio and its gradient.
struct SharpeObjective<'a> {
    stats: &'a ReturnStatistics,
    risk_free_rate: f64,
}

impl SharpeObjective<'_> {
    fn volatility(&self, w: &Array1<f64>) -> Option<f64> {
        let variance = w.dot(&self.stats.covariance.dot(w));
        let sd = variance.max(0.0).sqrt();
        (sd.is_finite() && sd > 0.0).then_some(sd)
    }

    fn value(&self, w: &Array1<f64>) -> Option<f64> {
        let sd = self.volatility(w)?;
        let excess = w.dot(&self.stats.mean) * TRADING_DAYS - self.risk_free_rate;
        let value = -excess / (sd * TRADING_DAYS.sqrt());
        value.is_finite().then_some(value)
    }

    fn gradient(&self, w: &Array1<f64>) -> Option<Array1<f64>> {
        let sd = self.volatility(w)?;
        let sigma_w = self.stats.covariance.dot(w);
        let excess = w.dot(&self.stats.mean) * TRADING_DAYS - self.risk_free_rate;
        let scale = TRADING_DAYS.sqrt();

        let gradient = &self.stats.mean * (-TRADING_DAYS / (scale * sd))
            + &sigma_w * (excess / (scale * sd.powi(3)));
        gradient.iter().all(|g| g.is_finite()).then_some(gradient)
    }
}

/// Rounds to two decimals, ties to even.
pub fn round_weight(weight: f64) -> f64 {
    (weight * 100.0).round_ties_even() / 100.0
}

fn equal_weights(n: usize) -> Array1<f64> {
    Array1::from_elem(n, 1.0 / n as f64)
}

/// Euclidean projection onto `{w : sum w = 1, w >= 0}`.
fn project_onto_simplex(v: &Array1<f64>) -> Array1<f64> {
    let mut sorted = v.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumulative = 0.0;
    let mut threshold = 0.0;
    for (j, value) in sorted.iter().enumerate() {
        cumulative += value;
        let candidate = (cumulative - 1.0) / (j + 1) as f64;
        if value - candidate > 0.0 {
            threshold = candidate;
        }
    }

    v.mapv(|value| (value - threshold).max(0.0))
}

/// True when a unit projected-gradient step leaves `x` in place.
fn is_stationary(x: &Array1<f64>, gradient: &Array1<f64>) -> bool {
    max_abs(&(x - &project_onto_simplex(&(x - gradient)))) < STALL_RESIDUAL
}

fn max_abs(v: &Array1<f64>) -> f64 {
    v.iter().fold(0.0_f64, |acc, value| acc.max(value.abs()))
}

fn check_feasible(
    method: Method,
    weights: &Array1<f64>,
    iterations: usize,
) -> Result<(), OptimizeError> {
    let sum = weights.sum();
    let in_bounds = weights
        .iter()
        .all(|w| w.is_finite() && *w >= 0.0 && *w <= 1.0 + FEASIBILITY_TOLERANCE);
    if in_bounds && (sum - 1.0).abs() <= FEASIBILITY_TOLERANCE {
        Ok(())
    } else {
        Err(not_converged(
            method,
            iterations,
            &format!("solution violates constraints (sum = {sum})"),
        ))
    }
}

fn not_converged(method: Method, iterations: usize, reason: &str) -> OptimizeError {
    OptimizeError::DidNotConverge {
        method,
        iterations,
        reason: reason.to_owned(),
    }
}
