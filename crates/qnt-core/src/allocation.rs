use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// One reported position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub ticker: String,
    pub weight: f64,
    /// `weight * budget`; absent for percentage-only reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

/// Converts retained weights into currency amounts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocationComputer;

impl AllocationComputer {
    /// `budget == 0` omits amounts. Weights are multiplied as given; they are
    /// not re-normalised even when they no longer sum to one.
    pub fn allocate<I>(weights: I, budget: f64) -> Result<Vec<Allocation>, ValidationError>
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        if !budget.is_finite() {
            return Err(ValidationError::NonFiniteValue { field: "budget" });
        }
        if budget < 0.0 {
            return Err(ValidationError::NegativeValue { field: "budget" });
        }

        Ok(weights
            .into_iter()
            .map(|(ticker, weight)| Allocation {
                ticker,
                weight,
                amount: (budget > 0.0).then(|| weight * budget),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_multiplies_weight_exactly() {
        let allocations =
            AllocationComputer::allocate(vec![(String::from("فولاد"), 0.40)], 1000.0)
                .expect("valid budget");

        assert_eq!(allocations[0].amount, Some(400.0));
    }

    #[test]
    fn zero_budget_omits_amounts() {
        let allocations = AllocationComputer::allocate(
            vec![(String::from("A"), 0.6), (String::from("B"), 0.39)],
            0.0,
        )
        .expect("valid budget");

        assert!(allocations.iter().all(|a| a.amount.is_none()));
        let json = serde_json::to_string(&allocations[0]).expect("json");
        assert_eq!(json, r#"{"ticker":"A","weight":0.6}"#);
    }

    #[test]
    fn weights_are_not_renormalised() {
        let allocations = AllocationComputer::allocate(
            vec![(String::from("A"), 0.5), (String::from("B"), 0.49)],
            100.0,
        )
        .expect("valid budget");

        assert_eq!(allocations[0].amount, Some(50.0));
        assert_eq!(allocations[1].amount, Some(49.0));
    }

    #[test]
    fn rejects_negative_and_non_finite_budget() {
        assert_eq!(
            AllocationComputer::allocate(Vec::<(String, f64)>::new(), -1.0),
            Err(ValidationError::NegativeValue { field: "budget" })
        );
        assert_eq!(
            AllocationComputer::allocate(Vec::<(String, f64)>::new(), f64::INFINITY),
            Err(ValidationError::NonFiniteValue { field: "budget" })
        );
    }
}
