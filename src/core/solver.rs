use serde::Serialize;

use super::loan::{PAYOFF_ITERATION_CAP, months_to_payoff};
use super::types::finite_or_zero;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtraPaymentSolveConfig {
    pub search_min: f64,
    pub search_max: f64,
    /// Stop once the bracket is this narrow, in currency units.
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for ExtraPaymentSolveConfig {
    fn default() -> Self {
        Self {
            search_min: 0.0,
            search_max: 5_000.0,
            tolerance: 1.0,
            max_iterations: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub months: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraPaymentSolution {
    pub target_months: u32,
    /// Smallest whole-unit extra monthly payment that meets the target.
    /// `None` when even `search_max` does not close the loan in time.
    pub extra_monthly: Option<f64>,
    pub months_with_extra: Option<u32>,
    pub iterations: Vec<SolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

/// Smallest extra monthly payment so the loan is gone within `target_years`,
/// searched in [0, 5000] to the nearest unit.
pub fn extra_payment_for_target_years(
    balance: f64,
    annual_rate: f64,
    fixed_payment: f64,
    target_years: f64,
) -> ExtraPaymentSolution {
    solve_extra_payment(
        balance,
        annual_rate,
        fixed_payment,
        target_years,
        ExtraPaymentSolveConfig::default(),
    )
}

pub fn solve_extra_payment(
    balance: f64,
    annual_rate: f64,
    fixed_payment: f64,
    target_years: f64,
    config: ExtraPaymentSolveConfig,
) -> ExtraPaymentSolution {
    let target_months = (finite_or_zero(target_years).max(0.0) * 12.0).round() as u32;
    let meets_target = |extra: f64| -> (bool, u32) {
        let months = months_to_payoff(balance, annual_rate, fixed_payment, extra);
        (months <= target_months && months < PAYOFF_ITERATION_CAP, months)
    };

    let search_min = finite_or_zero(config.search_min).max(0.0);
    let search_max = finite_or_zero(config.search_max).max(search_min);
    let tolerance = if config.tolerance.is_finite() && config.tolerance > 0.0 {
        config.tolerance
    } else {
        1.0
    };

    let (low_ok, low_months) = meets_target(search_min);
    if low_ok {
        return ExtraPaymentSolution {
            target_months,
            extra_monthly: Some(search_min),
            months_with_extra: Some(low_months),
            iterations: Vec::new(),
            converged: true,
            feasible: true,
            message: "Already meets target at lower bound.".to_string(),
        };
    }

    let (high_ok, _) = meets_target(search_max);
    if !high_ok {
        tracing::debug!(
            target_months,
            search_max,
            "no extra payment within bounds closes the loan in time"
        );
        return ExtraPaymentSolution {
            target_months,
            extra_monthly: None,
            months_with_extra: None,
            iterations: Vec::new(),
            converged: false,
            feasible: false,
            message: "No feasible extra payment found within the search bounds.".to_string(),
        };
    }

    let mut iterations = Vec::new();
    let mut lo = search_min;
    let mut hi = search_max;
    let mut converged = false;
    let mut it = 0;
    while it < config.max_iterations {
        it += 1;
        let mid = (lo + hi) * 0.5;
        let (ok, months) = meets_target(mid);
        iterations.push(SolveIteration {
            iteration: it,
            lower_bound: lo,
            upper_bound: hi,
            candidate_value: mid,
            months,
        });

        if ok {
            hi = mid;
        } else {
            lo = mid;
        }

        if (hi - lo).abs() <= tolerance {
            converged = true;
            break;
        }
    }

    let (extra, months) = match meets_target(hi.floor()) {
        (true, months) if hi.floor() >= search_min => (hi.floor(), months),
        _ => {
            let extra = hi.ceil().min(search_max);
            (extra, meets_target(extra).1)
        }
    };
    ExtraPaymentSolution {
        target_months,
        extra_monthly: Some(extra),
        months_with_extra: Some(months),
        iterations,
        converged,
        feasible: true,
        message: if converged {
            "Solved extra monthly payment.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate."
                .to_string()
        },
    }
}
