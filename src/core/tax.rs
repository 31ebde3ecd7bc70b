use serde::{Deserialize, Serialize};

use super::ledger::AnnualTotals;
use super::types::{clamp_percent, finite_or_zero};

/// One step of a progressive table. `up_to: None` is the open-ended top bracket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBracket {
    pub up_to: Option<f64>,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BracketTableError {
    #[error("bracket table is empty")]
    Empty,
    #[error("bracket {index}: rate {rate} must be between 0 and 1")]
    InvalidRate { index: usize, rate: f64 },
    #[error("bracket {index}: threshold must be finite and above the previous one")]
    NotAscending { index: usize },
    #[error("only the last bracket may be open-ended")]
    OpenBracketNotLast,
}

/// Ascending, validated list of brackets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TaxBracket>", into = "Vec<TaxBracket>")]
pub struct BracketTable(Vec<TaxBracket>);

impl BracketTable {
    pub fn new(brackets: Vec<TaxBracket>) -> Result<Self, BracketTableError> {
        if brackets.is_empty() {
            return Err(BracketTableError::Empty);
        }
        let mut previous = 0.0;
        for (index, bracket) in brackets.iter().enumerate() {
            if !(0.0..=1.0).contains(&bracket.rate) {
                return Err(BracketTableError::InvalidRate {
                    index,
                    rate: bracket.rate,
                });
            }
            match bracket.up_to {
                Some(limit) if !limit.is_finite() || limit <= previous => {
                    return Err(BracketTableError::NotAscending { index });
                }
                Some(limit) => previous = limit,
                None if index + 1 != brackets.len() => {
                    return Err(BracketTableError::OpenBracketNotLast);
                }
                None => {}
            }
        }
        Ok(Self(brackets))
    }

    pub fn brackets(&self) -> &[TaxBracket] {
        &self.0
    }

    /// Marginal tax: each slice of `taxable` is taxed at its own bracket's rate.
    /// Income above a closed last bracket is taxed at that bracket's rate.
    pub fn tax_for(&self, taxable: f64) -> f64 {
        let taxable = finite_or_zero(taxable).max(0.0);
        let mut lower = 0.0;
        let mut tax = 0.0;
        let last = self.0.len() - 1;
        for (index, bracket) in self.0.iter().enumerate() {
            let upper = match bracket.up_to {
                Some(limit) if index < last => limit,
                _ => f64::INFINITY,
            };
            if taxable <= lower {
                break;
            }
            tax += (taxable.min(upper) - lower) * bracket.rate;
            lower = upper;
        }
        tax
    }

    pub fn marginal_rate(&self, taxable: f64) -> f64 {
        let last = self.0.len() - 1;
        self.0
            .iter()
            .enumerate()
            .find(|(index, b)| *index == last || b.up_to.is_some_and(|limit| taxable <= limit))
            .map(|(_, b)| b.rate)
            .unwrap_or(0.0)
    }
}

impl TryFrom<Vec<TaxBracket>> for BracketTable {
    type Error = BracketTableError;

    fn try_from(value: Vec<TaxBracket>) -> Result<Self, Self::Error> {
        BracketTable::new(value)
    }
}

impl From<BracketTable> for Vec<TaxBracket> {
    fn from(value: BracketTable) -> Self {
        value.0
    }
}

impl Default for BracketTable {
    fn default() -> Self {
        let brackets = [
            (Some(7_703.0), 0.1325),
            (Some(11_623.0), 0.18),
            (Some(16_472.0), 0.23),
            (Some(21_321.0), 0.26),
            (Some(27_146.0), 0.3275),
            (Some(39_791.0), 0.37),
            (Some(51_997.0), 0.435),
            (Some(81_199.0), 0.45),
            (None, 0.48),
        ]
        .into_iter()
        .map(|(up_to, rate)| TaxBracket { up_to, rate })
        .collect();
        Self(brackets)
    }
}

/// Simplified self-employment regime parameters. Estimation data, not law.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaxSettings {
    /// Share of gross income treated as taxable.
    pub coefficient: f64,
    pub brackets: BracketTable,
    /// Flat estimate of deductions subtracted from the bracket tax.
    pub deductions: f64,
    pub social_security_rate: f64,
}

impl Default for TaxSettings {
    fn default() -> Self {
        Self {
            coefficient: 0.75,
            brackets: BracketTable::default(),
            deductions: 250.0,
            social_security_rate: 0.214,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxEstimate {
    pub gross_income: f64,
    pub taxable_income: f64,
    pub bracket_tax: f64,
    pub deductions: f64,
    pub income_tax: f64,
    pub social_security: f64,
    pub total_liability: f64,
    pub withheld: f64,
    /// Positive: refund expected. Negative: additional payment due.
    pub reconciliation: f64,
    pub effective_rate: f64,
    pub marginal_rate: f64,
}

pub fn estimate_tax(gross_income: f64, withheld: f64, settings: &TaxSettings) -> TaxEstimate {
    let gross_income = finite_or_zero(gross_income).max(0.0);
    let withheld = finite_or_zero(withheld).max(0.0);
    let coefficient = finite_or_zero(settings.coefficient).clamp(0.0, 1.0);
    let taxable_income = gross_income * coefficient;

    let bracket_tax = settings.brackets.tax_for(taxable_income);
    let deductions = finite_or_zero(settings.deductions).max(0.0);
    let income_tax = (bracket_tax - deductions).max(0.0);
    let social_security =
        gross_income * finite_or_zero(settings.social_security_rate).clamp(0.0, 1.0);
    let total_liability = income_tax + social_security;

    TaxEstimate {
        gross_income,
        taxable_income,
        bracket_tax,
        deductions,
        income_tax,
        social_security,
        total_liability,
        withheld,
        reconciliation: withheld - total_liability,
        effective_rate: if gross_income > 0.0 {
            total_liability / gross_income
        } else {
            0.0
        },
        marginal_rate: settings.brackets.marginal_rate(taxable_income),
    }
}

/// Estimate for a year of ledger data: taxed income is the gross, and the
/// monthly tax reserve at `tax_rate` percent is what has been withheld.
pub fn estimate_for_year(annual: &AnnualTotals, tax_rate: f64, settings: &TaxSettings) -> TaxEstimate {
    let withheld = annual.taxed_income * clamp_percent(tax_rate) / 100.0;
    estimate_tax(annual.taxed_income, withheld, settings)
}
