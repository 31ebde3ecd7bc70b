use serde::{Deserialize, Serialize};

use super::ledger::sum_entries;
use super::types::{ExpenseItem, GlobalConfig, Partner, clamp_percent, finite_or_zero};

/// How the partner's children-insurance line is found among shared expenses
/// when no item carries the explicit flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PartnerSettings {
    /// Case-insensitive substring looked for in shared-expense descriptions.
    pub children_insurance_match: String,
    /// Deduction used when neither a flagged nor a matching line exists.
    pub children_insurance_default: f64,
}

impl Default for PartnerSettings {
    fn default() -> Self {
        Self {
            children_insurance_match: "seguro niños".to_string(),
            children_insurance_default: 60.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub taxed_income: f64,
    pub untaxed_income: f64,
    pub tax_reserve: f64,
    pub net_income: f64,
    pub shared_expenses: f64,
    pub my_shared_share: f64,
    pub partner_shared_share: f64,
    pub personal_expenses: f64,
    pub vacation_reserve: f64,
    /// Negative in an over-budget month; not clamped.
    pub disposable: f64,
    pub amortization_amount: f64,
    pub investment_amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeductionSource {
    Flagged,
    DescriptionMatch,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerReconciliation {
    pub partner_shared_share: f64,
    pub meal_card_deduction: f64,
    pub children_insurance_deduction: f64,
    pub children_insurance_source: DeductionSource,
    pub partner_contribution: f64,
    pub partner_income: f64,
    pub partner_expenses: f64,
    pub partner_surplus: f64,
    pub partner_allocations: f64,
    pub partner_unallocated: f64,
}

/// Splits one month's income according to the user-wide percentages.
pub fn allocate(taxed_income: f64, untaxed_income: f64, config: &GlobalConfig) -> Allocation {
    let taxed_income = finite_or_zero(taxed_income);
    let untaxed_income = finite_or_zero(untaxed_income);
    let tax_rate = clamp_percent(config.tax_rate) / 100.0;
    let contribution = clamp_percent(config.contribution_rate) / 100.0;
    let amortization_share = clamp_percent(config.amortization_split) / 100.0;

    let tax_reserve = taxed_income * tax_rate;
    let net_income = taxed_income + untaxed_income - tax_reserve;

    let shared_expenses = sum_entries(&config.shared_expenses);
    let my_shared_share = shared_expenses * contribution;
    let partner_shared_share = shared_expenses * (1.0 - contribution);
    let personal_expenses = sum_entries(&config.personal_expenses);
    let vacation_reserve = finite_or_zero(config.vacation_reserve);

    let disposable = net_income - my_shared_share - personal_expenses - vacation_reserve;
    let investable = disposable.max(0.0);
    let amortization_amount = investable * amortization_share;

    Allocation {
        taxed_income,
        untaxed_income,
        tax_reserve,
        net_income,
        shared_expenses,
        my_shared_share,
        partner_shared_share,
        personal_expenses,
        vacation_reserve,
        disposable,
        amortization_amount,
        investment_amount: investable - amortization_amount,
    }
}

fn children_insurance(
    shared_expenses: &[ExpenseItem],
    settings: &PartnerSettings,
) -> (f64, DeductionSource) {
    if let Some(item) = shared_expenses.iter().find(|e| e.is_children_insurance) {
        return (finite_or_zero(item.amount), DeductionSource::Flagged);
    }

    let needle = settings.children_insurance_match.to_lowercase();
    if !needle.is_empty()
        && let Some(item) = shared_expenses
            .iter()
            .find(|e| e.description.to_lowercase().contains(&needle))
    {
        return (
            finite_or_zero(item.amount),
            DeductionSource::DescriptionMatch,
        );
    }

    (
        finite_or_zero(settings.children_insurance_default),
        DeductionSource::Default,
    )
}

fn meal_card(partner: &Partner) -> f64 {
    partner
        .income
        .iter()
        .find(|i| i.is_meal_card)
        .map(|i| finite_or_zero(i.amount))
        .unwrap_or(0.0)
}

/// What the partner owes towards shared expenses and what they keep afterwards.
pub fn partner_reconciliation(
    config: &GlobalConfig,
    settings: &PartnerSettings,
) -> PartnerReconciliation {
    let contribution = clamp_percent(config.contribution_rate) / 100.0;
    let partner_shared_share = sum_entries(&config.shared_expenses) * (1.0 - contribution);
    let meal_card_deduction = meal_card(&config.partner);
    let (children_insurance_deduction, children_insurance_source) =
        children_insurance(&config.shared_expenses, settings);

    let partner_contribution =
        partner_shared_share - meal_card_deduction - children_insurance_deduction;
    let partner_income = sum_entries(&config.partner.income);
    let partner_expenses = sum_entries(&config.partner.expenses);
    let partner_surplus = partner_income - partner_expenses - partner_contribution;
    let partner_allocations = sum_entries(&config.partner.allocations);

    PartnerReconciliation {
        partner_shared_share,
        meal_card_deduction,
        children_insurance_deduction,
        children_insurance_source,
        partner_contribution,
        partner_income,
        partner_expenses,
        partner_surplus,
        partner_allocations,
        partner_unallocated: partner_surplus - partner_allocations,
    }
}
