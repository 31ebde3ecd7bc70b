use serde::Serialize;

use super::period::PeriodKey;
use super::types::{
    Amount, Client, EntryId, ExpenseItem, Goals, IncomeEntry, InvestmentEntry,
    LOAN_AMORTIZATION_CATEGORY, MonthRecord, MonthRecords, finite_or_zero,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientTotal {
    pub client_id: EntryId,
    pub name: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthTotals {
    pub period: String,
    pub taxed_income: f64,
    pub untaxed_income: f64,
    pub total_income: f64,
    /// New savings; loan amortization entries are excluded.
    pub investments: f64,
    pub amortization: f64,
    pub per_client: Vec<ClientTotal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualTotals {
    pub year: i32,
    pub taxed_income: f64,
    pub untaxed_income: f64,
    pub income: f64,
    pub investments: f64,
    pub amortization: f64,
    pub per_client: Vec<ClientTotal>,
    pub months: Vec<MonthTotals>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    /// Percent of each annual target reached; `None` when no target is set.
    pub income: Option<f64>,
    pub amortization: Option<f64>,
    pub investment: Option<f64>,
}

/// Sum of `amount`; empty input is 0 and non-finite amounts are skipped.
pub fn sum_entries<T: Amount>(entries: &[T]) -> f64 {
    entries.iter().map(|e| finite_or_zero(e.amount())).sum()
}

/// Totals per client in client display order. Entries pointing at a client
/// that no longer exists are ignored.
pub fn per_client_totals(entries: &[IncomeEntry], clients: &[Client]) -> Vec<ClientTotal> {
    let mut totals: Vec<ClientTotal> = clients
        .iter()
        .map(|c| ClientTotal {
            client_id: c.id,
            name: c.name.clone(),
            total: 0.0,
        })
        .collect();

    for entry in entries {
        if let Some(slot) = totals.iter_mut().find(|t| t.client_id == entry.client_id) {
            slot.total += finite_or_zero(entry.amount);
        }
    }
    totals
}

fn is_amortization(entry: &InvestmentEntry) -> bool {
    entry.category.eq_ignore_ascii_case(LOAN_AMORTIZATION_CATEGORY)
}

fn split_investments(entries: &[InvestmentEntry]) -> (f64, f64) {
    entries.iter().fold((0.0, 0.0), |(savings, amortization), e| {
        let amount = finite_or_zero(e.amount);
        if is_amortization(e) {
            (savings, amortization + amount)
        } else {
            (savings + amount, amortization)
        }
    })
}

pub fn month_totals(period: &str, record: &MonthRecord, clients: &[Client]) -> MonthTotals {
    let taxed_income = sum_entries(&record.taxed_income);
    let untaxed_income = sum_entries(&record.untaxed_income);
    let (investments, amortization) = split_investments(&record.investments);

    let mut per_client = per_client_totals(&record.taxed_income, clients);
    for (slot, untaxed) in per_client
        .iter_mut()
        .zip(per_client_totals(&record.untaxed_income, clients))
    {
        slot.total += untaxed.total;
    }

    MonthTotals {
        period: period.to_string(),
        taxed_income,
        untaxed_income,
        total_income: taxed_income + untaxed_income,
        investments,
        amortization,
        per_client,
    }
}

/// Aggregates the twelve months of `year`. Months without a record count as empty.
pub fn annual_totals(records: &MonthRecords, year: i32, clients: &[Client]) -> AnnualTotals {
    let empty = MonthRecord::default();
    let months: Vec<MonthTotals> = PeriodKey::months_of(year)
        .map(|period| {
            let key = period.to_string();
            let record = records.get(&key).unwrap_or(&empty);
            month_totals(&key, record, clients)
        })
        .collect();

    let mut per_client = per_client_totals(&[], clients);
    for month in &months {
        for (slot, client) in per_client.iter_mut().zip(&month.per_client) {
            slot.total += client.total;
        }
    }

    let taxed_income = months.iter().map(|m| m.taxed_income).sum();
    let untaxed_income = months.iter().map(|m| m.untaxed_income).sum();
    AnnualTotals {
        year,
        taxed_income,
        untaxed_income,
        income: months.iter().map(|m| m.total_income).sum(),
        investments: months.iter().map(|m| m.investments).sum(),
        amortization: months.iter().map(|m| m.amortization).sum(),
        per_client,
        months,
    }
}

fn percent_of(value: f64, target: f64) -> Option<f64> {
    (target.is_finite() && target > 0.0).then(|| value / target * 100.0)
}

pub fn goal_progress(annual: &AnnualTotals, goals: &Goals) -> GoalProgress {
    GoalProgress {
        income: percent_of(annual.income, goals.income_target),
        amortization: percent_of(annual.amortization, goals.amortization_target),
        investment: percent_of(annual.investments, goals.investment_target),
    }
}

/// Expense totals per category, in the order categories first appear.
pub fn expense_breakdown(expenses: &[ExpenseItem]) -> Vec<CategoryTotal> {
    let mut out: Vec<CategoryTotal> = Vec::new();
    for expense in expenses {
        let amount = finite_or_zero(expense.amount);
        match out.iter_mut().find(|c| c.category == expense.category) {
            Some(slot) => slot.total += amount,
            None => out.push(CategoryTotal {
                category: expense.category.clone(),
                total: amount,
            }),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn clients() -> Vec<Client> {
        vec![
            Client {
                id: 1,
                name: "Acme".to_string(),
                ..Client::default()
            },
            Client {
                id: 2,
                name: "Globex".to_string(),
                ..Client::default()
            },
        ]
    }

    fn income(id: u64, client_id: u64, amount: f64) -> IncomeEntry {
        IncomeEntry {
            id,
            client_id,
            amount,
            ..IncomeEntry::default()
        }
    }

    fn investment(amount: f64, category: &str) -> InvestmentEntry {
        InvestmentEntry {
            amount,
            category: category.to_string(),
            ..InvestmentEntry::default()
        }
    }

    #[test]
    fn sum_of_empty_sequence_is_zero() {
        assert_eq!(sum_entries::<IncomeEntry>(&[]), 0.0);
    }

    #[test]
    fn sum_skips_non_finite_amounts() {
        let entries = vec![income(1, 1, 10.0), income(2, 1, f64::NAN), income(3, 1, 5.5)];
        assert_approx(sum_entries(&entries), 15.5);
    }

    #[test]
    fn per_client_ignores_deleted_clients_and_keeps_display_order() {
        let entries = vec![income(1, 2, 300.0), income(2, 1, 100.0), income(3, 99, 50.0)];
        let totals = per_client_totals(&entries, &clients());
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].name, "Acme");
        assert_approx(totals[0].total, 100.0);
        assert_eq!(totals[1].name, "Globex");
        assert_approx(totals[1].total, 300.0);
    }

    #[test]
    fn month_totals_merge_taxed_and_untaxed_per_client() {
        let record = MonthRecord {
            taxed_income: vec![income(1, 1, 1_000.0)],
            untaxed_income: vec![income(2, 1, 200.0), income(3, 2, 50.0)],
            investments: vec![investment(300.0, "FONDOS"), investment(400.0, "CREDITO")],
            ..MonthRecord::default()
        };
        let totals = month_totals("2024-2", &record, &clients());
        assert_approx(totals.total_income, 1_250.0);
        assert_approx(totals.per_client[0].total, 1_200.0);
        assert_approx(totals.per_client[1].total, 50.0);
        assert_approx(totals.investments, 300.0);
        assert_approx(totals.amortization, 400.0);
    }

    #[test]
    fn annual_totals_with_three_populated_months() {
        let mut records = MonthRecords::new();
        for (key, amount) in [("2024-1", 1_000.0), ("2024-6", 2_000.0), ("2024-12", 500.0)] {
            records.insert(
                key.to_string(),
                MonthRecord {
                    taxed_income: vec![income(1, 1, amount)],
                    untaxed_income: vec![income(2, 2, 100.0)],
                    investments: vec![investment(50.0, "FONDOS"), investment(70.0, "credito")],
                    ..MonthRecord::default()
                },
            );
        }
        records.insert(
            "2023-12".to_string(),
            MonthRecord {
                taxed_income: vec![income(9, 1, 99_999.0)],
                ..MonthRecord::default()
            },
        );

        let annual = annual_totals(&records, 2024, &clients());
        assert_eq!(annual.months.len(), 12);
        assert_approx(annual.taxed_income, 3_500.0);
        assert_approx(annual.untaxed_income, 300.0);
        assert_approx(annual.income, 3_800.0);
        assert_approx(annual.investments, 150.0);
        assert_approx(annual.amortization, 210.0);
        assert_approx(annual.per_client[0].total, 3_500.0);
        assert_approx(annual.per_client[1].total, 300.0);
        assert_approx(annual.months[1].total_income, 0.0);
    }

    #[test]
    fn annual_totals_for_an_empty_year_is_all_zero() {
        let annual = annual_totals(&MonthRecords::new(), 2030, &[]);
        assert_eq!(annual.income, 0.0);
        assert_eq!(annual.investments, 0.0);
        assert!(annual.per_client.is_empty());
    }

    #[test]
    fn goal_progress_skips_unset_targets() {
        let annual = annual_totals(&MonthRecords::new(), 2024, &[]);
        let annual = AnnualTotals {
            income: 30_000.0,
            investments: 5_000.0,
            ..annual
        };
        let progress = goal_progress(
            &annual,
            &Goals {
                income_target: 60_000.0,
                amortization_target: 0.0,
                investment_target: 10_000.0,
            },
        );
        assert_approx(progress.income.expect("income target set"), 50.0);
        assert!(progress.amortization.is_none());
        assert_approx(progress.investment.expect("investment target set"), 50.0);
    }

    #[test]
    fn expense_breakdown_groups_in_first_seen_order() {
        let expenses = vec![
            ExpenseItem {
                category: "Home".to_string(),
                amount: 700.0,
                ..ExpenseItem::default()
            },
            ExpenseItem {
                category: "Food".to_string(),
                amount: 300.0,
                ..ExpenseItem::default()
            },
            ExpenseItem {
                category: "Home".to_string(),
                amount: 50.0,
                ..ExpenseItem::default()
            },
        ];
        let breakdown = expense_breakdown(&expenses);
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].category, "Home");
        assert_approx(breakdown[0].total, 750.0);
        assert_approx(breakdown[1].total, 300.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_month_total_is_taxed_plus_untaxed(
            taxed in proptest::collection::vec(0u32..100_000, 0..12),
            untaxed in proptest::collection::vec(0u32..100_000, 0..12)
        ) {
            let record = MonthRecord {
                taxed_income: taxed.iter().map(|a| income(1, 1, *a as f64)).collect(),
                untaxed_income: untaxed.iter().map(|a| income(2, 2, *a as f64)).collect(),
                ..MonthRecord::default()
            };
            let totals = month_totals("2024-1", &record, &clients());
            let decomposed = sum_entries(&record.taxed_income) + sum_entries(&record.untaxed_income);
            prop_assert!((totals.total_income - decomposed).abs() <= EPS);
        }

        #[test]
        fn prop_annual_totals_are_idempotent(
            amounts in proptest::collection::vec(0u32..50_000, 0..12)
        ) {
            let records: MonthRecords = amounts
                .iter()
                .enumerate()
                .map(|(i, a)| {
                    (
                        format!("2024-{}", i + 1),
                        MonthRecord {
                            taxed_income: vec![income(i as u64, 1, *a as f64)],
                            ..MonthRecord::default()
                        },
                    )
                })
                .collect();
            let first = annual_totals(&records, 2024, &clients());
            let second = annual_totals(&records, 2024, &clients());
            prop_assert!(first == second);
        }
    }
}
