use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Investment category used for extra loan principal. It moves capital from
/// savings into home equity, so it never counts as new investment.
pub const LOAN_AMORTIZATION_CATEGORY: &str = "CREDITO";

pub type EntryId = u64;

/// Anything on a ledger that carries a monetary amount.
pub trait Amount {
    fn amount(&self) -> f64;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Client {
    pub id: EntryId,
    pub name: String,
    pub color: String,
}

impl Default for Client {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            color: "#64748b".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IncomeEntry {
    pub id: EntryId,
    pub client_id: EntryId,
    pub amount: f64,
    pub date: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExpenseItem {
    pub id: EntryId,
    pub description: String,
    pub category: String,
    pub amount: f64,
    pub is_children_insurance: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InvestmentEntry {
    pub id: EntryId,
    pub description: String,
    pub category: String,
    pub amount: f64,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio_item_id: Option<EntryId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PortfolioItem {
    pub id: EntryId,
    pub description: String,
    pub category: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Transfers {
    pub shared_account: bool,
    pub personal_account: bool,
    pub investment_account: bool,
    pub vacation_account: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PartnerIncome {
    pub id: EntryId,
    pub description: String,
    pub amount: f64,
    pub is_meal_card: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PartnerExpense {
    pub id: EntryId,
    pub description: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PartnerAllocation {
    pub id: EntryId,
    pub description: String,
    pub amount: f64,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Partner {
    pub income: Vec<PartnerIncome>,
    pub expenses: Vec<PartnerExpense>,
    pub allocations: Vec<PartnerAllocation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BalancePoint {
    pub date: String,
    pub balance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PortfolioPoint {
    pub date: String,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Loan {
    pub home_value: f64,
    pub initial_down_payment: f64,
    pub initial_principal: f64,
    pub current_balance: f64,
    /// Nominal annual rate in percent. Used when no euribor/spread pair is set.
    pub annual_rate: f64,
    pub monthly_payment: f64,
    /// Monthly insurance paid alongside the installment.
    pub insurance: f64,
    pub end_date: Option<NaiveDate>,
    pub spread: f64,
    pub euribor_rate: f64,
    pub balance_history: Vec<BalancePoint>,
}

impl Loan {
    /// Variable-rate loans are priced at euribor + spread; otherwise the nominal rate applies.
    pub fn effective_rate(&self) -> f64 {
        if self.spread > 0.0 || self.euribor_rate > 0.0 {
            self.euribor_rate + self.spread
        } else {
            self.annual_rate
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Goals {
    pub income_target: f64,
    pub amortization_target: f64,
    pub investment_target: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobalConfig {
    pub clients: Vec<Client>,
    pub tax_rate: f64,
    pub contribution_rate: f64,
    pub amortization_split: f64,
    pub vacation_reserve: f64,
    pub shared_expenses: Vec<ExpenseItem>,
    pub personal_expenses: Vec<ExpenseItem>,
    pub investment_categories: Vec<String>,
    pub partner: Partner,
    pub loan: Loan,
    pub goals: Goals,
    pub portfolio_history: Vec<PortfolioPoint>,
    pub next_id: EntryId,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            clients: Vec::new(),
            tax_rate: 25.0,
            contribution_rate: 50.0,
            amortization_split: 50.0,
            vacation_reserve: 0.0,
            shared_expenses: Vec::new(),
            personal_expenses: Vec::new(),
            investment_categories: ["FONDOS", "ACCIONES", "CRYPTO", "AHORRO"]
                .into_iter()
                .chain([LOAN_AMORTIZATION_CATEGORY])
                .map(str::to_string)
                .collect(),
            partner: Partner::default(),
            loan: Loan::default(),
            goals: Goals::default(),
            portfolio_history: Vec::new(),
            next_id: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonthRecord {
    pub taxed_income: Vec<IncomeEntry>,
    pub untaxed_income: Vec<IncomeEntry>,
    pub investments: Vec<InvestmentEntry>,
    pub transfers: Transfers,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio: Option<Vec<PortfolioItem>>,
}

/// Month records keyed by period key (`"2024-3"`).
pub type MonthRecords = BTreeMap<String, MonthRecord>;

/// Everything the persistence layer hands the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Snapshot {
    pub config: GlobalConfig,
    pub months: MonthRecords,
}

macro_rules! impl_amount {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Amount for $ty {
                fn amount(&self) -> f64 {
                    self.amount
                }
            }
        )*
    };
}

impl_amount!(
    IncomeEntry,
    ExpenseItem,
    InvestmentEntry,
    PortfolioItem,
    PartnerIncome,
    PartnerExpense,
    PartnerAllocation,
);

/// Clamps a percentage input to [0, 100]; non-finite values read as 0.
pub(crate) fn clamp_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Monetary inputs that are not finite read as 0.
pub(crate) fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_round_trips_through_json_with_camel_case_keys() {
        let mut snapshot = Snapshot::default();
        snapshot.config.clients.push(Client {
            id: 1,
            name: "Acme".to_string(),
            color: "#ff0000".to_string(),
        });
        snapshot.config.loan.end_date = NaiveDate::from_ymd_opt(2050, 6, 1);
        snapshot.months.insert(
            "2024-3".to_string(),
            MonthRecord {
                taxed_income: vec![IncomeEntry {
                    id: 2,
                    client_id: 1,
                    amount: 1_500.0,
                    date: "2024-03-10".to_string(),
                    description: "Invoice 12".to_string(),
                }],
                investments: vec![InvestmentEntry {
                    id: 3,
                    description: "Index fund".to_string(),
                    category: "FONDOS".to_string(),
                    amount: 200.0,
                    done: true,
                    portfolio_item_id: Some(9),
                }],
                ..MonthRecord::default()
            },
        );

        let json = serde_json::to_string(&snapshot).expect("snapshot should serialize");
        assert!(json.contains("\"taxedIncome\""));
        assert!(json.contains("\"clientId\""));
        assert!(json.contains("\"portfolioItemId\""));
        assert!(json.contains("\"endDate\":\"2050-06-01\""));

        let back: Snapshot = serde_json::from_str(&json).expect("snapshot should parse");
        assert_eq!(back, snapshot);
    }

    #[test]
    fn sparse_json_fills_defaults() {
        let snapshot: Snapshot = serde_json::from_str(
            r#"{"config": {"taxRate": 38}, "months": {"2024-1": {}}}"#,
        )
        .expect("sparse snapshot should parse");
        assert_eq!(snapshot.config.tax_rate, 38.0);
        assert_eq!(snapshot.config.contribution_rate, 50.0);
        assert!(snapshot.months["2024-1"].portfolio.is_none());
        assert!(
            snapshot
                .config
                .investment_categories
                .iter()
                .any(|c| c == LOAN_AMORTIZATION_CATEGORY)
        );
    }

    #[test]
    fn effective_rate_prefers_euribor_plus_spread() {
        let mut loan = Loan {
            annual_rate: 3.1,
            ..Loan::default()
        };
        assert_eq!(loan.effective_rate(), 3.1);
        loan.euribor_rate = 2.5;
        loan.spread = 0.9;
        assert!((loan.effective_rate() - 3.4).abs() < 1e-12);
    }

    #[test]
    fn percent_clamp_handles_out_of_range_and_nan() {
        assert_eq!(clamp_percent(-5.0), 0.0);
        assert_eq!(clamp_percent(140.0), 100.0);
        assert_eq!(clamp_percent(f64::NAN), 0.0);
        assert_eq!(clamp_percent(38.0), 38.0);
    }
}
