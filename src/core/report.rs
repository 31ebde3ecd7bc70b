use chrono::NaiveDate;
use serde::Serialize;

use super::allocation::{Allocation, PartnerReconciliation, allocate, partner_reconciliation};
use super::ledger::{
    AnnualTotals, CategoryTotal, GoalProgress, MonthTotals, annual_totals, expense_breakdown,
    goal_progress, month_totals,
};
use super::loan::{LoanSummary, PAYOFF_ITERATION_CAP, Payoff, loan_summary};
use super::net_worth::{PortfolioPerformance, net_worth, portfolio_performance};
use super::period::{PeriodKey, PortfolioSource, resolve_portfolio};
use super::tax::{TaxEstimate, estimate_for_year};
use super::types::{MonthRecord, Snapshot, Transfers};
use crate::settings::EngineSettings;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetWorth {
    pub portfolio: f64,
    pub home_equity: f64,
    pub total: f64,
}

/// Everything the dashboard shows for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub period: PeriodKey,
    pub month: MonthTotals,
    pub transfers: Transfers,
    pub allocation: Allocation,
    pub partner: PartnerReconciliation,
    pub shared_by_category: Vec<CategoryTotal>,
    pub personal_by_category: Vec<CategoryTotal>,
    pub portfolio_source: PortfolioSource,
    pub portfolio: PortfolioPerformance,
    pub loan: LoanSummary,
    pub net_worth: NetWorth,
    pub annual: AnnualTotals,
    pub goals: GoalProgress,
    pub tax: TaxEstimate,
}

impl DashboardSummary {
    pub fn compute(
        snapshot: &Snapshot,
        period: PeriodKey,
        today: NaiveDate,
        settings: &EngineSettings,
    ) -> Self {
        let config = &snapshot.config;
        let key = period.to_string();
        let empty = MonthRecord::default();
        let record = snapshot.months.get(&key).unwrap_or(&empty);

        let month = month_totals(&key, record, &config.clients);
        let allocation = allocate(month.taxed_income, month.untaxed_income, config);
        let partner = partner_reconciliation(config, &settings.partner);

        let current = resolve_portfolio(&key, &snapshot.months);
        let previous = resolve_portfolio(&period.previous().to_string(), &snapshot.months);
        // A carried-forward portfolio has no fresh valuation to compare.
        let portfolio = if current.source == PortfolioSource::Own {
            portfolio_performance(&current.items, &previous.items, &record.investments)
        } else {
            PortfolioPerformance {
                previous_total: previous.total(),
                ..portfolio_performance(&current.items, &[], &record.investments)
            }
        };

        let loan = loan_summary(&config.loan, allocation.amortization_amount, today);
        let home_equity = loan.equity;
        let net_worth = NetWorth {
            portfolio: portfolio.total,
            home_equity,
            total: net_worth(portfolio.total, config.loan.home_value, loan.current_balance),
        };

        let annual = annual_totals(&snapshot.months, period.year(), &config.clients);
        let goals = goal_progress(&annual, &config.goals);
        let tax = estimate_for_year(&annual, config.tax_rate, &settings.tax);

        tracing::debug!(period = %period, source = ?current.source, "computed dashboard");

        DashboardSummary {
            period,
            month,
            transfers: record.transfers,
            allocation,
            partner,
            shared_by_category: expense_breakdown(&config.shared_expenses),
            personal_by_category: expense_breakdown(&config.personal_expenses),
            portfolio_source: current.source,
            portfolio,
            loan,
            net_worth,
            annual,
            goals,
            tax,
        }
    }
}

/// One flat line of a dashboard export.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub section: &'static str,
    pub label: String,
    pub value: f64,
}

fn row(section: &'static str, label: impl Into<String>, value: f64) -> ExportRow {
    ExportRow {
        section,
        label: label.into(),
        value,
    }
}

fn payoff_months(payoff: Payoff) -> f64 {
    match payoff {
        Payoff::Months(months) => months as f64,
        Payoff::Never => PAYOFF_ITERATION_CAP as f64,
    }
}

pub fn export_rows(summary: &DashboardSummary) -> Vec<ExportRow> {
    let mut rows = Vec::new();

    let m = &summary.month;
    rows.push(row("income", "taxed", m.taxed_income));
    rows.push(row("income", "untaxed", m.untaxed_income));
    rows.push(row("income", "total", m.total_income));
    for client in &m.per_client {
        rows.push(row("income", format!("client:{}", client.name), client.total));
    }
    rows.push(row("investments", "savings", m.investments));
    rows.push(row("investments", "amortization", m.amortization));

    let a = &summary.allocation;
    rows.extend([
        row("allocation", "taxReserve", a.tax_reserve),
        row("allocation", "netIncome", a.net_income),
        row("allocation", "mySharedShare", a.my_shared_share),
        row("allocation", "personalExpenses", a.personal_expenses),
        row("allocation", "vacationReserve", a.vacation_reserve),
        row("allocation", "disposable", a.disposable),
        row("allocation", "amortizationAmount", a.amortization_amount),
        row("allocation", "investmentAmount", a.investment_amount),
    ]);

    let p = &summary.partner;
    rows.extend([
        row("partner", "contribution", p.partner_contribution),
        row("partner", "surplus", p.partner_surplus),
        row("partner", "unallocated", p.partner_unallocated),
    ]);

    for category in &summary.shared_by_category {
        rows.push(row("sharedExpenses", category.category.clone(), category.total));
    }
    for category in &summary.personal_by_category {
        rows.push(row("personalExpenses", category.category.clone(), category.total));
    }

    for item in &summary.portfolio.items {
        rows.push(row("portfolio", item.description.clone(), item.amount));
    }
    rows.push(row("portfolio", "total", summary.portfolio.total));
    rows.push(row("portfolio", "gain", summary.portfolio.gain));

    let l = &summary.loan;
    rows.extend([
        row("loan", "balance", l.current_balance),
        row("loan", "effectiveRate", l.effective_rate),
        row("loan", "payoffMonths", payoff_months(l.payoff)),
        row("loan", "payoffMonthsWithExtra", payoff_months(l.payoff_with_extra)),
        row("loan", "interestSaved", l.interest_saved),
        row("loan", "equity", l.equity),
    ]);

    rows.extend([
        row("netWorth", "portfolio", summary.net_worth.portfolio),
        row("netWorth", "homeEquity", summary.net_worth.home_equity),
        row("netWorth", "total", summary.net_worth.total),
        row("annual", "income", summary.annual.income),
        row("annual", "investments", summary.annual.investments),
        row("annual", "amortization", summary.annual.amortization),
        row("tax", "totalLiability", summary.tax.total_liability),
        row("tax", "withheld", summary.tax.withheld),
        row("tax", "reconciliation", summary.tax.reconciliation),
    ]);
    rows
}
