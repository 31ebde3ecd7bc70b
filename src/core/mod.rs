mod allocation;
mod ledger;
mod loan;
mod net_worth;
mod period;
mod report;
mod solver;
mod store;
mod tax;
mod types;

pub use allocation::{
    Allocation, DeductionSource, PartnerReconciliation, PartnerSettings, allocate,
    partner_reconciliation,
};
pub use ledger::{
    AnnualTotals, CategoryTotal, ClientTotal, GoalProgress, MonthTotals, annual_totals,
    expense_breakdown, goal_progress, month_totals, per_client_totals, sum_entries,
};
pub use loan::{
    AVERAGE_DAYS_PER_MONTH, Amortization, AmortizationSchedule, DebtProjection,
    DebtProjectionIter, LoanSummary, PAYOFF_ITERATION_CAP, Payoff, ProjectionPoint, ScheduleRow,
    debt_projection, loan_summary, monthly_payment, months_to_payoff, remaining_term_months,
    total_interest,
};
pub use net_worth::{
    Dated, InvestmentMatch, ItemPerformance, Performance, PortfolioPerformance,
    invested_this_month, monthly_performance, net_worth, portfolio_performance, upsert_snapshot,
};
pub use period::{
    PORTFOLIO_LOOKBACK_MONTHS, ParsePeriodError, PeriodKey, PortfolioSource, ResolvedPortfolio,
    default_portfolio_template, period_key, previous_period_key, resolve_portfolio,
};
pub use report::{DashboardSummary, ExportRow, NetWorth, export_rows};
pub use solver::{
    ExtraPaymentSolution, ExtraPaymentSolveConfig, SolveIteration, extra_payment_for_target_years,
    solve_extra_payment,
};
pub use store::{Edit, ExpenseList, IncomeKind, Rate, TransferAccount, apply, apply_all};
pub use tax::{
    BracketTable, BracketTableError, TaxBracket, TaxEstimate, TaxSettings, estimate_for_year,
    estimate_tax,
};
pub use types::{
    Amount, BalancePoint, Client, EntryId, ExpenseItem, GlobalConfig, Goals, IncomeEntry,
    InvestmentEntry, LOAN_AMORTIZATION_CATEGORY, Loan, MonthRecord, MonthRecords, Partner,
    PartnerAllocation, PartnerExpense, PartnerIncome, PortfolioItem, PortfolioPoint, Snapshot,
    Transfers,
};
