//! Pure edits over a [`Snapshot`]. Each edit returns a new snapshot and never
//! touches its input; the caller owns the current state.

use serde::Deserialize;

use super::net_worth::upsert_snapshot;
use super::period::PeriodKey;
use super::types::{
    BalancePoint, Client, EntryId, ExpenseItem, Goals, IncomeEntry, InvestmentEntry, Loan,
    MonthRecord, PortfolioItem, PortfolioPoint, Snapshot, clamp_percent, finite_or_zero,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Rate {
    Tax,
    Contribution,
    AmortizationSplit,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IncomeKind {
    Taxed,
    Untaxed,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExpenseList {
    Shared,
    Personal,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferAccount {
    Shared,
    Personal,
    Investment,
    Vacation,
}

/// A single user edit. New entries get their id assigned from `nextId`; any id
/// they carry is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Edit {
    SetRate { rate: Rate, value: f64 },
    SetVacationReserve { amount: f64 },
    AddClient { name: String, color: String },
    RemoveClient { id: EntryId },
    AddIncome { period: String, kind: IncomeKind, entry: IncomeEntry },
    RemoveIncome { period: String, kind: IncomeKind, id: EntryId },
    AddInvestment { period: String, entry: InvestmentEntry },
    RemoveInvestment { period: String, id: EntryId },
    ToggleInvestmentDone { period: String, id: EntryId },
    SetTransfer { period: String, account: TransferAccount, done: bool },
    SetPortfolio { period: String, items: Vec<PortfolioItem> },
    ClearMonth { period: String },
    AddExpense { list: ExpenseList, entry: ExpenseItem },
    RemoveExpense { list: ExpenseList, id: EntryId },
    AddInvestmentCategory { name: String },
    RecordPortfolioTotal { date: String, total: f64 },
    RecordLoanBalance { date: String, balance: f64 },
    SetLoan { loan: Loan },
    SetGoals { goals: Goals },
}

/// Largest id carried by any entry in `state`, 0 when there are none.
fn max_entry_id(state: &Snapshot) -> EntryId {
    let config = &state.config;
    let months = state.months.values().flat_map(|m| {
        m.taxed_income
            .iter()
            .chain(&m.untaxed_income)
            .map(|e| e.id)
            .chain(m.investments.iter().map(|e| e.id))
            .chain(m.portfolio.iter().flatten().map(|p| p.id))
    });
    config
        .clients
        .iter()
        .map(|c| c.id)
        .chain(config.shared_expenses.iter().map(|e| e.id))
        .chain(config.personal_expenses.iter().map(|e| e.id))
        .chain(config.partner.income.iter().map(|e| e.id))
        .chain(config.partner.expenses.iter().map(|e| e.id))
        .chain(config.partner.allocations.iter().map(|e| e.id))
        .chain(months)
        .max()
        .unwrap_or(0)
}

/// Next free id. Snapshots saved without `nextId` (or with a stale one) are
/// resumed past the largest id already in use.
fn allocate_id(state: &mut Snapshot) -> EntryId {
    let id = state
        .config
        .next_id
        .max(max_entry_id(state).saturating_add(1))
        .max(1);
    state.config.next_id = id + 1;
    id
}

fn month<'a>(state: &'a mut Snapshot, period: &str) -> &'a mut MonthRecord {
    state.months.entry(period.to_string()).or_default()
}

/// Month keys are stored in canonical `"2024-3"` form, so `"2024-03"` and
/// `"2024-03-15"` address the same record.
fn canonical_period(period: &str) -> Option<String> {
    PeriodKey::from_date_str(period).map(|p| p.to_string())
}

fn period_of(edit: &mut Edit) -> Option<&mut String> {
    match edit {
        Edit::AddIncome { period, .. }
        | Edit::RemoveIncome { period, .. }
        | Edit::AddInvestment { period, .. }
        | Edit::RemoveInvestment { period, .. }
        | Edit::ToggleInvestmentDone { period, .. }
        | Edit::SetTransfer { period, .. }
        | Edit::SetPortfolio { period, .. }
        | Edit::ClearMonth { period } => Some(period),
        _ => None,
    }
}

fn income_list(record: &mut MonthRecord, kind: IncomeKind) -> &mut Vec<IncomeEntry> {
    match kind {
        IncomeKind::Taxed => &mut record.taxed_income,
        IncomeKind::Untaxed => &mut record.untaxed_income,
    }
}

fn expense_list(state: &mut Snapshot, list: ExpenseList) -> &mut Vec<ExpenseItem> {
    match list {
        ExpenseList::Shared => &mut state.config.shared_expenses,
        ExpenseList::Personal => &mut state.config.personal_expenses,
    }
}

/// Applies `edit` to a copy of `state`. Month edits with an unreadable period
/// are dropped.
pub fn apply(state: &Snapshot, mut edit: Edit) -> Snapshot {
    if let Some(period) = period_of(&mut edit) {
        match canonical_period(period) {
            Some(key) => *period = key,
            None => {
                tracing::debug!(period = %period, "ignoring edit for unreadable period");
                return state.clone();
            }
        }
    }

    let mut next = state.clone();
    match edit {
        Edit::SetRate { rate, value } => {
            let value = clamp_percent(value);
            match rate {
                Rate::Tax => next.config.tax_rate = value,
                Rate::Contribution => next.config.contribution_rate = value,
                Rate::AmortizationSplit => next.config.amortization_split = value,
            }
        }
        Edit::SetVacationReserve { amount } => {
            next.config.vacation_reserve = finite_or_zero(amount).max(0.0);
        }
        Edit::AddClient { name, color } => {
            let id = allocate_id(&mut next);
            next.config.clients.push(Client { id, name, color });
        }
        Edit::RemoveClient { id } => {
            // Income already booked against the client stays; aggregation skips it.
            next.config.clients.retain(|c| c.id != id);
        }
        Edit::AddIncome {
            period,
            kind,
            mut entry,
        } => {
            entry.id = allocate_id(&mut next);
            entry.amount = finite_or_zero(entry.amount).max(0.0);
            income_list(month(&mut next, &period), kind).push(entry);
        }
        Edit::RemoveIncome { period, kind, id } => {
            if let Some(record) = next.months.get_mut(&period) {
                income_list(record, kind).retain(|e| e.id != id);
            }
        }
        Edit::AddInvestment { period, mut entry } => {
            entry.id = allocate_id(&mut next);
            entry.amount = finite_or_zero(entry.amount).max(0.0);
            month(&mut next, &period).investments.push(entry);
        }
        Edit::RemoveInvestment { period, id } => {
            if let Some(record) = next.months.get_mut(&period) {
                record.investments.retain(|e| e.id != id);
            }
        }
        Edit::ToggleInvestmentDone { period, id } => {
            if let Some(entry) = next
                .months
                .get_mut(&period)
                .and_then(|r| r.investments.iter_mut().find(|e| e.id == id))
            {
                entry.done = !entry.done;
            }
        }
        Edit::SetTransfer {
            period,
            account,
            done,
        } => {
            let transfers = &mut month(&mut next, &period).transfers;
            match account {
                TransferAccount::Shared => transfers.shared_account = done,
                TransferAccount::Personal => transfers.personal_account = done,
                TransferAccount::Investment => transfers.investment_account = done,
                TransferAccount::Vacation => transfers.vacation_account = done,
            }
        }
        Edit::SetPortfolio { period, items } => {
            let items = items
                .into_iter()
                .map(|mut item| {
                    item.amount = finite_or_zero(item.amount).max(0.0);
                    item
                })
                .collect();
            month(&mut next, &period).portfolio = Some(items);
        }
        Edit::ClearMonth { period } => {
            if let Some(record) = next.months.get_mut(&period) {
                *record = MonthRecord::default();
            }
        }
        Edit::AddExpense { list, mut entry } => {
            entry.id = allocate_id(&mut next);
            entry.amount = finite_or_zero(entry.amount).max(0.0);
            expense_list(&mut next, list).push(entry);
        }
        Edit::RemoveExpense { list, id } => {
            expense_list(&mut next, list).retain(|e| e.id != id);
        }
        Edit::AddInvestmentCategory { name } => {
            let name = name.trim().to_string();
            if !name.is_empty() && !next.config.investment_categories.contains(&name) {
                next.config.investment_categories.push(name);
            }
        }
        Edit::RecordPortfolioTotal { date, total } => {
            next.config.portfolio_history = upsert_snapshot(
                &next.config.portfolio_history,
                PortfolioPoint {
                    date,
                    total: finite_or_zero(total),
                },
            );
        }
        Edit::RecordLoanBalance { date, balance } => {
            let balance = finite_or_zero(balance).max(0.0);
            next.config.loan.balance_history = upsert_snapshot(
                &next.config.loan.balance_history,
                BalancePoint {
                    date,
                    balance,
                },
            );
            next.config.loan.current_balance = balance;
        }
        Edit::SetLoan { loan } => {
            next.config.loan = loan;
        }
        Edit::SetGoals { goals } => {
            next.config.goals = goals;
        }
    }
    next
}

/// Applies edits in order.
pub fn apply_all(state: &Snapshot, edits: impl IntoIterator<Item = Edit>) -> Snapshot {
    edits
        .into_iter()
        .fold(state.clone(), |acc, edit| apply(&acc, edit))
}
