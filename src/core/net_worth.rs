use serde::Serialize;

use super::ledger::sum_entries;
use super::period::PeriodKey;
use super::types::{
    BalancePoint, EntryId, InvestmentEntry, PortfolioItem, PortfolioPoint, finite_or_zero,
};

pub fn net_worth(portfolio_total: f64, home_value: f64, loan_balance: f64) -> f64 {
    finite_or_zero(portfolio_total) + (finite_or_zero(home_value) - finite_or_zero(loan_balance))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InvestmentMatch {
    Linked,
    DescriptionMatch,
    Unmatched,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub previous: f64,
    pub current: f64,
    pub invested: f64,
    pub invested_match: InvestmentMatch,
    pub gain: f64,
    pub percent: f64,
}

/// Money put into `item` this month. Entries linked by id win; otherwise the
/// first unlinked entry whose description mentions the item is used.
pub fn invested_this_month(
    item: &PortfolioItem,
    investments: &[InvestmentEntry],
) -> (f64, InvestmentMatch) {
    let linked: Vec<&InvestmentEntry> = investments
        .iter()
        .filter(|e| e.portfolio_item_id == Some(item.id))
        .collect();
    if !linked.is_empty() {
        let total = linked.iter().map(|e| finite_or_zero(e.amount)).sum();
        return (total, InvestmentMatch::Linked);
    }

    let needle = item.description.trim().to_lowercase();
    if needle.is_empty() {
        return (0.0, InvestmentMatch::Unmatched);
    }
    investments
        .iter()
        .filter(|e| e.portfolio_item_id.is_none())
        .find(|e| e.description.to_lowercase().contains(&needle))
        .map(|e| (finite_or_zero(e.amount), InvestmentMatch::DescriptionMatch))
        .unwrap_or((0.0, InvestmentMatch::Unmatched))
}

fn find_previous<'a>(item: &PortfolioItem, previous: &'a [PortfolioItem]) -> Option<&'a PortfolioItem> {
    previous.iter().find(|p| p.id == item.id).or_else(|| {
        let description = item.description.trim();
        previous
            .iter()
            .find(|p| p.description.trim().eq_ignore_ascii_case(description))
    })
}

/// Month-over-month gain of one holding net of new money. `None` when there is
/// no positive prior value to compare against.
pub fn monthly_performance(
    current: &PortfolioItem,
    previous_month: &[PortfolioItem],
    this_month_investments: &[InvestmentEntry],
) -> Option<Performance> {
    let previous = find_previous(current, previous_month)?;
    let previous_amount = finite_or_zero(previous.amount);
    if previous_amount <= 0.0 {
        return None;
    }
    let current_amount = finite_or_zero(current.amount);
    let (invested, invested_match) = invested_this_month(current, this_month_investments);
    let gain = current_amount - previous_amount - invested;
    Some(Performance {
        previous: previous_amount,
        current: current_amount,
        invested,
        invested_match,
        gain,
        percent: gain / previous_amount * 100.0,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPerformance {
    pub item_id: EntryId,
    pub description: String,
    pub category: String,
    pub amount: f64,
    pub performance: Option<Performance>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioPerformance {
    pub total: f64,
    pub previous_total: f64,
    pub items: Vec<ItemPerformance>,
    /// Sum of gains over items that have a comparison point.
    pub gain: f64,
}

pub fn portfolio_performance(
    current: &[PortfolioItem],
    previous_month: &[PortfolioItem],
    this_month_investments: &[InvestmentEntry],
) -> PortfolioPerformance {
    let items: Vec<ItemPerformance> = current
        .iter()
        .map(|item| ItemPerformance {
            item_id: item.id,
            description: item.description.clone(),
            category: item.category.clone(),
            amount: finite_or_zero(item.amount),
            performance: monthly_performance(item, previous_month, this_month_investments),
        })
        .collect();
    let gain = items
        .iter()
        .filter_map(|i| i.performance.map(|p| p.gain))
        .sum();
    PortfolioPerformance {
        total: sum_entries(current),
        previous_total: sum_entries(previous_month),
        items,
        gain,
    }
}

/// A history entry stamped with a date string that maps onto a period.
pub trait Dated {
    fn date(&self) -> &str;

    fn period(&self) -> Option<PeriodKey> {
        PeriodKey::from_date_str(self.date())
    }
}

impl Dated for PortfolioPoint {
    fn date(&self) -> &str {
        &self.date
    }
}

impl Dated for BalancePoint {
    fn date(&self) -> &str {
        &self.date
    }
}

/// Inserts `entry` keeping one entry per period in ascending order. An entry
/// for a period already present replaces it, and an out-of-order history comes
/// back sorted. An `entry` with an unreadable date leaves the history
/// untouched; existing entries with unreadable dates are dropped on the next
/// insert.
pub fn upsert_snapshot<T: Dated + Clone>(history: &[T], entry: T) -> Vec<T> {
    let Some(period) = entry.period() else {
        tracing::debug!(date = entry.date(), "ignoring history entry with unreadable date");
        return history.to_vec();
    };

    let mut out: Vec<T> = history
        .iter()
        .filter(|h| h.period().is_some_and(|p| p != period))
        .cloned()
        .collect();
    out.sort_by_key(|h| h.period());
    let at = out.partition_point(|h| h.period().is_some_and(|p| p < period));
    out.insert(at, entry);
    out
}
