use chrono::NaiveDate;
use serde::Serialize;

use super::types::{Loan, finite_or_zero};

/// Upper bound on simulated months. A simulation that reaches it means the
/// payment never gets ahead of interest; treat the value as "never", not as a
/// month count.
pub const PAYOFF_ITERATION_CAP: u32 = 500;

/// Average month length used to turn a date span into whole months.
pub const AVERAGE_DAYS_PER_MONTH: f64 = 30.44;

/// Most samples a debt projection yields.
pub const PROJECTION_MAX_SAMPLES: usize = 15;

/// Horizons longer than this are sampled every two years instead of yearly.
pub const PROJECTION_YEARLY_LIMIT_MONTHS: u32 = 14 * 12;

/// Remaining balances below this are treated as settled.
const SETTLED_EPSILON: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRow {
    pub month: u32,
    pub interest: f64,
    pub principal: f64,
    pub extra: f64,
    pub balance: f64,
}

/// Parameters of a fixed-payment loan simulated month by month.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Amortization {
    pub balance: f64,
    pub annual_rate: f64,
    pub fixed_payment: f64,
    pub extra_monthly: f64,
}

impl Amortization {
    pub fn new(balance: f64, annual_rate: f64, fixed_payment: f64, extra_monthly: f64) -> Self {
        Self {
            balance: finite_or_zero(balance).max(0.0),
            annual_rate: finite_or_zero(annual_rate).max(0.0),
            fixed_payment: finite_or_zero(fixed_payment).max(0.0),
            extra_monthly: finite_or_zero(extra_monthly).max(0.0),
        }
    }

    pub fn monthly_rate(&self) -> f64 {
        self.annual_rate / 100.0 / 12.0
    }

    /// Month-by-month rows until the balance is settled or the cap is hit.
    pub fn schedule(&self) -> AmortizationSchedule {
        AmortizationSchedule {
            monthly_rate: self.monthly_rate(),
            fixed_payment: self.fixed_payment,
            extra_monthly: self.extra_monthly,
            balance: self.balance,
            month: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AmortizationSchedule {
    monthly_rate: f64,
    fixed_payment: f64,
    extra_monthly: f64,
    balance: f64,
    month: u32,
}

impl Iterator for AmortizationSchedule {
    type Item = ScheduleRow;

    fn next(&mut self) -> Option<ScheduleRow> {
        if self.balance <= SETTLED_EPSILON || self.month >= PAYOFF_ITERATION_CAP {
            return None;
        }
        let interest = self.balance * self.monthly_rate;
        let principal = self.fixed_payment - interest;
        let mut next_balance = self.balance - principal - self.extra_monthly;
        if next_balance <= SETTLED_EPSILON {
            next_balance = 0.0;
        }
        let paid_down = self.balance - next_balance;
        let extra = self.extra_monthly.min(paid_down.max(0.0));
        self.balance = next_balance;
        self.month += 1;
        Some(ScheduleRow {
            month: self.month,
            interest,
            principal: paid_down - extra,
            extra,
            balance: next_balance,
        })
    }
}

/// Standard annuity installment `D·i(1+i)^n / ((1+i)^n − 1)` with `i` the monthly rate.
pub fn monthly_payment(balance: f64, annual_rate_percent: f64, term_months: i64) -> f64 {
    let balance = finite_or_zero(balance);
    if term_months <= 0 || balance <= 0.0 {
        return 0.0;
    }
    let n = term_months as f64;
    let i = finite_or_zero(annual_rate_percent).max(0.0) / 100.0 / 12.0;
    if i == 0.0 {
        return balance / n;
    }
    let growth = (1.0 + i).powf(n);
    let payment = balance * (i * growth) / (growth - 1.0);
    if payment.is_finite() { payment } else { 0.0 }
}

/// Whole months from `today` to `end_date`, never less than one.
pub fn remaining_term_months(end_date: NaiveDate, today: NaiveDate) -> u32 {
    let days = (end_date - today).num_days();
    let months = (days as f64 / AVERAGE_DAYS_PER_MONTH).floor();
    if months >= 1.0 { months as u32 } else { 1 }
}

/// Months until the balance is gone. Returns `PAYOFF_ITERATION_CAP` when the
/// payments never catch up with interest.
pub fn months_to_payoff(balance: f64, annual_rate: f64, fixed_payment: f64, extra_monthly: f64) -> u32 {
    Amortization::new(balance, annual_rate, fixed_payment, extra_monthly)
        .schedule()
        .count() as u32
}

/// Interest paid over the simulated life of the loan, up to the cap.
pub fn total_interest(balance: f64, annual_rate: f64, fixed_payment: f64, extra_monthly: f64) -> f64 {
    Amortization::new(balance, annual_rate, fixed_payment, extra_monthly)
        .schedule()
        .map(|row| row.interest)
        .sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "months", rename_all = "camelCase")]
pub enum Payoff {
    Months(u32),
    Never,
}

impl Payoff {
    pub fn from_months(months: u32) -> Self {
        if months >= PAYOFF_ITERATION_CAP {
            Payoff::Never
        } else {
            Payoff::Months(months)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionPoint {
    pub month_offset: u32,
    pub balance: f64,
}

/// Balance samples over a horizon. Iterating is lazy and can be repeated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebtProjection {
    loan: Amortization,
    horizon_months: u32,
    interval_months: u32,
}

impl DebtProjection {
    pub fn interval_months(&self) -> u32 {
        self.interval_months
    }

    pub fn iter(&self) -> DebtProjectionIter {
        DebtProjectionIter {
            schedule: self.loan.schedule(),
            balance: self.loan.balance,
            simulated: 0,
            next_offset: 0,
            horizon_months: self.horizon_months,
            interval_months: self.interval_months,
            emitted: 0,
            finished: false,
        }
    }
}

impl<'a> IntoIterator for &'a DebtProjection {
    type Item = ProjectionPoint;
    type IntoIter = DebtProjectionIter;

    fn into_iter(self) -> DebtProjectionIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct DebtProjectionIter {
    schedule: AmortizationSchedule,
    balance: f64,
    simulated: u32,
    next_offset: u32,
    horizon_months: u32,
    interval_months: u32,
    emitted: usize,
    finished: bool,
}

impl Iterator for DebtProjectionIter {
    type Item = ProjectionPoint;

    fn next(&mut self) -> Option<ProjectionPoint> {
        if self.finished
            || self.emitted >= PROJECTION_MAX_SAMPLES
            || self.next_offset > self.horizon_months
        {
            return None;
        }
        while self.simulated < self.next_offset && self.balance > 0.0 {
            match self.schedule.next() {
                Some(row) => self.balance = row.balance,
                // Cap reached without settling; the balance stays where it is.
                None => break,
            }
            self.simulated += 1;
        }
        let point = ProjectionPoint {
            month_offset: self.next_offset,
            balance: self.balance,
        };
        self.emitted += 1;
        self.next_offset += self.interval_months;
        if self.balance <= 0.0 {
            self.finished = true;
        }
        Some(point)
    }
}

/// Samples the balance yearly (or every two years for long horizons),
/// stopping early once the loan is paid off.
pub fn debt_projection(
    balance: f64,
    annual_rate: f64,
    fixed_payment: f64,
    extra_monthly: f64,
    horizon_months: u32,
) -> DebtProjection {
    let interval_months = if horizon_months <= PROJECTION_YEARLY_LIMIT_MONTHS {
        12
    } else {
        24
    };
    DebtProjection {
        loan: Amortization::new(balance, annual_rate, fixed_payment, extra_monthly),
        horizon_months,
        interval_months,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanSummary {
    pub effective_rate: f64,
    pub current_balance: f64,
    pub monthly_payment: f64,
    pub monthly_outlay: f64,
    pub remaining_term_months: Option<u32>,
    /// Installment that would close the loan exactly at `endDate`.
    pub scheduled_payment: Option<f64>,
    pub payoff: Payoff,
    pub payoff_with_extra: Payoff,
    pub total_interest: f64,
    pub total_interest_with_extra: f64,
    pub interest_saved: f64,
    pub equity: f64,
    pub principal_repaid: f64,
    pub percent_repaid: f64,
    pub projection: Vec<ProjectionPoint>,
}

/// Derived mortgage figures for the dashboard. `extra_monthly` is the amount
/// routed to amortization this month.
pub fn loan_summary(loan: &Loan, extra_monthly: f64, today: NaiveDate) -> LoanSummary {
    let rate = loan.effective_rate();
    let balance = finite_or_zero(loan.current_balance).max(0.0);
    let remaining = loan.end_date.map(|end| remaining_term_months(end, today));

    let base_months = months_to_payoff(balance, rate, loan.monthly_payment, 0.0);
    let extra_months = months_to_payoff(balance, rate, loan.monthly_payment, extra_monthly);
    let interest = total_interest(balance, rate, loan.monthly_payment, 0.0);
    let interest_with_extra = total_interest(balance, rate, loan.monthly_payment, extra_monthly);

    let principal = finite_or_zero(loan.initial_principal);
    let principal_repaid = (principal - balance).max(0.0);
    let percent_repaid = if principal > 0.0 {
        principal_repaid / principal * 100.0
    } else {
        0.0
    };

    let horizon = base_months.min(PAYOFF_ITERATION_CAP);
    let projection = debt_projection(balance, rate, loan.monthly_payment, extra_monthly, horizon)
        .iter()
        .collect();

    LoanSummary {
        effective_rate: rate,
        current_balance: balance,
        monthly_payment: finite_or_zero(loan.monthly_payment),
        monthly_outlay: finite_or_zero(loan.monthly_payment) + finite_or_zero(loan.insurance),
        remaining_term_months: remaining,
        scheduled_payment: remaining.map(|n| monthly_payment(balance, rate, n as i64)),
        payoff: Payoff::from_months(base_months),
        payoff_with_extra: Payoff::from_months(extra_months),
        total_interest: interest,
        total_interest_with_extra: interest_with_extra,
        interest_saved: (interest - interest_with_extra).max(0.0),
        equity: finite_or_zero(loan.home_value) - balance,
        principal_repaid,
        percent_repaid,
        projection,
    }
}
