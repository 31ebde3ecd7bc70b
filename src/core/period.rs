use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::types::{MonthRecords, PortfolioItem};

/// How far back `resolve_portfolio` walks before giving up on inheritance.
pub const PORTFOLIO_LOOKBACK_MONTHS: u32 = 12;

/// A `year-month` identifier. Displays as `"2024-3"`: 1-based month, no padding,
/// exactly the form month records are keyed by.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodKey {
    year: i32,
    month: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePeriodError(String);

impl fmt::Display for ParsePeriodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid period key {:?}", self.0)
    }
}

impl std::error::Error for ParsePeriodError {}

impl PeriodKey {
    /// Returns `None` when `month` is outside 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year.saturating_sub(1),
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year.saturating_add(1),
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The twelve keys of `year`, January first.
    pub fn months_of(year: i32) -> impl Iterator<Item = PeriodKey> {
        (1..=12).map(move |month| PeriodKey { year, month })
    }

    /// Reads either a period key (`2024-3`) or an ISO date (`2024-03-15`).
    pub fn from_date_str(value: &str) -> Option<Self> {
        let mut parts = value.trim().splitn(3, '-');
        let year = parts.next()?.parse::<i32>().ok()?;
        let month = parts.next()?.parse::<u32>().ok()?;
        if let Some(day) = parts.next() {
            day.get(..2.min(day.len()))?.parse::<u32>().ok()?;
        }
        Self::new(year, month)
    }
}

impl From<NaiveDate> for PeriodKey {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.month)
    }
}

impl FromStr for PeriodKey {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| ParsePeriodError(s.to_string()))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| ParsePeriodError(s.to_string()))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| ParsePeriodError(s.to_string()))?;
        Self::new(year, month).ok_or_else(|| ParsePeriodError(s.to_string()))
    }
}

impl Serialize for PeriodKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PeriodKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PeriodKey::from_date_str(&raw)
            .ok_or_else(|| serde::de::Error::custom(ParsePeriodError(raw)))
    }
}

/// Formats `year`/`month` the way month records are keyed.
pub fn period_key(year: i32, month: u32) -> String {
    format!("{year}-{month}")
}

/// `None` for keys that do not parse; callers treat that as "no history".
pub fn previous_period_key(key: &str) -> Option<String> {
    key.parse::<PeriodKey>()
        .ok()
        .map(|period| period.previous().to_string())
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "period", rename_all = "camelCase")]
pub enum PortfolioSource {
    Own,
    Inherited(PeriodKey),
    Template,
}

#[derive(Debug, Clone)]
pub struct ResolvedPortfolio<'a> {
    pub source: PortfolioSource,
    pub items: Cow<'a, [PortfolioItem]>,
}

impl ResolvedPortfolio<'_> {
    pub fn total(&self) -> f64 {
        super::ledger::sum_entries(&self.items)
    }
}

/// Holdings every new user starts from.
pub fn default_portfolio_template() -> Vec<PortfolioItem> {
    [
        (1, "Index funds", "FONDOS"),
        (2, "Stocks", "ACCIONES"),
        (3, "Crypto", "CRYPTO"),
        (4, "Savings account", "AHORRO"),
    ]
    .into_iter()
    .map(|(id, description, category)| PortfolioItem {
        id,
        description: description.to_string(),
        category: category.to_string(),
        amount: 0.0,
    })
    .collect()
}

/// The portfolio to show for `key`: its own snapshot, else the nearest prior
/// month's within `PORTFOLIO_LOOKBACK_MONTHS`, else the default template.
pub fn resolve_portfolio<'a>(key: &str, records: &'a MonthRecords) -> ResolvedPortfolio<'a> {
    let parsed = key.parse::<PeriodKey>().ok();
    let own = records.get(key).or_else(|| {
        parsed.and_then(|period| records.get(&period.to_string()))
    });
    if let Some(items) = own.and_then(|r| r.portfolio.as_deref()) {
        return ResolvedPortfolio {
            source: PortfolioSource::Own,
            items: Cow::Borrowed(items),
        };
    }

    if let Some(start) = parsed {
        let mut cursor = start;
        for _ in 0..PORTFOLIO_LOOKBACK_MONTHS {
            cursor = cursor.previous();
            if let Some(items) = records
                .get(&cursor.to_string())
                .and_then(|r| r.portfolio.as_deref())
            {
                return ResolvedPortfolio {
                    source: PortfolioSource::Inherited(cursor),
                    items: Cow::Borrowed(items),
                };
            }
        }
    }

    tracing::debug!(period = key, "no portfolio within lookback, using template");
    ResolvedPortfolio {
        source: PortfolioSource::Template,
        items: Cow::Owned(default_portfolio_template()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::MonthRecord;

    fn item(id: u64, amount: f64) -> PortfolioItem {
        PortfolioItem {
            id,
            description: format!("item {id}"),
            category: "FONDOS".to_string(),
            amount,
        }
    }

    fn records_with_portfolio(keys: &[(&str, f64)]) -> MonthRecords {
        keys.iter()
            .map(|(key, amount)| {
                (
                    key.to_string(),
                    MonthRecord {
                        portfolio: Some(vec![item(1, *amount)]),
                        ..MonthRecord::default()
                    },
                )
            })
            .collect()
    }

    #[test]
    fn period_key_has_no_zero_padding() {
        assert_eq!(period_key(2024, 3), "2024-3");
        assert_eq!(PeriodKey::new(2024, 11).expect("valid").to_string(), "2024-11");
        assert!(PeriodKey::new(2024, 0).is_none());
        assert!(PeriodKey::new(2024, 13).is_none());
    }

    #[test]
    fn previous_rolls_the_year_at_january() {
        assert_eq!(previous_period_key("2024-1").as_deref(), Some("2023-12"));
        assert_eq!(previous_period_key("2024-7").as_deref(), Some("2024-6"));
        assert_eq!(previous_period_key("garbage"), None);
        let dec = PeriodKey::new(2023, 12).expect("valid");
        assert_eq!(dec.next().to_string(), "2024-1");
    }

    #[test]
    fn stepping_past_the_year_range_saturates() {
        let last: PeriodKey = "2147483647-12".parse().expect("valid");
        assert_eq!(last.next().year(), i32::MAX);
        assert_eq!(last.next().month(), 1);
        let first = PeriodKey::new(i32::MIN, 1).expect("valid");
        assert_eq!(first.previous().year(), i32::MIN);
        assert_eq!(first.previous().month(), 12);
    }

    #[test]
    fn parses_period_keys_and_iso_dates() {
        assert_eq!(
            PeriodKey::from_date_str("2024-03-15"),
            PeriodKey::new(2024, 3)
        );
        assert_eq!(PeriodKey::from_date_str("2024-3"), PeriodKey::new(2024, 3));
        assert_eq!(PeriodKey::from_date_str("2024-13-01"), None);
        assert_eq!(PeriodKey::from_date_str(""), None);
        assert!("2024-03".parse::<PeriodKey>().is_ok());
        assert!("2024".parse::<PeriodKey>().is_err());
    }

    #[test]
    fn months_of_covers_the_year_in_order() {
        let keys: Vec<String> = PeriodKey::months_of(2025).map(|k| k.to_string()).collect();
        assert_eq!(keys.len(), 12);
        assert_eq!(keys[0], "2025-1");
        assert_eq!(keys[11], "2025-12");
    }

    #[test]
    fn resolve_prefers_own_portfolio() {
        let records = records_with_portfolio(&[("2024-5", 10.0), ("2024-4", 20.0)]);
        let resolved = resolve_portfolio("2024-5", &records);
        assert_eq!(resolved.source, PortfolioSource::Own);
        assert_eq!(resolved.total(), 10.0);
    }

    #[test]
    fn resolve_inherits_nearest_prior_month_across_year_boundary() {
        let records = records_with_portfolio(&[("2023-10", 5.0), ("2023-11", 7.0)]);
        let resolved = resolve_portfolio("2024-2", &records);
        assert_eq!(
            resolved.source,
            PortfolioSource::Inherited(PeriodKey::new(2023, 11).expect("valid"))
        );
        assert_eq!(resolved.total(), 7.0);
    }

    #[test]
    fn resolve_lookback_is_bounded_to_twelve_months() {
        let twelve_back = records_with_portfolio(&[("2023-6", 3.0)]);
        let resolved = resolve_portfolio("2024-6", &twelve_back);
        assert_eq!(
            resolved.source,
            PortfolioSource::Inherited(PeriodKey::new(2023, 6).expect("valid"))
        );

        let thirteen_back = records_with_portfolio(&[("2023-5", 3.0)]);
        let resolved = resolve_portfolio("2024-6", &thirteen_back);
        assert_eq!(resolved.source, PortfolioSource::Template);
        assert_eq!(resolved.items.len(), default_portfolio_template().len());
    }

    #[test]
    fn resolve_month_without_portfolio_field_is_skipped() {
        let mut records = records_with_portfolio(&[("2024-1", 9.0)]);
        records.insert("2024-2".to_string(), MonthRecord::default());
        let resolved = resolve_portfolio("2024-2", &records);
        assert_eq!(
            resolved.source,
            PortfolioSource::Inherited(PeriodKey::new(2024, 1).expect("valid"))
        );
    }

    #[test]
    fn resolve_with_corrupt_key_falls_back_to_template() {
        let records = records_with_portfolio(&[("2024-1", 9.0)]);
        let resolved = resolve_portfolio("not-a-key", &records);
        assert_eq!(resolved.source, PortfolioSource::Template);
    }

    #[test]
    fn period_key_serializes_as_plain_string() {
        let key = PeriodKey::new(2024, 9).expect("valid");
        let json = serde_json::to_string(&key).expect("serialize");
        assert_eq!(json, "\"2024-9\"");
        let back: PeriodKey = serde_json::from_str("\"2024-09-30\"").expect("parse");
        assert_eq!(back, key);
    }
}
