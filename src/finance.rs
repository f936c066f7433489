//! Revenue reporting over sales within a date range.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("custom range needs both `from` and `to`")]
    MissingCustomDates,
    #[error("range starts after it ends: {from} > {to}")]
    Inverted { from: NaiveDate, to: NaiveDate },
    #[error("date out of supported range")]
    OutOfRange,
}

/// A sale, carrying one amount booked under one revenue type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub sale_id: String,
    pub sale_date: NaiveDate,
    pub revenue_type_id: String,
    pub amount: f64,
}

/// A user-configured revenue category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueType {
    pub revenue_type_id: String,
    pub revenue_name: String,
}

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    // ---
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, RangeError> {
        if from > to {
            return Err(RangeError::Inverted { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// Preset ranges offered next to a custom range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRangeOption {
    ThisYear,
    Last7Days,
    Last14Days,
    Last30Days,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    Custom,
}

/// A range as chosen by the user: a preset, or `custom` with explicit dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RangeSelection {
    pub option: DateRangeOption,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl RangeSelection {
    // ---
    /// Resolve to concrete days, relative to `today` and the first day of the week.
    ///
    /// `last_N_days` ends today and spans N days including today.
    pub fn resolve(&self, today: NaiveDate, week_start: Weekday) -> Result<DateRange, RangeError> {
        // ---
        let range = match self.option {
            DateRangeOption::ThisYear => DateRange {
                from: ymd(today.year(), 1, 1)?,
                to: ymd(today.year(), 12, 31)?,
            },
            DateRangeOption::Last7Days => last_days(today, 7)?,
            DateRangeOption::Last14Days => last_days(today, 14)?,
            DateRangeOption::Last30Days => last_days(today, 30)?,
            DateRangeOption::ThisWeek => week_of(today, week_start)?,
            DateRangeOption::LastWeek => {
                let a_week_ago = today.checked_sub_days(Days::new(7)).ok_or(RangeError::OutOfRange)?;
                week_of(a_week_ago, week_start)?
            }
            DateRangeOption::ThisMonth => month_of(today)?,
            DateRangeOption::LastMonth => {
                let a_month_ago = today.checked_sub_months(Months::new(1)).ok_or(RangeError::OutOfRange)?;
                month_of(a_month_ago)?
            }
            DateRangeOption::Custom => match (self.from, self.to) {
                (Some(from), Some(to)) => DateRange::new(from, to)?,
                _ => return Err(RangeError::MissingCustomDates),
            },
        };
        Ok(range)
    }
}

fn ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate, RangeError> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or(RangeError::OutOfRange)
}

fn last_days(today: NaiveDate, days: u64) -> Result<DateRange, RangeError> {
    let from = today
        .checked_sub_days(Days::new(days - 1))
        .ok_or(RangeError::OutOfRange)?;
    Ok(DateRange { from, to: today })
}

fn week_of(day: NaiveDate, week_start: Weekday) -> Result<DateRange, RangeError> {
    // ---
    let week = day.week(week_start);
    Ok(DateRange {
        from: week.checked_first_day().ok_or(RangeError::OutOfRange)?,
        to: week.checked_last_day().ok_or(RangeError::OutOfRange)?,
    })
}

fn month_of(day: NaiveDate) -> Result<DateRange, RangeError> {
    // ---
    let from = ymd(day.year(), day.month(), 1)?;
    let to = from
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or(RangeError::OutOfRange)?;
    Ok(DateRange { from, to })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueReport {
    pub range: DateRange,
    pub total: f64,
    /// Revenue per revenue-type name.
    pub breakdown: BTreeMap<String, f64>,
    /// Sales inside the range, oldest first.
    pub sales: Vec<Sale>,
}

/// Sales dated within `range` (inclusive), oldest first.
pub fn filter_sales_by_date_range(sales: &[Sale], range: &DateRange) -> Vec<Sale> {
    // ---
    let mut filtered: Vec<Sale> = sales
        .iter()
        .filter(|s| range.contains(s.sale_date))
        .cloned()
        .collect();
    filtered.sort_by_key(|s| s.sale_date);
    filtered
}

/// Total and per-type revenue of the sales in `range`.
///
/// Sales booked under a revenue type that is not configured are left out of
/// both the total and the breakdown.
pub fn revenue_report(sales: &[Sale], range: &DateRange, revenue_types: &[RevenueType]) -> RevenueReport {
    // ---
    let names: HashMap<&str, &str> = revenue_types
        .iter()
        .map(|t| (t.revenue_type_id.as_str(), t.revenue_name.as_str()))
        .collect();

    let in_range = filter_sales_by_date_range(sales, range);
    let mut breakdown = BTreeMap::new();
    let mut total = 0.0;

    for sale in &in_range {
        let Some(name) = names.get(sale.revenue_type_id.as_str()) else {
            tracing::debug!(
                "Sale {} has unknown revenue type {}, skipping",
                sale.sale_id,
                sale.revenue_type_id
            );
            continue;
        };
        *breakdown.entry(name.to_string()).or_insert(0.0) += sale.amount;
        total += sale.amount;
    }

    RevenueReport {
        range: *range,
        total,
        breakdown,
        sales: in_range,
    }
}
