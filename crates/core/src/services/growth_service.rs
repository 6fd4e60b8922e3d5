use std::collections::{BTreeMap, BTreeSet};

use crate::errors::CoreError;
use crate::models::analytics::{InvestmentReturn, YearGrowth, YearValues};
use crate::models::year_data::{parse_year, YearMap};

use super::transaction_log::TransactionLog;

/// Derives growth figures from ledger snapshots.
///
/// Values are taken in the ledger base currency with hidden positions
/// excluded; rates and CAGR are ratios and therefore currency-independent.
pub struct GrowthCalculator {
    log: TransactionLog,
}

impl GrowthCalculator {
    pub fn new() -> Self {
        Self {
            log: TransactionLog::new(),
        }
    }

    /// Growth of `year` against `previous_year`.
    pub fn year_over_year_growth(
        &self,
        years: &YearMap,
        year: &str,
        previous_year: &str,
        hidden: &BTreeSet<String>,
    ) -> Result<YearGrowth, CoreError> {
        let current = years
            .get(year)
            .ok_or_else(|| CoreError::YearNotFound(year.to_string()))?;
        let previous = years
            .get(previous_year)
            .ok_or_else(|| CoreError::YearNotFound(previous_year.to_string()))?;

        let value = current.total_value(hidden);
        let previous_value = previous.total_value(hidden);
        let deposits = self.log.year_deposits(current);

        let actual_growth = value - previous_value;
        let has_base = previous_value > 0.0;

        Ok(YearGrowth {
            year: year.to_string(),
            previous_year: previous_year.to_string(),
            actual_growth,
            actual_growth_rate: has_base.then(|| actual_growth / previous_value * 100.0),
            investment_growth: actual_growth - deposits,
            investment_growth_rate: has_base
                .then(|| ((value - deposits) / previous_value - 1.0) * 100.0),
            year_deposits: deposits,
        })
    }

    /// Growth of every year against the year before it, oldest first.
    pub fn growth_series(
        &self,
        years: &YearMap,
        hidden: &BTreeSet<String>,
    ) -> Result<Vec<YearGrowth>, CoreError> {
        let keys: Vec<&String> = years.keys().collect();
        keys.windows(2)
            .map(|pair| self.year_over_year_growth(years, pair[1], pair[0], hidden))
            .collect()
    }

    /// Compound annual growth rate (percent) from the first to the last year.
    ///
    /// The base is the first year's value, or the net cumulative deposits
    /// when that value is not positive. Returns `None` without a positive
    /// base or without any year.
    pub fn cagr(&self, years: &YearMap, hidden: &BTreeSet<String>) -> Option<f64> {
        let (first_key, first) = years.iter().next()?;
        let (last_key, last) = years.iter().next_back()?;
        let first_year = parse_year(first_key).ok()?;
        let last_year = parse_year(last_key).ok()?;

        let first_value = first.total_value(hidden);
        let base = if first_value > 0.0 {
            first_value
        } else {
            years
                .values()
                .fold(0.0, |sum, y| sum + self.log.net_deposits(y))
        };
        if base <= 0.0 {
            return None;
        }

        let total_return = last.total_value(hidden) / base - 1.0;
        let investment_years = f64::from(last_year - first_year + 1);
        Some(((1.0 + total_return).powf(1.0 / investment_years) - 1.0) * 100.0)
    }

    /// Market value per visible stock for every year, plus the stock total.
    pub fn yearly_values(
        &self,
        years: &YearMap,
        hidden: &BTreeSet<String>,
    ) -> BTreeMap<String, YearValues> {
        years
            .iter()
            .map(|(year, data)| {
                let mut values = YearValues::default();
                for p in data.stocks.iter().filter(|p| !hidden.contains(&p.name)) {
                    *values.by_stock.entry(p.name.clone()).or_insert(0.0) += p.market_value();
                }
                values.total = values.by_stock.values().sum();
                (year.clone(), values)
            })
            .collect()
    }

    /// Net money put in (deposits minus withdrawals) over all years up to `year`.
    ///
    /// Carryovers are skipped: the cash they move was already counted in
    /// the year it was deposited.
    pub fn total_investment(&self, years: &YearMap, year: &str) -> f64 {
        years
            .range(..=year.to_string())
            .fold(0.0, |sum, (_, data)| sum + self.log.net_fresh_deposits(data))
    }

    /// Cumulative investment against the value of `year`.
    pub fn investment_return(
        &self,
        years: &YearMap,
        year: &str,
        hidden: &BTreeSet<String>,
    ) -> Result<InvestmentReturn, CoreError> {
        let data = years
            .get(year)
            .ok_or_else(|| CoreError::YearNotFound(year.to_string()))?;
        let total_investment = self.total_investment(years, year);
        let portfolio_value = data.total_value(hidden);
        let absolute_return = portfolio_value - total_investment;
        let percentage_return = if total_investment > 0.0 {
            absolute_return / total_investment * 100.0
        } else {
            0.0
        };

        Ok(InvestmentReturn {
            total_investment,
            portfolio_value,
            absolute_return,
            percentage_return,
        })
    }

    /// Whole years needed to grow `current` into `goal` at `annual_rate_pct`.
    /// `None` when the goal is unreachable (no positive rate or no starting amount).
    pub fn years_to_goal(&self, current: f64, goal: f64, annual_rate_pct: f64) -> Option<u32> {
        if current <= 0.0 || annual_rate_pct <= 0.0 || !goal.is_finite() {
            return None;
        }
        if goal <= current {
            return Some(0);
        }
        let years = (goal / current).ln() / (1.0 + annual_rate_pct / 100.0).ln();
        Some(years.ceil() as u32)
    }

    /// Annual return (percent) needed to grow `current` into `goal` in `years`.
    pub fn required_return_rate(&self, current: f64, goal: f64, years: u32) -> Option<f64> {
        if current <= 0.0 || years == 0 {
            return None;
        }
        Some(((goal / current).powf(1.0 / f64::from(years)) - 1.0) * 100.0)
    }
}

impl Default for GrowthCalculator {
    fn default() -> Self {
        Self::new()
    }
}
