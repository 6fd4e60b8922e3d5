use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::transaction::TradeSide;

/// Growth of one year against the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearGrowth {
    pub year: String,
    pub previous_year: String,

    /// Total value change, deposits included: V(year) - V(previous)
    pub actual_growth: f64,

    /// actual_growth / V(previous) × 100; `None` when V(previous) ≤ 0
    pub actual_growth_rate: Option<f64>,

    /// Value change with this year's deposits stripped out
    pub investment_growth: f64,

    /// ((V(year) - deposits) / V(previous) - 1) × 100; `None` when V(previous) ≤ 0
    pub investment_growth_rate: Option<f64>,

    /// Deposit-kind cash of `year`, carryover included (trade cash excluded)
    pub year_deposits: f64,
}

/// Cumulative investment vs. value at a given year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentReturn {
    /// Net deposits minus withdrawals up to and including the year
    pub total_investment: f64,
    pub portfolio_value: f64,
    pub absolute_return: f64,
    /// absolute_return / total_investment × 100 (0 when nothing was invested)
    pub percentage_return: f64,
}

/// Market value per stock for one year, plus the stock total (cash excluded).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearValues {
    pub by_stock: BTreeMap<String, f64>,
    pub total: f64,
}

/// What a trade would do, computed before anything is mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradePreview {
    pub stock_name: String,
    pub side: TradeSide,
    pub shares: f64,
    pub price: f64,
    pub old_shares: f64,
    pub new_shares: f64,
    pub old_cost_price: f64,
    pub new_cost_price: f64,
    pub cash_delta: f64,
    pub cash_after: f64,
    /// True when a buy would push the cash balance below zero
    pub needs_cash_confirmation: bool,
    /// (price - old_cost) × shares, sells with a known cost only
    pub expected_profit: Option<f64>,
    /// (price / old_cost - 1) × 100, sells with a known cost only
    pub expected_profit_pct: Option<f64>,
}
