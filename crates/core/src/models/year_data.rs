use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::errors::CoreError;

use super::position::Position;
use super::transaction::{CashTransaction, StockTransaction};

/// All years of the ledger, keyed by 4-digit year string.
///
/// `BTreeMap` keeps keys in lexical order, which for 4-digit years is also
/// chronological order.
pub type YearMap = BTreeMap<String, YearData>;

/// Everything recorded for one fiscal year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearData {
    #[serde(default)]
    pub stocks: Vec<Position>,

    #[serde(default)]
    pub cash_transactions: Vec<CashTransaction>,

    #[serde(default)]
    pub stock_transactions: Vec<StockTransaction>,

    /// Running sum of `cash_transactions[].amount`
    #[serde(default)]
    pub cash_balance: f64,
}

impl YearData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a position by exact name.
    pub fn position(&self, name: &str) -> Option<&Position> {
        self.stocks.iter().find(|p| p.name == name)
    }

    pub fn position_mut(&mut self, name: &str) -> Option<&mut Position> {
        self.stocks.iter_mut().find(|p| p.name == name)
    }

    /// Insert or replace a position by name. A zero-share position is removed instead.
    pub fn upsert_position(&mut self, position: Position) {
        let idx = self.stocks.iter().position(|p| p.name == position.name);
        match (idx, position.shares > 0.0) {
            (Some(i), true) => self.stocks[i] = position,
            (Some(i), false) => {
                self.stocks.remove(i);
            }
            (None, true) => self.stocks.push(position),
            (None, false) => {}
        }
    }

    /// Append a cash movement and move the balance with it.
    pub fn push_cash(&mut self, tx: CashTransaction) {
        self.cash_balance += tx.amount;
        self.cash_transactions.push(tx);
    }

    /// Market value of all positions not in `hidden`.
    pub fn stock_value(&self, hidden: &BTreeSet<String>) -> f64 {
        self.stocks
            .iter()
            .filter(|p| !hidden.contains(&p.name))
            .map(Position::market_value)
            .sum()
    }

    /// Stock value of visible positions plus cash, in the ledger base currency.
    pub fn total_value(&self, hidden: &BTreeSet<String>) -> f64 {
        self.stock_value(hidden) + self.cash_balance
    }
}

/// Validate a year key and return its numeric value.
///
/// Years are 4-digit strings (e.g., "2024"); anything else is rejected so
/// that lexical ordering of keys stays chronological.
pub fn parse_year(year: &str) -> Result<i32, CoreError> {
    let trimmed = year.trim();
    if trimmed.len() != 4 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(CoreError::Validation(format!(
            "Invalid year '{year}': expected 4 digits (e.g., 2024)"
        )));
    }
    trimmed
        .parse::<i32>()
        .map_err(|e| CoreError::Validation(format!("Invalid year '{year}': {e}")))
}
