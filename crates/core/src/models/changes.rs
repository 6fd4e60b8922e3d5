use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::position::Position;
use super::transaction::{CashTransaction, StockTransaction};

/// Per-year summary sent alongside the entity buckets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearSummary {
    pub cash_balance: f64,
}

/// Minimal diff of local mutations since the last acknowledged sync.
///
/// This is the exact payload of `POST /api/updateNotion`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementalChanges {
    #[serde(default)]
    pub stocks: BTreeMap<String, Vec<Position>>,

    #[serde(default)]
    pub cash_transactions: BTreeMap<String, Vec<CashTransaction>>,

    #[serde(default)]
    pub stock_transactions: BTreeMap<String, Vec<StockTransaction>>,

    #[serde(default)]
    pub yearly_summaries: BTreeMap<String, YearSummary>,
}

impl IncrementalChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no bucket holds anything.
    pub fn is_empty(&self) -> bool {
        self.stocks.values().all(Vec::is_empty)
            && self.cash_transactions.values().all(Vec::is_empty)
            && self.stock_transactions.values().all(Vec::is_empty)
            && self.yearly_summaries.is_empty()
    }

    /// Number of entity entries across the three entity buckets.
    pub fn entity_count(&self) -> usize {
        self.stocks.values().map(Vec::len).sum::<usize>()
            + self.cash_transactions.values().map(Vec::len).sum::<usize>()
            + self.stock_transactions.values().map(Vec::len).sum::<usize>()
    }
}

/// What one ledger mutation touched, in the shape the change tracker records.
///
/// Returned by every `PositionLedger` mutation so the caller decides where
/// the diff goes; the ledger itself never talks to the tracker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerChange {
    pub year: String,
    pub positions: Vec<Position>,
    pub cash_transactions: Vec<CashTransaction>,
    pub stock_transactions: Vec<StockTransaction>,
    /// Cash balance of `year` after the mutation
    pub cash_balance: Option<f64>,
}

impl LedgerChange {
    pub fn for_year(year: impl Into<String>) -> Self {
        Self {
            year: year.into(),
            ..Self::default()
        }
    }

    /// Number of tracked entities this change produces (summaries excluded).
    pub fn entity_count(&self) -> usize {
        self.positions.len() + self.cash_transactions.len() + self.stock_transactions.len()
    }
}
