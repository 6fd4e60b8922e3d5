use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A holding of one named security within one fiscal year.
///
/// The `id` stays the same when a holding is carried into the next year,
/// so the remote store can link the rows. Lookups inside the ledger go
/// through `name` (exact, case-sensitive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: Uuid,

    /// Display name, unique within a year (e.g., "Tencent")
    pub name: String,

    /// Quote symbol used by the price feed (e.g., "0700.HK", "GOOGL")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,

    /// Shares held (never negative; zero-share positions are removed)
    pub shares: f64,

    /// Last known market price in the ledger base currency
    pub price: f64,

    /// Weighted-average cost per share
    pub cost_price: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_uuid: Option<String>,
}

impl Position {
    pub fn new(name: impl Into<String>, shares: f64, price: f64, cost_price: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            symbol: None,
            shares,
            price,
            cost_price,
            user_uuid: None,
        }
    }

    /// Builder-style symbol setter. Blank symbols are stored as `None`.
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = normalize_symbol(Some(symbol.into()));
        self
    }

    /// Market value: shares × last price.
    pub fn market_value(&self) -> f64 {
        self.shares * self.price
    }

    /// Total cost still in the pool: shares × weighted-average cost.
    pub fn total_cost(&self) -> f64 {
        self.shares * self.cost_price
    }
}

/// Trim a symbol and collapse blank strings to `None`.
pub(crate) fn normalize_symbol(symbol: Option<String>) -> Option<String> {
    symbol
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
