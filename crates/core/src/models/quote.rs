use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single price quote from the price feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub price: f64,

    /// Quote currency; `None` means the ledger base currency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl Quote {
    pub fn new(price: f64) -> Self {
        Self {
            price,
            currency: None,
            name: None,
            last_updated: None,
        }
    }

    pub fn in_currency(price: f64, currency: impl Into<String>) -> Self {
        Self {
            currency: Some(currency.into().to_uppercase()),
            ..Self::new(price)
        }
    }
}

/// Feed result keyed by symbol. Cross-rate entries (e.g., "HKD") share the map:
/// their `price` is the value of one unit of that currency in the base currency.
pub type PriceQuotes = HashMap<String, Quote>;
