use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::errors::CoreError;

/// Default backend for the remote API.
pub const DEFAULT_BACKEND_URL: &str = "https://stock-backend-tau.vercel.app";

/// Default quiet period before queued changes are synced.
pub const DEFAULT_SYNC_DEBOUNCE_MS: u64 = 2_000;

/// Session configuration for a `PortfolioStore`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Currency all ledger amounts are stored in (e.g., "USD").
    pub base_currency: String,

    /// Currency valuations are presented in.
    pub display_currency: String,

    /// Cross-rate entries to read from the price feed.
    pub tracked_currencies: Vec<String>,

    /// Base URL of the remote API.
    pub backend_url: String,

    /// Quiet period after the last mutation before a sync is due.
    pub sync_debounce_ms: u64,

    /// Stock names excluded from valuations (visibility toggle; data is kept).
    #[serde(default)]
    pub hidden_stocks: BTreeSet<String>,

    /// Stamped on every entity created this session.
    #[serde(default)]
    pub user_uuid: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_currency: "USD".to_string(),
            display_currency: "USD".to_string(),
            tracked_currencies: vec!["HKD".to_string(), "CNY".to_string()],
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            sync_debounce_ms: DEFAULT_SYNC_DEBOUNCE_MS,
            hidden_stocks: BTreeSet::new(),
            user_uuid: None,
        }
    }
}

/// Normalize a currency code; it must be exactly 3 ASCII letters.
pub fn validate_currency_code(code: &str) -> Result<String, CoreError> {
    let trimmed = code.trim().to_uppercase();
    if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CoreError::Validation(format!(
            "Invalid currency code '{code}': must be exactly 3 ASCII letters (e.g., USD, HKD, CNY)"
        )));
    }
    Ok(trimmed)
}
