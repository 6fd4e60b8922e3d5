use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::changes::IncrementalChanges;
use crate::models::quote::PriceQuotes;
use crate::models::year_data::{YearData, YearMap};

/// Remote persistence for the ledger.
///
/// Implementations must surface rejected credentials as
/// `CoreError::SessionExpired` so the store can run its reset path.
/// `push_changes` may be delivered more than once for the same diff.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait RemoteStore: Send + Sync {
    /// Year keys known to the backend, newest first.
    async fn fetch_year_list(&self) -> Result<Vec<String>, CoreError>;

    /// Full data of one year.
    async fn fetch_year(&self, year: &str) -> Result<YearData, CoreError>;

    /// Every year in one response (legacy endpoint).
    async fn fetch_all(&self) -> Result<YearMap, CoreError>;

    /// Submit a diff. `Ok` means the backend acknowledged all of it.
    async fn push_changes(&self, changes: &IncrementalChanges) -> Result<(), CoreError>;
}

/// Source of latest prices and cross rates.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait PriceFeed: Send + Sync {
    /// Human-readable name of this feed (for logs/errors).
    fn name(&self) -> &str;

    /// Latest quotes for `symbols`. Cross-rate entries for non-base
    /// currencies are keyed by currency code in the same map.
    /// Symbols the feed cannot price are simply absent.
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<PriceQuotes, CoreError>;
}
