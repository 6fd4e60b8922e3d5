use thiserror::Error;

/// Unified error type for the entire stock-ledger-core library.
/// Every public fallible function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Input / Ledger ──────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Cannot sell {requested} shares of {stock}: only {held} held")]
    InsufficientShares {
        stock: String,
        requested: f64,
        held: f64,
    },

    /// Recoverable: the caller may retry with an explicit confirmation.
    #[error("Insufficient cash: trade needs {required:.2}, balance is {available:.2}")]
    InsufficientCash { required: f64, available: f64 },

    #[error("Year already exists: {0}")]
    DuplicateYear(String),

    #[error("Year not found: {0}")]
    YearNotFound(String),

    #[error("Stock not found: {0}")]
    StockNotFound(String),

    #[error("Exchange rate not available for currency: {0}")]
    UnknownCurrency(String),

    // ── Sync / Remote ───────────────────────────────────────────────
    #[error("Sync failed: {0}")]
    SyncFailure(String),

    #[error("Session expired, please sign in again")]
    SessionExpired,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    // ── Import / Storage ────────────────────────────────────────────
    #[error("Import rejected: {0}")]
    ImportParse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// True for errors the caller can resolve by confirming the action.
    pub fn is_confirmable(&self) -> bool {
        matches!(self, CoreError::InsufficientCash { .. })
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors carry the full URL; strip the query so tokens never reach logs.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        CoreError::Network(sanitized)
    }
}
