use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Direction of a stock trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

/// Kind of a cash movement. Serialized as the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CashTransactionKind {
    /// Money put into the account (positive amount)
    Deposit,
    /// Money taken out of the account (negative amount)
    Withdraw,
    /// Cash paid for a stock purchase (negative amount)
    Buy,
    /// Cash received from a stock sale (positive amount)
    Sell,
}

impl CashTransactionKind {
    /// Deposits and withdrawals are user-initiated; buy/sell are trade-induced.
    pub fn is_external_flow(&self) -> bool {
        matches!(self, CashTransactionKind::Deposit | CashTransactionKind::Withdraw)
    }
}

impl From<TradeSide> for CashTransactionKind {
    fn from(side: TradeSide) -> Self {
        match side {
            TradeSide::Buy => CashTransactionKind::Buy,
            TradeSide::Sell => CashTransactionKind::Sell,
        }
    }
}

impl std::fmt::Display for CashTransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CashTransactionKind::Deposit => write!(f, "deposit"),
            CashTransactionKind::Withdraw => write!(f, "withdraw"),
            CashTransactionKind::Buy => write!(f, "buy"),
            CashTransactionKind::Sell => write!(f, "sell"),
        }
    }
}

/// Description attached to the synthetic opening deposit of a carried-forward year.
pub const CARRYOVER_DESCRIPTION: &str = "prior-year carryover";

/// A signed cash movement within a year.
///
/// Positive amounts are inflows, negative amounts outflows. `stock_name`
/// is set exactly for trade-induced movements; use the constructors to
/// keep that pairing intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashTransaction {
    pub amount: f64,

    #[serde(rename = "type")]
    pub kind: CashTransactionKind,

    pub date: NaiveDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_uuid: Option<String>,
}

impl CashTransaction {
    /// Deposit of `amount` (stored positive).
    pub fn deposit(amount: f64, date: NaiveDate) -> Self {
        Self::external(CashTransactionKind::Deposit, amount.abs(), date)
    }

    /// Withdrawal of `amount` (stored negative).
    pub fn withdraw(amount: f64, date: NaiveDate) -> Self {
        Self::external(CashTransactionKind::Withdraw, -amount.abs(), date)
    }

    /// Opening balance carried over from the previous year.
    /// Keeps the sign of the carried balance.
    pub fn carryover(balance: f64, date: NaiveDate) -> Self {
        Self {
            description: Some(CARRYOVER_DESCRIPTION.to_string()),
            ..Self::external(CashTransactionKind::Deposit, balance, date)
        }
    }

    /// Cash leg of a stock trade; `cash_delta` is already signed.
    pub fn trade(side: TradeSide, stock_name: impl Into<String>, cash_delta: f64, date: NaiveDate) -> Self {
        Self {
            amount: cash_delta,
            kind: side.into(),
            date,
            stock_name: Some(stock_name.into()),
            description: None,
            user_uuid: None,
        }
    }

    fn external(kind: CashTransactionKind, amount: f64, date: NaiveDate) -> Self {
        Self {
            amount,
            kind,
            date,
            stock_name: None,
            description: None,
            user_uuid: None,
        }
    }

    pub fn is_carryover(&self) -> bool {
        self.kind == CashTransactionKind::Deposit
            && self.description.as_deref() == Some(CARRYOVER_DESCRIPTION)
    }

    /// Same `(amount, kind, date)` triple, the duplicate-submission key.
    pub fn same_movement(&self, other: &CashTransaction) -> bool {
        self.amount == other.amount && self.kind == other.kind && self.date == other.date
    }
}

/// One executed stock trade, with the cost basis before and after it.
///
/// The `before_cost_price` / `after_cost_price` pair is the audit trail
/// for cost-basis correctness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockTransaction {
    pub stock_name: String,

    #[serde(rename = "type")]
    pub side: TradeSide,

    pub shares: f64,

    pub price: f64,

    pub date: NaiveDate,

    #[serde(default)]
    pub before_cost_price: f64,

    #[serde(default)]
    pub after_cost_price: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_uuid: Option<String>,
}

impl StockTransaction {
    /// Gross value of the trade (shares × price).
    pub fn gross_value(&self) -> f64 {
        self.shares * self.price
    }
}

/// Input for a stock trade against one year of the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRequest {
    pub year: String,
    pub stock_name: String,
    pub side: TradeSide,
    pub shares: f64,
    pub price: f64,
    /// Quote symbol; blank keeps the existing position's symbol
    pub symbol: Option<String>,
    /// Market price to store on the position; defaults to the existing
    /// position's price, or the trade price for a new position
    pub year_end_price: Option<f64>,
    pub date: NaiveDate,
}

impl TradeRequest {
    pub fn new(
        year: impl Into<String>,
        stock_name: impl Into<String>,
        side: TradeSide,
        shares: f64,
        price: f64,
    ) -> Self {
        Self {
            year: year.into(),
            stock_name: stock_name.into(),
            side,
            shares,
            price,
            symbol: None,
            year_end_price: None,
            date: chrono::Utc::now().date_naive(),
        }
    }

    pub fn buy(year: impl Into<String>, stock_name: impl Into<String>, shares: f64, price: f64) -> Self {
        Self::new(year, stock_name, TradeSide::Buy, shares, price)
    }

    pub fn sell(year: impl Into<String>, stock_name: impl Into<String>, shares: f64, price: f64) -> Self {
        Self::new(year, stock_name, TradeSide::Sell, shares, price)
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_year_end_price(mut self, price: f64) -> Self {
        self.year_end_price = Some(price);
        self
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }
}

/// Whether the caller has accepted a buy that overdraws the cash balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CashConfirmation {
    /// Reject with `InsufficientCash` when cash does not cover the buy
    #[default]
    Unconfirmed,
    /// Proceed and let the balance go negative
    AllowNegative,
}

/// Manual correction of one position row in one year.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionEdit {
    pub shares: f64,
    pub price: f64,
    pub cost_price: f64,
    pub symbol: Option<String>,
}
