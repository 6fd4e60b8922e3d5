use crate::errors::CoreError;
use crate::models::transaction::TradeSide;

/// Relative share tolerance. A sell leaving no more than
/// `SHARE_EPSILON * max(held, 1)` closes the position.
pub const SHARE_EPSILON: f64 = 1e-9;

/// True when `remaining` is float noise relative to `reference` shares.
pub fn is_share_dust(remaining: f64, reference: f64) -> bool {
    remaining.abs() <= SHARE_EPSILON * reference.abs().max(1.0)
}

/// Outcome of applying one trade to a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeResult {
    pub new_shares: f64,
    pub new_cost_price: f64,
    /// Signed cash movement: negative for buys, positive for sells
    pub cash_delta: f64,
}

/// Weighted-average cost-basis arithmetic. Pure: no ledger access, no I/O.
///
/// Sells reduce the cost pool by the sale *proceeds*
/// (`old_shares·old_cost - shares·price`) rather than by the cost of the
/// shares removed. Realized profit therefore stays inside the pool and
/// lowers the remaining cost price. Existing ledgers were built with this
/// rule and their stored `after_cost_price` values depend on it.
pub struct CostBasisEngine;

impl CostBasisEngine {
    pub fn new() -> Self {
        Self
    }

    /// Apply a buy or sell of `shares` at `price` to a position currently
    /// holding `old_shares` at `old_cost`.
    pub fn apply_trade(
        &self,
        old_shares: f64,
        old_cost: f64,
        side: TradeSide,
        shares: f64,
        price: f64,
    ) -> Result<TradeResult, CoreError> {
        Self::validate_trade_input(shares, price)?;
        let old_total_cost = old_shares * old_cost;
        let gross = shares * price;

        match side {
            TradeSide::Buy => {
                let new_shares = old_shares + shares;
                let new_cost_price = if new_shares > 0.0 {
                    if old_shares == 0.0 {
                        // exact: avoids (0 + s·p) / s rounding
                        price
                    } else {
                        (old_total_cost + gross) / new_shares
                    }
                } else {
                    0.0
                };
                Ok(TradeResult {
                    new_shares,
                    new_cost_price,
                    cash_delta: -gross,
                })
            }
            TradeSide::Sell => {
                let remaining = old_shares - shares;
                if old_shares <= 0.0 || (remaining < 0.0 && !is_share_dust(remaining, old_shares)) {
                    return Err(CoreError::InsufficientShares {
                        stock: String::new(),
                        requested: shares,
                        held: old_shares.max(0.0),
                    });
                }
                // 0.1 + 0.2 bought then 0.3 sold must close the position
                let (new_shares, new_cost_price) = if is_share_dust(remaining, old_shares) {
                    (0.0, 0.0)
                } else {
                    (remaining, (old_total_cost - gross) / remaining)
                };
                Ok(TradeResult {
                    new_shares,
                    new_cost_price,
                    cash_delta: gross,
                })
            }
        }
    }

    /// Profit of selling `shares` at `price` against an average cost of `old_cost`.
    pub fn realized_profit(&self, old_cost: f64, shares: f64, price: f64) -> f64 {
        (price - old_cost) * shares
    }

    /// Percentage gain of `price` over `old_cost`; `None` without a positive cost.
    pub fn profit_pct(&self, old_cost: f64, price: f64) -> Option<f64> {
        (old_cost > 0.0).then(|| (price / old_cost - 1.0) * 100.0)
    }

    fn validate_trade_input(shares: f64, price: f64) -> Result<(), CoreError> {
        if !shares.is_finite() || shares <= 0.0 {
            return Err(CoreError::Validation(format!(
                "Trade shares must be a positive number, got {shares}"
            )));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(CoreError::Validation(format!(
                "Trade price must be a positive number, got {price}"
            )));
        }
        Ok(())
    }
}

impl Default for CostBasisEngine {
    fn default() -> Self {
        Self::new()
    }
}

