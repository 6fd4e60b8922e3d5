use std::collections::HashMap;

use crate::errors::CoreError;
use crate::models::transaction::{CashTransaction, CashTransactionKind, StockTransaction, TradeSide};
use crate::models::year_data::YearData;

use super::cost_basis::{is_share_dust, CostBasisEngine};

/// Relative tolerance for audit comparisons of derived money values.
const AUDIT_TOLERANCE: f64 = 1e-6;

/// Read-side queries over a year's append-only transaction history:
/// deposits/withdrawals for growth figures, per-stock history, and the
/// audit checks for the cash-balance and cost-basis invariants.
pub struct TransactionLog {
    engine: CostBasisEngine,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self {
            engine: CostBasisEngine::new(),
        }
    }

    /// Every deposit-kind movement of the year, the carried-over opening
    /// balance included. Trade cash is excluded by kind.
    pub fn year_deposits(&self, year: &YearData) -> f64 {
        year.cash_transactions
            .iter()
            .filter(|tx| tx.kind == CashTransactionKind::Deposit)
            .fold(0.0, |sum, tx| sum + tx.amount)
    }

    /// Deposits of money new to the ledger: the carryover is left out.
    pub fn fresh_deposits(&self, year: &YearData) -> f64 {
        year.cash_transactions
            .iter()
            .filter(|tx| tx.kind == CashTransactionKind::Deposit && !tx.is_carryover())
            .fold(0.0, |sum, tx| sum + tx.amount)
    }

    /// Money withdrawn during the year, as a positive magnitude.
    pub fn year_withdrawals(&self, year: &YearData) -> f64 {
        year.cash_transactions
            .iter()
            .filter(|tx| tx.kind == CashTransactionKind::Withdraw)
            .fold(0.0, |sum, tx| sum + tx.amount.abs())
    }

    /// `year_deposits` minus withdrawals.
    pub fn net_deposits(&self, year: &YearData) -> f64 {
        self.year_deposits(year) - self.year_withdrawals(year)
    }

    /// `fresh_deposits` minus withdrawals.
    pub fn net_fresh_deposits(&self, year: &YearData) -> f64 {
        self.fresh_deposits(year) - self.year_withdrawals(year)
    }

    /// Sum of every signed cash movement recorded for the year.
    pub fn cash_history_sum(&self, year: &YearData) -> f64 {
        year.cash_transactions
            .iter()
            .fold(0.0, |sum, tx| sum + tx.amount)
    }

    /// Trades of one stock in recording order.
    pub fn trades_for<'a>(&self, year: &'a YearData, stock_name: &str) -> Vec<&'a StockTransaction> {
        year.stock_transactions
            .iter()
            .filter(|tx| tx.stock_name == stock_name)
            .collect()
    }

    /// Trade-induced cash movements of one stock in recording order.
    pub fn cash_for_stock<'a>(&self, year: &'a YearData, stock_name: &str) -> Vec<&'a CashTransaction> {
        year.cash_transactions
            .iter()
            .filter(|tx| tx.stock_name.as_deref() == Some(stock_name))
            .collect()
    }

    /// Check that the stored balance equals the sum of the cash history.
    pub fn verify_cash_balance(&self, year: &YearData) -> Result<(), CoreError> {
        let expected = self.cash_history_sum(year);
        if !approx_eq(expected, year.cash_balance) {
            return Err(CoreError::Validation(format!(
                "Cash balance {:.2} does not match transaction history {:.2}",
                year.cash_balance, expected
            )));
        }
        Ok(())
    }

    /// Replay each stock's trades and check every `after_cost_price`.
    ///
    /// The opening share count of a stock is reconstructed from its final
    /// position minus the net shares traded during the year. The first trade's
    /// `before_cost_price` seeds the replay; each later trade must start from
    /// the cost the previous one ended at.
    pub fn verify_cost_basis_trail(&self, year: &YearData) -> Result<(), CoreError> {
        let mut by_stock: HashMap<&str, Vec<&StockTransaction>> = HashMap::new();
        for tx in &year.stock_transactions {
            by_stock.entry(tx.stock_name.as_str()).or_default().push(tx);
        }

        for (name, trades) in by_stock {
            let final_shares = year.position(name).map(|p| p.shares).unwrap_or(0.0);
            let net_traded: f64 = trades
                .iter()
                .map(|tx| match tx.side {
                    TradeSide::Buy => tx.shares,
                    TradeSide::Sell => -tx.shares,
                })
                .sum();
            let mut shares = final_shares - net_traded;
            if is_share_dust(shares, final_shares) {
                shares = 0.0;
            }
            let mut cost = trades.first().map(|tx| tx.before_cost_price).unwrap_or(0.0);

            for tx in trades {
                if !approx_eq(tx.before_cost_price, cost) {
                    return Err(CoreError::Validation(format!(
                        "{name} {} on {}: recorded cost before trade {:.4}, replay gives {:.4}",
                        tx.side, tx.date, tx.before_cost_price, cost
                    )));
                }
                let result = self
                    .engine
                    .apply_trade(shares, cost, tx.side, tx.shares, tx.price)
                    .map_err(|e| match e {
                        CoreError::InsufficientShares { requested, held, .. } => {
                            CoreError::InsufficientShares {
                                stock: name.to_string(),
                                requested,
                                held,
                            }
                        }
                        other => other,
                    })?;
                if !approx_eq(tx.after_cost_price, result.new_cost_price) {
                    return Err(CoreError::Validation(format!(
                        "{name} {} on {}: recorded cost after trade {:.4}, replay gives {:.4}",
                        tx.side, tx.date, tx.after_cost_price, result.new_cost_price
                    )));
                }
                shares = result.new_shares;
                cost = result.new_cost_price;
            }
        }
        Ok(())
    }
}

impl Default for TransactionLog {
    fn default() -> Self {
        Self::new()
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= AUDIT_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}
