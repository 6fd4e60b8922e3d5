use chrono::NaiveDate;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::analytics::TradePreview;
use crate::models::changes::LedgerChange;
use crate::models::position::{normalize_symbol, Position};
use crate::models::quote::PriceQuotes;
use crate::models::rates::ExchangeRates;
use crate::models::transaction::{
    CashConfirmation, CashTransaction, CashTransactionKind, PositionEdit, StockTransaction,
    TradeRequest, TradeSide,
};
use crate::models::year_data::{parse_year, YearData, YearMap};

use super::cost_basis::CostBasisEngine;
use super::currency_service::CurrencyService;

/// Owns the per-year positions and cash balances and applies every mutation.
///
/// Each mutation validates first and only then writes, so an error leaves
/// `YearData` untouched. Mutations return a `LedgerChange` describing the
/// entities they produced; recording them in the diff is the caller's job.
#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    years: YearMap,
    user_uuid: Option<String>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing year map (e.g., loaded from storage or the remote API).
    pub fn from_years(years: YearMap) -> Self {
        Self {
            years,
            user_uuid: None,
        }
    }

    /// Stamp entities created from now on with this user id.
    pub fn set_user_uuid(&mut self, user_uuid: Option<String>) {
        self.user_uuid = user_uuid;
    }

    pub fn years(&self) -> &YearMap {
        &self.years
    }

    /// Replace every year at once (import, remote load, reset).
    pub fn replace_years(&mut self, years: YearMap) {
        self.years = years;
    }

    pub fn year(&self, year: &str) -> Result<&YearData, CoreError> {
        self.years
            .get(year)
            .ok_or_else(|| CoreError::YearNotFound(year.to_string()))
    }

    pub fn contains_year(&self, year: &str) -> bool {
        self.years.contains_key(year)
    }

    /// Year keys, newest first.
    pub fn year_keys_desc(&self) -> Vec<String> {
        self.years.keys().rev().cloned().collect()
    }

    /// The newest year, if any.
    pub fn latest_year(&self) -> Option<&str> {
        self.years.keys().next_back().map(String::as_str)
    }

    // ── Years ───────────────────────────────────────────────────────

    /// Create a new year.
    ///
    /// With `carry_forward`, the most recent year before `year` seeds it:
    /// positions are cloned with their ids, and the ending cash balance
    /// becomes a synthetic carry-over deposit dated `date`.
    pub fn add_year(
        &mut self,
        year: &str,
        carry_forward: bool,
        date: NaiveDate,
    ) -> Result<LedgerChange, CoreError> {
        let year = year.trim();
        let year_num = parse_year(year)?;
        if self.years.contains_key(year) {
            return Err(CoreError::DuplicateYear(year.to_string()));
        }

        let reference = if carry_forward {
            self.years
                .iter()
                .filter(|(key, _)| parse_year(key).map(|y| y < year_num).unwrap_or(false))
                .next_back()
                .map(|(_, data)| data.clone())
        } else {
            None
        };

        let mut data = YearData::new();
        let mut change = LedgerChange::for_year(year);

        if let Some(previous) = reference {
            data.stocks = previous.stocks;
            if previous.cash_balance != 0.0 {
                let mut carry = CashTransaction::carryover(previous.cash_balance, date);
                carry.user_uuid = self.user_uuid.clone();
                data.push_cash(carry.clone());
                change.cash_transactions.push(carry);
            }
            change.positions = data.stocks.clone();
        }

        change.cash_balance = Some(data.cash_balance);
        log::debug!(
            "Added year {year} (carry_forward={carry_forward}, positions={}, cash={:.2})",
            data.stocks.len(),
            data.cash_balance
        );
        self.years.insert(year.to_string(), data);
        Ok(change)
    }

    // ── Cash ────────────────────────────────────────────────────────

    /// Record a deposit or withdrawal of `amount` (must be positive).
    pub fn record_cash_transaction(
        &mut self,
        year: &str,
        kind: CashTransactionKind,
        amount: f64,
        date: NaiveDate,
    ) -> Result<LedgerChange, CoreError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(CoreError::Validation(format!(
                "Cash amount must be a positive number, got {amount}"
            )));
        }
        let mut tx = match kind {
            CashTransactionKind::Deposit => CashTransaction::deposit(amount, date),
            CashTransactionKind::Withdraw => CashTransaction::withdraw(amount, date),
            CashTransactionKind::Buy | CashTransactionKind::Sell => {
                return Err(CoreError::Validation(format!(
                    "'{kind}' cash movements are recorded through stock trades"
                )));
            }
        };
        tx.user_uuid = self.user_uuid.clone();

        let data = self
            .years
            .get_mut(year)
            .ok_or_else(|| CoreError::YearNotFound(year.to_string()))?;
        data.push_cash(tx.clone());

        let mut change = LedgerChange::for_year(year);
        change.cash_balance = Some(data.cash_balance);
        change.cash_transactions.push(tx);
        Ok(change)
    }

    // ── Trades ──────────────────────────────────────────────────────

    /// Compute what a trade would do without touching the ledger.
    pub fn preview_trade(&self, request: &TradeRequest) -> Result<TradePreview, CoreError> {
        let stock_name = validate_stock_name(&request.stock_name)?;
        let data = self.year(&request.year)?;
        let engine = CostBasisEngine::new();

        let (old_shares, old_cost) = data
            .position(&stock_name)
            .map(|p| (p.shares, p.cost_price))
            .unwrap_or((0.0, 0.0));

        let result = engine
            .apply_trade(old_shares, old_cost, request.side, request.shares, request.price)
            .map_err(|e| name_insufficient_shares(e, &stock_name))?;

        let cash_after = data.cash_balance + result.cash_delta;
        let (expected_profit, expected_profit_pct) = match request.side {
            TradeSide::Sell if old_cost > 0.0 => (
                Some(engine.realized_profit(old_cost, request.shares, request.price)),
                engine.profit_pct(old_cost, request.price),
            ),
            _ => (None, None),
        };

        Ok(TradePreview {
            stock_name,
            side: request.side,
            shares: request.shares,
            price: request.price,
            old_shares,
            new_shares: result.new_shares,
            old_cost_price: old_cost,
            new_cost_price: result.new_cost_price,
            cash_delta: result.cash_delta,
            cash_after,
            needs_cash_confirmation: request.side == TradeSide::Buy
                && data.cash_balance < -result.cash_delta,
            expected_profit,
            expected_profit_pct,
        })
    }

    /// Execute a buy or sell.
    ///
    /// - Selling more than held fails with `InsufficientShares`.
    /// - Buying for more than the cash balance fails with `InsufficientCash`
    ///   unless `confirmation` is `AllowNegative`.
    ///
    /// On success the position is upserted (removed at zero shares), and a
    /// `StockTransaction` plus its mirroring `CashTransaction` are appended.
    pub fn record_stock_trade(
        &mut self,
        request: &TradeRequest,
        confirmation: CashConfirmation,
    ) -> Result<LedgerChange, CoreError> {
        if let Some(p) = request.year_end_price {
            if !p.is_finite() || p < 0.0 {
                return Err(CoreError::Validation(format!(
                    "Year-end price must be a non-negative number, got {p}"
                )));
            }
        }

        let preview = self.preview_trade(request)?;
        if preview.needs_cash_confirmation && confirmation == CashConfirmation::Unconfirmed {
            let available = self.year(&request.year)?.cash_balance;
            return Err(CoreError::InsufficientCash {
                required: -preview.cash_delta,
                available,
            });
        }

        let user_uuid = self.user_uuid.clone();
        let data = self
            .years
            .get_mut(&request.year)
            .ok_or_else(|| CoreError::YearNotFound(request.year.clone()))?;
        let existing = data.position(&preview.stock_name).cloned();

        let position = Position {
            id: existing.as_ref().map(|p| p.id).unwrap_or_else(Uuid::new_v4),
            name: preview.stock_name.clone(),
            symbol: normalize_symbol(request.symbol.clone())
                .or_else(|| existing.as_ref().and_then(|p| p.symbol.clone())),
            shares: preview.new_shares,
            price: request
                .year_end_price
                .or_else(|| existing.as_ref().map(|p| p.price))
                .unwrap_or(request.price),
            cost_price: preview.new_cost_price,
            user_uuid: user_uuid.clone(),
        };

        let stock_tx = StockTransaction {
            stock_name: preview.stock_name.clone(),
            side: request.side,
            shares: request.shares,
            price: request.price,
            date: request.date,
            before_cost_price: preview.old_cost_price,
            after_cost_price: preview.new_cost_price,
            user_uuid: user_uuid.clone(),
        };

        let mut cash_tx = CashTransaction::trade(
            request.side,
            preview.stock_name.clone(),
            preview.cash_delta,
            request.date,
        );
        cash_tx.user_uuid = user_uuid;

        data.upsert_position(position.clone());
        data.stock_transactions.push(stock_tx.clone());
        data.push_cash(cash_tx.clone());

        log::debug!(
            "{} {} {} @ {} in {}: shares {} -> {}, cost {:.4} -> {:.4}, cash {:.2}",
            request.side,
            request.shares,
            preview.stock_name,
            request.price,
            request.year,
            preview.old_shares,
            preview.new_shares,
            preview.old_cost_price,
            preview.new_cost_price,
            data.cash_balance
        );

        Ok(LedgerChange {
            year: request.year.clone(),
            positions: vec![position],
            cash_transactions: vec![cash_tx],
            stock_transactions: vec![stock_tx],
            cash_balance: Some(data.cash_balance),
        })
    }

    // ── Manual edits ────────────────────────────────────────────────

    /// Overwrite one position row. Zero shares removes it.
    pub fn edit_position(
        &mut self,
        year: &str,
        stock_name: &str,
        edit: PositionEdit,
    ) -> Result<LedgerChange, CoreError> {
        let stock_name = validate_stock_name(stock_name)?;
        for (label, value) in [
            ("shares", edit.shares),
            ("price", edit.price),
            ("cost price", edit.cost_price),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CoreError::Validation(format!(
                    "Position {label} must be a non-negative number, got {value}"
                )));
            }
        }

        let user_uuid = self.user_uuid.clone();
        let data = self
            .years
            .get_mut(year)
            .ok_or_else(|| CoreError::YearNotFound(year.to_string()))?;
        let existing = data.position(&stock_name).cloned();
        if existing.is_none() && edit.shares == 0.0 {
            return Err(CoreError::StockNotFound(stock_name));
        }

        let position = Position {
            id: existing.as_ref().map(|p| p.id).unwrap_or_else(Uuid::new_v4),
            name: stock_name,
            symbol: normalize_symbol(edit.symbol),
            shares: edit.shares,
            price: edit.price,
            cost_price: if edit.shares > 0.0 { edit.cost_price } else { 0.0 },
            user_uuid: existing.and_then(|p| p.user_uuid).or(user_uuid),
        };
        data.upsert_position(position.clone());

        let mut change = LedgerChange::for_year(year);
        change.positions.push(position);
        change.cash_balance = Some(data.cash_balance);
        Ok(change)
    }

    /// Remove a holding from every year. Returns the years it was removed from.
    pub fn remove_stock(&mut self, stock_name: &str) -> Result<Vec<String>, CoreError> {
        let mut affected = Vec::new();
        for (year, data) in self.years.iter_mut() {
            let before = data.stocks.len();
            data.stocks.retain(|p| p.name != stock_name);
            if data.stocks.len() != before {
                affected.push(year.clone());
            }
        }
        if affected.is_empty() {
            return Err(CoreError::StockNotFound(stock_name.to_string()));
        }
        log::debug!("Removed {stock_name} from years {affected:?}");
        Ok(affected)
    }

    // ── Prices & valuation ──────────────────────────────────────────

    /// Overwrite market prices of positions whose symbol has a quote.
    ///
    /// Quotes in a foreign currency are converted to the ledger base with
    /// `rates`. Quotes that are unusable (non-positive price, unknown currency)
    /// are skipped and the old price kept. `cost_price` is never touched.
    pub fn update_prices(
        &mut self,
        year: &str,
        quotes: &PriceQuotes,
        rates: &ExchangeRates,
    ) -> Result<LedgerChange, CoreError> {
        let converter = CurrencyService::new();
        let data = self
            .years
            .get_mut(year)
            .ok_or_else(|| CoreError::YearNotFound(year.to_string()))?;

        let mut change = LedgerChange::for_year(year);
        for position in data.stocks.iter_mut() {
            let Some(quote) = position.symbol.as_ref().and_then(|s| quotes.get(s)) else {
                continue;
            };
            if !quote.price.is_finite() || quote.price <= 0.0 {
                log::warn!("Skipping invalid quote for {}: {}", position.name, quote.price);
                continue;
            }
            match converter.quote_to_base(rates, quote.price, quote.currency.as_deref()) {
                Ok(price) => {
                    position.price = price;
                    change.positions.push(position.clone());
                }
                Err(e) => log::warn!("Skipping quote for {}: {e}", position.name),
            }
        }
        Ok(change)
    }

    /// Value of visible positions plus cash for `year`, in `display_currency`.
    pub fn valuation(
        &self,
        year: &str,
        display_currency: &str,
        hidden: &BTreeSet<String>,
        rates: &ExchangeRates,
    ) -> Result<f64, CoreError> {
        let total = self.year(year)?.total_value(hidden);
        CurrencyService::new().to_display(rates, total, display_currency)
    }
}

fn validate_stock_name(name: &str) -> Result<String, CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Stock name must not be empty".into()));
    }
    Ok(trimmed.to_string())
}

/// The engine does not know stock names; attach it for the caller.
fn name_insufficient_shares(err: CoreError, stock_name: &str) -> CoreError {
    match err {
        CoreError::InsufficientShares { requested, held, .. } => CoreError::InsufficientShares {
            stock: stock_name.to_string(),
            requested,
            held,
        },
        other => other,
    }
}
