pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use chrono::{Datelike, NaiveDate, Utc};
use models::{
    analytics::{InvestmentReturn, TradePreview, YearGrowth, YearValues},
    changes::{IncrementalChanges, LedgerChange},
    quote::PriceQuotes,
    rates::ExchangeRates,
    settings::{validate_currency_code, Settings},
    transaction::{CashConfirmation, CashTransactionKind, PositionEdit, TradeRequest},
    year_data::{parse_year, YearData, YearMap},
};
use providers::{
    remote_api::HttpRemoteStore,
    traits::{PriceFeed, RemoteStore},
};
use services::{
    change_tracker::ChangeTracker,
    growth_service::GrowthCalculator,
    ledger_service::PositionLedger,
    sync_service::{SyncBatch, SyncCoordinator, SyncOutcome, SyncScheduler, SyncStatus},
    transaction_log::TransactionLog,
};
use std::collections::BTreeMap;
use std::time::Duration;
use storage::{backup::BackupManager, kv::KeyValueStore, snapshot::LocalSnapshot};
use tokio::time::Instant;

use errors::CoreError;

/// Owned request for one price refresh, detached from the ledger while the
/// feed is queried.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshTicket {
    pub generation: u64,
    pub year: String,
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied {
        positions_updated: usize,
        rates_updated: usize,
    },
    /// A newer refresh was started after this ticket; nothing was applied.
    Stale,
}

/// Result of a remote load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub years_loaded: Vec<String>,
    /// Years listed by the backend whose fetch failed; they are absent locally.
    pub years_failed: Vec<String>,
    pub used_legacy_endpoint: bool,
    /// The backend had no data and the default dataset was installed.
    pub reset_to_default: bool,
}

/// Main entry point for the stock ledger core library.
///
/// Owns the ledger, the pending diff, exchange rates and session settings.
/// Every mutation validates, applies, records its diff entries and, while
/// signed out, writes the local snapshot.
#[must_use]
pub struct PortfolioStore {
    ledger: PositionLedger,
    tracker: ChangeTracker,
    growth: GrowthCalculator,
    audit: TransactionLog,
    rates: ExchangeRates,
    settings: Settings,
    selected_year: Option<String>,
    session_token: Option<String>,
    local: Option<Box<dyn KeyValueStore>>,
    scheduler: SyncScheduler,
    refresh_generation: u64,
    next_batch_id: u64,
}

impl std::fmt::Debug for PortfolioStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioStore")
            .field("years", &self.ledger.year_keys_desc())
            .field("selected_year", &self.selected_year)
            .field("pending_entities", &self.tracker.snapshot().entity_count())
            .field("signed_in", &self.session_token.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

impl PortfolioStore {
    /// Fresh store with the default dataset (one empty current year).
    pub fn create_new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self::build(default_years(today()), settings)
    }

    /// Store backed by local persistence. Loads the saved snapshot if there
    /// is one, otherwise starts from the default dataset and saves it.
    pub fn open_local(
        store: Box<dyn KeyValueStore>,
        settings: Settings,
    ) -> Result<Self, CoreError> {
        let snapshot = LocalSnapshot::load(store.as_ref())?;
        let mut this = match snapshot {
            Some(snapshot) => {
                log::debug!("Loaded local snapshot with {} years", snapshot.years.len());
                let mut this = Self::build(snapshot.years, settings);
                if snapshot.selected_year.is_some() {
                    this.selected_year = snapshot.selected_year;
                }
                this
            }
            None => Self::build(default_years(today()), settings),
        };
        this.local = Some(store);
        this.persist_local()?;
        Ok(this)
    }

    // ── Years ───────────────────────────────────────────────────────

    /// Year keys, newest first.
    #[must_use]
    pub fn years(&self) -> Vec<String> {
        self.ledger.year_keys_desc()
    }

    #[must_use]
    pub fn year_data(&self) -> &YearMap {
        self.ledger.years()
    }

    pub fn year(&self, year: &str) -> Result<&YearData, CoreError> {
        self.ledger.year(year)
    }

    #[must_use]
    pub fn latest_year(&self) -> Option<&str> {
        self.ledger.latest_year()
    }

    #[must_use]
    pub fn selected_year(&self) -> Option<&str> {
        self.selected_year.as_deref()
    }

    pub fn select_year(&mut self, year: &str) -> Result<(), CoreError> {
        if !self.ledger.contains_year(year) {
            return Err(CoreError::YearNotFound(year.to_string()));
        }
        self.selected_year = Some(year.to_string());
        self.persist_or_warn();
        Ok(())
    }

    /// Add a year, optionally carrying positions and cash forward from the
    /// most recent earlier year. The new year becomes the selected one.
    pub fn add_year(&mut self, year: &str, carry_forward: bool) -> Result<(), CoreError> {
        let change = self.ledger.add_year(year, carry_forward, today())?;
        self.selected_year = Some(change.year.clone());
        self.apply_change(&change);
        Ok(())
    }

    // ── Cash ────────────────────────────────────────────────────────

    /// Record a deposit or withdrawal; `amount` is a positive magnitude.
    pub fn record_cash_transaction(
        &mut self,
        year: &str,
        kind: CashTransactionKind,
        amount: f64,
        date: NaiveDate,
    ) -> Result<(), CoreError> {
        let change = self.ledger.record_cash_transaction(year, kind, amount, date)?;
        self.apply_change(&change);
        Ok(())
    }

    pub fn deposit(&mut self, year: &str, amount: f64, date: NaiveDate) -> Result<(), CoreError> {
        self.record_cash_transaction(year, CashTransactionKind::Deposit, amount, date)
    }

    pub fn withdraw(&mut self, year: &str, amount: f64, date: NaiveDate) -> Result<(), CoreError> {
        self.record_cash_transaction(year, CashTransactionKind::Withdraw, amount, date)
    }

    // ── Trades & Positions ──────────────────────────────────────────

    /// What a trade would do, without applying it.
    pub fn preview_trade(&self, request: &TradeRequest) -> Result<TradePreview, CoreError> {
        self.ledger.preview_trade(request)
    }

    /// Execute a trade.
    ///
    /// A buy that exceeds the cash balance fails with `InsufficientCash`
    /// (see `CoreError::is_confirmable`); repeat it with
    /// `CashConfirmation::AllowNegative` to proceed anyway.
    pub fn record_stock_trade(
        &mut self,
        request: &TradeRequest,
        confirmation: CashConfirmation,
    ) -> Result<(), CoreError> {
        let change = self.ledger.record_stock_trade(request, confirmation)?;
        self.apply_change(&change);
        Ok(())
    }

    /// Manually correct one position in one year.
    pub fn edit_position(
        &mut self,
        year: &str,
        stock_name: &str,
        edit: PositionEdit,
    ) -> Result<(), CoreError> {
        let change = self.ledger.edit_position(year, stock_name, edit)?;
        self.apply_change(&change);
        Ok(())
    }

    /// Delete a holding from every year. Transaction history is kept.
    /// Returns the years it was removed from.
    pub fn remove_stock(&mut self, stock_name: &str) -> Result<Vec<String>, CoreError> {
        let years = self.ledger.remove_stock(stock_name)?;
        self.tracker.drop_stock(stock_name);
        self.settings.hidden_stocks.remove(stock_name);
        self.persist_or_warn();
        Ok(years)
    }

    // ── Valuation & Growth ──────────────────────────────────────────

    /// Visible stock value plus cash of `year`, in the display currency.
    pub fn valuation(&self, year: &str) -> Result<f64, CoreError> {
        self.ledger.valuation(
            year,
            &self.settings.display_currency,
            &self.settings.hidden_stocks,
            &self.rates,
        )
    }

    pub fn year_over_year_growth(
        &self,
        year: &str,
        previous_year: &str,
    ) -> Result<YearGrowth, CoreError> {
        self.growth.year_over_year_growth(
            self.ledger.years(),
            year,
            previous_year,
            &self.settings.hidden_stocks,
        )
    }

    /// Growth of each year against the one before it, oldest first.
    pub fn growth_series(&self) -> Result<Vec<YearGrowth>, CoreError> {
        self.growth
            .growth_series(self.ledger.years(), &self.settings.hidden_stocks)
    }

    /// Compound annual growth rate (percent) over all years.
    #[must_use]
    pub fn cagr(&self) -> Option<f64> {
        self.growth
            .cagr(self.ledger.years(), &self.settings.hidden_stocks)
    }

    #[must_use]
    pub fn yearly_values(&self) -> BTreeMap<String, YearValues> {
        self.growth
            .yearly_values(self.ledger.years(), &self.settings.hidden_stocks)
    }

    #[must_use]
    pub fn total_investment(&self, year: &str) -> f64 {
        self.growth.total_investment(self.ledger.years(), year)
    }

    pub fn investment_return(&self, year: &str) -> Result<InvestmentReturn, CoreError> {
        self.growth
            .investment_return(self.ledger.years(), year, &self.settings.hidden_stocks)
    }

    #[must_use]
    pub fn years_to_goal(&self, current: f64, goal: f64, annual_rate_pct: f64) -> Option<u32> {
        self.growth.years_to_goal(current, goal, annual_rate_pct)
    }

    #[must_use]
    pub fn required_return_rate(&self, current: f64, goal: f64, years: u32) -> Option<f64> {
        self.growth.required_return_rate(current, goal, years)
    }

    /// Check the cash and cost-basis invariants of one year.
    pub fn verify_year(&self, year: &str) -> Result<(), CoreError> {
        let data = self.ledger.year(year)?;
        self.audit.verify_cash_balance(data)?;
        self.audit.verify_cost_basis_trail(data)
    }

    // ── Prices ──────────────────────────────────────────────────────

    /// Start a refresh for the latest year's symbols.
    ///
    /// Starting a new refresh invalidates every earlier ticket.
    pub fn begin_price_refresh(&mut self) -> Result<RefreshTicket, CoreError> {
        let year = self
            .ledger
            .latest_year()
            .ok_or_else(|| CoreError::YearNotFound("(no years)".into()))?
            .to_string();
        let mut symbols: Vec<String> = self
            .ledger
            .year(&year)?
            .stocks
            .iter()
            .filter_map(|p| p.symbol.clone())
            .collect();
        symbols.sort();
        symbols.dedup();

        self.refresh_generation += 1;
        Ok(RefreshTicket {
            generation: self.refresh_generation,
            year,
            symbols,
        })
    }

    /// Apply a feed result for `ticket`. Stale tickets are ignored whole.
    pub fn apply_price_refresh(
        &mut self,
        ticket: &RefreshTicket,
        quotes: &PriceQuotes,
    ) -> Result<RefreshOutcome, CoreError> {
        if ticket.generation != self.refresh_generation {
            log::debug!(
                "Ignoring stale price refresh #{} (current #{})",
                ticket.generation,
                self.refresh_generation
            );
            return Ok(RefreshOutcome::Stale);
        }

        let rates_updated = self
            .rates
            .absorb_quotes(quotes, &self.settings.tracked_currencies);
        let change = self.ledger.update_prices(&ticket.year, quotes, &self.rates)?;
        let positions_updated = change.positions.len();
        if positions_updated > 0 {
            self.apply_change(&change);
        }
        log::info!(
            "Price refresh #{}: {positions_updated} positions, {rates_updated} rates updated",
            ticket.generation
        );
        Ok(RefreshOutcome::Applied {
            positions_updated,
            rates_updated,
        })
    }

    /// Fetch from `feed` and apply the result.
    ///
    /// Holds `&mut self` across the feed request. Callers that must keep the
    /// ledger usable during the request call `begin_price_refresh`, query
    /// the feed with the ticket's symbols, then `apply_price_refresh`.
    pub async fn refresh_prices(&mut self, feed: &dyn PriceFeed) -> Result<RefreshOutcome, CoreError> {
        let ticket = self.begin_price_refresh()?;
        let quotes = feed.fetch_quotes(&ticket.symbols).await?;
        self.apply_price_refresh(&ticket, &quotes)
    }

    #[must_use]
    pub fn exchange_rates(&self) -> &ExchangeRates {
        &self.rates
    }

    pub fn set_exchange_rate(&mut self, currency: &str, rate: f64) -> Result<(), CoreError> {
        self.rates.set_rate(currency, rate)
    }

    // ── Sync ────────────────────────────────────────────────────────

    /// Entities changed since the last acknowledged sync.
    #[must_use]
    pub fn pending_changes(&self) -> &IncrementalChanges {
        self.tracker.snapshot()
    }

    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        !self.tracker.is_empty()
    }

    /// Whether the debounce window since the last mutation has elapsed.
    #[must_use]
    pub fn sync_due(&self, now: Instant) -> bool {
        self.scheduler.is_due(now)
    }

    #[must_use]
    pub fn sync_scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    /// Snapshot the diff for submission. `None` when nothing is pending.
    pub fn prepare_sync(&mut self) -> Option<SyncBatch> {
        if self.tracker.is_empty() {
            return None;
        }
        self.next_batch_id += 1;
        Some(SyncBatch {
            id: self.next_batch_id,
            changes: self.tracker.snapshot().clone(),
        })
    }

    /// The backend acknowledged `batch`: drop exactly what it contained.
    pub fn acknowledge_sync(&mut self, batch: &SyncBatch) {
        self.tracker.clear_submitted(&batch.changes);
        if self.tracker.is_empty() {
            self.scheduler.mark_clean();
        }
    }

    /// Submit the current diff through `coordinator` and acknowledge it on success.
    ///
    /// On `SessionExpired` the caller is expected to run
    /// `handle_session_expired`.
    ///
    /// Holds `&mut self` across the push. To keep mutating while a batch is
    /// in flight, call `prepare_sync`, submit the batch through
    /// `SyncCoordinator::submit` on a detached task, then `acknowledge_sync`.
    pub async fn sync_now(&mut self, coordinator: &SyncCoordinator) -> Result<SyncOutcome, CoreError> {
        let Some(batch) = self.prepare_sync() else {
            return Ok(SyncOutcome {
                status: SyncStatus::NothingToSync,
                follow_up: false,
            });
        };
        let outcome = coordinator.submit(&batch).await?;
        if outcome.status == SyncStatus::Synced {
            self.acknowledge_sync(&batch);
        }
        Ok(outcome)
    }

    // ── Session ─────────────────────────────────────────────────────

    /// Start a remote session. Local snapshots stop being written.
    pub fn sign_in(&mut self, token: impl Into<String>) {
        self.session_token = Some(token.into());
    }

    pub fn sign_out(&mut self) {
        self.session_token = None;
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.session_token.is_some()
    }

    /// HTTP client for the configured backend with the session token.
    #[must_use]
    pub fn remote_store(&self) -> Option<HttpRemoteStore> {
        self.session_token
            .as_ref()
            .map(|token| HttpRemoteStore::new(&self.settings.backend_url, token.clone()))
    }

    /// Replace local years with the remote ones.
    ///
    /// Reads the year list, then each year. If the list endpoint fails for
    /// any reason other than an expired session, falls back to the legacy
    /// full fetch. An empty list installs the default dataset. The pending
    /// diff is left as is.
    pub async fn load_remote(&mut self, remote: &dyn RemoteStore) -> Result<LoadReport, CoreError> {
        let mut report = LoadReport::default();

        let years = match remote.fetch_year_list().await {
            Ok(list) if list.is_empty() => {
                report.reset_to_default = true;
                default_years(today())
            }
            Ok(list) => {
                let mut years = YearMap::new();
                for year in list {
                    if let Err(e) = parse_year(&year) {
                        log::warn!("Skipping remote year with invalid key: {e}");
                        report.years_failed.push(year);
                        continue;
                    }
                    match remote.fetch_year(&year).await {
                        Ok(data) => {
                            years.insert(year.clone(), data);
                            report.years_loaded.push(year);
                        }
                        Err(CoreError::SessionExpired) => return Err(CoreError::SessionExpired),
                        Err(e) => {
                            log::warn!("Failed to load year {year}: {e}");
                            report.years_failed.push(year);
                        }
                    }
                }
                years
            }
            Err(CoreError::SessionExpired) => return Err(CoreError::SessionExpired),
            Err(e) => {
                log::warn!("Year list unavailable ({e}); falling back to full load");
                report.used_legacy_endpoint = true;
                let mut years = remote.fetch_all().await?;
                years.retain(|year, _| match parse_year(year) {
                    Ok(_) => true,
                    Err(e) => {
                        log::warn!("Skipping remote year with invalid key: {e}");
                        report.years_failed.push(year.clone());
                        false
                    }
                });
                report.years_loaded = years.keys().rev().cloned().collect();
                years
            }
        };

        self.ledger.replace_years(years);
        self.selected_year = self.ledger.latest_year().map(str::to_string);
        self.persist_or_warn();
        Ok(report)
    }

    /// The backend rejected the session's credentials.
    ///
    /// Signs out, resets to the default dataset and returns the unsynced
    /// diff that was discarded so the caller can still export it.
    pub fn handle_session_expired(&mut self) -> IncrementalChanges {
        let discarded = self.tracker.clear();
        log::warn!(
            "Session expired; resetting local data and discarding {} unsynced entities",
            discarded.entity_count()
        );
        self.session_token = None;
        self.ledger.replace_years(default_years(today()));
        self.selected_year = self.ledger.latest_year().map(str::to_string);
        self.scheduler.mark_clean();
        self.persist_or_warn();
        discarded
    }

    // ── Settings ────────────────────────────────────────────────────

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Set the display currency (3-letter code with a known exchange rate).
    pub fn set_display_currency(&mut self, currency: &str) -> Result<(), CoreError> {
        let code = validate_currency_code(currency)?;
        if self.rates.rate(&code).is_none() {
            return Err(CoreError::UnknownCurrency(code));
        }
        self.settings.display_currency = code;
        Ok(())
    }

    /// Flip a stock's visibility in valuations. Returns true if it is now hidden.
    pub fn toggle_stock_visibility(&mut self, stock_name: &str) -> bool {
        if self.settings.hidden_stocks.remove(stock_name) {
            false
        } else {
            self.settings.hidden_stocks.insert(stock_name.to_string());
            true
        }
    }

    /// Stamp entities created from now on with `user_uuid`.
    pub fn set_user_uuid(&mut self, user_uuid: Option<String>) {
        self.ledger.set_user_uuid(user_uuid.clone());
        self.settings.user_uuid = user_uuid;
    }

    // ── Export / Import ─────────────────────────────────────────────

    pub fn export_json(&self) -> Result<String, CoreError> {
        BackupManager::export_json(self.ledger.years())
    }

    /// Replace every year with a backup.
    ///
    /// Rejected documents leave the store untouched. On success the pending
    /// diff is replaced by the full imported dataset so a signed-in session
    /// pushes it to the backend.
    pub fn import_json(&mut self, json: &str) -> Result<(), CoreError> {
        let years = BackupManager::import_json(json)?;
        self.tracker.clear();
        for (year, data) in &years {
            self.tracker.record_change(&LedgerChange {
                year: year.clone(),
                positions: data.stocks.clone(),
                cash_transactions: data.cash_transactions.clone(),
                stock_transactions: data.stock_transactions.clone(),
                cash_balance: Some(data.cash_balance),
            });
        }
        self.ledger.replace_years(years);
        self.selected_year = self.ledger.latest_year().map(str::to_string);
        self.scheduler.mark_dirty(Instant::now());
        self.persist_or_warn();
        Ok(())
    }

    /// Write the local snapshot now. No-op while signed in or without a local store.
    pub fn persist_local(&mut self) -> Result<(), CoreError> {
        if self.session_token.is_some() {
            return Ok(());
        }
        let Some(store) = self.local.as_mut() else {
            return Ok(());
        };
        LocalSnapshot::new(self.ledger.years().clone(), self.selected_year.clone())
            .save(store.as_mut())
    }

    // ── Internal ────────────────────────────────────────────────────

    fn apply_change(&mut self, change: &LedgerChange) {
        self.tracker.record_change(change);
        self.scheduler.mark_dirty(Instant::now());
        self.persist_or_warn();
    }

    fn persist_or_warn(&mut self) {
        if let Err(e) = self.persist_local() {
            log::warn!("Failed to write local snapshot: {e}");
        }
    }

    fn build(years: YearMap, settings: Settings) -> Self {
        let mut ledger = PositionLedger::from_years(years);
        ledger.set_user_uuid(settings.user_uuid.clone());
        let selected_year = ledger.latest_year().map(str::to_string);
        let scheduler = SyncScheduler::new(Duration::from_millis(settings.sync_debounce_ms));
        let rates = if settings.base_currency == ExchangeRates::default().base {
            ExchangeRates::default()
        } else {
            ExchangeRates::new(&settings.base_currency)
        };

        Self {
            ledger,
            tracker: ChangeTracker::new(),
            growth: GrowthCalculator::new(),
            audit: TransactionLog::new(),
            rates,
            settings,
            selected_year,
            session_token: None,
            local: None,
            scheduler,
            refresh_generation: 0,
            next_batch_id: 0,
        }
    }
}

/// One empty year for the current calendar year.
fn default_years(today: NaiveDate) -> YearMap {
    let mut years = YearMap::new();
    years.insert(format!("{:04}", today.year()), YearData::new());
    years
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
