use crate::models::changes::{IncrementalChanges, LedgerChange, YearSummary};
use crate::models::position::Position;
use crate::models::transaction::{CashTransaction, StockTransaction};

/// One entity destined for the diff.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackedEntity {
    Position(Position),
    Cash(CashTransaction),
    Stock(StockTransaction),
    Summary(YearSummary),
}

/// Accumulates the minimal set of entities changed since the last
/// acknowledged sync. It is the sole writer of `IncrementalChanges`.
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    pending: IncrementalChanges,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one entity under `year`.
    ///
    /// Cash transactions identical in `(amount, kind, date)` to one already
    /// pending for the year are dropped. Summaries overwrite the previous one.
    pub fn record(&mut self, year: &str, entity: TrackedEntity) {
        match entity {
            TrackedEntity::Position(p) => {
                self.pending.stocks.entry(year.to_string()).or_default().push(p);
            }
            TrackedEntity::Cash(tx) => {
                let bucket = self
                    .pending
                    .cash_transactions
                    .entry(year.to_string())
                    .or_default();
                if bucket.iter().any(|pending| pending.same_movement(&tx)) {
                    log::debug!(
                        "Skipping duplicate pending cash transaction {} {} on {} for {year}",
                        tx.kind,
                        tx.amount,
                        tx.date
                    );
                    return;
                }
                bucket.push(tx);
            }
            TrackedEntity::Stock(tx) => {
                self.pending
                    .stock_transactions
                    .entry(year.to_string())
                    .or_default()
                    .push(tx);
            }
            TrackedEntity::Summary(summary) => {
                self.pending.yearly_summaries.insert(year.to_string(), summary);
            }
        }
    }

    /// Record everything a ledger mutation produced.
    pub fn record_change(&mut self, change: &LedgerChange) {
        let year = change.year.as_str();
        for p in &change.positions {
            self.record(year, TrackedEntity::Position(p.clone()));
        }
        for tx in &change.cash_transactions {
            self.record(year, TrackedEntity::Cash(tx.clone()));
        }
        for tx in &change.stock_transactions {
            self.record(year, TrackedEntity::Stock(tx.clone()));
        }
        if let Some(cash_balance) = change.cash_balance {
            self.record(year, TrackedEntity::Summary(YearSummary { cash_balance }));
        }
    }

    /// Current diff.
    pub fn snapshot(&self) -> &IncrementalChanges {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop everything (session reset). Returns what was pending.
    pub fn clear(&mut self) -> IncrementalChanges {
        std::mem::take(&mut self.pending)
    }

    /// Remove exactly the entries of a submitted snapshot.
    ///
    /// Entities are subtracted as a multiset per year bucket, so anything
    /// recorded after the snapshot was taken stays pending. A yearly summary
    /// is removed only if it still equals the submitted value.
    pub fn clear_submitted(&mut self, submitted: &IncrementalChanges) {
        subtract_buckets(&mut self.pending.stocks, &submitted.stocks);
        subtract_buckets(
            &mut self.pending.cash_transactions,
            &submitted.cash_transactions,
        );
        subtract_buckets(
            &mut self.pending.stock_transactions,
            &submitted.stock_transactions,
        );

        for (year, summary) in &submitted.yearly_summaries {
            if self.pending.yearly_summaries.get(year) == Some(summary) {
                self.pending.yearly_summaries.remove(year);
            }
        }
    }

    /// Forget pending position entries of a deleted stock.
    pub fn drop_stock(&mut self, stock_name: &str) {
        for bucket in self.pending.stocks.values_mut() {
            bucket.retain(|p| p.name != stock_name);
        }
        self.pending.stocks.retain(|_, bucket| !bucket.is_empty());
    }
}

fn subtract_buckets<T: PartialEq>(
    pending: &mut std::collections::BTreeMap<String, Vec<T>>,
    submitted: &std::collections::BTreeMap<String, Vec<T>>,
) {
    for (year, sent) in submitted {
        let Some(bucket) = pending.get_mut(year) else {
            continue;
        };
        for item in sent {
            if let Some(idx) = bucket.iter().position(|p| p == item) {
                bucket.remove(idx);
            }
        }
        if bucket.is_empty() {
            pending.remove(year);
        }
    }
}
