use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::errors::CoreError;
use crate::models::changes::IncrementalChanges;
use crate::providers::traits::RemoteStore;

/// An owned copy of the diff as it is submitted.
///
/// The ledger is not borrowed while the request is in flight; on success the
/// exact same `changes` are subtracted from the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncBatch {
    pub id: u64,
    pub changes: IncrementalChanges,
}

/// What happened to a sync request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// The backend acknowledged the batch.
    Synced,
    /// Another submission was in flight; this one is queued behind it.
    Queued,
    /// The batch was empty; no request was made.
    NothingToSync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    pub status: SyncStatus,
    /// A request was queued while this one was in flight; sync again.
    pub follow_up: bool,
}

impl SyncOutcome {
    fn new(status: SyncStatus) -> Self {
        Self {
            status,
            follow_up: false,
        }
    }
}

/// Submits diffs to the remote store, at most one at a time.
///
/// A submission that arrives while another is in flight is not dropped: it
/// is reported as `Queued` and the in-flight completion carries
/// `follow_up = true` so the caller syncs again with the then-current diff.
/// Failures are returned as-is; retrying is up to the caller.
pub struct SyncCoordinator {
    remote: Arc<dyn RemoteStore>,
    in_flight: Mutex<()>,
    queued: AtomicBool,
}

impl SyncCoordinator {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            in_flight: Mutex::new(()),
            queued: AtomicBool::new(false),
        }
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Whether a request is waiting, clearing the flag.
    pub fn take_queued(&self) -> bool {
        self.queued.swap(false, Ordering::SeqCst)
    }

    /// Submit one batch.
    ///
    /// - `SessionExpired` passes through untouched.
    /// - Any other failure becomes `SyncFailure`; the queued flag survives it.
    pub async fn submit(&self, batch: &SyncBatch) -> Result<SyncOutcome, CoreError> {
        if batch.changes.is_empty() {
            return Ok(SyncOutcome::new(SyncStatus::NothingToSync));
        }

        let Ok(_guard) = self.in_flight.try_lock() else {
            log::debug!("Sync #{} queued behind an in-flight submission", batch.id);
            self.queued.store(true, Ordering::SeqCst);
            return Ok(SyncOutcome::new(SyncStatus::Queued));
        };

        log::info!(
            "Sync #{}: submitting {} entities, {} yearly summaries",
            batch.id,
            batch.changes.entity_count(),
            batch.changes.yearly_summaries.len()
        );

        match self.remote.push_changes(&batch.changes).await {
            Ok(()) => Ok(SyncOutcome {
                status: SyncStatus::Synced,
                follow_up: self.take_queued(),
            }),
            Err(CoreError::SessionExpired) => Err(CoreError::SessionExpired),
            Err(e) => {
                log::warn!("Sync #{} failed, diff kept: {e}", batch.id);
                Err(CoreError::SyncFailure(e.to_string()))
            }
        }
    }
}

/// Debounce window for automatic syncs.
///
/// Every mutation pushes the due time out by `window`; a sync is due only
/// once the window has elapsed with no new mutation.
#[derive(Debug, Clone)]
pub struct SyncScheduler {
    window: Duration,
    last_mutation: Option<Instant>,
}

impl SyncScheduler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_mutation: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn mark_dirty(&mut self, now: Instant) {
        self.last_mutation = Some(now);
    }

    pub fn mark_clean(&mut self) {
        self.last_mutation = None;
    }

    pub fn is_dirty(&self) -> bool {
        self.last_mutation.is_some()
    }

    /// When the pending sync becomes due, if anything is pending.
    pub fn due_at(&self) -> Option<Instant> {
        self.last_mutation.map(|t| t + self.window)
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.due_at().is_some_and(|due| now >= due)
    }

    /// Sleep until the current window closes. Returns immediately when clean.
    pub async fn wait_until_due(&self) {
        if let Some(due) = self.due_at() {
            tokio::time::sleep_until(due).await;
        }
    }
}

impl Default for SyncScheduler {
    fn default() -> Self {
        Self::new(Duration::from_millis(
            crate::models::settings::DEFAULT_SYNC_DEBOUNCE_MS,
        ))
    }
}
