//! Queue manager: the public API surface over store, notifier, and
//! executor.
//!
//! Invariants enforced here:
//! - exactly one record per locally finalized unconfirmed sale, newest
//!   prepended;
//! - ids are generated at enqueue time and never reused;
//! - a record leaves the store only through an explicit [`remove`] — after
//!   an acknowledged success or an operator discard. Nothing here
//!   auto-expires or auto-removes on failure.
//!
//! [`remove`]: QueueManager::remove

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::notify::{ChangeNotifier, QueueAction};
use crate::record::{NewSaleRecord, QueueRecord, SaleEndpoint};
use crate::store::{QueueStore, StoreError};
use crate::submit::{SubmitOutcome, Submitter};

/// Pluggable id generation so deterministic ids can be injected under test.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// Default id source: UUID v4 (cryptographically random).
pub struct UuidSource;

impl IdSource for UuidSource {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Result of a [`QueueManager::process_pending`] drain.
#[derive(Debug, Default)]
pub struct ProcessReport {
    /// Ids of records that were acknowledged and removed.
    pub submitted: Vec<String>,
    /// Records that stayed queued, with the error the operator should see.
    pub failed: Vec<FailedSubmission>,
}

#[derive(Debug)]
pub struct FailedSubmission {
    pub record_id: String,
    pub error: String,
    /// `true` when the payload can never succeed and needs operator review.
    pub fatal: bool,
}

/// Badge data for the pending-sales panel.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub pending: usize,
    pub layaways: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_age_seconds: Option<i64>,
}

/// The sale queue API: enqueue, list, remove, submit.
///
/// The store, notifier, and executor are injected so tests run against an
/// in-memory store and a scripted executor with no ambient environment.
pub struct QueueManager<S> {
    store: Arc<dyn QueueStore>,
    notifier: Arc<dyn ChangeNotifier>,
    ids: Arc<dyn IdSource>,
    submitter: S,
}

impl<S: Submitter> QueueManager<S> {
    pub fn new(
        store: Arc<dyn QueueStore>,
        notifier: Arc<dyn ChangeNotifier>,
        submitter: S,
    ) -> Self {
        Self {
            store,
            notifier,
            ids: Arc::new(UuidSource),
            submitter,
        }
    }

    /// Replace the id source. Tests inject a deterministic one.
    pub fn with_id_source(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    /// Durably add a finalized sale and announce `added`.
    ///
    /// Generates a fresh id, defaults the summary's `created_at` to now
    /// when absent, prepends (newest first), persists, and returns the new
    /// full sequence. Payload shape is not validated here — that is the
    /// caller's responsibility.
    pub fn enqueue(&self, sale: NewSaleRecord) -> Result<Vec<QueueRecord>, StoreError> {
        let mut summary = sale.summary;
        if summary.created_at.is_none() {
            summary.created_at = Some(Utc::now());
        }
        let record = QueueRecord {
            id: self.ids.next_id(),
            endpoint: sale.endpoint,
            payload: sale.payload,
            summary,
        };

        let mut records = self.store.read();
        records.insert(0, record.clone());
        self.store.write(&records)?;
        self.notifier.notify(QueueAction::Added);
        info!(record_id = %record.id, pending = records.len(), "sale queued for later submission");
        Ok(records)
    }

    /// Pure read of the durable store. Safe at any time; returns the empty
    /// sequence before any write has occurred.
    pub fn list(&self) -> Vec<QueueRecord> {
        self.store.read()
    }

    /// Remove a record by id and announce `removed`. Idempotent: an absent
    /// id is a no-op, not an error, and wakes nobody since nothing changed.
    pub fn remove(&self, id: &str) -> Result<Vec<QueueRecord>, StoreError> {
        let records = self.store.read();
        let before = records.len();
        let records: Vec<QueueRecord> = records.into_iter().filter(|r| r.id != id).collect();
        if records.len() == before {
            return Ok(records);
        }

        self.store.write(&records)?;
        self.notifier.notify(QueueAction::Removed);
        debug!(record_id = %id, pending = records.len(), "queued sale removed");
        Ok(records)
    }

    /// One submission attempt for one record.
    ///
    /// Deliberately leaves the record in the store regardless of outcome:
    /// "did the network call succeed" and "is this record still pending"
    /// stay independently inspectable, and a crash between send and
    /// acknowledgment cannot lose the sale. Callers call [`remove`] only
    /// after observing [`SubmitOutcome::Success`].
    ///
    /// [`remove`]: QueueManager::remove
    pub async fn submit(&self, record: &QueueRecord, credential: &str) -> SubmitOutcome {
        self.submitter.submit(record, credential).await
    }

    /// Operator-triggered drain: submit every pending sale once, removing
    /// exactly those that succeed. Failed records stay queued with their
    /// error reported; there is no failure-count cutoff.
    pub async fn process_pending(&self, credential: &str) -> Result<ProcessReport, StoreError> {
        let pending = self.store.read();
        let mut report = ProcessReport::default();

        for record in &pending {
            match self.submitter.submit(record, credential).await {
                SubmitOutcome::Success { .. } => {
                    self.remove(&record.id)?;
                    report.submitted.push(record.id.clone());
                }
                SubmitOutcome::Retryable { error } => {
                    warn!(record_id = %record.id, error = %error, "sale submission failed, record stays queued");
                    report.failed.push(FailedSubmission {
                        record_id: record.id.clone(),
                        error,
                        fatal: false,
                    });
                }
                SubmitOutcome::Fatal { status, error } => {
                    warn!(record_id = %record.id, status, error = %error, "sale rejected by the API, operator review required");
                    report.failed.push(FailedSubmission {
                        record_id: record.id.clone(),
                        error,
                        fatal: true,
                    });
                }
            }
        }

        info!(
            submitted = report.submitted.len(),
            failed = report.failed.len(),
            "pending sales drain finished"
        );
        Ok(report)
    }

    /// Counts for the pending-sales badge.
    pub fn stats(&self) -> QueueStats {
        let records = self.store.read();
        let now = Utc::now();
        let oldest_age_seconds = records
            .iter()
            .filter_map(|r| r.summary.created_at)
            .map(|t| (now - t).num_seconds().max(0))
            .max();

        QueueStats {
            pending: records.len(),
            layaways: records
                .iter()
                .filter(|r| r.endpoint == SaleEndpoint::Layaway)
                .count(),
            oldest_age_seconds,
        }
    }
}
