//! Offline-durable sale submission queue for retail POS terminals.
//!
//! When the sales backend is unreachable, a finalized sale is parked in a
//! durable local queue instead of being lost. Queued sales survive process
//! restarts, stay visible to every open view, and are submitted at least
//! once — a record only leaves the queue through an explicit removal after
//! an acknowledged success or an operator discard, never silently.
//!
//! The crate is split along its seams so each piece can be swapped under
//! test:
//!
//! - [`QueueStore`] — persistence of the whole record sequence as a single
//!   JSON document under one key ([`MemoryStore`], [`SqliteStore`]);
//! - [`ChangeNotifier`] — announces `added` / `removed` / `updated` to
//!   same-context subscribers ([`LocalBus`]) and cross-context bridges
//!   ([`BridgeNotifier`]), composable via [`FanoutNotifier`];
//! - [`QueueManager`] — enqueue, list, remove, submit, plus the
//!   operator-triggered drain and badge stats;
//! - [`Submitter`] — one network attempt per invocation, outcome classified
//!   as success / retryable / fatal ([`HttpSubmitter`]).
//!
//! ```no_run
//! use std::sync::Arc;
//! use pos_offline_queue::{
//!     HttpSubmitter, LocalBus, NewSaleRecord, QueueManager, SaleEndpoint, SaleSummary,
//!     SqliteStore,
//! };
//!
//! # async fn demo() -> Result<(), pos_offline_queue::StoreError> {
//! let store = Arc::new(SqliteStore::open(std::path::Path::new("/var/lib/pos"))?);
//! let bus = Arc::new(LocalBus::new());
//! let manager = QueueManager::new(store, bus, HttpSubmitter::new("https://pos.example.com"));
//!
//! // Sale finalized while offline: park it durably.
//! manager.enqueue(NewSaleRecord {
//!     endpoint: SaleEndpoint::Sale,
//!     payload: serde_json::json!({ "items": [{ "sku": "sku-1", "qty": 1 }] }),
//!     summary: SaleSummary {
//!         sale_number: "V-0001".to_string(),
//!         total: 50000.0,
//!         payment_method: "Efectivo".to_string(),
//!         customer_name: None,
//!         is_layaway: false,
//!         created_at: None,
//!     },
//! })?;
//!
//! // Operator-triggered retry: succeeded records are removed, the rest
//! // stay queued with their error.
//! let report = manager.process_pending("bearer-token").await?;
//! println!("submitted {}, still pending {}", report.submitted.len(), report.failed.len());
//! # Ok(()) }
//! ```

mod notify;
mod queue;
mod record;
mod store;
mod submit;

pub use notify::{BridgeNotifier, ChangeNotifier, FanoutNotifier, LocalBus, QueueAction};
pub use queue::{FailedSubmission, IdSource, ProcessReport, QueueManager, QueueStats, UuidSource};
pub use record::{NewSaleRecord, QueueRecord, SaleEndpoint, SaleSummary};
pub use store::{MemoryStore, QueueStore, SqliteStore, StoreError, QUEUE_KEY};
pub use submit::{
    check_connectivity, normalize_base_url, ConnectivityResult, HttpSubmitter, SubmitOutcome,
    Submitter,
};
