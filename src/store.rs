//! Durable persistence for the queue document.
//!
//! The whole record sequence is serialized as a single JSON document under
//! one well-known key. Client-side key/value storage offers no
//! transactional primitive narrower than a full value, so the unit of
//! persistence is always the entire sequence — there are no partial-record
//! updates.
//!
//! Two implementations: [`MemoryStore`] for tests and embedders that handle
//! durability elsewhere, and [`SqliteStore`] persisting the document in a
//! category/key/value settings table (WAL mode, matching the rest of the
//! terminal's local storage).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::record::QueueRecord;

/// Well-known storage key holding the serialized queue document.
pub const QUEUE_KEY: &str = "pending_sales";

/// Settings category the queue key lives under.
const SETTINGS_CATEGORY: &str = "offline";

/// Errors surfaced by queue persistence. Reads never produce these — an
/// unreadable document degrades to an empty queue instead.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("queue store lock poisoned")]
    Poisoned,
    #[error("create data dir: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialize queue document: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Key-addressed persistence for the queue document.
///
/// `read` is deliberately infallible: an absent, malformed, or unparsable
/// document is treated as an empty queue (logged, never surfaced to the
/// operator as an error). `write` replaces the stored document in a single
/// underlying set operation; an empty sequence deletes the key entirely so
/// storage stays tidy and "empty" never diverges from "absent".
pub trait QueueStore: Send + Sync {
    fn read(&self) -> Vec<QueueRecord>;
    fn write(&self, records: &[QueueRecord]) -> Result<(), StoreError>;
}

fn decode_document(raw: Option<&str>) -> Vec<QueueRecord> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<QueueRecord>>(raw) {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "queue document is malformed, treating as empty");
            Vec::new()
        }
    }
}

/// `None` means "delete the key".
fn encode_document(records: &[QueueRecord]) -> Result<Option<String>, StoreError> {
    if records.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(records)?))
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// In-memory store holding the *serialized* document rather than decoded
/// records, so it round-trips exactly like a real storage backend.
#[derive(Default)]
pub struct MemoryStore {
    doc: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the raw document, bypassing serialization. Lets tests stage
    /// corruption and lost-update scenarios.
    pub fn set_raw(&self, raw: &str) {
        if let Ok(mut doc) = self.doc.lock() {
            *doc = Some(raw.to_string());
        }
    }

    /// Current raw document, `None` when the key is absent.
    pub fn raw(&self) -> Option<String> {
        self.doc.lock().ok().and_then(|doc| doc.clone())
    }
}

impl QueueStore for MemoryStore {
    fn read(&self) -> Vec<QueueRecord> {
        let doc = match self.doc.lock() {
            Ok(doc) => doc,
            Err(_) => {
                warn!("queue store lock poisoned during read");
                return Vec::new();
            }
        };
        decode_document(doc.as_deref())
    }

    fn write(&self, records: &[QueueRecord]) -> Result<(), StoreError> {
        let encoded = encode_document(records)?;
        let mut doc = self.doc.lock().map_err(|_| StoreError::Poisoned)?;
        *doc = encoded;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SQLite-backed store
// ---------------------------------------------------------------------------

/// SQLite-backed store. The queue document occupies one row of a
/// `local_settings`-style table, keyed by category + key, and is replaced
/// wholesale on every write.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) `{data_dir}/pos-queue.db` and ensure the schema.
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("pos-queue.db");
        info!("opening queue database at {}", db_path.display());

        let conn = Connection::open(&db_path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )?;
        Self::from_connection(conn, db_path)
    }

    /// Build a store over an existing connection. Tests use this with an
    /// in-memory connection.
    pub fn from_connection(conn: Connection, db_path: PathBuf) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS local_settings (
                setting_category TEXT NOT NULL,
                setting_key TEXT NOT NULL,
                setting_value TEXT NOT NULL,
                updated_at TEXT DEFAULT (datetime('now')),
                PRIMARY KEY (setting_category, setting_key)
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Path of the backing database file (`:memory:` for test stores).
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

impl QueueStore for SqliteStore {
    fn read(&self) -> Vec<QueueRecord> {
        let conn = match self.conn.lock() {
            Ok(conn) => conn,
            Err(_) => {
                warn!("queue store lock poisoned during read");
                return Vec::new();
            }
        };
        let raw = conn
            .query_row(
                "SELECT setting_value FROM local_settings \
                 WHERE setting_category = ?1 AND setting_key = ?2",
                params![SETTINGS_CATEGORY, QUEUE_KEY],
                |row| row.get::<_, String>(0),
            )
            .optional();
        match raw {
            Ok(raw) => decode_document(raw.as_deref()),
            Err(e) => {
                warn!(error = %e, "failed to read queue document");
                Vec::new()
            }
        }
    }

    fn write(&self, records: &[QueueRecord]) -> Result<(), StoreError> {
        let encoded = encode_document(records)?;
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        match encoded {
            Some(doc) => {
                conn.execute(
                    "INSERT INTO local_settings (setting_category, setting_key, setting_value, updated_at) \
                     VALUES (?1, ?2, ?3, datetime('now')) \
                     ON CONFLICT(setting_category, setting_key) DO UPDATE SET \
                        setting_value = excluded.setting_value, updated_at = excluded.updated_at",
                    params![SETTINGS_CATEGORY, QUEUE_KEY, doc],
                )?;
            }
            None => {
                conn.execute(
                    "DELETE FROM local_settings \
                     WHERE setting_category = ?1 AND setting_key = ?2",
                    params![SETTINGS_CATEGORY, QUEUE_KEY],
                )?;
            }
        }
        debug!(records = records.len(), "queue document persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{SaleEndpoint, SaleSummary};

    fn sample_record(id: &str) -> QueueRecord {
        QueueRecord {
            id: id.to_string(),
            endpoint: SaleEndpoint::Sale,
            payload: serde_json::json!({ "items": [{ "sku": "sku-1", "qty": 1 }] }),
            summary: SaleSummary {
                sale_number: format!("V-{id}"),
                total: 50000.0,
                payment_method: "Efectivo".to_string(),
                customer_name: None,
                is_layaway: false,
                created_at: Some("2026-08-30T10:00:00Z".parse().unwrap()),
            },
        }
    }

    fn test_sqlite_store() -> SqliteStore {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        conn.execute_batch(
            "PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )
        .expect("pragma setup");
        SqliteStore::from_connection(conn, PathBuf::from(":memory:")).expect("create store")
    }

    fn queue_row_count(store: &SqliteStore) -> i64 {
        let conn = store.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM local_settings \
             WHERE setting_category = ?1 AND setting_key = ?2",
            params![SETTINGS_CATEGORY, QUEUE_KEY],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_sqlite_write_then_read_round_trips() {
        let store = test_sqlite_store();
        let records = vec![sample_record("b"), sample_record("a")];

        store.write(&records).unwrap();
        assert_eq!(store.read(), records);
    }

    #[test]
    fn test_read_returns_empty_before_first_write() {
        let store = test_sqlite_store();
        assert!(store.read().is_empty());
    }

    #[test]
    fn test_empty_write_deletes_the_key() {
        let store = test_sqlite_store();
        store.write(&[sample_record("a")]).unwrap();
        assert_eq!(queue_row_count(&store), 1);

        store.write(&[]).unwrap();
        assert_eq!(queue_row_count(&store), 0);
        assert!(store.read().is_empty());
    }

    #[test]
    fn test_malformed_sqlite_document_reads_as_empty() {
        let store = test_sqlite_store();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO local_settings (setting_category, setting_key, setting_value) \
                 VALUES (?1, ?2, ?3)",
                params![SETTINGS_CATEGORY, QUEUE_KEY, "{ not json"],
            )
            .unwrap();
        }
        assert!(store.read().is_empty());
    }

    #[test]
    fn test_non_sequence_document_reads_as_empty() {
        let store = MemoryStore::new();
        store.set_raw("{\"pending\": 3}");
        assert!(store.read().is_empty());
    }

    #[test]
    fn test_memory_store_round_trips_and_clears_raw_document() {
        let store = MemoryStore::new();
        let records = vec![sample_record("x")];

        store.write(&records).unwrap();
        assert!(store.raw().is_some());
        assert_eq!(store.read(), records);

        store.write(&[]).unwrap();
        assert_eq!(store.raw(), None);
    }
}
