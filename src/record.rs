//! Queue record model: the unit of offline durability.
//!
//! A [`QueueRecord`] is one locally finalized, not-yet-confirmed sale. The
//! `payload` is the fully formed request body that will be replayed
//! verbatim; the queue never inspects or mutates business fields inside it.
//! The `summary` exists purely so a pending-sales panel can render the
//! record without parsing the payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Remote route a queued sale is replayed against. Fixed small set;
/// immutable for the record's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleEndpoint {
    /// Standard sale, settled in full at the till.
    Sale,
    /// Layaway / partial-payment sale, settled over future payments.
    Layaway,
}

impl SaleEndpoint {
    /// API path for this route, relative to the normalized base URL.
    pub fn path(self) -> &'static str {
        match self {
            SaleEndpoint::Sale => "/api/sales",
            SaleEndpoint::Layaway => "/api/sales/layaway",
        }
    }
}

/// Denormalized display projection of a queued sale.
///
/// Display only — submission logic never reads it, so stale values here
/// carry no correctness impact. `created_at` is defaulted at enqueue time
/// when the caller leaves it unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleSummary {
    pub sale_number: String,
    pub total: f64,
    pub payment_method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub is_layaway: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// One locally durable, not-yet-confirmed sale awaiting submission.
///
/// Records are immutable values: an "update" is modeled as remove-old /
/// insert-new. The `id` is the sole key for removal and is never reused,
/// even after the record is gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRecord {
    pub id: String,
    pub endpoint: SaleEndpoint,
    pub payload: Value,
    pub summary: SaleSummary,
}

/// Input to [`crate::QueueManager::enqueue`]: a sale before id assignment.
#[derive(Debug, Clone)]
pub struct NewSaleRecord {
    pub endpoint: SaleEndpoint,
    pub payload: Value,
    pub summary: SaleSummary,
}
