// models/webhook.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Currency, PaymentProvider, TransactionStatus};

/// Provider callback payload. Signature verification happens against the
/// raw request body before this is ever deserialized into state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    pub transaction_id: Uuid,
    #[serde(default)]
    pub external_transaction_id: Option<String>,
    pub status: TransactionStatus,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<Currency>,
    pub provider: PaymentProvider,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub reason: Option<String>,
}
