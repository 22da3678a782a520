// models/transaction.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use super::{Currency, PaymentMethod, PaymentProvider, RiskLevel};

/// Lifecycle states for a transaction. Transitions are enforced by the
/// transaction manager; nothing else writes `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processing,
    AwaitingConfirmation,
    Confirmed,
    Completed,
    Failed,
    Cancelled,
    Refunded,
    PartiallyRefunded,
    Disputed,
    Expired,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Failed | TransactionStatus::Cancelled | TransactionStatus::Expired
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::AwaitingConfirmation => "awaiting_confirmation",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Refunded => "refunded",
            TransactionStatus::PartiallyRefunded => "partially_refunded",
            TransactionStatus::Disputed => "disputed",
            TransactionStatus::Expired => "expired",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Payment,
    Refund,
}

/// Canonical transaction record, owned exclusively by the transaction
/// manager. `amount`, `provider` and `order_id` never change after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub order_id: String,
    pub customer_id: String,
    pub merchant_id: Option<String>,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub amount: i64,
    pub currency: Currency,
    pub provider: PaymentProvider,
    pub method: PaymentMethod,
    pub phone_number: Option<String>,
    pub reference: String,
    pub description: String,
    pub external_transaction_id: Option<String>,
    pub fees: i64,
    pub taxes: i64,
    pub commission: i64,
    pub net_amount: i64,
    pub metadata: HashMap<String, serde_json::Value>,
    pub fraud_score: Option<u32>,
    pub risk_level: Option<RiskLevel>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub callback_url: Option<String>,
    pub webhook_attempts: u32,
    pub expires_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update applied through the transaction manager's sanctioned
/// mutation path.
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub status: Option<TransactionStatus>,
    pub external_transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    pub fraud_score: Option<u32>,
    pub risk_level: Option<RiskLevel>,
    pub retry_count: Option<u32>,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub webhook_attempts: Option<u32>,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl TransactionUpdate {
    pub fn status(status: TransactionStatus) -> Self {
        TransactionUpdate {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Events published by the transaction manager. Consumers subscribe through
/// a broadcast channel; the manager never depends on them.
#[derive(Debug, Clone)]
pub enum TransactionEvent {
    Created {
        transaction: Transaction,
    },
    StatusChanged {
        transaction: Transaction,
        previous: TransactionStatus,
        current: TransactionStatus,
    },
}
