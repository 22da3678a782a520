// services/transaction_manager.rs
//
// Owns the transaction store and enforces the lifecycle state machine.
// Every status write goes through `update_transaction_status`; the wrapper
// methods below validate their pre-conditions and delegate to it.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::PaymentError;
use crate::models::{
    PaymentRequest, Transaction, TransactionEvent, TransactionStatus, TransactionType,
    TransactionUpdate,
};
use crate::utils::money::{calculate_merchant_commission, calculate_payment_fees};
use crate::utils::reference::generate_transaction_reference;

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct TransactionManager {
    config: Arc<AppConfig>,
    store: RwLock<HashMap<Uuid, Transaction>>,
    events: broadcast::Sender<TransactionEvent>,
}

impl TransactionManager {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        TransactionManager {
            config,
            store: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransactionEvent> {
        self.events.subscribe()
    }

    /// Which target states a transaction in `from` may move to.
    pub fn allowed_transitions(from: TransactionStatus) -> &'static [TransactionStatus] {
        use TransactionStatus::*;
        match from {
            Pending => &[Processing, AwaitingConfirmation, Failed, Cancelled, Expired],
            Processing => &[
                AwaitingConfirmation,
                Confirmed,
                Failed,
                Cancelled,
                Expired,
            ],
            AwaitingConfirmation => &[Confirmed, Failed, Cancelled, Expired],
            Confirmed => &[Completed, Failed, Refunded, PartiallyRefunded],
            Completed => &[Refunded, PartiallyRefunded, Disputed],
            Refunded => &[Disputed],
            PartiallyRefunded => &[Refunded, Disputed],
            Disputed => &[Completed, Refunded],
            Failed | Cancelled | Expired => &[],
        }
    }

    pub fn is_valid_transition(from: TransactionStatus, to: TransactionStatus) -> bool {
        Self::allowed_transitions(from).contains(&to)
    }

    /// Create a pending transaction from a validated payment request. Fees,
    /// taxes and commission are computed here and frozen on the record.
    pub async fn create_transaction(
        &self,
        request: &PaymentRequest,
    ) -> Result<Transaction, PaymentError> {
        let schedule = &self.config.provider_settings(request.provider).fees;
        let fees = calculate_payment_fees(request.amount, schedule, &self.config.taxation);
        let commission = calculate_merchant_commission(request.amount, &self.config.taxation);
        let now = Utc::now();

        let transaction = Transaction {
            id: Uuid::new_v4(),
            order_id: request.order_id.clone(),
            customer_id: request.customer_id.clone(),
            merchant_id: request.merchant_id.clone(),
            transaction_type: TransactionType::Payment,
            status: TransactionStatus::Pending,
            amount: request.amount,
            currency: request.currency,
            provider: request.provider,
            method: request.method,
            phone_number: request.phone_number.clone(),
            reference: generate_transaction_reference(request.provider, &request.order_id),
            description: request.description.clone(),
            external_transaction_id: None,
            fees: fees.fees,
            taxes: fees.taxes,
            commission,
            net_amount: fees.net_amount,
            metadata: request.metadata.clone(),
            fraud_score: None,
            risk_level: None,
            retry_count: 0,
            max_retries: self.config.max_retries,
            last_retry_at: None,
            failure_reason: None,
            callback_url: request.callback_url.clone(),
            webhook_attempts: 0,
            expires_at: request.expires_at,
            confirmed_at: None,
            completed_at: None,
            failed_at: None,
            cancelled_at: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        };

        self.store
            .write()
            .await
            .insert(transaction.id, transaction.clone());

        tracing::info!(
            transaction_id = %transaction.id,
            order_id = %transaction.order_id,
            provider = %transaction.provider,
            amount = transaction.amount,
            reference = %transaction.reference,
            "transaction created"
        );

        let _ = self.events.send(TransactionEvent::Created {
            transaction: transaction.clone(),
        });

        Ok(transaction)
    }

    pub async fn get_transaction(&self, id: Uuid) -> Result<Transaction, PaymentError> {
        self.store
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(PaymentError::TransactionNotFound(id))
    }

    pub async fn transactions_for_customer(&self, customer_id: &str) -> Vec<Transaction> {
        self.store
            .read()
            .await
            .values()
            .filter(|t| t.customer_id == customer_id)
            .cloned()
            .collect()
    }

    /// Apply a status change plus any accompanying field updates. The
    /// transition is checked against the state machine before anything
    /// mutates; an invalid transition leaves the record untouched.
    pub async fn update_transaction_status(
        &self,
        id: Uuid,
        update: TransactionUpdate,
    ) -> Result<Transaction, PaymentError> {
        let mut store = self.store.write().await;
        let transaction = store
            .get_mut(&id)
            .ok_or(PaymentError::TransactionNotFound(id))?;

        let previous = transaction.status;

        if let Some(next) = update.status {
            if next != previous && !Self::is_valid_transition(previous, next) {
                return Err(PaymentError::InvalidTransition {
                    from: previous,
                    to: next,
                });
            }
        }

        let now = Utc::now();

        if let Some(next) = update.status {
            transaction.status = next;
            match next {
                TransactionStatus::Confirmed => transaction.confirmed_at = Some(now),
                TransactionStatus::Completed => transaction.completed_at = Some(now),
                TransactionStatus::Failed | TransactionStatus::Expired => {
                    transaction.failed_at = Some(now)
                }
                TransactionStatus::Cancelled => transaction.cancelled_at = Some(now),
                TransactionStatus::Refunded | TransactionStatus::PartiallyRefunded => {
                    transaction.refunded_at = Some(now)
                }
                _ => {}
            }
        }

        if let Some(external_id) = update.external_transaction_id {
            transaction.external_transaction_id = Some(external_id);
        }
        if let Some(reason) = update.failure_reason {
            transaction.failure_reason = Some(reason);
        }
        if let Some(score) = update.fraud_score {
            transaction.fraud_score = Some(score);
        }
        if let Some(level) = update.risk_level {
            transaction.risk_level = Some(level);
        }
        if let Some(count) = update.retry_count {
            transaction.retry_count = count;
        }
        if let Some(at) = update.last_retry_at {
            transaction.last_retry_at = Some(at);
        }
        if let Some(attempts) = update.webhook_attempts {
            transaction.webhook_attempts = attempts;
        }
        if let Some(metadata) = update.metadata {
            transaction.metadata.extend(metadata);
        }

        transaction.updated_at = now;
        let snapshot = transaction.clone();
        drop(store);

        if snapshot.status != previous {
            tracing::info!(
                transaction_id = %id,
                from = %previous,
                to = %snapshot.status,
                "transaction status changed"
            );
            let _ = self.events.send(TransactionEvent::StatusChanged {
                transaction: snapshot.clone(),
                previous,
                current: snapshot.status,
            });
        }

        Ok(snapshot)
    }

    /// Confirm a payment. A transaction still in `Pending` is first stepped
    /// through `AwaitingConfirmation` so the confirmation always follows the
    /// same path the customer-facing flow takes.
    pub async fn confirm_transaction(
        &self,
        id: Uuid,
        external_transaction_id: Option<String>,
    ) -> Result<Transaction, PaymentError> {
        let current = self.get_transaction(id).await?;

        if matches!(
            current.status,
            TransactionStatus::Pending | TransactionStatus::Processing
        ) {
            self.update_transaction_status(
                id,
                TransactionUpdate::status(TransactionStatus::AwaitingConfirmation),
            )
            .await?;
        }

        let update = TransactionUpdate {
            status: Some(TransactionStatus::Confirmed),
            external_transaction_id,
            ..Default::default()
        };
        self.update_transaction_status(id, update).await
    }

    pub async fn complete_transaction(&self, id: Uuid) -> Result<Transaction, PaymentError> {
        self.update_transaction_status(id, TransactionUpdate::status(TransactionStatus::Completed))
            .await
    }

    pub async fn cancel_transaction(
        &self,
        id: Uuid,
        reason: impl Into<String>,
    ) -> Result<Transaction, PaymentError> {
        let update = TransactionUpdate {
            status: Some(TransactionStatus::Cancelled),
            failure_reason: Some(reason.into()),
            ..Default::default()
        };
        self.update_transaction_status(id, update).await
    }

    pub async fn expire_transaction(&self, id: Uuid) -> Result<Transaction, PaymentError> {
        let update = TransactionUpdate {
            status: Some(TransactionStatus::Expired),
            failure_reason: Some("transaction expired".to_string()),
            ..Default::default()
        };
        self.update_transaction_status(id, update).await
    }

    /// Record a failure. Retryable failures below the retry budget keep the
    /// transaction alive and bump the retry counter; everything else moves
    /// it to `Failed`.
    pub async fn mark_as_failed(
        &self,
        id: Uuid,
        reason: impl Into<String>,
        retryable: bool,
    ) -> Result<Transaction, PaymentError> {
        let current = self.get_transaction(id).await?;
        let reason = reason.into();

        if retryable && current.retry_count < current.max_retries {
            let update = TransactionUpdate {
                failure_reason: Some(reason.clone()),
                retry_count: Some(current.retry_count + 1),
                last_retry_at: Some(Utc::now()),
                ..Default::default()
            };
            let updated = self.update_transaction_status(id, update).await?;
            tracing::warn!(
                transaction_id = %id,
                retry_count = updated.retry_count,
                max_retries = updated.max_retries,
                reason = %reason,
                "transaction failure recorded, retry budget remaining"
            );
            return Ok(updated);
        }

        let update = TransactionUpdate {
            status: Some(TransactionStatus::Failed),
            failure_reason: Some(reason),
            ..Default::default()
        };
        self.update_transaction_status(id, update).await
    }

    /// Check a refund against the stored record without mutating anything.
    /// Returns the status the refund would land in. Callers must pass this
    /// check before any provider-side refund is issued.
    pub fn validate_refund(
        transaction: &Transaction,
        amount: Option<i64>,
    ) -> Result<TransactionStatus, PaymentError> {
        if !matches!(
            transaction.status,
            TransactionStatus::Completed | TransactionStatus::Confirmed
        ) {
            return Err(PaymentError::RefundNotAllowed(transaction.status));
        }

        let refund_amount = amount.unwrap_or(transaction.amount);
        if refund_amount <= 0 || refund_amount > transaction.amount {
            return Err(PaymentError::validation(
                "amount",
                "refund amount must be positive and at most the original amount",
            ));
        }

        Ok(if refund_amount == transaction.amount {
            TransactionStatus::Refunded
        } else {
            TransactionStatus::PartiallyRefunded
        })
    }

    /// Apply a refund outcome. Full refunds move to `Refunded`, anything
    /// less to `PartiallyRefunded`. Only settled transactions qualify.
    pub async fn process_refund(
        &self,
        id: Uuid,
        amount: Option<i64>,
        reason: &str,
    ) -> Result<Transaction, PaymentError> {
        let current = self.get_transaction(id).await?;
        let status = Self::validate_refund(&current, amount)?;
        let refund_amount = amount.unwrap_or(current.amount);

        let mut metadata = HashMap::new();
        metadata.insert("refund_amount".to_string(), serde_json::json!(refund_amount));
        metadata.insert("refund_reason".to_string(), serde_json::json!(reason));

        let update = TransactionUpdate {
            status: Some(status),
            metadata: Some(metadata),
            ..Default::default()
        };
        self.update_transaction_status(id, update).await
    }
}
