// providers/cash.rs
//
// Cash processor for pay-on-delivery and agent pickup. There is no external
// API: payments complete when an agent or courier reports collection, so
// every operation resolves locally.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::PaymentError;
use crate::models::{
    PaymentMethod, PaymentProvider, PaymentRequest, ProviderHealth, ProviderPayment,
    ProviderRefund, RefundRequest, Transaction, TransactionStatus,
};
use crate::utils::crypto;
use crate::utils::money::format_currency;
use crate::utils::reference::generate_payment_code;

use super::ProviderClient;

const PICKUP_CODE_VALIDITY_DAYS: i64 = 7;

pub struct CashProcessor {
    config: Arc<AppConfig>,
}

impl CashProcessor {
    pub fn new(config: Arc<AppConfig>) -> Self {
        CashProcessor { config }
    }
}

#[async_trait]
impl ProviderClient for CashProcessor {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Cash
    }

    async fn authenticate(&self) -> Result<(), PaymentError> {
        Ok(())
    }

    async fn pay(&self, request: &PaymentRequest) -> Result<ProviderPayment, PaymentError> {
        let transaction_id = Uuid::new_v4().to_string();
        let formatted = format_currency(request.amount, request.currency);

        let (reference, message, expires_at) = match request.method {
            PaymentMethod::CashPickup => {
                let code = generate_payment_code();
                let expires = Utc::now() + Duration::days(PICKUP_CODE_VALIDITY_DAYS);
                let message = format!(
                    "Present code {code} at any pickup point to pay {formatted}. \
                     Code valid for {PICKUP_CODE_VALIDITY_DAYS} days."
                );
                (code, message, Some(expires))
            }
            _ => {
                let reference = format!("COD-{}", &transaction_id[..8].to_uppercase());
                let message =
                    format!("Pay {formatted} in cash on delivery. Reference {reference}.");
                (reference, message, request.expires_at)
            }
        };

        tracing::info!(
            order_id = %request.order_id,
            method = %request.method,
            reference = %reference,
            "cash payment registered"
        );

        Ok(ProviderPayment {
            transaction_id,
            external_transaction_id: Some(reference.clone()),
            status: TransactionStatus::Pending,
            ussd_code: None,
            payment_url: None,
            reference: Some(reference),
            message,
            expires_at,
        })
    }

    async fn get_status(&self, _external_ref: &str) -> Result<TransactionStatus, PaymentError> {
        // cash settles only through agent confirmation, never by polling
        Ok(TransactionStatus::Pending)
    }

    async fn refund(
        &self,
        request: &RefundRequest,
        original: &Transaction,
    ) -> Result<ProviderRefund, PaymentError> {
        let amount = request.amount.unwrap_or(original.amount);
        let refund_id = format!("CASH-REF-{}", Uuid::new_v4());

        tracing::info!(
            transaction_id = %original.id,
            refund_id = %refund_id,
            amount,
            "cash refund queued for manual disbursement"
        );

        Ok(ProviderRefund {
            refund_id,
            status: TransactionStatus::Processing,
            amount,
            currency: original.currency,
            reference: original.reference.clone(),
        })
    }

    fn validate_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        crypto::verify_signature(payload, signature, &self.config.cash_webhook_secret)
    }

    async fn health_check(&self) -> ProviderHealth {
        if self.config.cash.enabled {
            ProviderHealth::healthy()
        } else {
            ProviderHealth::unhealthy(json!({ "error": "cash payments disabled" }))
        }
    }
}
