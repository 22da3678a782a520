// providers/mtn.rs
//
// MTN Mobile Money client (MoMo API). Collections handle pay-ins, the
// disbursement product handles refunds. Access tokens are cached per
// product and refreshed 60 seconds before expiry.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::PaymentError;
use crate::models::{
    PaymentProvider, PaymentRequest, ProviderHealth, ProviderPayment, ProviderRefund,
    RefundRequest, Transaction, TransactionStatus,
};
use crate::utils::crypto;
use crate::utils::phone;
use crate::utils::retry::{retry_operation, RetryPolicy};

use super::ProviderClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MomoProduct {
    Collection,
    Disbursement,
}

impl MomoProduct {
    fn path(&self) -> &'static str {
        match self {
            MomoProduct::Collection => "collection",
            MomoProduct::Disbursement => "disbursement",
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct RequestToPayStatus {
    status: String,
    #[serde(default)]
    reason: Option<serde_json::Value>,
}

type TokenCache = RwLock<Option<(String, DateTime<Utc>)>>;

pub struct MtnClient {
    config: Arc<AppConfig>,
    http: reqwest::Client,
    collection_token: TokenCache,
    disbursement_token: TokenCache,
}

impl MtnClient {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.mtn_api.timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        MtnClient {
            config,
            http,
            collection_token: RwLock::new(None),
            disbursement_token: RwLock::new(None),
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.config.mtn_api.retry_attempts,
            self.config.mtn_api.retry_delay_ms,
        )
    }

    fn target_environment(&self) -> &'static str {
        if self.config.is_production() {
            "mtncameroon"
        } else {
            "sandbox"
        }
    }

    fn subscription_key(&self, product: MomoProduct) -> &str {
        match product {
            MomoProduct::Collection => &self.config.mtn_api.collection_subscription_key,
            MomoProduct::Disbursement => &self.config.mtn_api.disbursement_subscription_key,
        }
    }

    fn token_cache(&self, product: MomoProduct) -> &TokenCache {
        match product {
            MomoProduct::Collection => &self.collection_token,
            MomoProduct::Disbursement => &self.disbursement_token,
        }
    }

    async fn access_token(&self, product: MomoProduct) -> Result<String, PaymentError> {
        if let Some((token, expires_at)) = self.token_cache(product).read().unwrap().clone() {
            if Utc::now() < expires_at {
                return Ok(token);
            }
        }

        let credentials = general_purpose::STANDARD.encode(format!(
            "{}:{}",
            self.config.mtn_api.api_user_id, self.config.mtn_api.api_key
        ));

        let response = self
            .http
            .post(format!(
                "{}/{}/token/",
                self.config.mtn_api.base_url,
                product.path()
            ))
            .header("Authorization", format!("Basic {credentials}"))
            .header("Ocp-Apim-Subscription-Key", self.subscription_key(product))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.provider_error(response).await);
        }

        let token: TokenResponse = response.json().await?;
        // refresh one minute early so in-flight calls never race expiry
        let expires_at = Utc::now() + Duration::seconds((token.expires_in - 60).max(0));
        *self.token_cache(product).write().unwrap() =
            Some((token.access_token.clone(), expires_at));

        Ok(token.access_token)
    }

    async fn provider_error(&self, response: reqwest::Response) -> PaymentError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        PaymentError::Provider {
            provider: PaymentProvider::MtnMobileMoney,
            code: status.as_u16().to_string(),
            message: if body.is_empty() {
                status.to_string()
            } else {
                body
            },
            retryable: status.is_server_error(),
        }
    }

    fn map_momo_status(status: &str) -> TransactionStatus {
        match status {
            "SUCCESSFUL" => TransactionStatus::Completed,
            "FAILED" => TransactionStatus::Failed,
            "TIMEOUT" => TransactionStatus::Expired,
            "ONGOING" => TransactionStatus::Processing,
            // PENDING and anything unrecognized stay pending
            _ => TransactionStatus::Pending,
        }
    }

    async fn request_to_pay(
        &self,
        request: &PaymentRequest,
        reference_id: &str,
    ) -> Result<(), PaymentError> {
        let token = self.access_token(MomoProduct::Collection).await?;
        let phone_number = request.phone_number.as_deref().unwrap_or_default();

        let body = json!({
            "amount": request.amount.to_string(),
            "currency": request.currency,
            "externalId": request.order_id,
            "payer": {
                "partyIdType": "MSISDN",
                "partyId": phone::national_number(phone_number),
            },
            "payerMessage": request.description,
            "payeeNote": request.description,
        });

        let response = self
            .http
            .post(format!(
                "{}/collection/v1_0/requesttopay",
                self.config.mtn_api.base_url
            ))
            .header("Authorization", format!("Bearer {token}"))
            .header("X-Reference-Id", reference_id)
            .header("X-Target-Environment", self.target_environment())
            .header(
                "Ocp-Apim-Subscription-Key",
                self.subscription_key(MomoProduct::Collection),
            )
            .json(&body)
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::ACCEPTED {
            return Err(self.provider_error(response).await);
        }

        Ok(())
    }
}

#[async_trait]
impl ProviderClient for MtnClient {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::MtnMobileMoney
    }

    async fn authenticate(&self) -> Result<(), PaymentError> {
        self.access_token(MomoProduct::Collection).await?;
        Ok(())
    }

    async fn pay(&self, request: &PaymentRequest) -> Result<ProviderPayment, PaymentError> {
        let reference_id = Uuid::new_v4().to_string();

        retry_operation(self.retry_policy(), "mtn_request_to_pay", || {
            self.request_to_pay(request, &reference_id)
        })
        .await?;

        tracing::info!(
            order_id = %request.order_id,
            reference_id = %reference_id,
            "MTN request-to-pay accepted"
        );

        Ok(ProviderPayment {
            transaction_id: reference_id.clone(),
            external_transaction_id: Some(reference_id),
            status: TransactionStatus::Pending,
            ussd_code: self
                .config
                .ussd_code(PaymentProvider::MtnMobileMoney)
                .map(str::to_string),
            payment_url: None,
            reference: None,
            message: format!(
                "Dial {} and confirm the payment on your phone",
                self.config.ussd.mtn_code
            ),
            expires_at: Some(Utc::now() + Duration::minutes(5)),
        })
    }

    async fn get_status(&self, external_ref: &str) -> Result<TransactionStatus, PaymentError> {
        let token = self.access_token(MomoProduct::Collection).await?;

        let response = self
            .http
            .get(format!(
                "{}/collection/v1_0/requesttopay/{}",
                self.config.mtn_api.base_url, external_ref
            ))
            .header("Authorization", format!("Bearer {token}"))
            .header("X-Target-Environment", self.target_environment())
            .header(
                "Ocp-Apim-Subscription-Key",
                self.subscription_key(MomoProduct::Collection),
            )
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(TransactionStatus::Failed);
        }
        if !response.status().is_success() {
            return Err(self.provider_error(response).await);
        }

        let status: RequestToPayStatus = response.json().await?;
        if let Some(reason) = &status.reason {
            tracing::debug!(external_ref, ?reason, momo_status = %status.status, "MTN status poll");
        }

        Ok(Self::map_momo_status(&status.status))
    }

    async fn refund(
        &self,
        request: &RefundRequest,
        original: &Transaction,
    ) -> Result<ProviderRefund, PaymentError> {
        let token = self.access_token(MomoProduct::Disbursement).await?;
        let reference_id = Uuid::new_v4().to_string();
        let amount = request.amount.unwrap_or(original.amount);
        let phone_number = original.phone_number.as_deref().unwrap_or_default();

        let body = json!({
            "amount": amount.to_string(),
            "currency": original.currency,
            "externalId": original.order_id,
            "payee": {
                "partyIdType": "MSISDN",
                "partyId": phone::national_number(phone_number),
            },
            "payerMessage": request.reason,
            "payeeNote": request.reason,
        });

        let response = self
            .http
            .post(format!(
                "{}/disbursement/v1_0/transfer",
                self.config.mtn_api.base_url
            ))
            .header("Authorization", format!("Bearer {token}"))
            .header("X-Reference-Id", &reference_id)
            .header("X-Target-Environment", self.target_environment())
            .header(
                "Ocp-Apim-Subscription-Key",
                self.subscription_key(MomoProduct::Disbursement),
            )
            .json(&body)
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::ACCEPTED {
            return Err(self.provider_error(response).await);
        }

        tracing::info!(
            transaction_id = %original.id,
            refund_id = %reference_id,
            amount,
            "MTN refund transfer accepted"
        );

        Ok(ProviderRefund {
            refund_id: reference_id,
            status: TransactionStatus::Processing,
            amount,
            currency: original.currency,
            reference: original.reference.clone(),
        })
    }

    fn validate_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        crypto::verify_signature(payload, signature, &self.config.mtn_api.webhook_secret)
    }

    async fn health_check(&self) -> ProviderHealth {
        match self.access_token(MomoProduct::Collection).await {
            Ok(_) => ProviderHealth::healthy(),
            Err(err) => ProviderHealth::unhealthy(json!({ "error": err.to_string() })),
        }
    }
}
