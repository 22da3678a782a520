// providers/orange.rs
//
// Orange Money Web Payment client. Payments redirect the customer to a
// hosted payment page; the pay token is what status polls key on.

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
use crate::utils::retry::{retry_operation, RetryPolicy};

use super::ProviderClient;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct WebPaymentResponse {
    #[serde(rename = "payment_url")]
    payment_url: String,
    #[serde(rename = "pay_token")]
    pay_token: String,
}

#[derive(Deserialize)]
struct PaymentStatusResponse {
    status: String,
}

pub struct OrangeClient {
    config: Arc<AppConfig>,
    http: reqwest::Client,
    token: RwLock<Option<(String, DateTime<Utc>)>>,
}

impl OrangeClient {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(
                config.orange_api.timeout_secs,
            ))
            .build()
            .expect("failed to build HTTP client");

        OrangeClient {
            config,
            http,
            token: RwLock::new(None),
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.config.orange_api.retry_attempts,
            self.config.orange_api.retry_delay_ms,
        )
    }

    async fn access_token(&self) -> Result<String, PaymentError> {
        if let Some((token, expires_at)) = self.token.read().unwrap().clone() {
            if Utc::now() < expires_at {
                return Ok(token);
            }
        }

        let credentials = general_purpose::STANDARD.encode(format!(
            "{}:{}",
            self.config.orange_api.client_id, self.config.orange_api.client_secret
        ));

        let response = self
            .http
            .post("https://api.orange.com/oauth/v3/token")
            .header("Authorization", format!("Basic {credentials}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.provider_error(response).await);
        }

        let token: TokenResponse = response.json().await?;
        let expires_at = Utc::now() + Duration::seconds((token.expires_in - 60).max(0));
        *self.token.write().unwrap() = Some((token.access_token.clone(), expires_at));

        Ok(token.access_token)
    }

    async fn provider_error(&self, response: reqwest::Response) -> PaymentError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        PaymentError::Provider {
            provider: PaymentProvider::OrangeMoney,
            code: status.as_u16().to_string(),
            message: if body.is_empty() {
                status.to_string()
            } else {
                body
            },
            retryable: status.is_server_error(),
        }
    }

    fn map_orange_status(status: &str) -> TransactionStatus {
        match status {
            "INITIATED" => TransactionStatus::Pending,
            "PENDING" => TransactionStatus::Processing,
            "SUCCESS" => TransactionStatus::Completed,
            "FAILED" => TransactionStatus::Failed,
            "CANCELLED" => TransactionStatus::Cancelled,
            "EXPIRED" => TransactionStatus::Expired,
            _ => TransactionStatus::Pending,
        }
    }

    async fn create_web_payment(
        &self,
        request: &PaymentRequest,
        reference: &str,
    ) -> Result<WebPaymentResponse, PaymentError> {
        let token = self.access_token().await?;

        let body = json!({
            "merchant_key": self.config.orange_api.merchant_key,
            "currency": request.currency,
            "order_id": request.order_id,
            "amount": request.amount,
            "return_url": self.config.orange_api.return_url,
            "cancel_url": self.config.orange_api.cancel_url,
            "notif_url": self.config.orange_api.notif_url,
            "lang": "fr",
            "reference": reference,
        });

        let response = self
            .http
            .post(format!("{}/webpayment", self.config.orange_api.base_url))
            .header("Authorization", format!("Bearer {token}"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.provider_error(response).await);
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ProviderClient for OrangeClient {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::OrangeMoney
    }

    async fn authenticate(&self) -> Result<(), PaymentError> {
        self.access_token().await?;
        Ok(())
    }

    async fn pay(&self, request: &PaymentRequest) -> Result<ProviderPayment, PaymentError> {
        let reference = Uuid::new_v4().to_string();

        let payment = retry_operation(self.retry_policy(), "orange_web_payment", || {
            self.create_web_payment(request, &reference)
        })
        .await?;

        tracing::info!(
            order_id = %request.order_id,
            pay_token = %payment.pay_token,
            "Orange web payment created"
        );

        Ok(ProviderPayment {
            transaction_id: payment.pay_token.clone(),
            external_transaction_id: Some(payment.pay_token),
            status: TransactionStatus::Pending,
            ussd_code: self
                .config
                .ussd_code(PaymentProvider::OrangeMoney)
                .map(str::to_string),
            payment_url: Some(payment.payment_url),
            reference: Some(reference),
            message: format!(
                "Dial {} or follow the payment link to confirm",
                self.config.ussd.orange_code
            ),
            expires_at: Some(Utc::now() + Duration::minutes(10)),
        })
    }

    async fn get_status(&self, external_ref: &str) -> Result<TransactionStatus, PaymentError> {
        let token = self.access_token().await?;

        let response = self
            .http
            .post(format!(
                "{}/transactionstatus",
                self.config.orange_api.base_url
            ))
            .header("Authorization", format!("Bearer {token}"))
            .json(&json!({ "pay_token": external_ref }))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(TransactionStatus::Failed);
        }
        if !response.status().is_success() {
            return Err(self.provider_error(response).await);
        }

        let status: PaymentStatusResponse = response.json().await?;
        Ok(Self::map_orange_status(&status.status))
    }

    async fn refund(
        &self,
        request: &RefundRequest,
        original: &Transaction,
    ) -> Result<ProviderRefund, PaymentError> {
        let token = self.access_token().await?;
        let amount = request.amount.unwrap_or(original.amount);
        let refund_id = Uuid::new_v4().to_string();

        let body = json!({
            "merchant_key": self.config.orange_api.merchant_key,
            "pay_token": original.external_transaction_id,
            "amount": amount,
            "reference": refund_id,
            "reason": request.reason,
        });

        let response = self
            .http
            .post(format!("{}/refund", self.config.orange_api.base_url))
            .header("Authorization", format!("Bearer {token}"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.provider_error(response).await);
        }

        tracing::info!(
            transaction_id = %original.id,
            refund_id = %refund_id,
            amount,
            "Orange refund accepted"
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
        crypto::verify_signature(payload, signature, &self.config.orange_api.webhook_secret)
    }

    async fn health_check(&self) -> ProviderHealth {
        match self.access_token().await {
            Ok(_) => ProviderHealth::healthy(),
            Err(err) => ProviderHealth::unhealthy(json!({ "error": err.to_string() })),
        }
    }
}
