// src/errors.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{FraudDetectionResult, PaymentProvider, TransactionStatus};

#[derive(Error, Debug)]
pub enum PaymentError {
    /// Bad or missing input. Never retried, surfaced verbatim to the caller.
    #[error("{message}")]
    Validation { field: String, message: String },

    /// A provider rejected or failed the call. `retryable` follows the
    /// wrapped HTTP status: server-side failures may be retried, definitive
    /// rejections may not.
    #[error("{provider} error [{code}]: {message}")]
    Provider {
        provider: PaymentProvider,
        code: String,
        message: String,
        retryable: bool,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    /// The fraud engine blocked the request. Carries the full result so the
    /// caller can surface it without re-deriving anything.
    #[error("transaction blocked due to high fraud risk")]
    Fraud { result: FraudDetectionResult },

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("transaction {0} not found")]
    TransactionNotFound(Uuid),

    #[error("transaction cannot be refunded in current status ({0})")]
    RefundNotAllowed(TransactionStatus),

    #[error("{0}")]
    Internal(String),
}

impl PaymentError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        PaymentError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Transient failures eligible for backoff retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Network(_) | PaymentError::Timeout(_) => true,
            PaymentError::Provider { retryable, .. } => *retryable,
            _ => false,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            PaymentError::Validation { .. } => "VALIDATION_ERROR",
            PaymentError::Provider { .. } => "PROVIDER_ERROR",
            PaymentError::Network(_) => "NETWORK_ERROR",
            PaymentError::Timeout(_) => "TIMEOUT_ERROR",
            PaymentError::Fraud { .. } => "FRAUD_DETECTED",
            PaymentError::InvalidTransition { .. } => "INVALID_TRANSITION",
            PaymentError::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            PaymentError::RefundNotAllowed(_) => "INVALID_STATUS_FOR_REFUND",
            PaymentError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::Validation { .. } => StatusCode::BAD_REQUEST,
            PaymentError::Provider { .. } => StatusCode::BAD_GATEWAY,
            PaymentError::Network(_) => StatusCode::SERVICE_UNAVAILABLE,
            PaymentError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            PaymentError::Fraud { .. } => StatusCode::FORBIDDEN,
            PaymentError::InvalidTransition { .. } => StatusCode::CONFLICT,
            PaymentError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
            PaymentError::RefundNotAllowed(_) => StatusCode::CONFLICT,
            PaymentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PaymentError::Timeout(err.to_string())
        } else {
            PaymentError::Network(err.to_string())
        }
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let details = match &self {
            PaymentError::Validation { field, .. } => Some(json!({ "field": field })),
            PaymentError::Provider { provider, code, .. } => {
                Some(json!({ "provider": provider, "provider_code": code }))
            }
            PaymentError::Fraud { result } => Some(json!(result)),
            PaymentError::InvalidTransition { from, to } => {
                Some(json!({ "current_status": from, "requested_status": to }))
            }
            PaymentError::RefundNotAllowed(status) => Some(json!({ "current_status": status })),
            _ => None,
        };

        let body = json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.to_string(),
                "details": details,
            }
        });

        (self.status_code(), Json(body)).into_response()
    }
}
