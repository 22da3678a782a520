// handlers/webhook_handlers.rs
//
// Provider callback intake. The raw body is verified against the
// per-provider shared secret before any deserialization drives state.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::errors::PaymentError;
use crate::models::{PaymentProvider, TransactionStatus, TransactionUpdate, WebhookPayload};
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "x-webhook-signature";

pub async fn provider_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, PaymentError> {
    let provider: PaymentProvider = provider
        .parse()
        .map_err(|message: String| PaymentError::validation("provider", message))?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let valid = crate::utils::crypto::verify_signature(
        &body,
        signature,
        state.config.webhook_secret(provider),
    );
    if !valid {
        tracing::warn!(provider = %provider, "webhook rejected: bad signature");
        return Ok((
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "success": false,
                "error": { "code": "INVALID_SIGNATURE", "message": "webhook signature mismatch" }
            })),
        ));
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| PaymentError::validation("body", format!("invalid webhook payload: {e}")))?;

    if payload.provider != provider {
        return Err(PaymentError::validation(
            "provider",
            "payload provider does not match webhook path",
        ));
    }

    tracing::info!(
        provider = %provider,
        transaction_id = %payload.transaction_id,
        event = %payload.event,
        status = %payload.status,
        "webhook received"
    );

    let id = payload.transaction_id;
    let transaction = match payload.status {
        TransactionStatus::Completed => {
            state
                .transactions
                .confirm_transaction(id, payload.external_transaction_id.clone())
                .await?;
            state.transactions.complete_transaction(id).await?
        }
        TransactionStatus::Confirmed => {
            state
                .transactions
                .confirm_transaction(id, payload.external_transaction_id.clone())
                .await?
        }
        TransactionStatus::Failed => {
            let reason = payload
                .reason
                .clone()
                .unwrap_or_else(|| "provider reported failure".to_string());
            state.transactions.mark_as_failed(id, reason, false).await?
        }
        TransactionStatus::Cancelled => {
            let reason = payload
                .reason
                .clone()
                .unwrap_or_else(|| "cancelled at provider".to_string());
            state.transactions.cancel_transaction(id, reason).await?
        }
        TransactionStatus::Expired => state.transactions.expire_transaction(id).await?,
        other => {
            state
                .transactions
                .update_transaction_status(id, TransactionUpdate::status(other))
                .await?
        }
    };

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": { "transaction_id": transaction.id, "status": transaction.status },
        })),
    ))
}
