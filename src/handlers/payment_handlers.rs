// handlers/payment_handlers.rs
//
// HTTP surface for payments: create, fetch, poll status, refund, and the
// method-selection list.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::errors::PaymentError;
use crate::models::{
    ClientContext, PaymentRequest, RefundRequest, TransactionStatus, TransactionUpdate,
};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ProcessPaymentBody {
    #[serde(flatten)]
    pub request: PaymentRequest,
    #[serde(flatten)]
    pub client: ClientContext,
    /// Sum of the customer's settled amounts today, supplied by the caller
    /// that owns the order history. Used for the daily CEMAC ceiling.
    #[serde(default)]
    pub daily_total: Option<i64>,
}

pub async fn process_payment(
    State(state): State<AppState>,
    Json(body): Json<ProcessPaymentBody>,
) -> Result<impl IntoResponse, PaymentError> {
    let fraud_result = state
        .fraud
        .analyze_payment_risk(&body.request, &body.client)
        .await?;

    state
        .gateway
        .validate_payment_request(&body.request, body.daily_total)?;

    let transaction = state.transactions.create_transaction(&body.request).await?;

    // audit annotation only, never gates the flow
    state
        .transactions
        .update_transaction_status(
            transaction.id,
            TransactionUpdate {
                fraud_score: Some(fraud_result.score),
                risk_level: Some(fraud_result.risk_level),
                ..Default::default()
            },
        )
        .await?;

    let payment = match state
        .gateway
        .process_payment(&body.request, body.daily_total)
        .await
    {
        Ok(payment) => payment,
        Err(err) => {
            state
                .transactions
                .mark_as_failed(transaction.id, err.to_string(), err.is_retryable())
                .await?;
            return Err(err);
        }
    };

    let transaction = state
        .transactions
        .update_transaction_status(
            transaction.id,
            TransactionUpdate {
                external_transaction_id: payment.external_transaction_id.clone(),
                ..Default::default()
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": {
                "transaction": transaction,
                "payment": payment,
                "fraud": fraud_result,
            }
        })),
    ))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, PaymentError> {
    let transaction = state.transactions.get_transaction(id).await?;
    Ok(Json(json!({
        "success": true,
        "data": transaction,
    })))
}

/// Poll the provider for the latest status and fold it into the stored
/// transaction.
pub async fn payment_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, PaymentError> {
    let transaction = state.transactions.get_transaction(id).await?;

    let Some(external_ref) = transaction.external_transaction_id.clone() else {
        return Ok(Json(json!({
            "success": true,
            "data": { "status": transaction.status, "transaction": transaction },
        })));
    };

    if transaction.status.is_terminal()
        || matches!(
            transaction.status,
            TransactionStatus::Completed
                | TransactionStatus::Refunded
                | TransactionStatus::PartiallyRefunded
        )
    {
        return Ok(Json(json!({
            "success": true,
            "data": { "status": transaction.status, "transaction": transaction },
        })));
    }

    let provider_status = state
        .gateway
        .get_status(transaction.provider, &external_ref)
        .await?;

    let transaction = match provider_status {
        TransactionStatus::Completed => {
            state.transactions.confirm_transaction(id, None).await?;
            state.transactions.complete_transaction(id).await?
        }
        TransactionStatus::Failed => {
            state
                .transactions
                .mark_as_failed(id, "provider reported failure", false)
                .await?
        }
        TransactionStatus::Expired => state.transactions.expire_transaction(id).await?,
        TransactionStatus::Cancelled => {
            state
                .transactions
                .cancel_transaction(id, "cancelled at provider")
                .await?
        }
        TransactionStatus::Processing if transaction.status == TransactionStatus::Pending => {
            state
                .transactions
                .update_transaction_status(
                    id,
                    TransactionUpdate::status(TransactionStatus::Processing),
                )
                .await?
        }
        _ => transaction,
    };

    Ok(Json(json!({
        "success": true,
        "data": { "status": transaction.status, "transaction": transaction },
    })))
}

pub async fn refund_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(mut request): Json<RefundRequest>,
) -> Result<impl IntoResponse, PaymentError> {
    request.transaction_id = id;
    let original = state.transactions.get_transaction(id).await?;

    // amount and status must pass before the provider moves any money
    crate::services::TransactionManager::validate_refund(&original, request.amount)?;

    let refund = state.gateway.process_refund(&request, &original).await?;
    let transaction = state
        .transactions
        .process_refund(id, request.amount, &request.reason)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "refund": refund,
            "transaction": transaction,
        }
    })))
}

#[derive(Deserialize)]
pub struct MethodsQuery {
    pub phone_number: Option<String>,
    pub amount: Option<i64>,
}

pub async fn available_methods(
    State(state): State<AppState>,
    Query(query): Query<MethodsQuery>,
) -> Result<impl IntoResponse, PaymentError> {
    let methods = state
        .gateway
        .available_payment_methods(query.phone_number.as_deref(), query.amount);

    Ok(Json(json!({
        "success": true,
        "data": methods,
    })))
}
