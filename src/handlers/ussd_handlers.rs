// handlers/ussd_handlers.rs
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::errors::PaymentError;
use crate::models::{ClientContext, PaymentRequest};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct InitiateUssdBody {
    #[serde(flatten)]
    pub request: PaymentRequest,
    #[serde(flatten)]
    pub client: ClientContext,
    #[serde(default)]
    pub daily_total: Option<i64>,
}

/// Open a USSD payment session: screen, validate, create the transaction,
/// then hand back dial-in instructions.
pub async fn initiate_session(
    State(state): State<AppState>,
    Json(body): Json<InitiateUssdBody>,
) -> Result<impl IntoResponse, PaymentError> {
    let fraud_result = state
        .fraud
        .analyze_payment_risk(&body.request, &body.client)
        .await?;

    state
        .gateway
        .validate_payment_request(&body.request, body.daily_total)?;

    let transaction = state.transactions.create_transaction(&body.request).await?;
    let initiation = state.ussd.initiate(&transaction).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": {
                "session": initiation,
                "fraud": fraud_result,
            }
        })),
    ))
}

#[derive(Deserialize)]
pub struct UssdInputBody {
    pub input: String,
}

pub async fn session_input(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<UssdInputBody>,
) -> Result<impl IntoResponse, PaymentError> {
    let reply = state.ussd.process_input(&session_id, &body.input).await?;

    Ok(Json(json!({
        "success": true,
        "data": reply,
    })))
}

pub async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, PaymentError> {
    let reply = state.ussd.cancel_session(&session_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": reply,
    })))
}

pub async fn statistics(State(state): State<AppState>) -> Result<impl IntoResponse, PaymentError> {
    let stats = state.ussd.statistics().await;

    Ok(Json(json!({
        "success": true,
        "data": stats,
    })))
}
