pub mod payment_handlers;
pub mod ussd_handlers;
pub mod webhook_handlers;

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "service": state.config.server.service_name,
        "status": "ok",
        "environment": state.config.server.environment,
        "timestamp": chrono::Utc::now(),
    }))
}

/// Deep health: asks every registered provider client plus the USSD table.
pub async fn detailed_health(State(state): State<AppState>) -> impl IntoResponse {
    let providers = state.gateway.provider_health().await;
    let ussd = state.ussd.statistics().await;

    Json(json!({
        "success": true,
        "service": state.config.server.service_name,
        "status": "ok",
        "providers": providers,
        "ussd": ussd,
        "timestamp": chrono::Utc::now(),
    }))
}
