// routes/webhooks.rs
use axum::{routing::post, Router};

use crate::handlers::webhook_handlers;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/:provider", post(webhook_handlers::provider_webhook))
}
