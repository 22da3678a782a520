// routes/payments.rs
use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::payment_handlers;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(payment_handlers::process_payment))
        .route("/methods", get(payment_handlers::available_methods))
        .route("/:id", get(payment_handlers::get_payment))
        .route("/:id/status", get(payment_handlers::payment_status))
        .route("/:id/refund", post(payment_handlers::refund_payment))
}
