// routes/ussd.rs
use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers::ussd_handlers;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/initiate", post(ussd_handlers::initiate_session))
        .route("/statistics", get(ussd_handlers::statistics))
        .route("/:session_id/input", post(ussd_handlers::session_input))
        .route("/:session_id", delete(ussd_handlers::cancel_session))
}
