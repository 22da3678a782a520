use axum::{http::Method, routing::get, Router};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use payment_service::config::AppConfig;
use payment_service::handlers;
use payment_service::models::UssdEvent;
use payment_service::routes;
use payment_service::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = AppConfig::from_env();
    tracing::info!(
        environment = %config.server.environment,
        bind = %config.bind_address(),
        "starting payment service"
    );

    let app_state = AppState::new(config);

    app_state.ussd.spawn_sweeper();
    spawn_ussd_bridge(app_state.clone());

    let app = build_router(app_state.clone());
    start_server(app, &app_state).await;
}

/// Forward USSD menu outcomes into the transaction lifecycle. A completed
/// PIN entry confirms and settles the transaction; a cancelled session
/// fails it.
fn spawn_ussd_bridge(state: AppState) -> tokio::task::JoinHandle<()> {
    let mut events = state.ussd.subscribe();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(UssdEvent::PaymentCompleted {
                    session_id,
                    transaction_id,
                    ..
                }) => {
                    let confirmed = state
                        .transactions
                        .confirm_transaction(transaction_id, Some(session_id.clone()))
                        .await;
                    let result = match confirmed {
                        Ok(_) => state.transactions.complete_transaction(transaction_id).await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = result {
                        tracing::error!(
                            %transaction_id,
                            session_id = %session_id,
                            error = %e,
                            "failed to settle USSD payment"
                        );
                    }
                }
                Ok(UssdEvent::PaymentFailed {
                    transaction_id,
                    reason,
                    ..
                }) => {
                    if let Err(e) = state
                        .transactions
                        .mark_as_failed(transaction_id, reason, false)
                        .await
                    {
                        tracing::error!(
                            %transaction_id,
                            error = %e,
                            "failed to record USSD cancellation"
                        );
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "USSD event bridge lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .allow_credentials(false);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/health", get(handlers::detailed_health))
        .nest("/api/payments", routes::payments::routes())
        .nest("/api/ussd", routes::ussd::routes())
        .nest("/api/webhooks", routes::webhooks::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

async fn start_server(app: Router, state: &AppState) {
    let addr: SocketAddr = state
        .config
        .bind_address()
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], state.config.server.port)));

    tracing::info!("server listening on {}", addr);

    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("server error: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            tracing::error!("failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    }
}
