//! HTTP surface.
//!
//! Endpoints:
//! - `POST /api/payments/status`: update by orderId, registrationNumber or email
//! - `POST /api/payments/complete`: immediate write after client confirmation
//! - `POST /api/webhooks/paypal`: provider webhook
//! - `POST /api/admin/reconcile`: run one sweep
//! - `GET /api/registrations/:registrationNumber/payment`: consistency view
//! - `GET /health`

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::services::ReconciliationService;

mod error;
mod handlers;

pub use error::{ApiError, ErrorBody};
pub use handlers::{MessageBody, PaymentConfirmation};

/// Start the HTTP server on `addr`.
pub async fn serve(
    service: Arc<ReconciliationService>,
    addr: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(service);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %listener.local_addr()?, "paysync HTTP API listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the axum router (separated for testing).
pub fn router(service: Arc<ReconciliationService>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/payments/status", post(handlers::update_status))
        .route("/api/payments/complete", post(handlers::complete_payment))
        .route("/api/webhooks/paypal", post(handlers::paypal_webhook))
        .route("/api/admin/reconcile", post(handlers::reconcile))
        .route(
            "/api/registrations/:registration_number/payment",
            get(handlers::registration_payment),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
