use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, create_borrowing, get_borrowing, get_payment, list_borrowings, list_payments,
    payment_cancel, payment_success, renew_payment, return_borrowing,
};

/// Creates the API router with all borrowing and payment endpoints
///
/// Borrowings:
/// - POST /borrowings - Create a borrowing and its rental payment session
/// - GET /borrowings - List borrowings (user_id, is_active filters)
/// - GET /borrowings/:id - Get borrowing details
/// - POST /borrowings/:id/return - Return a book
///
/// Payments:
/// - GET /payments - List payments of a user
/// - GET /payments/:id - Get payment details
/// - POST /payments/:id/renew - Renew an expired payment
/// - GET /payments/success - Checkout success redirect
/// - GET /payments/cancel - Checkout cancel redirect
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .route("/borrowings", post(create_borrowing).get(list_borrowings))
        .route("/borrowings/:id", get(get_borrowing))
        .route("/borrowings/:id/return", post(return_borrowing))
        // Static segments take priority over /payments/:id
        .route("/payments", get(list_payments))
        .route("/payments/success", get(payment_success))
        .route("/payments/cancel", get(payment_cancel))
        .route("/payments/:id", get(get_payment))
        .route("/payments/:id/renew", post(renew_payment))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
