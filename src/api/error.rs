use crate::application::borrowing::BorrowingApplicationError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーをラップし、HTTPレスポンスへのマッピングを提供する。
#[derive(Debug)]
pub struct ApiError(BorrowingApplicationError);

impl From<BorrowingApplicationError> for ApiError {
    fn from(err: BorrowingApplicationError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self.0 {
            // 404 Not Found - リクエストされたリソースが存在しない
            BorrowingApplicationError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{} not found", resource),
            ),

            // 422 Unprocessable Entity - ビジネスルール違反
            ref err @ BorrowingApplicationError::OutOfStock => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "OUT_OF_STOCK",
                err.to_string(),
            ),
            ref err @ BorrowingApplicationError::DuplicateActiveBorrowing => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "DUPLICATE_ACTIVE_BORROWING",
                err.to_string(),
            ),
            ref err @ BorrowingApplicationError::ConflictingPendingPayment => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "CONFLICTING_PENDING_PAYMENT",
                err.to_string(),
            ),
            ref err @ BorrowingApplicationError::AlreadyReturned => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "ALREADY_RETURNED",
                err.to_string(),
            ),
            ref err @ BorrowingApplicationError::InvalidReturnDate => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_RETURN_DATE",
                err.to_string(),
            ),
            ref err @ BorrowingApplicationError::RentalPeriodTooLong => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "RENTAL_PERIOD_TOO_LONG",
                err.to_string(),
            ),
            BorrowingApplicationError::PaymentRejected(ref e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "PAYMENT_REJECTED",
                e.to_string(),
            ),
            ref err @ BorrowingApplicationError::PaymentNotRenewable => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "PAYMENT_NOT_RENEWABLE",
                err.to_string(),
            ),

            // 503 Service Unavailable - 決済サービス障害（再試行可能）
            BorrowingApplicationError::PaymentSessionFailure(ref e) => {
                tracing::error!("Payment session failure: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "PAYMENT_SESSION_FAILURE",
                    "Payment provider is unavailable, please retry later".to_string(),
                )
            }

            // 500 Internal Server Error - システム障害
            // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
            BorrowingApplicationError::StoreError(ref e) => {
                tracing::error!("Borrowing store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "Failed to access borrowing store".to_string(),
                )
            }
            BorrowingApplicationError::GatewayError(ref e) => {
                tracing::error!("Payment gateway error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "GATEWAY_ERROR",
                    "Payment gateway error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse::new(error_type, message));
        (status, body).into_response()
    }
}
