use crate::application::borrowing::{
    BorrowingApplicationError, PaymentCompletion, ServiceDependencies,
    complete_payment as execute_complete_payment, create_borrowing as execute_create_borrowing,
    get_borrowing as execute_get_borrowing, get_payment as execute_get_payment,
    list_borrowings as execute_list_borrowings, list_payments as execute_list_payments,
    renew_payment as execute_renew_payment, return_borrowing as execute_return_borrowing,
};
use crate::domain::PaymentStatus;
use crate::domain::commands::{CompletePayment, RenewPayment, ReturnBook};
use crate::domain::value_objects::{BorrowingId, PaymentId, UserId};
use crate::ports::BorrowingFilter;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    error::ApiError,
    types::{
        BorrowingCreatedResponse, BorrowingResponse, BorrowingReturnedResponse,
        CreateBorrowingRequest, ListBorrowingsQuery, ListPaymentsQuery, PaymentResponse,
        PaymentStatusResponse, PaymentSuccessQuery,
    },
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
}

fn today() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}

// ============================================================================
// Command handlers (POST)
// ============================================================================

/// POST /borrowings - 新しい貸出を作成
///
/// 強制されるビジネスルール:
/// - 書籍に在庫があること
/// - 同じ書名・装丁の本を貸出中でないこと
/// - 未完了の支払いがないこと
///
/// 成功すると貸出料金の決済セッションを返す。
pub async fn create_borrowing(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBorrowingRequest>,
) -> Result<(StatusCode, Json<BorrowingCreatedResponse>), ApiError> {
    let cmd = req.to_command(today());

    let receipt = execute_create_borrowing(&state.service_deps, cmd).await?;

    Ok((
        StatusCode::CREATED,
        Json(BorrowingCreatedResponse::from(receipt)),
    ))
}

/// POST /borrowings/:id/return - 書籍を返却
///
/// 延滞している場合は延滞料金の決済セッションを返す。
pub async fn return_borrowing(
    State(state): State<Arc<AppState>>,
    Path(borrowing_id): Path<Uuid>,
) -> Result<(StatusCode, Json<BorrowingReturnedResponse>), ApiError> {
    let cmd = ReturnBook {
        borrowing_id: BorrowingId::from_uuid(borrowing_id),
        returned_on: today(),
    };

    let receipt = execute_return_borrowing(&state.service_deps, cmd).await?;

    Ok((StatusCode::OK, Json(BorrowingReturnedResponse::from(receipt))))
}

/// POST /payments/:id/renew - 期限切れの支払いを更新
pub async fn renew_payment(
    State(state): State<Arc<AppState>>,
    Path(payment_id): Path<Uuid>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    let cmd = RenewPayment {
        payment_id: PaymentId::from_uuid(payment_id),
    };

    let payment = execute_renew_payment(&state.service_deps, cmd).await?;

    Ok((StatusCode::CREATED, Json(PaymentResponse::from(payment))))
}

// ============================================================================
// Query handlers (GET)
// ============================================================================

/// GET /borrowings - オプションフィルタ付き貸出一覧取得
///
/// クエリパラメータ:
/// - user_id: 利用者IDでフィルタリング（オプション）
/// - is_active: true なら貸出中、false なら返却済み（オプション）
pub async fn list_borrowings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListBorrowingsQuery>,
) -> Result<Json<Vec<BorrowingResponse>>, ApiError> {
    let filter = BorrowingFilter {
        user_id: query.user_id.map(UserId::from_uuid),
        is_active: query.is_active,
    };

    let borrowings = execute_list_borrowings(&state.service_deps, filter).await?;

    Ok(Json(
        borrowings.into_iter().map(BorrowingResponse::from).collect(),
    ))
}

/// GET /borrowings/:id - 貸出詳細をIDで取得
pub async fn get_borrowing(
    State(state): State<Arc<AppState>>,
    Path(borrowing_id): Path<Uuid>,
) -> Result<Json<BorrowingResponse>, ApiError> {
    let details =
        execute_get_borrowing(&state.service_deps, BorrowingId::from_uuid(borrowing_id)).await?;

    Ok(Json(BorrowingResponse::from(details)))
}

/// GET /payments?user_id= - 利用者の支払い一覧
pub async fn list_payments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<Vec<PaymentResponse>>, ApiError> {
    let payments =
        execute_list_payments(&state.service_deps, UserId::from_uuid(query.user_id)).await?;

    Ok(Json(payments.into_iter().map(PaymentResponse::from).collect()))
}

/// GET /payments/:id - 支払い詳細をIDで取得
pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment =
        execute_get_payment(&state.service_deps, PaymentId::from_uuid(payment_id)).await?;

    Ok(Json(PaymentResponse::from(payment)))
}

// ============================================================================
// Payment provider redirects
// ============================================================================

/// GET /payments/success?session_id= - 決済完了リダイレクト
///
/// 決済サービスに状態を確認してから支払いをPaidにする。
pub async fn payment_success(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaymentSuccessQuery>,
) -> Result<Json<PaymentStatusResponse>, ApiError> {
    let cmd = CompletePayment {
        session_id: query.session_id,
    };

    let status = match execute_complete_payment(&state.service_deps, cmd).await? {
        PaymentCompletion::Paid(_) => "Payment successful.",
        PaymentCompletion::AlreadySettled(payment) if payment.status == PaymentStatus::Paid => {
            "Payment successful."
        }
        PaymentCompletion::AlreadySettled(_) => {
            "Payment session expired. Please, renew your payment."
        }
        PaymentCompletion::NotPaid(_) => "Payment has not been completed yet.",
        PaymentCompletion::UnknownSession => {
            return Err(BorrowingApplicationError::NotFound("Payment").into());
        }
    };

    Ok(Json(PaymentStatusResponse::new(status)))
}

/// GET /payments/cancel - 決済キャンセルリダイレクト
pub async fn payment_cancel() -> Json<PaymentStatusResponse> {
    Json(PaymentStatusResponse::new(
        "Payment canceled. Please, complete your payment within 24 hours.",
    ))
}
