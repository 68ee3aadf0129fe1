use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::borrowing::{BorrowingReceipt, ReturnOutcome, ReturnReceipt};
use crate::domain::{Book, Payment, commands::BorrowBook, value_objects::*};
use crate::ports::BorrowingDetails;

// ============================================================================
// Requests
// ============================================================================

/// 貸出作成リクエスト（POST /borrowings）
///
/// 認証は前段で行われ、利用者IDはリクエストに含めて渡される。
#[derive(Debug, Deserialize)]
pub struct CreateBorrowingRequest {
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub expected_return_date: NaiveDate,
}

impl CreateBorrowingRequest {
    /// 貸出日は今日
    pub fn to_command(&self, today: NaiveDate) -> BorrowBook {
        BorrowBook {
            book_id: BookId::from_uuid(self.book_id),
            user_id: UserId::from_uuid(self.user_id),
            borrow_date: today,
            expected_return_date: self.expected_return_date,
        }
    }
}

/// 貸出一覧取得のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct ListBorrowingsQuery {
    /// 利用者IDでフィルタリング
    pub user_id: Option<Uuid>,
    /// true: 貸出中のみ / false: 返却済みのみ
    pub is_active: Option<bool>,
}

/// 支払い一覧取得のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct ListPaymentsQuery {
    pub user_id: Uuid,
}

/// 決済完了リダイレクトのクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct PaymentSuccessQuery {
    pub session_id: String,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct BookResponse {
    pub book_id: Uuid,
    pub title: String,
    pub author: String,
    pub cover: String,
    pub daily_fee: Decimal,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            book_id: book.book_id.value(),
            title: book.title,
            author: book.author,
            cover: book.cover.as_str().to_string(),
            daily_fee: book.daily_fee,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub payment_id: Uuid,
    pub borrowing_id: Uuid,
    pub payment_type: String,
    pub status: String,
    pub session_id: String,
    pub session_url: String,
    pub money_to_pay: Decimal,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            payment_id: payment.payment_id.value(),
            borrowing_id: payment.borrowing_id.value(),
            payment_type: payment.payment_type.as_str().to_string(),
            status: payment.status.as_str().to_string(),
            session_id: payment.session_id,
            session_url: payment.session_url,
            money_to_pay: payment.money_to_pay,
        }
    }
}

/// 貸出レスポンス（GET /borrowings/:id と GET /borrowings）
#[derive(Debug, Serialize, Deserialize)]
pub struct BorrowingResponse {
    pub borrowing_id: Uuid,
    pub user_id: Uuid,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,
    pub is_active: bool,
    pub book: BookResponse,
    pub payments: Vec<PaymentResponse>,
}

impl From<BorrowingDetails> for BorrowingResponse {
    fn from(details: BorrowingDetails) -> Self {
        let core = details.borrowing.core();
        Self {
            borrowing_id: core.borrowing_id.value(),
            user_id: core.user_id.value(),
            borrow_date: core.borrow_date,
            expected_return_date: core.expected_return_date,
            actual_return_date: details.borrowing.actual_return_date(),
            is_active: details.borrowing.is_active(),
            book: BookResponse::from(details.book),
            payments: details
                .payments
                .into_iter()
                .map(PaymentResponse::from)
                .collect(),
        }
    }
}

/// 貸出作成レスポンス
///
/// 利用者はsession_urlで貸出料金を支払う。
#[derive(Debug, Serialize, Deserialize)]
pub struct BorrowingCreatedResponse {
    pub borrowing_id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    pub payment: PaymentResponse,
}

impl From<BorrowingReceipt> for BorrowingCreatedResponse {
    fn from(receipt: BorrowingReceipt) -> Self {
        let borrowing = receipt.borrowing;
        Self {
            borrowing_id: borrowing.borrowing_id.value(),
            book_id: borrowing.book_id.value(),
            user_id: borrowing.user_id.value(),
            borrow_date: borrowing.borrow_date,
            expected_return_date: borrowing.expected_return_date,
            payment: PaymentResponse::from(receipt.payment),
        }
    }
}

/// 返却レスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct BorrowingReturnedResponse {
    pub borrowing_id: Uuid,
    pub actual_return_date: NaiveDate,
    pub detail: String,
    /// 延滞料金（期限内の返却ならなし）
    pub fine: Option<Decimal>,
    pub fine_payment: Option<PaymentResponse>,
}

impl From<ReturnReceipt> for BorrowingReturnedResponse {
    fn from(receipt: ReturnReceipt) -> Self {
        let borrowing_id = receipt.borrowing.borrowing_id.value();
        let actual_return_date = receipt.borrowing.actual_return_date;

        match receipt.outcome {
            ReturnOutcome::OnTime => Self {
                borrowing_id,
                actual_return_date,
                detail: "Book returned in time, no fine required.".to_string(),
                fine: None,
                fine_payment: None,
            },
            ReturnOutcome::FineDue { fine, payment } => Self {
                borrowing_id,
                actual_return_date,
                detail: format!("Please, pay {}$ fine", fine),
                fine: Some(fine),
                fine_payment: Some(PaymentResponse::from(payment)),
            },
        }
    }
}

/// 決済リダイレクト先のレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentStatusResponse {
    pub status: String,
}

impl PaymentStatusResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}

/// エラーレスポンス
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
