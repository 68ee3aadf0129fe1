use thiserror::Error;

use crate::domain::{BorrowBookError, ReturnBookError};

/// 貸出管理アプリケーション層のエラー
#[derive(Debug, Error)]
pub enum BorrowingApplicationError {
    /// 在庫切れ
    #[error("Book is out of stock")]
    OutOfStock,

    /// 同じ書名・装丁の本を既に借りている
    #[error("User already has an active borrowing of this book")]
    DuplicateActiveBorrowing,

    /// 未完了の支払いがある
    #[error("User has an uncompleted pending payment")]
    ConflictingPendingPayment,

    /// 既に返却済み
    #[error("Book has already been returned")]
    AlreadyReturned,

    /// 返却予定日が貸出日より前
    #[error("Expected return date must not be earlier than borrow date")]
    InvalidReturnDate,

    /// 貸出期間が長すぎる
    #[error("Rental period must not exceed {} days", crate::domain::fees::MAX_RENTAL_DAYS)]
    RentalPeriodTooLong,

    /// 決済セッションを作成できなかった（再試行可能）
    #[error("Payment session could not be opened")]
    PaymentSessionFailure(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// 決済サービスが請求を拒否した（金額が不正など。再試行しても成功しない）
    #[error("Payment provider rejected the charge")]
    PaymentRejected(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// 対象（書籍・貸出・支払い）が存在しない
    #[error("{0} not found")]
    NotFound(&'static str),

    /// 期限切れではない支払いは更新できない
    #[error("Only expired payments can be renewed")]
    PaymentNotRenewable,

    /// BorrowingStoreのエラー
    #[error("Borrowing store error")]
    StoreError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// PaymentGatewayのエラー（セッション状態の問い合わせ）
    #[error("Payment gateway error")]
    GatewayError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<BorrowBookError> for BorrowingApplicationError {
    fn from(err: BorrowBookError) -> Self {
        match err {
            BorrowBookError::OutOfStock => BorrowingApplicationError::OutOfStock,
            BorrowBookError::InvalidReturnDate => BorrowingApplicationError::InvalidReturnDate,
            BorrowBookError::RentalPeriodTooLong => BorrowingApplicationError::RentalPeriodTooLong,
        }
    }
}

impl From<ReturnBookError> for BorrowingApplicationError {
    fn from(err: ReturnBookError) -> Self {
        match err {
            ReturnBookError::AlreadyReturned => BorrowingApplicationError::AlreadyReturned,
        }
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, BorrowingApplicationError>;
