use super::PaymentStatus;

/// 貸出のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BorrowBookError {
    /// 在庫切れ
    OutOfStock,
    /// 返却予定日が貸出日より前
    InvalidReturnDate,
    /// 貸出期間がMAX_RENTAL_DAYSを超える
    RentalPeriodTooLong,
}

/// 返却のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnBookError {
    /// 既に返却済み
    AlreadyReturned,
}

/// 支払いステータス遷移のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentTransitionError {
    /// Pending以外からの支払い完了・期限切れ
    NotPending(PaymentStatus),
    /// Expired以外の更新
    NotExpired(PaymentStatus),
}
