use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BookId, BorrowingId, UserId};

/// イベント：書籍が貸し出された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookBorrowed {
    pub borrowing_id: BorrowingId,
    pub book_id: BookId,
    pub user_id: UserId,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    /// 予定期間分の貸出料金
    pub rental_amount: Decimal,
}

/// イベント：書籍が返却された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookReturned {
    pub borrowing_id: BorrowingId,
    pub book_id: BookId,
    pub user_id: UserId,
    pub borrow_date: NaiveDate,
    pub actual_return_date: NaiveDate,
    pub was_overdue: bool,
    /// 延滞料金（期限内なら0.00）
    pub fine: Decimal,
}
