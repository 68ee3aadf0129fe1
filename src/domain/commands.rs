use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{BookId, BorrowingId, PaymentId, UserId};

/// コマンド：書籍を借りる
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowBook {
    pub book_id: BookId,
    pub user_id: UserId,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
}

/// コマンド：書籍を返却する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnBook {
    pub borrowing_id: BorrowingId,
    pub returned_on: NaiveDate,
}

/// コマンド：決済完了を反映する（決済サービスからのリダイレクト）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletePayment {
    pub session_id: String,
}

/// コマンド：期限切れの支払いを更新する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewPayment {
    pub payment_id: PaymentId,
}
