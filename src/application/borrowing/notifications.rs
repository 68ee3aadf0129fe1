//! 職員向け通知メッセージ
//!
//! 文面の組み立てと、失敗しても業務処理を止めない送信ヘルパー。

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::{Book, BorrowingCore, Payment, PaymentType, fees};
use crate::ports::NotificationSink;

/// 通知を送信する（ベストエフォート）
///
/// 送信失敗はwarnログに残すだけで呼び出し元には返さない。
pub(super) async fn notify(sink: &dyn NotificationSink, message: &str) {
    if let Err(e) = sink.send(message).await {
        tracing::warn!(error = %e, "Failed to deliver notification");
    }
}

pub(super) fn borrowing_created(borrowing: &BorrowingCore, book: &Book) -> String {
    format!(
        "New borrowing has been created\n\
         Borrow id: {}\n\
         Author: {}\n\
         Book: {} (cover: {})\n\
         User: {}\n\
         Return date: {}\n\
         Daily fee {}$",
        borrowing.borrowing_id.value(),
        book.author,
        book.title,
        book.cover.as_str(),
        borrowing.user_id.value(),
        borrowing.expected_return_date,
        book.daily_fee,
    )
}

pub(super) fn returned_on_time(
    borrowing: &BorrowingCore,
    book: &Book,
    returned_on: NaiveDate,
) -> String {
    format!(
        "{} has returned book {}(cover: {}) from {}\n\
         Borrowing id: {}\n\
         Return date: {}",
        borrowing.user_id.value(),
        book.title,
        book.cover.as_str(),
        borrowing.borrow_date,
        borrowing.borrowing_id.value(),
        returned_on,
    )
}

pub(super) fn fine_due(
    borrowing: &BorrowingCore,
    book: &Book,
    returned_on: NaiveDate,
    fine: Decimal,
) -> String {
    format!(
        "{} has returned book {}(cover: {}) from {}\n\
         Borrowing id: {}\n\
         Return date: {}\n\
         {} has to pay {}$ fine",
        borrowing.user_id.value(),
        book.title,
        book.cover.as_str(),
        borrowing.borrow_date,
        borrowing.borrowing_id.value(),
        returned_on,
        borrowing.user_id.value(),
        fine,
    )
}

pub(super) fn overdue(borrowing: &BorrowingCore, book: &Book, today: NaiveDate) -> String {
    format!(
        "Overdue borrowing!\n\
         Borrow id: {}\n\
         User: {}\n\
         Book: {}, Author: {}, cover({})\n\
         User was supposed to return this book on {}\n\
         Fine so far: {}$",
        borrowing.borrowing_id.value(),
        borrowing.user_id.value(),
        book.title,
        book.author,
        book.cover.as_str(),
        borrowing.expected_return_date,
        fees::fine(borrowing.expected_return_date, today, book.daily_fee),
    )
}

pub(super) const NONE_OVERDUE: &str = "No borrowings overdue today!";

pub(super) fn sessions_expired(count: usize) -> String {
    if count == 0 {
        "No payment sessions expired".to_string()
    } else {
        format!("{} payment session(s) expired", count)
    }
}

/// 支払い完了の通知
///
/// 貸出料金の場合は予定期間から計算した金額を含める。
pub(super) fn payment_completed(
    payment: &Payment,
    borrowing: &BorrowingCore,
    book: &Book,
) -> String {
    match payment.payment_type {
        PaymentType::Payment => {
            let rental = fees::rental_amount(
                fees::rental_days(borrowing.borrow_date, borrowing.expected_return_date),
                book.daily_fee,
            );
            format!(
                "Payment received\n\
                 Borrowing id: {}\n\
                 User: {}\n\
                 Book: {} (cover: {})\n\
                 Rental amount: {}$",
                borrowing.borrowing_id.value(),
                borrowing.user_id.value(),
                book.title,
                book.cover.as_str(),
                rental,
            )
        }
        PaymentType::Fine => format!(
            "Fine paid\n\
             Borrowing id: {}\n\
             User: {}\n\
             Book: {} (cover: {})\n\
             Fine: {}$",
            borrowing.borrowing_id.value(),
            borrowing.user_id.value(),
            book.title,
            book.cover.as_str(),
            payment.money_to_pay,
        ),
    }
}
