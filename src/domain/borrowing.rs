use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{
    Book, BookBorrowed, BookId, BookReturned, BorrowBookError, BorrowingId, ReturnBookError,
    UserId, fees,
};

// ============================================================================
// 型安全な状態パターン
// ============================================================================

/// Borrowing集約の共通フィールド
///
/// 貸出中・返却済みのどちらの状態でも共有されるコアデータ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowingCore {
    pub borrowing_id: BorrowingId,

    // 他の集約への参照（IDのみ）
    pub book_id: BookId,
    pub user_id: UserId,

    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
}

/// 貸出中状態
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveBorrowing {
    #[serde(flatten)]
    pub core: BorrowingCore,
}

impl std::ops::Deref for ActiveBorrowing {
    type Target = BorrowingCore;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// 返却済み状態
///
/// ビジネスルール：
/// - actual_return_dateが必須（型で保証）
/// - 終端状態。以後の遷移はない
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnedBorrowing {
    #[serde(flatten)]
    pub core: BorrowingCore,
    pub actual_return_date: NaiveDate,
}

impl std::ops::Deref for ReturnedBorrowing {
    type Target = BorrowingCore;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// Borrowing集約の統合型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Borrowing {
    Active(ActiveBorrowing),
    Returned(ReturnedBorrowing),
}

impl Borrowing {
    /// 永続化された行から集約を復元する
    pub fn from_parts(core: BorrowingCore, actual_return_date: Option<NaiveDate>) -> Self {
        match actual_return_date {
            None => Borrowing::Active(ActiveBorrowing { core }),
            Some(actual_return_date) => Borrowing::Returned(ReturnedBorrowing {
                core,
                actual_return_date,
            }),
        }
    }

    pub fn core(&self) -> &BorrowingCore {
        match self {
            Borrowing::Active(active) => &active.core,
            Borrowing::Returned(returned) => &returned.core,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Borrowing::Active(_))
    }

    pub fn actual_return_date(&self) -> Option<NaiveDate> {
        match self {
            Borrowing::Active(_) => None,
            Borrowing::Returned(returned) => Some(returned.actual_return_date),
        }
    }
}

// ============================================================================
// 純粋関数
// ============================================================================

/// 純粋関数：書籍を貸し出す
///
/// ビジネスルール：
/// - 返却予定日は貸出日以降
/// - 貸出期間はMAX_RENTAL_DAYS日以内
/// - 在庫が1冊以上あること
/// - 在庫を1冊減らす
///
/// 副作用なし。新しいActiveBorrowing、在庫を減らしたBook、イベントを返す。
/// 同一利用者の重複貸出や未払いの確認は永続化層の状態が必要なため、
/// アプリケーション層で同一トランザクション内に行う。
pub fn borrow_book(
    book: &Book,
    user_id: UserId,
    borrow_date: NaiveDate,
    expected_return_date: NaiveDate,
) -> Result<(ActiveBorrowing, Book, BookBorrowed), BorrowBookError> {
    if expected_return_date < borrow_date {
        return Err(BorrowBookError::InvalidReturnDate);
    }
    if fees::rental_days(borrow_date, expected_return_date) > fees::MAX_RENTAL_DAYS {
        return Err(BorrowBookError::RentalPeriodTooLong);
    }

    let updated_book = book.take_copy().ok_or(BorrowBookError::OutOfStock)?;

    let borrowing = ActiveBorrowing {
        core: BorrowingCore {
            borrowing_id: BorrowingId::new(),
            book_id: book.book_id,
            user_id,
            borrow_date,
            expected_return_date,
        },
    };

    let rental_amount = fees::rental_amount(
        fees::rental_days(borrow_date, expected_return_date),
        book.daily_fee,
    );

    let event = BookBorrowed {
        borrowing_id: borrowing.borrowing_id,
        book_id: book.book_id,
        user_id,
        borrow_date,
        expected_return_date,
        rental_amount,
    };

    Ok((borrowing, updated_book, event))
}

/// 純粋関数：書籍を返却する
///
/// ビジネスルール：
/// - 既に返却済みなら不可
/// - 在庫を1冊戻す
/// - 返却予定日を過ぎていれば延滞料金を計算する
///
/// 副作用なし。ReturnedBorrowing、在庫を戻したBook、イベントを返す。
pub fn return_book(
    borrowing: Borrowing,
    book: &Book,
    actual_return_date: NaiveDate,
) -> Result<(ReturnedBorrowing, Book, BookReturned), ReturnBookError> {
    let active = match borrowing {
        Borrowing::Active(active) => active,
        Borrowing::Returned(_) => return Err(ReturnBookError::AlreadyReturned),
    };

    let was_overdue = actual_return_date > active.expected_return_date;
    let fine = fees::fine(
        active.expected_return_date,
        actual_return_date,
        book.daily_fee,
    );

    let event = BookReturned {
        borrowing_id: active.borrowing_id,
        book_id: active.book_id,
        user_id: active.user_id,
        borrow_date: active.borrow_date,
        actual_return_date,
        was_overdue,
        fine,
    };

    let returned = ReturnedBorrowing {
        core: active.core,
        actual_return_date,
    };

    Ok((returned, book.put_back_copy(), event))
}

/// 純粋関数：延滞判定
pub fn is_overdue(borrowing: &Borrowing, today: NaiveDate) -> bool {
    match borrowing {
        Borrowing::Active(active) => active.expected_return_date < today,
        Borrowing::Returned(_) => false,
    }
}
