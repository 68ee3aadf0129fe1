use crate::domain::{self, commands::*, fees, value_objects::*};
use crate::domain::{ActiveBorrowing, Book, Borrowing, Payment, ReturnedBorrowing};
use crate::ports::*;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::errors::{BorrowingApplicationError, Result};
use super::notifications;

/// サービスの依存関係
///
/// 関数型DDDの原則に従い、データ構造として定義。
/// 振る舞い（メソッド）は持たず、純粋な関数に依存関係を渡す。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub store: Arc<dyn BorrowingStore>,
    pub payment_gateway: Arc<dyn PaymentGateway>,
    pub notification_sink: Arc<dyn NotificationSink>,
    /// 決済に使う通貨（ISO 4217の小文字コード）
    pub currency: String,
}

/// 貸出作成の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowingReceipt {
    pub borrowing: ActiveBorrowing,
    /// 貸出料金の支払い（Pending）
    pub payment: Payment,
}

/// 返却の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnOutcome {
    /// 期限内の返却
    OnTime,
    /// 延滞返却。延滞料金の支払い（Pending）を作成済み
    FineDue { fine: Decimal, payment: Payment },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnReceipt {
    pub borrowing: ReturnedBorrowing,
    pub outcome: ReturnOutcome,
}

/// 決済セッションを開くヘルパー関数
///
/// create_borrowing, return_borrowing, renew_paymentで共通利用される。
/// 決済サービスが請求を拒否した場合はPaymentRejected、
/// それ以外の失敗はPaymentSessionFailureとして返す。
pub(super) async fn open_checkout(
    deps: &ServiceDependencies,
    book: &Book,
    borrowing_id: BorrowingId,
    payment_type: PaymentType,
    amount: Decimal,
) -> Result<CheckoutSession> {
    let description = match payment_type {
        PaymentType::Payment => book.title.clone(),
        PaymentType::Fine => format!("Fine: {}", book.title),
    };

    let mut metadata = BTreeMap::new();
    metadata.insert(
        "borrowing_id".to_string(),
        borrowing_id.value().to_string(),
    );
    metadata.insert(
        "payment_type".to_string(),
        payment_type.as_str().to_string(),
    );

    deps.payment_gateway
        .open_session(CheckoutRequest {
            amount,
            currency: deps.currency.clone(),
            description,
            metadata,
        })
        .await
        .map_err(|e| {
            if e.is::<PaymentRejected>() {
                BorrowingApplicationError::PaymentRejected(e)
            } else {
                BorrowingApplicationError::PaymentSessionFailure(e)
            }
        })
}

/// トランザクションを破棄してからエラーを返すヘルパー関数
pub(super) async fn abort<T>(
    tx: Box<dyn BorrowingTransaction>,
    err: BorrowingApplicationError,
) -> Result<T> {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "Failed to roll back transaction");
    }
    Err(err)
}

/// 書籍を借りる
///
/// ビジネスルール：
/// - 返却予定日は貸出日以降、貸出期間はMAX_RENTAL_DAYS日以内
/// - 書籍が存在し、在庫があること
/// - 同じ書名・装丁の本を貸出中でないこと
/// - 利用者にPendingの支払いがないこと
///
/// 在庫の減算、貸出の保存、決済セッションの作成、支払いの保存を
/// 1トランザクションで行う。決済セッションの作成に失敗した場合は
/// すべてロールバックされる。
///
/// チェックと書き込みを同じトランザクション内で行い、
/// 利用者単位のロックと書籍の行ロックで同時実行を直列化する。
///
/// # 戻り値
/// 作成された貸出とPendingの支払い
pub async fn create_borrowing(
    deps: &ServiceDependencies,
    cmd: BorrowBook,
) -> Result<BorrowingReceipt> {
    if cmd.expected_return_date < cmd.borrow_date {
        return Err(BorrowingApplicationError::InvalidReturnDate);
    }
    if fees::rental_days(cmd.borrow_date, cmd.expected_return_date) > fees::MAX_RENTAL_DAYS {
        return Err(BorrowingApplicationError::RentalPeriodTooLong);
    }

    let mut tx = deps
        .store
        .begin()
        .await
        .map_err(BorrowingApplicationError::StoreError)?;

    // 1. 利用者と書籍をロック
    tx.lock_user(cmd.user_id)
        .await
        .map_err(BorrowingApplicationError::StoreError)?;

    let book = tx
        .lock_book(cmd.book_id)
        .await
        .map_err(BorrowingApplicationError::StoreError)?
        .ok_or(BorrowingApplicationError::NotFound("Book"))?;

    if !book.is_in_stock() {
        return abort(tx, BorrowingApplicationError::OutOfStock).await;
    }

    // 2. 同じ本の重複貸出を確認
    let has_active = tx
        .has_active_borrowing(cmd.user_id, &book.title, book.cover)
        .await
        .map_err(BorrowingApplicationError::StoreError)?;

    if has_active {
        return abort(tx, BorrowingApplicationError::DuplicateActiveBorrowing).await;
    }

    // 3. 未完了の支払いを確認
    let has_pending = tx
        .has_pending_payment(cmd.user_id)
        .await
        .map_err(BorrowingApplicationError::StoreError)?;

    if has_pending {
        return abort(tx, BorrowingApplicationError::ConflictingPendingPayment).await;
    }

    // 4. ドメイン層の純粋関数を呼び出し
    let (active, updated_book, event) =
        domain::borrow_book(&book, cmd.user_id, cmd.borrow_date, cmd.expected_return_date)?;

    tx.save_book(&updated_book)
        .await
        .map_err(BorrowingApplicationError::StoreError)?;
    tx.save_borrowing(&Borrowing::Active(active.clone()))
        .await
        .map_err(BorrowingApplicationError::StoreError)?;

    // 5. 決済セッションを作成し、支払いを保存
    let session = match open_checkout(
        deps,
        &book,
        active.borrowing_id,
        PaymentType::Payment,
        event.rental_amount,
    )
    .await
    {
        Ok(session) => session,
        Err(e) => return abort(tx, e).await,
    };

    let payment = domain::open_payment(
        active.borrowing_id,
        PaymentType::Payment,
        event.rental_amount,
        session.session_id,
        session.session_url,
    );

    tx.save_payment(&payment)
        .await
        .map_err(BorrowingApplicationError::StoreError)?;

    tx.commit()
        .await
        .map_err(BorrowingApplicationError::StoreError)?;

    tracing::info!(
        borrowing_id = %active.borrowing_id.value(),
        book_id = %book.book_id.value(),
        user_id = %cmd.user_id.value(),
        rental_amount = %event.rental_amount,
        "Borrowing created"
    );

    // 6. 通知（ベストエフォート）
    notifications::notify(
        deps.notification_sink.as_ref(),
        &notifications::borrowing_created(&active, &book),
    )
    .await;

    Ok(BorrowingReceipt {
        borrowing: active,
        payment,
    })
}

/// 書籍を返却する
///
/// ビジネスルール：
/// - 貸出が存在すること
/// - 返却済みでないこと
/// - 在庫を1冊戻す
/// - 返却予定日を過ぎていれば延滞料金の支払いを作成する（日額0なら作成しない）
///
/// 返却と延滞料金の決済セッション作成は同じトランザクションで行う。
/// 決済セッションの作成に失敗した場合は返却もロールバックされる。
pub async fn return_borrowing(
    deps: &ServiceDependencies,
    cmd: ReturnBook,
) -> Result<ReturnReceipt> {
    let mut tx = deps
        .store
        .begin()
        .await
        .map_err(BorrowingApplicationError::StoreError)?;

    // 1. 貸出と書籍をロック
    let borrowing = tx
        .lock_borrowing(cmd.borrowing_id)
        .await
        .map_err(BorrowingApplicationError::StoreError)?
        .ok_or(BorrowingApplicationError::NotFound("Borrowing"))?;

    if !borrowing.is_active() {
        return abort(tx, BorrowingApplicationError::AlreadyReturned).await;
    }

    let book = tx
        .lock_book(borrowing.core().book_id)
        .await
        .map_err(BorrowingApplicationError::StoreError)?
        .ok_or(BorrowingApplicationError::NotFound("Book"))?;

    // 2. ドメイン層の純粋関数を呼び出し
    let (returned, updated_book, event) = domain::return_book(borrowing, &book, cmd.returned_on)?;

    tx.save_book(&updated_book)
        .await
        .map_err(BorrowingApplicationError::StoreError)?;
    tx.save_borrowing(&Borrowing::Returned(returned.clone()))
        .await
        .map_err(BorrowingApplicationError::StoreError)?;

    // 3. 延滞していれば延滞料金の支払いを作成
    let outcome = if event.was_overdue && event.fine > Decimal::ZERO {
        let session = match open_checkout(
            deps,
            &book,
            returned.borrowing_id,
            PaymentType::Fine,
            event.fine,
        )
        .await
        {
            Ok(session) => session,
            Err(e) => return abort(tx, e).await,
        };

        let payment = domain::open_payment(
            returned.borrowing_id,
            PaymentType::Fine,
            event.fine,
            session.session_id,
            session.session_url,
        );

        tx.save_payment(&payment)
            .await
            .map_err(BorrowingApplicationError::StoreError)?;

        ReturnOutcome::FineDue {
            fine: event.fine,
            payment,
        }
    } else {
        ReturnOutcome::OnTime
    };

    tx.commit()
        .await
        .map_err(BorrowingApplicationError::StoreError)?;

    tracing::info!(
        borrowing_id = %returned.borrowing_id.value(),
        was_overdue = event.was_overdue,
        fine = %event.fine,
        "Book returned"
    );

    // 4. 通知（ベストエフォート）
    let message = match &outcome {
        ReturnOutcome::OnTime => notifications::returned_on_time(&returned, &book, cmd.returned_on),
        ReturnOutcome::FineDue { fine, .. } => {
            notifications::fine_due(&returned, &book, cmd.returned_on, *fine)
        }
    };
    notifications::notify(deps.notification_sink.as_ref(), &message).await;

    Ok(ReturnReceipt {
        borrowing: returned,
        outcome,
    })
}

/// 条件に一致する貸出を検索する
pub async fn list_borrowings(
    deps: &ServiceDependencies,
    filter: BorrowingFilter,
) -> Result<Vec<BorrowingDetails>> {
    deps.store
        .find_borrowings(filter)
        .await
        .map_err(BorrowingApplicationError::StoreError)
}

/// IDで貸出を取得する
pub async fn get_borrowing(
    deps: &ServiceDependencies,
    borrowing_id: BorrowingId,
) -> Result<BorrowingDetails> {
    deps.store
        .get_borrowing(borrowing_id)
        .await
        .map_err(BorrowingApplicationError::StoreError)?
        .ok_or(BorrowingApplicationError::NotFound("Borrowing"))
}
