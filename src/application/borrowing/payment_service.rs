use crate::domain::{self, commands::*, value_objects::*};
use crate::domain::Payment;
use crate::ports::*;

use super::borrowing_service::{ServiceDependencies, abort, open_checkout};
use super::errors::{BorrowingApplicationError, Result};
use super::notifications;

/// 決済完了コールバックの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentCompletion {
    /// Pending → Paid に遷移した
    Paid(Payment),
    /// 既に終端状態（Paid/Expired）だった。状態は変更しない
    AlreadySettled(Payment),
    /// 決済サービス側でまだ支払われていない。状態は変更しない
    NotPaid(Payment),
    /// セッションIDに対応する支払いがない
    UnknownSession,
}

/// 決済完了を反映する
///
/// 決済サービスからのリダイレクトで呼ばれる。
/// リダイレクトだけでは支払いを信用せず、決済サービスに状態を問い合わせてから
/// Paidに遷移させる。何度呼ばれても結果は同じ（冪等）。
pub async fn complete_payment(
    deps: &ServiceDependencies,
    cmd: CompletePayment,
) -> Result<PaymentCompletion> {
    // 1. セッションIDで支払いを取得
    let payment = match deps
        .store
        .find_payment_by_session(&cmd.session_id)
        .await
        .map_err(BorrowingApplicationError::StoreError)?
    {
        Some(payment) => payment,
        None => {
            tracing::warn!(session_id = %cmd.session_id, "Unknown payment session");
            return Ok(PaymentCompletion::UnknownSession);
        }
    };

    if payment.status.is_terminal() {
        return Ok(PaymentCompletion::AlreadySettled(payment));
    }

    // 2. 決済サービスに状態を問い合わせ
    let status = deps
        .payment_gateway
        .session_status(&cmd.session_id)
        .await
        .map_err(BorrowingApplicationError::GatewayError)?;

    if status != SessionStatus::Paid {
        return Ok(PaymentCompletion::NotPaid(payment));
    }

    // 3. ロックを取り直して遷移させる（スイープとの競合に備える）
    let mut tx = deps
        .store
        .begin()
        .await
        .map_err(BorrowingApplicationError::StoreError)?;

    let current = tx
        .lock_payment(payment.payment_id)
        .await
        .map_err(BorrowingApplicationError::StoreError)?
        .ok_or(BorrowingApplicationError::NotFound("Payment"))?;

    let paid = match domain::mark_paid(current.clone()) {
        Ok(paid) => paid,
        Err(_) => {
            tx.rollback()
                .await
                .map_err(BorrowingApplicationError::StoreError)?;
            return Ok(PaymentCompletion::AlreadySettled(current));
        }
    };

    tx.save_payment(&paid)
        .await
        .map_err(BorrowingApplicationError::StoreError)?;
    tx.commit()
        .await
        .map_err(BorrowingApplicationError::StoreError)?;

    tracing::info!(
        payment_id = %paid.payment_id.value(),
        payment_type = paid.payment_type.as_str(),
        "Payment completed"
    );

    // 4. 通知（ベストエフォート）
    match deps.store.get_borrowing(paid.borrowing_id).await {
        Ok(Some(details)) => {
            let message =
                notifications::payment_completed(&paid, details.borrowing.core(), &details.book);
            notifications::notify(deps.notification_sink.as_ref(), &message).await;
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load borrowing for payment notification");
        }
    }

    Ok(PaymentCompletion::Paid(paid))
}

/// 期限切れの支払いを更新する
///
/// ビジネスルール：
/// - 支払いが存在すること
/// - 支払いがExpiredであること
/// - 同じ貸出にPendingの支払いがないこと
///
/// 利用者ロックを取ってから確認するため、同じ利用者の貸出作成とは直列に実行される。
///
/// 同じ種別・金額で新しい決済セッションとPendingの支払いを作成する。
/// 期限切れの支払いはそのまま残る。
pub async fn renew_payment(deps: &ServiceDependencies, cmd: RenewPayment) -> Result<Payment> {
    let mut tx = deps
        .store
        .begin()
        .await
        .map_err(BorrowingApplicationError::StoreError)?;

    let expired = tx
        .lock_payment(cmd.payment_id)
        .await
        .map_err(BorrowingApplicationError::StoreError)?
        .ok_or(BorrowingApplicationError::NotFound("Payment"))?;

    if expired.status != PaymentStatus::Expired {
        return abort(tx, BorrowingApplicationError::PaymentNotRenewable).await;
    }

    let borrowing = tx
        .lock_borrowing(expired.borrowing_id)
        .await
        .map_err(BorrowingApplicationError::StoreError)?
        .ok_or(BorrowingApplicationError::NotFound("Borrowing"))?;

    // create_borrowingの未払い確認と直列化する
    tx.lock_user(borrowing.core().user_id)
        .await
        .map_err(BorrowingApplicationError::StoreError)?;

    let has_pending = tx
        .has_pending_payment_for_borrowing(expired.borrowing_id)
        .await
        .map_err(BorrowingApplicationError::StoreError)?;

    if has_pending {
        return abort(tx, BorrowingApplicationError::ConflictingPendingPayment).await;
    }

    let book = tx
        .lock_book(borrowing.core().book_id)
        .await
        .map_err(BorrowingApplicationError::StoreError)?
        .ok_or(BorrowingApplicationError::NotFound("Book"))?;

    let session = match open_checkout(
        deps,
        &book,
        expired.borrowing_id,
        expired.payment_type,
        expired.money_to_pay,
    )
    .await
    {
        Ok(session) => session,
        Err(e) => return abort(tx, e).await,
    };

    let renewed = domain::renew(&expired, session.session_id, session.session_url)
        .map_err(|_| BorrowingApplicationError::PaymentNotRenewable)?;

    tx.save_payment(&renewed)
        .await
        .map_err(BorrowingApplicationError::StoreError)?;
    tx.commit()
        .await
        .map_err(BorrowingApplicationError::StoreError)?;

    tracing::info!(
        expired_payment_id = %expired.payment_id.value(),
        payment_id = %renewed.payment_id.value(),
        "Payment renewed"
    );

    Ok(renewed)
}

/// 利用者の支払いを一覧する
pub async fn list_payments(deps: &ServiceDependencies, user_id: UserId) -> Result<Vec<Payment>> {
    deps.store
        .find_payments_for_user(user_id)
        .await
        .map_err(BorrowingApplicationError::StoreError)
}

/// IDで支払いを取得する
pub async fn get_payment(deps: &ServiceDependencies, payment_id: PaymentId) -> Result<Payment> {
    deps.store
        .get_payment(payment_id)
        .await
        .map_err(BorrowingApplicationError::StoreError)?
        .ok_or(BorrowingApplicationError::NotFound("Payment"))
}
