use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BorrowingId, PaymentId, PaymentStatus, PaymentTransitionError, PaymentType};

/// 支払い
///
/// 外部決済サービスのチェックアウトセッションと1対1で対応する。
/// 貸出1件につき貸出料金が1件、延滞返却なら延滞料金がさらに1件作られる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: PaymentId,
    pub borrowing_id: BorrowingId,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub session_id: String,
    pub session_url: String,
    pub money_to_pay: Decimal,
}

/// 純粋関数：支払いを開始する（Pending）
pub fn open_payment(
    borrowing_id: BorrowingId,
    payment_type: PaymentType,
    money_to_pay: Decimal,
    session_id: String,
    session_url: String,
) -> Payment {
    Payment {
        payment_id: PaymentId::new(),
        borrowing_id,
        payment_type,
        status: PaymentStatus::Pending,
        session_id,
        session_url,
        money_to_pay,
    }
}

/// 純粋関数：支払い完了
///
/// Pendingからのみ遷移可能。
pub fn mark_paid(payment: Payment) -> Result<Payment, PaymentTransitionError> {
    match payment.status {
        PaymentStatus::Pending => Ok(Payment {
            status: PaymentStatus::Paid,
            ..payment
        }),
        other => Err(PaymentTransitionError::NotPending(other)),
    }
}

/// 純粋関数：セッション期限切れ
///
/// Pendingからのみ遷移可能。
pub fn mark_expired(payment: Payment) -> Result<Payment, PaymentTransitionError> {
    match payment.status {
        PaymentStatus::Pending => Ok(Payment {
            status: PaymentStatus::Expired,
            ..payment
        }),
        other => Err(PaymentTransitionError::NotPending(other)),
    }
}

/// 純粋関数：期限切れの支払いを更新する
///
/// 期限切れの支払い自体は変更せず、同じ種別・金額で新しいPendingの支払いを作る。
pub fn renew(
    expired: &Payment,
    session_id: String,
    session_url: String,
) -> Result<Payment, PaymentTransitionError> {
    if expired.status != PaymentStatus::Expired {
        return Err(PaymentTransitionError::NotExpired(expired.status));
    }

    Ok(open_payment(
        expired.borrowing_id,
        expired.payment_type,
        expired.money_to_pay,
        session_id,
        session_url,
    ))
}
