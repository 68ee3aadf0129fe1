use futures::stream::{self, StreamExt};

use crate::domain::{self, PaymentId};
use crate::ports::SessionStatus;

use super::borrowing_service::ServiceDependencies;
use super::errors::{BorrowingApplicationError, Result};
use super::notifications;

/// 決済サービスへの同時問い合わせ数
const MAX_CONCURRENT_STATUS_CHECKS: usize = 8;

/// セッション期限切れスイープの結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpirationReport {
    /// 問い合わせたPendingの支払いの件数
    pub checked: usize,
    /// Expiredに遷移させた件数
    pub expired: usize,
    /// 問い合わせ・遷移に失敗した件数（次回のスイープで再試行される）
    pub failed: usize,
}

/// 決済セッション期限切れスイープ
///
/// Pendingの支払いすべてについて決済サービスに状態を問い合わせ、
/// 期限切れならExpiredに遷移させる。
///
/// - 1件の失敗はログに残して続行する
/// - 遷移は1件ごとに短いトランザクションで行い、
///   その間にPaid/Expiredになった支払いはスキップする（冪等）
/// - 呼び出しごとにサマリ通知を1件だけ送る
pub async fn expire_pending_sessions(deps: &ServiceDependencies) -> Result<ExpirationReport> {
    let pending = deps
        .store
        .find_pending_payments()
        .await
        .map_err(BorrowingApplicationError::StoreError)?;

    let gateway = &deps.payment_gateway;
    let statuses: Vec<_> = stream::iter(pending)
        .map(|payment| async move {
            let status = gateway.session_status(&payment.session_id).await;
            (payment, status)
        })
        .buffer_unordered(MAX_CONCURRENT_STATUS_CHECKS)
        .collect()
        .await;

    let mut report = ExpirationReport {
        checked: statuses.len(),
        ..Default::default()
    };

    for (payment, status) in statuses {
        match status {
            Ok(SessionStatus::Expired) => match expire_payment(deps, payment.payment_id).await {
                Ok(true) => report.expired += 1,
                Ok(false) => {
                    tracing::debug!(
                        payment_id = %payment.payment_id.value(),
                        "Payment settled before expiration, skipped"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        payment_id = %payment.payment_id.value(),
                        error = %e,
                        "Failed to expire payment"
                    );
                    report.failed += 1;
                }
            },
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    payment_id = %payment.payment_id.value(),
                    session_id = %payment.session_id,
                    error = %e,
                    "Failed to query payment session status"
                );
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        checked = report.checked,
        expired = report.expired,
        failed = report.failed,
        "Payment session sweep finished"
    );

    notifications::notify(
        deps.notification_sink.as_ref(),
        &notifications::sessions_expired(report.expired),
    )
    .await;

    Ok(report)
}

/// 1件の支払いをExpiredにする
///
/// 既にPendingでなければ何もせずfalseを返す。
async fn expire_payment(deps: &ServiceDependencies, payment_id: PaymentId) -> Result<bool> {
    let mut tx = deps
        .store
        .begin()
        .await
        .map_err(BorrowingApplicationError::StoreError)?;

    let Some(current) = tx
        .lock_payment(payment_id)
        .await
        .map_err(BorrowingApplicationError::StoreError)?
    else {
        return Ok(false);
    };

    let expired = match domain::mark_expired(current) {
        Ok(expired) => expired,
        Err(_) => return Ok(false),
    };

    tx.save_payment(&expired)
        .await
        .map_err(BorrowingApplicationError::StoreError)?;
    tx.commit()
        .await
        .map_err(BorrowingApplicationError::StoreError)?;

    Ok(true)
}
