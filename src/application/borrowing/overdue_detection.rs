use chrono::NaiveDate;

use crate::domain;

use super::borrowing_service::ServiceDependencies;
use super::errors::{BorrowingApplicationError, Result};
use super::notifications;

/// 延滞チェックバッチ
///
/// 定期的に実行され、延滞中の貸出ごとに通知を送る。読み取り専用。
///
/// ビジネスルール：
/// - 返却予定日（expected_return_date）を過ぎた未返却の貸出を延滞とする
/// - 延滞が1件もなければ「延滞なし」の通知を1件だけ送る
///
/// # 引数
/// * `deps` - サービスの依存関係
/// * `today` - 判定基準日
///
/// # 戻り値
/// 延滞として通知した貸出の件数
pub async fn check_overdue_borrowings(
    deps: &ServiceDependencies,
    today: NaiveDate,
) -> Result<usize> {
    let candidates = deps
        .store
        .find_overdue_borrowings(today)
        .await
        .map_err(BorrowingApplicationError::StoreError)?;

    let overdue: Vec<_> = candidates
        .iter()
        .filter(|details| domain::is_overdue(&details.borrowing, today))
        .collect();

    if overdue.is_empty() {
        notifications::notify(deps.notification_sink.as_ref(), notifications::NONE_OVERDUE)
            .await;
        return Ok(0);
    }

    for details in &overdue {
        let message = notifications::overdue(details.borrowing.core(), &details.book, today);
        notifications::notify(deps.notification_sink.as_ref(), &message).await;
    }

    tracing::info!(count = overdue.len(), %today, "Overdue borrowings notified");

    Ok(overdue.len())
}
