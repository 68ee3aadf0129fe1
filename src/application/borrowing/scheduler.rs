use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::borrowing_service::ServiceDependencies;
use super::overdue_detection::check_overdue_borrowings;
use super::session_expiration::expire_pending_sessions;

/// バックグラウンドスイープのタスク
pub struct SweepHandles {
    pub overdue: JoinHandle<()>,
    pub sessions: JoinHandle<()>,
}

impl SweepHandles {
    pub fn abort(&self) {
        self.overdue.abort();
        self.sessions.abort();
    }
}

/// 延滞チェックとセッション期限切れスイープを定期実行する
///
/// それぞれ独立したintervalで動き、初回は起動直後に実行される。
/// スイープが失敗しても次の周期で再実行される。
pub fn spawn_sweeps(
    deps: ServiceDependencies,
    overdue_every: Duration,
    sessions_every: Duration,
) -> SweepHandles {
    let overdue_deps = deps.clone();
    let overdue = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(overdue_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let today = chrono::Utc::now().date_naive();
            if let Err(e) = check_overdue_borrowings(&overdue_deps, today).await {
                tracing::error!(error = %e, "Overdue check failed");
            }
        }
    });

    let sessions = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sessions_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = expire_pending_sessions(&deps).await {
                tracing::error!(error = %e, "Payment session sweep failed");
            }
        }
    });

    SweepHandles { overdue, sessions }
}
