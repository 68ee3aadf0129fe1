use crate::ports::payment_gateway::{
    CheckoutRequest, CheckoutSession, PaymentGateway as PaymentGatewayTrait, PaymentRejected,
    Result, SessionStatus,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// PaymentGatewayのモック実装
///
/// 連番のセッションIDを発行し、状態はテストから設定できる。
/// 新しいセッションはPending。`fail_sessions`でセッション作成を失敗させられる。
/// 実際の決済サービスと同じく、0以下の金額は拒否する。
#[derive(Default)]
pub struct PaymentGateway {
    counter: AtomicUsize,
    fail_sessions: AtomicBool,
    statuses: Mutex<HashMap<String, SessionStatus>>,
    requests: Mutex<Vec<CheckoutRequest>>,
}

impl PaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// trueの間、open_sessionはエラーを返す
    pub fn fail_sessions(&self, fail: bool) {
        self.fail_sessions.store(fail, Ordering::SeqCst);
    }

    /// テスト用にセッションの状態を設定
    pub fn set_status(&self, session_id: &str, status: SessionStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(session_id.to_string(), status);
    }

    /// これまでに受け付けたセッション作成要求
    pub fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGatewayTrait for PaymentGateway {
    async fn open_session(&self, request: CheckoutRequest) -> Result<CheckoutSession> {
        if self.fail_sessions.load(Ordering::SeqCst) {
            return Err("payment provider unavailable".into());
        }
        if request.amount <= rust_decimal::Decimal::ZERO {
            return Err(Box::new(PaymentRejected(format!(
                "amount must be positive, got {}",
                request.amount
            ))));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let session_id = format!("cs_mock_{}", n);
        let session_url = format!("https://checkout.mock/pay/{}", session_id);

        self.statuses
            .lock()
            .unwrap()
            .insert(session_id.clone(), SessionStatus::Pending);
        self.requests.lock().unwrap().push(request);

        Ok(CheckoutSession {
            session_id,
            session_url,
        })
    }

    async fn session_status(&self, session_id: &str) -> Result<SessionStatus> {
        self.statuses
            .lock()
            .unwrap()
            .get(session_id)
            .copied()
            .ok_or_else(|| format!("No such checkout session: {}", session_id).into())
    }
}
