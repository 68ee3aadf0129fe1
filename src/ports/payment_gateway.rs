use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 決済サービスが請求を受け付けなかった
///
/// 金額が0や最低額未満など、同じ要求を再送しても成功しない失敗。
/// `open_session`はこのエラーを返すことで一時的な障害と区別させる。
#[derive(Debug, Error)]
#[error("Payment rejected by provider: {0}")]
pub struct PaymentRejected(pub String);

/// チェックアウトセッションの作成要求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// 請求額（通貨の主単位、例：ドル）
    pub amount: Decimal,
    /// ISO 4217の小文字コード（例："usd"）
    pub currency: String,
    /// 決済画面に表示する品名
    pub description: String,
    /// 決済サービス側に保存する付加情報
    pub metadata: BTreeMap<String, String>,
}

/// 作成されたチェックアウトセッション
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub session_id: String,
    pub session_url: String,
}

/// 決済サービス側のセッション状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Paid,
    Pending,
    Expired,
}

/// 決済ゲートウェイポート
///
/// 外部決済サービスのホスト型チェックアウトを抽象化する。
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// チェックアウトセッションを作成する
    async fn open_session(&self, request: CheckoutRequest) -> Result<CheckoutSession>;

    /// セッションの現在状態を問い合わせる
    async fn session_status(&self, session_id: &str) -> Result<SessionStatus>;
}
