use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 通知先ポート
///
/// 職員向けのチャットなど、人が読むメッセージの配信先を抽象化する。
/// 配信の失敗は呼び出し側でログに残すだけで、業務処理は失敗させない。
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
}
