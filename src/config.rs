use std::time::Duration;
use thiserror::Error;

/// 設定読み込みのエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 必須の環境変数がない
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    /// 値を解釈できない
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Telegram通知の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
}

/// アプリケーション設定
///
/// 起動時に環境変数から1回だけ読み込み、各アダプタのコンストラクタに渡す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    /// 決済サービスのリダイレクト先に使う公開URL
    pub base_url: String,
    pub stripe_secret_key: String,
    pub payment_currency: String,
    /// Noneなら通知はログ出力のみ
    pub telegram: Option<TelegramConfig>,
    pub overdue_check_interval: Duration,
    pub session_check_interval: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の参照関数から設定を組み立てる（テスト用に環境変数から切り離している）
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &'static str| lookup(name).filter(|value| !value.trim().is_empty());

        let port = match var("PORT") {
            Some(value) => parse("PORT", value)?,
            None => 3000,
        };

        let stripe_secret_key =
            var("STRIPE_SECRET_KEY").ok_or(ConfigError::Missing("STRIPE_SECRET_KEY"))?;

        let telegram = match (var("TG_TOKEN"), var("CHAT_ID")) {
            (Some(token), Some(chat_id)) => Some(TelegramConfig { token, chat_id }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("CHAT_ID")),
            (None, Some(_)) => return Err(ConfigError::Missing("TG_TOKEN")),
        };

        let payment_currency = var("PAYMENT_CURRENCY")
            .map(|c| c.to_ascii_lowercase())
            .unwrap_or_else(|| "usd".to_string());
        if payment_currency.len() != 3 || !payment_currency.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(ConfigError::Invalid {
                name: "PAYMENT_CURRENCY",
                value: payment_currency,
            });
        }

        Ok(Self {
            database_url: var("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost/library".to_string()),
            port,
            base_url: var("BASE_URL").unwrap_or_else(|| format!("http://localhost:{}", port)),
            stripe_secret_key,
            payment_currency,
            telegram,
            overdue_check_interval: interval(&var, "OVERDUE_CHECK_INTERVAL_SECS", 86_400)?,
            session_check_interval: interval(&var, "SESSION_CHECK_INTERVAL_SECS", 60)?,
        })
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|_| ConfigError::Invalid { name, value })
}

fn interval(
    var: &impl Fn(&'static str) -> Option<String>,
    name: &'static str,
    default_secs: u64,
) -> Result<Duration, ConfigError> {
    let secs = match var(name) {
        Some(value) => parse::<u64>(name, value)?,
        None => default_secs,
    };

    if secs == 0 {
        return Err(ConfigError::Invalid {
            name,
            value: secs.to_string(),
        });
    }

    Ok(Duration::from_secs(secs))
}
