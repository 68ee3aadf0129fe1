use crate::ports::notification_sink::{NotificationSink as NotificationSinkTrait, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const HTTP_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Telegram request failed")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API returned {0}")]
    Api(reqwest::StatusCode),
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Telegram implementation of NotificationSink
///
/// Posts every message to a single chat through the Bot API `sendMessage`.
pub struct NotificationSink {
    client: reqwest::Client,
    endpoint: String,
    chat_id: String,
}

impl NotificationSink {
    pub fn new(token: &str, chat_id: String) -> std::result::Result<Self, TelegramError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", TELEGRAM_API_BASE, token),
            chat_id,
        })
    }
}

#[async_trait]
impl NotificationSinkTrait for NotificationSink {
    async fn send(&self, message: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text: message,
            })
            .send()
            .await
            .map_err(TelegramError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelegramError::Api(status).into());
        }

        tracing::debug!("Telegram message sent");
        Ok(())
    }
}
