use crate::ports::notification_sink::{NotificationSink as NotificationSinkTrait, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Mock implementation of NotificationSink
///
/// Does not deliver anything. Messages are written to the log and kept in
/// memory so tests can assert on them.
#[derive(Default)]
pub struct NotificationSink {
    sent: Mutex<Vec<String>>,
    failing: AtomicBool,
    log_only: bool,
}

impl NotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that only logs, used at runtime when no chat is configured
    pub fn log_only() -> Self {
        Self {
            log_only: true,
            ..Self::default()
        }
    }

    /// A sink whose every send fails
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.failing.store(true, Ordering::SeqCst);
        sink
    }

    /// Messages received so far, oldest first
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSinkTrait for NotificationSink {
    async fn send(&self, message: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err("notification channel unavailable".into());
        }

        tracing::info!(%message, "Notification");
        if !self.log_only {
            self.sent.lock().unwrap().push(message.to_string());
        }
        Ok(())
    }
}
