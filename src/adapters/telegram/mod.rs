pub mod notification_sink;

pub use notification_sink::NotificationSink as TelegramNotificationSink;
