pub mod borrowing_store;
pub mod notification_sink;
pub mod payment_gateway;

pub use borrowing_store::{BorrowingDetails, BorrowingFilter, BorrowingStore, BorrowingTransaction};
pub use notification_sink::NotificationSink;
pub use payment_gateway::{
    CheckoutRequest, CheckoutSession, PaymentGateway, PaymentRejected, SessionStatus,
};
