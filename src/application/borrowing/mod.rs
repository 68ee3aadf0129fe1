mod borrowing_service;
mod errors;
mod notifications;
mod overdue_detection;
mod payment_service;
mod scheduler;
mod session_expiration;

pub use borrowing_service::{
    BorrowingReceipt, ReturnOutcome, ReturnReceipt, ServiceDependencies, create_borrowing,
    get_borrowing, list_borrowings, return_borrowing,
};
pub use errors::{BorrowingApplicationError, Result};
pub use overdue_detection::check_overdue_borrowings;
pub use payment_service::{
    PaymentCompletion, complete_payment, get_payment, list_payments, renew_payment,
};
pub use scheduler::{SweepHandles, spawn_sweeps};
pub use session_expiration::{ExpirationReport, expire_pending_sessions};
