use crate::domain::{
    Book, BookId, Borrowing, BorrowingId, CoverType, Payment, PaymentId, PaymentStatus, UserId,
};
use crate::ports::borrowing_store::{
    BorrowingDetails, BorrowingFilter, BorrowingStore as BorrowingStoreTrait,
    BorrowingTransaction, Result,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct State {
    books: HashMap<BookId, Book>,
    borrowings: HashMap<BorrowingId, Borrowing>,
    payments: HashMap<PaymentId, Payment>,
}

impl State {
    fn details(&self, borrowing: &Borrowing) -> Result<BorrowingDetails> {
        let core = borrowing.core();
        let book = self
            .books
            .get(&core.book_id)
            .cloned()
            .ok_or_else(|| {
                format!("Book {} referenced by borrowing is missing", core.book_id.value())
            })?;

        let mut payments: Vec<Payment> = self
            .payments
            .values()
            .filter(|p| p.borrowing_id == core.borrowing_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.payment_id.value());

        Ok(BorrowingDetails {
            borrowing: borrowing.clone(),
            book,
            payments,
        })
    }

    fn borrower_of(&self, payment: &Payment) -> Option<UserId> {
        self.borrowings
            .get(&payment.borrowing_id)
            .map(|b| b.core().user_id)
    }
}

/// In-memory implementation of BorrowingStore
///
/// All data lives behind a single async mutex. A transaction holds the lock
/// for its whole lifetime and works on a copy of the state, so transactions
/// are fully serialized. Commit writes the copy back; dropping the
/// transaction discards it.
///
/// Do not call the read methods while a transaction is open on the same
/// task: they wait for the same lock.
#[derive(Clone, Default)]
pub struct BorrowingStore {
    state: Arc<Mutex<State>>,
}

impl BorrowingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a book for test assertions
    pub async fn book(&self, book_id: BookId) -> Option<Book> {
        self.state.lock().await.books.get(&book_id).cloned()
    }

    /// Snapshot of all payments for test assertions
    pub async fn payments(&self) -> Vec<Payment> {
        self.state.lock().await.payments.values().cloned().collect()
    }

    /// Snapshot of all borrowings for test assertions
    pub async fn borrowings(&self) -> Vec<Borrowing> {
        self.state.lock().await.borrowings.values().cloned().collect()
    }
}

#[async_trait]
impl BorrowingStoreTrait for BorrowingStore {
    async fn begin(&self) -> Result<Box<dyn BorrowingTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(Transaction { guard, working }))
    }

    async fn insert_book(&self, book: Book) -> Result<()> {
        self.state.lock().await.books.insert(book.book_id, book);
        Ok(())
    }

    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>> {
        Ok(self.state.lock().await.books.get(&book_id).cloned())
    }

    async fn get_borrowing(&self, borrowing_id: BorrowingId) -> Result<Option<BorrowingDetails>> {
        let state = self.state.lock().await;
        state
            .borrowings
            .get(&borrowing_id)
            .map(|b| state.details(b))
            .transpose()
    }

    async fn find_borrowings(&self, filter: BorrowingFilter) -> Result<Vec<BorrowingDetails>> {
        let state = self.state.lock().await;
        let mut matched: Vec<&Borrowing> = state
            .borrowings
            .values()
            .filter(|b| filter.user_id.is_none_or(|user_id| b.core().user_id == user_id))
            .filter(|b| filter.is_active.is_none_or(|active| b.is_active() == active))
            .collect();
        matched.sort_by(|a, b| b.core().borrow_date.cmp(&a.core().borrow_date));

        matched.into_iter().map(|b| state.details(b)).collect()
    }

    async fn find_overdue_borrowings(&self, today: NaiveDate) -> Result<Vec<BorrowingDetails>> {
        let state = self.state.lock().await;
        let mut overdue: Vec<&Borrowing> = state
            .borrowings
            .values()
            .filter(|b| b.is_active() && b.core().expected_return_date < today)
            .collect();
        overdue.sort_by_key(|b| b.core().expected_return_date);

        overdue.into_iter().map(|b| state.details(b)).collect()
    }

    async fn find_pending_payments(&self) -> Result<Vec<Payment>> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Pending)
            .cloned()
            .collect())
    }

    async fn find_payment_by_session(&self, session_id: &str) -> Result<Option<Payment>> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .values()
            .find(|p| p.session_id == session_id)
            .cloned())
    }

    async fn find_payments_for_user(&self, user_id: UserId) -> Result<Vec<Payment>> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .values()
            .filter(|p| state.borrower_of(p) == Some(user_id))
            .cloned()
            .collect())
    }

    async fn get_payment(&self, payment_id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.state.lock().await.payments.get(&payment_id).cloned())
    }
}

/// In-memory transaction
///
/// Holds the store lock, so every lock method is trivially exclusive.
struct Transaction {
    guard: OwnedMutexGuard<State>,
    working: State,
}

#[async_trait]
impl BorrowingTransaction for Transaction {
    async fn lock_user(&mut self, _user_id: UserId) -> Result<()> {
        Ok(())
    }

    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>> {
        Ok(self.working.books.get(&book_id).cloned())
    }

    async fn has_active_borrowing(
        &mut self,
        user_id: UserId,
        title: &str,
        cover: CoverType,
    ) -> Result<bool> {
        let books = &self.working.books;
        Ok(self.working.borrowings.values().any(|b| {
            b.is_active()
                && b.core().user_id == user_id
                && books
                    .get(&b.core().book_id)
                    .is_some_and(|book| book.title == title && book.cover == cover)
        }))
    }

    async fn has_pending_payment(&mut self, user_id: UserId) -> Result<bool> {
        let state = &self.working;
        Ok(state.payments.values().any(|p| {
            p.status == PaymentStatus::Pending && state.borrower_of(p) == Some(user_id)
        }))
    }

    async fn has_pending_payment_for_borrowing(
        &mut self,
        borrowing_id: BorrowingId,
    ) -> Result<bool> {
        Ok(self
            .working
            .payments
            .values()
            .any(|p| p.status == PaymentStatus::Pending && p.borrowing_id == borrowing_id))
    }

    async fn lock_borrowing(&mut self, borrowing_id: BorrowingId) -> Result<Option<Borrowing>> {
        Ok(self.working.borrowings.get(&borrowing_id).cloned())
    }

    async fn lock_payment(&mut self, payment_id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.working.payments.get(&payment_id).cloned())
    }

    async fn save_book(&mut self, book: &Book) -> Result<()> {
        self.working.books.insert(book.book_id, book.clone());
        Ok(())
    }

    async fn save_borrowing(&mut self, borrowing: &Borrowing) -> Result<()> {
        let core = borrowing.core();
        if !self.working.books.contains_key(&core.book_id) {
            return Err(format!("Unknown book {}", core.book_id.value()).into());
        }
        self.working
            .borrowings
            .insert(core.borrowing_id, borrowing.clone());
        Ok(())
    }

    async fn save_payment(&mut self, payment: &Payment) -> Result<()> {
        if !self.working.borrowings.contains_key(&payment.borrowing_id) {
            return Err(format!("Unknown borrowing {}", payment.borrowing_id.value()).into());
        }
        self.working
            .payments
            .insert(payment.payment_id, payment.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Transaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
