pub mod borrowing_store;

// パブリックに型を再エクスポート
pub use borrowing_store::BorrowingStore as PostgresBorrowingStore;
