use crate::domain::{
    Book, BookId, Borrowing, BorrowingId, CoverType, Payment, PaymentId, UserId,
};
use async_trait::async_trait;
use chrono::NaiveDate;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 貸出の検索条件
///
/// Noneの項目は絞り込まない。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BorrowingFilter {
    pub user_id: Option<UserId>,
    /// true: 貸出中のみ / false: 返却済みのみ
    pub is_active: Option<bool>,
}

/// 貸出ビュー
///
/// 貸出と書籍、紐づく支払いをまとめたクエリ用の構造。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowingDetails {
    pub borrowing: Borrowing,
    pub book: Book,
    pub payments: Vec<Payment>,
}

/// 貸出ストアポート
///
/// 書籍・貸出・支払いの永続化を抽象化する。
/// 状態を変更する操作はすべて`begin`で開始したトランザクション経由で行う。
/// 読み取りメソッドはトランザクション外のスナップショットを返す。
///
/// 注意：トランザクションを保持したまま同じストアの読み取りメソッドを
/// 呼んではならない（インメモリ実装ではデッドロックする）。
#[async_trait]
pub trait BorrowingStore: Send + Sync {
    /// トランザクションを開始する
    async fn begin(&self) -> Result<Box<dyn BorrowingTransaction>>;

    /// 書籍を登録する
    ///
    /// カタログ管理はこのクレートの範囲外のため、初期データ投入とテスト用。
    async fn insert_book(&self, book: Book) -> Result<()>;

    /// IDで書籍を取得する
    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>>;

    /// IDで貸出を取得する
    async fn get_borrowing(&self, borrowing_id: BorrowingId) -> Result<Option<BorrowingDetails>>;

    /// 条件に一致する貸出を検索する（貸出日の新しい順）
    async fn find_borrowings(&self, filter: BorrowingFilter) -> Result<Vec<BorrowingDetails>>;

    /// 延滞中の貸出を検索する
    ///
    /// expected_return_date < today かつ未返却の貸出を返す。
    async fn find_overdue_borrowings(&self, today: NaiveDate) -> Result<Vec<BorrowingDetails>>;

    /// Pendingの支払いをすべて取得する
    async fn find_pending_payments(&self) -> Result<Vec<Payment>>;

    /// 決済セッションIDで支払いを取得する
    async fn find_payment_by_session(&self, session_id: &str) -> Result<Option<Payment>>;

    /// 利用者の支払いをすべて取得する
    async fn find_payments_for_user(&self, user_id: UserId) -> Result<Vec<Payment>>;

    /// IDで支払いを取得する
    async fn get_payment(&self, payment_id: PaymentId) -> Result<Option<Payment>>;
}

/// 貸出ストアのトランザクション
///
/// `commit`せずにドロップした場合はロールバックされる。
/// lock系のメソッドは対象をトランザクション終了まで排他ロックする。
#[async_trait]
pub trait BorrowingTransaction: Send {
    /// 利用者単位の排他ロックを取得する
    ///
    /// 重複貸出・未払いのチェックと書き込みを直列化するために使う。
    async fn lock_user(&mut self, user_id: UserId) -> Result<()>;

    /// 書籍を排他ロックして取得する
    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>>;

    /// 同じ書名・装丁の本を貸出中か
    async fn has_active_borrowing(
        &mut self,
        user_id: UserId,
        title: &str,
        cover: CoverType,
    ) -> Result<bool>;

    /// 利用者にPendingの支払いがあるか
    async fn has_pending_payment(&mut self, user_id: UserId) -> Result<bool>;

    /// 貸出にPendingの支払いがあるか
    async fn has_pending_payment_for_borrowing(
        &mut self,
        borrowing_id: BorrowingId,
    ) -> Result<bool>;

    /// 貸出を排他ロックして取得する
    async fn lock_borrowing(&mut self, borrowing_id: BorrowingId) -> Result<Option<Borrowing>>;

    /// 支払いを排他ロックして取得する
    async fn lock_payment(&mut self, payment_id: PaymentId) -> Result<Option<Payment>>;

    /// 書籍を保存する（在庫の更新）
    async fn save_book(&mut self, book: &Book) -> Result<()>;

    /// 貸出を保存する
    ///
    /// 新規の場合はINSERT、既存の場合はUPDATE（upsert）を実行する。
    async fn save_borrowing(&mut self, borrowing: &Borrowing) -> Result<()>;

    /// 支払いを保存する（upsert）
    async fn save_payment(&mut self, payment: &Payment) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
