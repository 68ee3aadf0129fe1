use crate::domain::{
    Book, BookId, Borrowing, BorrowingCore, BorrowingId, CoverType, Payment, PaymentId,
    PaymentStatus, PaymentType, UserId,
};
use crate::ports::borrowing_store::{
    BorrowingDetails, BorrowingFilter, BorrowingStore as BorrowingStoreTrait,
    BorrowingTransaction, Result,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

const BOOK_COLUMNS: &str = "book_id, title, author, cover, inventory, daily_fee";

const BORROWING_COLUMNS: &str =
    "borrowing_id, book_id, user_id, borrow_date, expected_return_date, actual_return_date";

const BORROWING_WITH_BOOK: &str = r#"
    SELECT
        br.borrowing_id,
        br.book_id,
        br.user_id,
        br.borrow_date,
        br.expected_return_date,
        br.actual_return_date,
        b.title,
        b.author,
        b.cover,
        b.inventory,
        b.daily_fee
    FROM borrowings br
    JOIN books b ON b.book_id = br.book_id
"#;

const PAYMENT_COLUMNS: &str = "p.payment_id, p.borrowing_id, p.payment_type, p.status, \
                               p.session_id, p.session_url, p.money_to_pay";

fn invalid_data(message: String) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message))
}

/// PostgreSQLの行データをBookに変換する
///
/// inventoryはINTEGER(i32)で保存されているためu32への変換でエラーハンドリングを行う。
fn map_row_to_book(row: &PgRow) -> Result<Book> {
    let inventory_i32: i32 = row.get("inventory");
    let inventory: u32 = inventory_i32
        .try_into()
        .map_err(|_| invalid_data(format!("inventory out of range: {}", inventory_i32)))?;

    let cover_str: &str = row.get("cover");
    let cover = CoverType::from_str(cover_str).map_err(invalid_data)?;

    Ok(Book {
        book_id: BookId::from_uuid(row.get("book_id")),
        title: row.get("title"),
        author: row.get("author"),
        cover,
        inventory,
        daily_fee: row.get("daily_fee"),
    })
}

fn map_row_to_borrowing(row: &PgRow) -> Borrowing {
    let core = BorrowingCore {
        borrowing_id: BorrowingId::from_uuid(row.get("borrowing_id")),
        book_id: BookId::from_uuid(row.get("book_id")),
        user_id: UserId::from_uuid(row.get("user_id")),
        borrow_date: row.get("borrow_date"),
        expected_return_date: row.get("expected_return_date"),
    };

    Borrowing::from_parts(core, row.get("actual_return_date"))
}

fn map_row_to_payment(row: &PgRow) -> Result<Payment> {
    let type_str: &str = row.get("payment_type");
    let payment_type = PaymentType::from_str(type_str).map_err(invalid_data)?;

    let status_str: &str = row.get("status");
    let status = PaymentStatus::from_str(status_str).map_err(invalid_data)?;

    Ok(Payment {
        payment_id: PaymentId::from_uuid(row.get("payment_id")),
        borrowing_id: BorrowingId::from_uuid(row.get("borrowing_id")),
        payment_type,
        status,
        session_id: row.get("session_id"),
        session_url: row.get("session_url"),
        money_to_pay: row.get("money_to_pay"),
    })
}

/// BorrowingStoreのPostgreSQL実装
///
/// 書籍・貸出・支払いの3テーブルを扱う。
/// 状態を変更する操作はトランザクション（`begin`）経由で行い、
/// 書籍・貸出・支払いは`SELECT ... FOR UPDATE`、利用者は
/// `pg_advisory_xact_lock`で排他制御する。
pub struct BorrowingStore {
    pool: PgPool,
}

impl BorrowingStore {
    /// PostgreSQLコネクションプールから新しいBorrowingStoreを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 貸出の行に支払いを付けて返す
    ///
    /// 支払いは1クエリでまとめて取得する（N+1を避ける）。
    async fn attach_payments(&self, rows: Vec<PgRow>) -> Result<Vec<BorrowingDetails>> {
        let borrowing_ids: Vec<Uuid> = rows.iter().map(|row| row.get("borrowing_id")).collect();

        let payment_rows = sqlx::query(&format!(
            "SELECT {} FROM payments p WHERE p.borrowing_id = ANY($1) ORDER BY p.payment_id",
            PAYMENT_COLUMNS
        ))
        .bind(&borrowing_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut payments_by_borrowing: HashMap<BorrowingId, Vec<Payment>> = HashMap::new();
        for row in &payment_rows {
            let payment = map_row_to_payment(row)?;
            payments_by_borrowing
                .entry(payment.borrowing_id)
                .or_default()
                .push(payment);
        }

        rows.iter()
            .map(|row| {
                let borrowing = map_row_to_borrowing(row);
                let payments = payments_by_borrowing
                    .remove(&borrowing.core().borrowing_id)
                    .unwrap_or_default();
                Ok(BorrowingDetails {
                    borrowing,
                    book: map_row_to_book(row)?,
                    payments,
                })
            })
            .collect()
    }
}

#[async_trait]
impl BorrowingStoreTrait for BorrowingStore {
    async fn begin(&self) -> Result<Box<dyn BorrowingTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn insert_book(&self, book: Book) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO books (book_id, title, author, cover, inventory, daily_fee)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(book.book_id.value())
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.cover.as_str())
        .bind(i32::try_from(book.inventory)?)
        .bind(book.daily_fee)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM books WHERE book_id = $1",
            BOOK_COLUMNS
        ))
        .bind(book_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    async fn get_borrowing(&self, borrowing_id: BorrowingId) -> Result<Option<BorrowingDetails>> {
        let rows = sqlx::query(&format!(
            "{} WHERE br.borrowing_id = $1",
            BORROWING_WITH_BOOK
        ))
        .bind(borrowing_id.value())
        .fetch_all(&self.pool)
        .await?;

        Ok(self.attach_payments(rows).await?.into_iter().next())
    }

    /// 条件に一致する貸出を検索（貸出日の新しい順）
    ///
    /// NULLのパラメータは条件を無効化する。
    async fn find_borrowings(&self, filter: BorrowingFilter) -> Result<Vec<BorrowingDetails>> {
        let rows = sqlx::query(&format!(
            r#"
            {}
            WHERE ($1::uuid IS NULL OR br.user_id = $1)
              AND ($2::bool IS NULL OR (br.actual_return_date IS NULL) = $2)
            ORDER BY br.borrow_date DESC, br.borrowing_id
            "#,
            BORROWING_WITH_BOOK
        ))
        .bind(filter.user_id.map(|user_id| user_id.value()))
        .bind(filter.is_active)
        .fetch_all(&self.pool)
        .await?;

        self.attach_payments(rows).await
    }

    /// 延滞中の貸出を検索
    ///
    /// 部分インデックス（未返却のみ）を使用する。
    async fn find_overdue_borrowings(&self, today: NaiveDate) -> Result<Vec<BorrowingDetails>> {
        let rows = sqlx::query(&format!(
            r#"
            {}
            WHERE br.actual_return_date IS NULL
              AND br.expected_return_date < $1
            ORDER BY br.expected_return_date ASC
            "#,
            BORROWING_WITH_BOOK
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        self.attach_payments(rows).await
    }

    async fn find_pending_payments(&self) -> Result<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM payments p WHERE p.status = 'Pending' ORDER BY p.payment_id",
            PAYMENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_payment).collect()
    }

    async fn find_payment_by_session(&self, session_id: &str) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments p WHERE p.session_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_payment).transpose()
    }

    async fn find_payments_for_user(&self, user_id: UserId) -> Result<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM payments p
            JOIN borrowings br ON br.borrowing_id = p.borrowing_id
            WHERE br.user_id = $1
            ORDER BY br.borrow_date DESC, p.payment_id
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(user_id.value())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_payment).collect()
    }

    async fn get_payment(&self, payment_id: PaymentId) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments p WHERE p.payment_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(payment_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_payment).transpose()
    }
}

/// PostgreSQLトランザクション
///
/// コミットせずにドロップされた場合、sqlxがロールバックする。
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl BorrowingTransaction for PostgresTransaction {
    /// 利用者単位のアドバイザリロック（トランザクション終了で解放）
    async fn lock_user(&mut self, user_id: UserId) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(user_id.value().to_string())
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn lock_book(&mut self, book_id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM books WHERE book_id = $1 FOR UPDATE",
            BOOK_COLUMNS
        ))
        .bind(book_id.value())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    async fn has_active_borrowing(
        &mut self,
        user_id: UserId,
        title: &str,
        cover: CoverType,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM borrowings br
                JOIN books b ON b.book_id = br.book_id
                WHERE br.user_id = $1
                  AND br.actual_return_date IS NULL
                  AND b.title = $2
                  AND b.cover = $3
            )
            "#,
        )
        .bind(user_id.value())
        .bind(title)
        .bind(cover.as_str())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn has_pending_payment(&mut self, user_id: UserId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM payments p
                JOIN borrowings br ON br.borrowing_id = p.borrowing_id
                WHERE br.user_id = $1
                  AND p.status = 'Pending'
            )
            "#,
        )
        .bind(user_id.value())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn has_pending_payment_for_borrowing(
        &mut self,
        borrowing_id: BorrowingId,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM payments WHERE borrowing_id = $1 AND status = 'Pending')",
        )
        .bind(borrowing_id.value())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn lock_borrowing(&mut self, borrowing_id: BorrowingId) -> Result<Option<Borrowing>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM borrowings WHERE borrowing_id = $1 FOR UPDATE",
            BORROWING_COLUMNS
        ))
        .bind(borrowing_id.value())
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.as_ref().map(map_row_to_borrowing))
    }

    async fn lock_payment(&mut self, payment_id: PaymentId) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM payments p WHERE p.payment_id = $1 FOR UPDATE",
            PAYMENT_COLUMNS
        ))
        .bind(payment_id.value())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(map_row_to_payment).transpose()
    }

    async fn save_book(&mut self, book: &Book) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO books (book_id, title, author, cover, inventory, daily_fee)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (book_id)
            DO UPDATE SET
                title = EXCLUDED.title,
                author = EXCLUDED.author,
                cover = EXCLUDED.cover,
                inventory = EXCLUDED.inventory,
                daily_fee = EXCLUDED.daily_fee
            "#,
        )
        .bind(book.book_id.value())
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.cover.as_str())
        .bind(i32::try_from(book.inventory)?)
        .bind(book.daily_fee)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    /// 貸出を保存（upsert）
    ///
    /// 更新されるのはactual_return_dateのみ（他の項目は不変）。
    async fn save_borrowing(&mut self, borrowing: &Borrowing) -> Result<()> {
        let core = borrowing.core();
        sqlx::query(
            r#"
            INSERT INTO borrowings (
                borrowing_id,
                book_id,
                user_id,
                borrow_date,
                expected_return_date,
                actual_return_date
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (borrowing_id)
            DO UPDATE SET actual_return_date = EXCLUDED.actual_return_date
            "#,
        )
        .bind(core.borrowing_id.value())
        .bind(core.book_id.value())
        .bind(core.user_id.value())
        .bind(core.borrow_date)
        .bind(core.expected_return_date)
        .bind(borrowing.actual_return_date())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    /// 支払いを保存（upsert）
    ///
    /// 更新されるのはstatusのみ。
    async fn save_payment(&mut self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                payment_id,
                borrowing_id,
                payment_type,
                status,
                session_id,
                session_url,
                money_to_pay
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (payment_id)
            DO UPDATE SET status = EXCLUDED.status
            "#,
        )
        .bind(payment.payment_id.value())
        .bind(payment.borrowing_id.value())
        .bind(payment.payment_type.as_str())
        .bind(payment.status.as_str())
        .bind(&payment.session_id)
        .bind(&payment.session_url)
        .bind(payment.money_to_pay)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let PostgresTransaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let PostgresTransaction { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}
