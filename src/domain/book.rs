use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BookId, CoverType};

/// 書籍（カタログの1エントリ）
///
/// inventoryは貸出可能な物理コピーの冊数。型(u32)で非負を保証する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: BookId,
    pub title: String,
    pub author: String,
    pub cover: CoverType,
    pub inventory: u32,
    pub daily_fee: Decimal,
}

impl Book {
    pub fn is_in_stock(&self) -> bool {
        self.inventory > 0
    }

    /// 在庫を1冊減らした書籍を返す。在庫切れならNone。
    pub fn take_copy(&self) -> Option<Book> {
        let inventory = self.inventory.checked_sub(1)?;
        Some(Book {
            inventory,
            ..self.clone()
        })
    }

    /// 在庫を1冊戻した書籍を返す
    pub fn put_back_copy(&self) -> Book {
        Book {
            inventory: self.inventory + 1,
            ..self.clone()
        }
    }
}
