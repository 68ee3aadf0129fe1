use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 貸出ID - 貸出集約のID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BorrowingId(Uuid);

impl BorrowingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for BorrowingId {
    fn default() -> Self {
        Self::new()
    }
}

/// 書籍ID - カタログへの参照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookId(Uuid);

impl BookId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for BookId {
    fn default() -> Self {
        Self::new()
    }
}

/// 利用者ID - 認証基盤が管理する利用者への参照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

/// 支払いID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(Uuid);

impl PaymentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

/// 装丁
///
/// 書名と装丁の組が「同じ本」の単位になる（同一版の物理コピーは交換可能）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoverType {
    Hard,
    Soft,
}

impl CoverType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverType::Hard => "Hard",
            CoverType::Soft => "Soft",
        }
    }
}

impl std::str::FromStr for CoverType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Hard" => Ok(CoverType::Hard),
            "Soft" => Ok(CoverType::Soft),
            _ => Err(format!("Invalid cover type: {}", s)),
        }
    }
}

/// 支払い種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentType {
    /// 貸出料金
    Payment,
    /// 延滞料金
    Fine,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Payment => "Payment",
            PaymentType::Fine => "Fine",
        }
    }
}

impl std::str::FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Payment" => Ok(PaymentType::Payment),
            "Fine" => Ok(PaymentType::Fine),
            _ => Err(format!("Invalid payment type: {}", s)),
        }
    }
}

/// 支払いステータス
///
/// Paid と Expired は終端状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Expired => "Expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(PaymentStatus::Pending),
            "Paid" => Ok(PaymentStatus::Paid),
            "Expired" => Ok(PaymentStatus::Expired),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_borrowing_id_creation() {
        let id1 = BorrowingId::new();
        let id2 = BorrowingId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_book_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = BookId::from_uuid(uuid);
        assert_eq!(id.value(), uuid);
    }

    #[test]
    fn test_cover_type_round_trips_through_str() {
        for cover in [CoverType::Hard, CoverType::Soft] {
            assert_eq!(CoverType::from_str(cover.as_str()), Ok(cover));
        }
        assert!(CoverType::from_str("Paperback").is_err());
    }

    #[test]
    fn test_payment_status_terminal_states() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Paid.is_terminal());
        assert!(PaymentStatus::Expired.is_terminal());
    }

    #[test]
    fn test_payment_type_from_invalid_str() {
        let result = PaymentType::from_str("Deposit");
        assert_eq!(result, Err("Invalid payment type: Deposit".to_string()));
    }
}
