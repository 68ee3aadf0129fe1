//! 料金計算
//!
//! 副作用のない純粋関数のみ。金額はすべて`Decimal`で扱い、浮動小数点は使わない。

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

/// 延滞1日あたりの倍率（日額料金に対して）
pub const FINE_MULTIPLIER: i64 = 2;

/// 1回の貸出で予約できる最長日数
pub const MAX_RENTAL_DAYS: i64 = 365;

/// 金額の小数点以下桁数
const MONEY_SCALE: u32 = 2;

fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// 貸出日数
///
/// 返却予定日 - 貸出日。検証は行わないため0や負数もあり得る。
pub fn rental_days(borrow_date: NaiveDate, expected_return_date: NaiveDate) -> i64 {
    (expected_return_date - borrow_date).num_days()
}

/// 貸出料金
///
/// 貸出時点で予定期間分を請求する。早期返却でも再計算しない。
pub fn rental_amount(days: i64, daily_fee: Decimal) -> Decimal {
    round_money(Decimal::from(days) * daily_fee)
}

/// 延滞料金
///
/// 返却予定日以内の返却は0.00。
/// 遅れた場合は 延滞日数 × 日額 × FINE_MULTIPLIER。
pub fn fine(
    expected_return_date: NaiveDate,
    actual_return_date: NaiveDate,
    daily_fee: Decimal,
) -> Decimal {
    let days_late = (actual_return_date - expected_return_date).num_days();
    if days_late <= 0 {
        return Decimal::new(0, MONEY_SCALE);
    }

    round_money(Decimal::from(days_late) * daily_fee * Decimal::from(FINE_MULTIPLIER))
}
