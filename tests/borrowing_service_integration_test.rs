mod common;

use common::{add_book, book, date, in_memory_app, with_sink};
use library_borrowing::adapters::mock::NotificationSink;
use library_borrowing::application::borrowing::{
    BorrowingApplicationError, ExpirationReport, PaymentCompletion, ReturnOutcome,
    check_overdue_borrowings, complete_payment, create_borrowing, expire_pending_sessions,
    get_borrowing, list_borrowings, list_payments, renew_payment, return_borrowing,
};
use library_borrowing::domain::commands::*;
use library_borrowing::domain::fees::MAX_RENTAL_DAYS;
use library_borrowing::domain::open_payment;
use library_borrowing::domain::value_objects::*;
use library_borrowing::ports::{BorrowingFilter, BorrowingStore, SessionStatus};
use rust_decimal_macros::dec;

fn borrow(book_id: BookId, user_id: UserId, days: i64) -> BorrowBook {
    let borrow_date = date(2024, 3, 1);
    BorrowBook {
        book_id,
        user_id,
        borrow_date,
        expected_return_date: borrow_date + chrono::Duration::days(days),
    }
}

// ============================================================================
// 貸出作成
// ============================================================================

#[tokio::test]
async fn test_create_borrowing_takes_copy_and_opens_payment() {
    let app = in_memory_app();
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 2, dec!(0.50))).await;
    let user_id = UserId::new();

    let receipt = create_borrowing(&app.deps, borrow(dune.book_id, user_id, 4))
        .await
        .expect("Failed to create borrowing");

    // 在庫が1冊減る
    assert_eq!(app.store.book(dune.book_id).await.unwrap().inventory, 1);

    // 貸出料金 4日 × 0.50 = 2.00 のPending支払いが1件
    assert_eq!(receipt.payment.payment_type, PaymentType::Payment);
    assert_eq!(receipt.payment.status, PaymentStatus::Pending);
    assert_eq!(receipt.payment.money_to_pay, dec!(2.00));
    assert_eq!(receipt.payment.borrowing_id, receipt.borrowing.borrowing_id);

    let payments = app.store.payments().await;
    assert_eq!(payments, vec![receipt.payment.clone()]);

    // 決済サービスには書名と貸出IDが渡る
    let requests = app.gateway.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].description, "Dune");
    assert_eq!(requests[0].currency, "usd");
    assert_eq!(
        requests[0].metadata.get("borrowing_id"),
        Some(&receipt.borrowing.borrowing_id.value().to_string())
    );

    // 職員に通知される
    let messages = app.sink.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("New borrowing has been created"));
}

#[tokio::test]
async fn test_create_borrowing_out_of_stock() {
    let app = in_memory_app();
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 0, dec!(0.50))).await;

    let result = create_borrowing(&app.deps, borrow(dune.book_id, UserId::new(), 4)).await;

    assert!(matches!(result, Err(BorrowingApplicationError::OutOfStock)));
    assert_eq!(app.store.book(dune.book_id).await, Some(dune));
    assert!(app.store.borrowings().await.is_empty());
    assert!(app.gateway.requests().is_empty());
}

#[tokio::test]
async fn test_create_borrowing_unknown_book() {
    let app = in_memory_app();

    let result = create_borrowing(&app.deps, borrow(BookId::new(), UserId::new(), 4)).await;

    assert!(matches!(
        result,
        Err(BorrowingApplicationError::NotFound("Book"))
    ));
}

#[tokio::test]
async fn test_create_borrowing_rejects_return_date_before_borrow_date() {
    let app = in_memory_app();
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 1, dec!(0.50))).await;

    let result = create_borrowing(&app.deps, borrow(dune.book_id, UserId::new(), -1)).await;

    assert!(matches!(
        result,
        Err(BorrowingApplicationError::InvalidReturnDate)
    ));
    assert_eq!(app.store.book(dune.book_id).await.unwrap().inventory, 1);
}

#[tokio::test]
async fn test_create_borrowing_rejects_overlong_rental_before_checkout() {
    let app = in_memory_app();
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 1, dec!(0.50))).await;

    let longest = create_borrowing(
        &app.deps,
        borrow(dune.book_id, UserId::new(), MAX_RENTAL_DAYS),
    )
    .await
    .unwrap();
    assert_eq!(longest.payment.money_to_pay, dec!(182.50));

    let other = add_book(&*app.store, book("Emma", CoverType::Soft, 1, dec!(0.50))).await;
    let result = create_borrowing(
        &app.deps,
        borrow(other.book_id, UserId::new(), MAX_RENTAL_DAYS + 1),
    )
    .await;

    assert!(matches!(
        result,
        Err(BorrowingApplicationError::RentalPeriodTooLong)
    ));
    // 決済セッションは作られない
    assert_eq!(app.gateway.requests().len(), 1);
    assert_eq!(app.store.book(other.book_id).await.unwrap().inventory, 1);
}

#[tokio::test]
async fn test_create_borrowing_with_zero_rental_is_rejected_by_provider() {
    let app = in_memory_app();
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 1, dec!(0.50))).await;

    // 当日返却の予定なので貸出料金は0.00
    let result = create_borrowing(&app.deps, borrow(dune.book_id, UserId::new(), 0)).await;

    assert!(matches!(
        result,
        Err(BorrowingApplicationError::PaymentRejected(_))
    ));
    assert_eq!(app.store.book(dune.book_id).await.unwrap().inventory, 1);
    assert!(app.store.borrowings().await.is_empty());
    assert!(app.store.payments().await.is_empty());
}

#[tokio::test]
async fn test_create_borrowing_rejects_same_title_and_cover() {
    let app = in_memory_app();
    // 同じ書名・装丁で別のカタログエントリ
    let first = add_book(&*app.store, book("Dune", CoverType::Hard, 1, dec!(0.50))).await;
    let second = add_book(&*app.store, book("Dune", CoverType::Hard, 1, dec!(0.50))).await;
    let user_id = UserId::new();

    let receipt = create_borrowing(&app.deps, borrow(first.book_id, user_id, 4))
        .await
        .unwrap();

    // 支払いを済ませてから2冊目を借りようとする
    app.gateway
        .set_status(&receipt.payment.session_id, SessionStatus::Paid);
    complete_payment(
        &app.deps,
        CompletePayment {
            session_id: receipt.payment.session_id.clone(),
        },
    )
    .await
    .unwrap();

    let result = create_borrowing(&app.deps, borrow(second.book_id, user_id, 4)).await;

    assert!(matches!(
        result,
        Err(BorrowingApplicationError::DuplicateActiveBorrowing)
    ));
    assert_eq!(app.store.book(second.book_id).await.unwrap().inventory, 1);
}

#[tokio::test]
async fn test_create_borrowing_allows_other_cover() {
    let app = in_memory_app();
    let hard = add_book(&*app.store, book("Dune", CoverType::Hard, 1, dec!(0.50))).await;
    let soft = add_book(&*app.store, book("Dune", CoverType::Soft, 1, dec!(0.30))).await;
    let user_id = UserId::new();

    let receipt = create_borrowing(&app.deps, borrow(hard.book_id, user_id, 4))
        .await
        .unwrap();
    app.gateway
        .set_status(&receipt.payment.session_id, SessionStatus::Paid);
    complete_payment(
        &app.deps,
        CompletePayment {
            session_id: receipt.payment.session_id,
        },
    )
    .await
    .unwrap();

    let result = create_borrowing(&app.deps, borrow(soft.book_id, user_id, 4)).await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_create_borrowing_rejects_user_with_pending_payment() {
    let app = in_memory_app();
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 1, dec!(0.50))).await;
    let emma = add_book(&*app.store, book("Emma", CoverType::Soft, 1, dec!(0.25))).await;
    let user_id = UserId::new();

    create_borrowing(&app.deps, borrow(dune.book_id, user_id, 4))
        .await
        .unwrap();

    // 1件目の支払いがPendingのまま
    let result = create_borrowing(&app.deps, borrow(emma.book_id, user_id, 2)).await;

    assert!(matches!(
        result,
        Err(BorrowingApplicationError::ConflictingPendingPayment)
    ));
    assert_eq!(app.store.book(emma.book_id).await.unwrap().inventory, 1);
}

#[tokio::test]
async fn test_create_borrowing_rolls_back_when_session_fails() {
    let app = in_memory_app();
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 1, dec!(0.50))).await;
    app.gateway.fail_sessions(true);

    let result = create_borrowing(&app.deps, borrow(dune.book_id, UserId::new(), 4)).await;

    assert!(matches!(
        result,
        Err(BorrowingApplicationError::PaymentSessionFailure(_))
    ));
    // 在庫・貸出・支払いのどれも残らない
    assert_eq!(app.store.book(dune.book_id).await.unwrap().inventory, 1);
    assert!(app.store.borrowings().await.is_empty());
    assert!(app.store.payments().await.is_empty());
    assert!(app.sink.messages().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_borrowings_of_last_copy() {
    let app = in_memory_app();
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 1, dec!(0.50))).await;

    let first = borrow(dune.book_id, UserId::new(), 4);
    let second = borrow(dune.book_id, UserId::new(), 4);

    let (a, b) = tokio::join!(
        create_borrowing(&app.deps, first),
        create_borrowing(&app.deps, second)
    );

    let succeeded = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(succeeded, 1);
    assert!(
        matches!(a, Err(BorrowingApplicationError::OutOfStock))
            || matches!(b, Err(BorrowingApplicationError::OutOfStock))
    );
    assert_eq!(app.store.book(dune.book_id).await.unwrap().inventory, 0);
    assert_eq!(app.store.borrowings().await.len(), 1);
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_borrowing() {
    let app = with_sink(NotificationSink::failing());
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 1, dec!(0.50))).await;

    let result = create_borrowing(&app.deps, borrow(dune.book_id, UserId::new(), 4)).await;

    assert!(result.is_ok());
    assert_eq!(app.store.borrowings().await.len(), 1);
}

// ============================================================================
// 返却
// ============================================================================

#[tokio::test]
async fn test_return_on_time_restores_inventory() {
    let app = in_memory_app();
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 2, dec!(0.50))).await;
    let receipt = create_borrowing(&app.deps, borrow(dune.book_id, UserId::new(), 4))
        .await
        .unwrap();

    let returned = return_borrowing(
        &app.deps,
        ReturnBook {
            borrowing_id: receipt.borrowing.borrowing_id,
            returned_on: date(2024, 3, 5),
        },
    )
    .await
    .expect("Failed to return book");

    assert_eq!(returned.outcome, ReturnOutcome::OnTime);
    assert_eq!(returned.borrowing.actual_return_date, date(2024, 3, 5));
    assert_eq!(app.store.book(dune.book_id).await.unwrap().inventory, 2);
    // 延滞料金の支払いは作られない
    assert_eq!(app.store.payments().await.len(), 1);
}

#[tokio::test]
async fn test_late_return_opens_fine_payment() {
    let app = in_memory_app();
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 2, dec!(0.50))).await;
    let receipt = create_borrowing(&app.deps, borrow(dune.book_id, UserId::new(), 4))
        .await
        .unwrap();
    assert_eq!(receipt.payment.money_to_pay, dec!(2.00));

    // 2日遅れ: 2 × 0.50 × 2 = 2.00
    let returned = return_borrowing(
        &app.deps,
        ReturnBook {
            borrowing_id: receipt.borrowing.borrowing_id,
            returned_on: date(2024, 3, 7),
        },
    )
    .await
    .unwrap();

    let ReturnOutcome::FineDue { fine, payment } = returned.outcome else {
        panic!("Expected a fine");
    };
    assert_eq!(fine, dec!(2.00));
    assert_eq!(payment.payment_type, PaymentType::Fine);
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.money_to_pay, dec!(2.00));

    assert_eq!(app.store.book(dune.book_id).await.unwrap().inventory, 2);
    assert_eq!(app.gateway.requests()[1].description, "Fine: Dune");

    let messages = app.sink.messages();
    assert!(messages.last().unwrap().contains("has to pay 2.00$ fine"));
}

#[tokio::test]
async fn test_late_return_of_free_book_has_no_fine_payment() {
    let app = in_memory_app();
    let free = add_book(&*app.store, book("Dune", CoverType::Hard, 1, dec!(0.50))).await;
    let receipt = create_borrowing(&app.deps, borrow(free.book_id, UserId::new(), 4))
        .await
        .unwrap();

    // 貸出後に日額が0になった書籍
    let mut tx = app.store.begin().await.unwrap();
    let current = tx.lock_book(free.book_id).await.unwrap().unwrap();
    tx.save_book(&library_borrowing::domain::Book {
        daily_fee: dec!(0.00),
        ..current
    })
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let returned = return_borrowing(
        &app.deps,
        ReturnBook {
            borrowing_id: receipt.borrowing.borrowing_id,
            returned_on: date(2024, 3, 10),
        },
    )
    .await
    .expect("Late return of a free book must succeed");

    assert_eq!(returned.outcome, ReturnOutcome::OnTime);
    assert_eq!(app.store.payments().await.len(), 1);
    assert_eq!(app.store.book(free.book_id).await.unwrap().inventory, 1);
}

#[tokio::test]
async fn test_return_twice_is_rejected() {
    let app = in_memory_app();
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 1, dec!(0.50))).await;
    let receipt = create_borrowing(&app.deps, borrow(dune.book_id, UserId::new(), 4))
        .await
        .unwrap();
    let cmd = ReturnBook {
        borrowing_id: receipt.borrowing.borrowing_id,
        returned_on: date(2024, 3, 3),
    };

    return_borrowing(&app.deps, cmd.clone()).await.unwrap();
    let result = return_borrowing(&app.deps, cmd).await;

    assert!(matches!(
        result,
        Err(BorrowingApplicationError::AlreadyReturned)
    ));
    assert_eq!(app.store.book(dune.book_id).await.unwrap().inventory, 1);
}

#[tokio::test]
async fn test_return_unknown_borrowing() {
    let app = in_memory_app();

    let result = return_borrowing(
        &app.deps,
        ReturnBook {
            borrowing_id: BorrowingId::new(),
            returned_on: date(2024, 3, 3),
        },
    )
    .await;

    assert!(matches!(
        result,
        Err(BorrowingApplicationError::NotFound("Borrowing"))
    ));
}

#[tokio::test]
async fn test_late_return_rolls_back_when_fine_session_fails() {
    let app = in_memory_app();
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 1, dec!(0.50))).await;
    let receipt = create_borrowing(&app.deps, borrow(dune.book_id, UserId::new(), 4))
        .await
        .unwrap();
    app.gateway.fail_sessions(true);

    let result = return_borrowing(
        &app.deps,
        ReturnBook {
            borrowing_id: receipt.borrowing.borrowing_id,
            returned_on: date(2024, 3, 10),
        },
    )
    .await;

    assert!(matches!(
        result,
        Err(BorrowingApplicationError::PaymentSessionFailure(_))
    ));
    // 貸出中のまま
    let details = get_borrowing(&app.deps, receipt.borrowing.borrowing_id)
        .await
        .unwrap();
    assert!(details.borrowing.is_active());
    assert_eq!(details.book.inventory, 0);
}

// ============================================================================
// 照会
// ============================================================================

#[tokio::test]
async fn test_list_borrowings_filters() {
    let app = in_memory_app();
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 5, dec!(0.50))).await;
    let alice = UserId::new();
    let bob = UserId::new();

    let alices = create_borrowing(&app.deps, borrow(dune.book_id, alice, 4))
        .await
        .unwrap();
    create_borrowing(&app.deps, borrow(dune.book_id, bob, 4))
        .await
        .unwrap();
    return_borrowing(
        &app.deps,
        ReturnBook {
            borrowing_id: alices.borrowing.borrowing_id,
            returned_on: date(2024, 3, 2),
        },
    )
    .await
    .unwrap();

    let all = list_borrowings(&app.deps, BorrowingFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let alice_only = list_borrowings(
        &app.deps,
        BorrowingFilter {
            user_id: Some(alice),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(alice_only.len(), 1);
    assert_eq!(alice_only[0].payments.len(), 1);

    let active = list_borrowings(
        &app.deps,
        BorrowingFilter {
            is_active: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].borrowing.core().user_id, bob);

    let payments = list_payments(&app.deps, alice).await.unwrap();
    assert_eq!(payments.len(), 1);
}

// ============================================================================
// 延滞チェック
// ============================================================================

#[tokio::test]
async fn test_overdue_check_without_overdue_borrowings() {
    let app = in_memory_app();
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 1, dec!(0.50))).await;
    create_borrowing(&app.deps, borrow(dune.book_id, UserId::new(), 4))
        .await
        .unwrap();

    // 返却予定日当日はまだ延滞ではない
    let count = check_overdue_borrowings(&app.deps, date(2024, 3, 5))
        .await
        .unwrap();

    assert_eq!(count, 0);
    assert_eq!(
        app.sink.messages().last().unwrap(),
        "No borrowings overdue today!"
    );
}

#[tokio::test]
async fn test_overdue_check_notifies_each_overdue_borrowing() {
    let app = in_memory_app();
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 5, dec!(0.50))).await;
    create_borrowing(&app.deps, borrow(dune.book_id, UserId::new(), 4))
        .await
        .unwrap();
    create_borrowing(&app.deps, borrow(dune.book_id, UserId::new(), 2))
        .await
        .unwrap();
    let before = app.sink.messages().len();

    let count = check_overdue_borrowings(&app.deps, date(2024, 3, 6))
        .await
        .unwrap();

    assert_eq!(count, 2);
    let messages = app.sink.messages();
    assert_eq!(messages.len(), before + 2);
    assert!(
        messages[before..]
            .iter()
            .all(|m| m.starts_with("Overdue borrowing!"))
    );
}

// ============================================================================
// 決済
// ============================================================================

#[tokio::test]
async fn test_complete_payment_marks_paid_once() {
    let app = in_memory_app();
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 1, dec!(0.50))).await;
    let receipt = create_borrowing(&app.deps, borrow(dune.book_id, UserId::new(), 4))
        .await
        .unwrap();
    let cmd = CompletePayment {
        session_id: receipt.payment.session_id.clone(),
    };

    // まだ支払われていない
    let pending = complete_payment(&app.deps, cmd.clone()).await.unwrap();
    assert!(matches!(pending, PaymentCompletion::NotPaid(_)));

    app.gateway
        .set_status(&receipt.payment.session_id, SessionStatus::Paid);

    let completed = complete_payment(&app.deps, cmd.clone()).await.unwrap();
    let PaymentCompletion::Paid(paid) = completed else {
        panic!("Expected payment to be completed");
    };
    assert_eq!(paid.status, PaymentStatus::Paid);
    assert!(app.sink.messages().last().unwrap().starts_with("Payment received"));

    // 2回目は何も変えない
    let again = complete_payment(&app.deps, cmd).await.unwrap();
    assert_eq!(again, PaymentCompletion::AlreadySettled(paid));
}

#[tokio::test]
async fn test_complete_payment_unknown_session() {
    let app = in_memory_app();

    let result = complete_payment(
        &app.deps,
        CompletePayment {
            session_id: "cs_unknown".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(result, PaymentCompletion::UnknownSession);
}

#[tokio::test]
async fn test_expire_pending_sessions() {
    let app = in_memory_app();
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 5, dec!(0.50))).await;
    let expiring = create_borrowing(&app.deps, borrow(dune.book_id, UserId::new(), 4))
        .await
        .unwrap();
    create_borrowing(&app.deps, borrow(dune.book_id, UserId::new(), 4))
        .await
        .unwrap();
    app.gateway
        .set_status(&expiring.payment.session_id, SessionStatus::Expired);

    let report = expire_pending_sessions(&app.deps).await.unwrap();

    assert_eq!(
        report,
        ExpirationReport {
            checked: 2,
            expired: 1,
            failed: 0,
        }
    );
    let payments = app.store.payments().await;
    let expired = payments
        .iter()
        .find(|p| p.payment_id == expiring.payment.payment_id)
        .unwrap();
    assert_eq!(expired.status, PaymentStatus::Expired);
    assert_eq!(
        app.sink.messages().last().unwrap(),
        "1 payment session(s) expired"
    );

    // 2回目は期限切れの支払いを再処理しない
    let report = expire_pending_sessions(&app.deps).await.unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.expired, 0);
    assert_eq!(
        app.sink.messages().last().unwrap(),
        "No payment sessions expired"
    );
}

#[tokio::test]
async fn test_expire_pending_sessions_continues_after_lookup_failure() {
    let app = in_memory_app();
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 5, dec!(0.50))).await;
    let expiring = create_borrowing(&app.deps, borrow(dune.book_id, UserId::new(), 4))
        .await
        .unwrap();
    app.gateway
        .set_status(&expiring.payment.session_id, SessionStatus::Expired);

    // 決済サービスが知らないセッションのPending支払い（問い合わせは失敗する）
    let lost = create_borrowing(&app.deps, borrow(dune.book_id, UserId::new(), 2))
        .await
        .unwrap();
    app.gateway
        .set_status(&lost.payment.session_id, SessionStatus::Paid);
    complete_payment(
        &app.deps,
        CompletePayment {
            session_id: lost.payment.session_id,
        },
    )
    .await
    .unwrap();
    let unknown = open_payment(
        lost.borrowing.borrowing_id,
        PaymentType::Payment,
        dec!(1.00),
        "cs_lost".to_string(),
        "https://checkout.mock/pay/cs_lost".to_string(),
    );
    let mut tx = app.store.begin().await.unwrap();
    tx.save_payment(&unknown).await.unwrap();
    tx.commit().await.unwrap();
    let before = app.sink.messages().len();

    let report = expire_pending_sessions(&app.deps).await.unwrap();

    assert_eq!(
        report,
        ExpirationReport {
            checked: 2,
            expired: 1,
            failed: 1,
        }
    );
    let payments = app.store.payments().await;
    let status_of = |id: PaymentId| payments.iter().find(|p| p.payment_id == id).unwrap().status;
    assert_eq!(status_of(expiring.payment.payment_id), PaymentStatus::Expired);
    assert_eq!(status_of(unknown.payment_id), PaymentStatus::Pending);

    // サマリ通知は1件だけ
    let messages = app.sink.messages();
    assert_eq!(messages.len(), before + 1);
    assert_eq!(messages.last().unwrap(), "1 payment session(s) expired");
}

#[tokio::test]
async fn test_complete_payment_after_expiration_is_settled() {
    let app = in_memory_app();
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 1, dec!(0.50))).await;
    let receipt = create_borrowing(&app.deps, borrow(dune.book_id, UserId::new(), 4))
        .await
        .unwrap();
    app.gateway
        .set_status(&receipt.payment.session_id, SessionStatus::Expired);
    expire_pending_sessions(&app.deps).await.unwrap();

    let result = complete_payment(
        &app.deps,
        CompletePayment {
            session_id: receipt.payment.session_id,
        },
    )
    .await
    .unwrap();

    let PaymentCompletion::AlreadySettled(payment) = result else {
        panic!("Expected settled payment");
    };
    assert_eq!(payment.status, PaymentStatus::Expired);
}

#[tokio::test]
async fn test_renew_expired_payment() {
    let app = in_memory_app();
    let dune = add_book(&*app.store, book("Dune", CoverType::Hard, 1, dec!(0.50))).await;
    let receipt = create_borrowing(&app.deps, borrow(dune.book_id, UserId::new(), 4))
        .await
        .unwrap();

    // Pendingのままでは更新できない
    let result = renew_payment(
        &app.deps,
        RenewPayment {
            payment_id: receipt.payment.payment_id,
        },
    )
    .await;
    assert!(matches!(
        result,
        Err(BorrowingApplicationError::PaymentNotRenewable)
    ));

    app.gateway
        .set_status(&receipt.payment.session_id, SessionStatus::Expired);
    expire_pending_sessions(&app.deps).await.unwrap();

    let renewed = renew_payment(
        &app.deps,
        RenewPayment {
            payment_id: receipt.payment.payment_id,
        },
    )
    .await
    .expect("Failed to renew payment");

    assert_ne!(renewed.payment_id, receipt.payment.payment_id);
    assert_ne!(renewed.session_id, receipt.payment.session_id);
    assert_eq!(renewed.status, PaymentStatus::Pending);
    assert_eq!(renewed.payment_type, PaymentType::Payment);
    assert_eq!(renewed.money_to_pay, dec!(2.00));
    // 期限切れの支払いは残る
    assert_eq!(app.store.payments().await.len(), 2);

    // 同じ貸出にPendingがあるので再度の更新はできない
    let result = renew_payment(
        &app.deps,
        RenewPayment {
            payment_id: receipt.payment.payment_id,
        },
    )
    .await;
    assert!(matches!(
        result,
        Err(BorrowingApplicationError::ConflictingPendingPayment)
    ));
}

#[tokio::test]
async fn test_renew_unknown_payment() {
    let app = in_memory_app();

    let result = renew_payment(
        &app.deps,
        RenewPayment {
            payment_id: PaymentId::new(),
        },
    )
    .await;

    assert!(matches!(
        result,
        Err(BorrowingApplicationError::NotFound("Payment"))
    ));
}
