mod common;

use bank_ledger::config::LedgerConfig;
use bank_ledger::domain::credit::PaymentStatus;
use bank_ledger::domain::ports::Notification;
use bank_ledger::domain::transaction::TransactionKind;
use bank_ledger::error::{Entity, LedgerError};
use bank_ledger::infrastructure::rate::{FixedRateProvider, UnavailableRateProvider};
use chrono::{Datelike, TimeZone, Utc};
use common::{Harness, SlowRateProvider};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::Ordering;
use std::time::Duration;

// Base rate 5% plus the default 5 point margin prices credits at 10%.
fn harness() -> Harness {
    Harness::new(FixedRateProvider::new(5.0))
}

#[tokio::test]
async fn test_issue_credit_builds_annuity_schedule() {
    let mut h = harness();
    let account = h.open_funded(7, dec!(100)).await;

    let issued = h
        .engine
        .issuer()
        .issue_credit(7, account, dec!(1200), 12)
        .await
        .unwrap();

    assert_eq!(issued.credit.interest_rate, dec!(10));
    assert_eq!(issued.credit.principal, dec!(1200));
    assert_eq!(issued.schedule.len(), 12);

    let first = &issued.schedule[0];
    assert_eq!(first.payment_number, 1);
    assert_eq!(first.interest, dec!(10.00));
    assert_eq!(first.amount, dec!(105.50));
    assert_eq!(first.principal, dec!(95.50));

    let principal: Decimal = issued.schedule.iter().map(|e| e.principal).sum();
    assert_eq!(principal, dec!(1200));
    assert!(issued.schedule.iter().all(|e| e.status == PaymentStatus::Pending));

    // The principal is paid out to the funding account.
    assert_eq!(h.balance(account).await, dec!(1300));
    assert_eq!(h.ledger_net(account).await, dec!(1300));
    let history = h.engine.ledger().history(account).await.unwrap();
    assert_eq!(history.last().unwrap().kind, TransactionKind::Disbursement);

    let stored = h
        .engine
        .issuer()
        .payment_schedule(issued.credit.id)
        .await
        .unwrap();
    assert_eq!(stored, issued.schedule);

    assert_eq!(
        h.drain_notifications(),
        vec![Notification::CreditIssued {
            user: 7,
            credit: issued.credit.id,
            principal: dec!(1200),
            first_due: Utc.with_ymd_and_hms(2024, 2, 15, 9, 0, 0).unwrap(),
        }]
    );
}

#[tokio::test]
async fn test_schedule_due_dates_follow_issue_date() {
    let h = harness();
    let account = h.open_funded(7, Decimal::ZERO).await;

    let issued = h
        .engine
        .issuer()
        .issue_credit(7, account, dec!(5000), 24)
        .await
        .unwrap();

    let numbers: Vec<u32> = issued.schedule.iter().map(|e| e.payment_number).collect();
    assert_eq!(numbers, (1..=24).collect::<Vec<_>>());
    for pair in issued.schedule.windows(2) {
        assert!(pair[0].due_date < pair[1].due_date);
        assert_eq!(pair[1].due_date.day(), 15);
    }
    let last = issued.schedule.last().unwrap();
    assert_eq!(last.due_date, Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap());
}

#[tokio::test]
async fn test_unavailable_rate_writes_nothing() {
    let mut h = Harness::new(UnavailableRateProvider::new("central bank down"));
    let account = h.open_funded(7, dec!(100)).await;

    let err = h
        .engine
        .issuer()
        .issue_credit(7, account, dec!(1200), 12)
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::ExternalServiceUnavailable(_)));
    assert!(err.is_retryable());
    assert!(h.engine.issuer().credits_for_user(7).await.unwrap().is_empty());
    assert_eq!(h.balance(account).await, dec!(100));
    assert!(h.drain_notifications().is_empty());
}

#[tokio::test]
async fn test_slow_rate_source_times_out() {
    let config = LedgerConfig {
        rate_timeout_ms: 50,
        ..LedgerConfig::default()
    };
    let h = Harness::with_config(
        SlowRateProvider {
            delay: Duration::from_secs(5),
            rate: 5.0,
        },
        config,
    );
    let account = h.open_funded(7, dec!(100)).await;

    let err = h
        .engine
        .issuer()
        .issue_credit(7, account, dec!(1200), 12)
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::ExternalServiceUnavailable(_)));
    assert!(h.engine.issuer().credits_for_user(7).await.unwrap().is_empty());
    assert_eq!(h.balance(account).await, dec!(100));
}

#[tokio::test]
async fn test_failed_credit_record_leaves_no_trace() {
    let h = harness();
    let account = h.open_funded(7, dec!(100)).await;
    h.credits.fail_put_credit.store(true, Ordering::SeqCst);

    let err = h
        .engine
        .issuer()
        .issue_credit(7, account, dec!(1200), 12)
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::Storage(_)));
    assert!(h.engine.issuer().credits_for_user(7).await.unwrap().is_empty());
    assert_eq!(h.balance(account).await, dec!(100));
}

#[tokio::test]
async fn test_failed_disbursement_deletes_credit() {
    let h = harness();
    let account = h.open_funded(7, dec!(100)).await;
    h.accounts
        .fail_adjust_when(move |id, delta| id == account && delta > Decimal::ZERO);

    let err = h
        .engine
        .issuer()
        .issue_credit(7, account, dec!(1200), 12)
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::Storage(_)));
    assert!(h.engine.issuer().credits_for_user(7).await.unwrap().is_empty());
    assert_eq!(h.balance(account).await, dec!(100));
    assert_eq!(h.ledger_net(account).await, dec!(100));
}

#[tokio::test]
async fn test_failed_schedule_reverses_disbursement() {
    let mut h = harness();
    let account = h.open_funded(7, dec!(100)).await;
    h.credits.fail_put_schedule.store(true, Ordering::SeqCst);

    let err = h
        .engine
        .issuer()
        .issue_credit(7, account, dec!(1200), 12)
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::Storage(_)));
    assert!(h.engine.issuer().credits_for_user(7).await.unwrap().is_empty());
    assert!(matches!(
        h.engine.issuer().get_credit(1).await,
        Err(LedgerError::NotFound {
            entity: Entity::Credit,
            ..
        })
    ));
    assert_eq!(h.balance(account).await, dec!(100));

    let kinds: Vec<_> = h
        .engine
        .ledger()
        .history(account)
        .await
        .unwrap()
        .iter()
        .map(|t| t.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            TransactionKind::Deposit,
            TransactionKind::Disbursement,
            TransactionKind::Reversal
        ]
    );
    assert_eq!(h.ledger_net(account).await, dec!(100));
    assert!(h.drain_notifications().is_empty());
}

#[tokio::test]
async fn test_failed_compensation_reports_inconsistency() {
    let h = harness();
    let account = h.open_funded(7, dec!(100)).await;
    h.credits.fail_put_schedule.store(true, Ordering::SeqCst);
    h.credits.fail_delete.store(true, Ordering::SeqCst);

    let err = h
        .engine
        .issuer()
        .issue_credit(7, account, dec!(1200), 12)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LedgerError::Consistency {
            operation: "issue credit",
            ..
        }
    ));
    // The money movement is still reversed even though the record stays.
    assert_eq!(h.balance(account).await, dec!(100));
}

#[tokio::test]
async fn test_issue_credit_rejects_invalid_requests() {
    let h = harness();
    let account = h.open_funded(7, dec!(100)).await;
    let issuer = h.engine.issuer();

    assert!(matches!(
        issuer.issue_credit(7, account, dec!(1200), 0).await,
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        issuer.issue_credit(7, account, dec!(1200), 361).await,
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        issuer.issue_credit(7, account, dec!(-5), 12).await,
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        issuer.issue_credit(8, account, dec!(1200), 12).await,
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        issuer.issue_credit(7, 99, dec!(1200), 12).await,
        Err(LedgerError::NotFound {
            entity: Entity::Account,
            id: 99
        })
    ));
    assert_eq!(h.balance(account).await, dec!(100));
}

#[tokio::test]
async fn test_principal_below_one_cent_per_month_is_rejected() {
    let mut h = harness();
    let account = h.open_funded(7, dec!(100)).await;

    let err = h
        .engine
        .issuer()
        .issue_credit(7, account, dec!(0.01), 12)
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::Validation(_)));
    assert!(h.engine.issuer().credits_for_user(7).await.unwrap().is_empty());
    assert_eq!(h.balance(account).await, dec!(100));
    assert_eq!(h.engine.ledger().history(account).await.unwrap().len(), 1);
    assert!(h.drain_notifications().is_empty());
}

#[tokio::test]
async fn test_margin_comes_from_config() {
    let config = LedgerConfig {
        fixed_margin: dec!(2.5),
        ..LedgerConfig::default()
    };
    let h = Harness::with_config(FixedRateProvider::new(16.0), config);
    let account = h.open_funded(7, Decimal::ZERO).await;

    let issued = h
        .engine
        .issuer()
        .issue_credit(7, account, dec!(1000), 6)
        .await
        .unwrap();

    assert_eq!(issued.credit.interest_rate, dec!(18.5));
}
