mod common;

use chargepay::application::engine::HistoryFilter;
use chargepay::domain::events::PaymentEvent;
use chargepay::domain::transaction::TransactionStatus;
use chargepay::error::{LedgerError, PaymentError};
use chargepay::infrastructure::ledger::ScriptedFailure;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_transient_failure_then_keyed_retry_pays_once() {
    let h = common::harness();
    let view = h
        .engine
        .initialize_session("chg-1", "user-1", "stn-1")
        .await
        .unwrap();

    h.xrpl
        .enqueue_failure(ScriptedFailure::Transient {
            code: "tooBusy".to_string(),
            message: "server is overloaded".to_string(),
        })
        .await;
    let err = h
        .engine
        .process_micropayment(&view.id, dec!(1.0), dec!(1.0), "attempt-1")
        .await
        .unwrap_err();
    match err {
        PaymentError::Ledger(ledger) => assert!(ledger.should_retry()),
        other => panic!("expected ledger error, got {:?}", other),
    }

    // Totals untouched while the record sits Pending.
    let session = h.engine.get_session(&view.id).await.unwrap();
    assert_eq!(session.total_amount_paid, dec!(0.0));

    let tx = h
        .engine
        .process_micropayment(&view.id, dec!(1.0), dec!(1.0), "attempt-1")
        .await
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Confirmed);

    let history = h
        .engine
        .get_payment_history("user-1", HistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(h.xrpl.executed_count().await, 1);
}

#[tokio::test]
async fn test_unknown_outcome_reconciles_without_double_payment() {
    let h = common::harness();
    let view = h
        .engine
        .initialize_session("chg-1", "user-1", "stn-1")
        .await
        .unwrap();

    // The ledger executes the payment but the caller only sees a timeout.
    h.xrpl
        .enqueue_failure(ScriptedFailure::Unknown { executed: true })
        .await;
    let err = h
        .engine
        .process_micropayment(&view.id, dec!(2.0), dec!(1.0), "attempt-1")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PaymentError::Ledger(LedgerError::Unknown { .. })
    ));

    let tx = h
        .engine
        .process_micropayment(&view.id, dec!(2.0), dec!(1.0), "attempt-1")
        .await
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Confirmed);
    assert!(tx.transaction_hash.is_some());

    // Reconciliation adopted the earlier submission; exactly one payment.
    assert_eq!(h.xrpl.executed_count().await, 1);
    let session = h.engine.get_session(&view.id).await.unwrap();
    assert_eq!(session.total_amount_paid, dec!(1.0));
    let wallet = h
        .engine
        .get_wallet_info(&view.source_wallet_address)
        .await
        .unwrap();
    assert_eq!(wallet.balance, dec!(99.0));
}

#[tokio::test]
async fn test_unknown_outcome_unexecuted_resubmits_safely() {
    let h = common::harness();
    let view = h
        .engine
        .initialize_session("chg-1", "user-1", "stn-1")
        .await
        .unwrap();

    h.xrpl
        .enqueue_failure(ScriptedFailure::Unknown { executed: false })
        .await;
    h.engine
        .process_micropayment(&view.id, dec!(2.0), dec!(1.0), "attempt-1")
        .await
        .unwrap_err();

    let tx = h
        .engine
        .process_micropayment(&view.id, dec!(2.0), dec!(1.0), "attempt-1")
        .await
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Confirmed);
    assert_eq!(h.xrpl.executed_count().await, 1);

    let history = h
        .engine
        .get_payment_history("user-1", HistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_permanent_failure_records_failed_and_keeps_session_open() {
    let h = common::harness();
    let view = h
        .engine
        .initialize_session("chg-1", "user-1", "stn-1")
        .await
        .unwrap();

    h.xrpl
        .enqueue_failure(ScriptedFailure::Permanent {
            code: "temMALFORMED".to_string(),
            message: "malformed transaction".to_string(),
        })
        .await;
    let tx = h
        .engine
        .process_micropayment(&view.id, dec!(2.0), dec!(1.0), "attempt-1")
        .await
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Failed);
    assert!(tx.transaction_hash.is_none());

    let session = h.engine.get_session(&view.id).await.unwrap();
    assert_eq!(session.total_amount_paid, dec!(0.0));
    assert!(session.transaction_hashes.is_empty());

    let events = h.publisher.events().await;
    match events.last().unwrap() {
        PaymentEvent::PaymentFailed {
            should_retry,
            error_code,
            ..
        } => {
            assert!(!should_retry);
            assert_eq!(error_code, "temMALFORMED");
        }
        other => panic!("expected PaymentFailed, got {:?}", other),
    }

    // One refused increment does not demote the session; the next settles.
    let next = h
        .engine
        .process_micropayment(&view.id, dec!(2.0), dec!(1.0), "attempt-2")
        .await
        .unwrap();
    assert_eq!(next.status, TransactionStatus::Confirmed);
}

#[tokio::test]
async fn test_publish_failure_never_fails_the_settlement() {
    let h = common::harness();
    let view = h
        .engine
        .initialize_session("chg-1", "user-1", "stn-1")
        .await
        .unwrap();

    h.publisher.set_failing(true);
    let tx = h
        .engine
        .process_micropayment(&view.id, dec!(2.0), dec!(1.0), "1")
        .await
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Confirmed);

    let session = h.engine.get_session(&view.id).await.unwrap();
    assert_eq!(session.total_amount_paid, dec!(1.0));
    assert!(h.publisher.events().await.is_empty());
}
