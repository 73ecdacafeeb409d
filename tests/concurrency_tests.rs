mod common;

use chargepay::application::engine::HistoryFilter;
use chargepay::domain::transaction::TransactionStatus;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_concurrent_micropayments_lose_no_update() {
    let h = common::harness();
    let view = h
        .engine
        .initialize_session("chg-1", "user-1", "stn-1")
        .await
        .unwrap();

    let a = {
        let engine = h.engine.clone();
        let id = view.id.clone();
        tokio::spawn(async move {
            engine
                .process_micropayment(&id, dec!(1.0), dec!(1.0), "a")
                .await
        })
    };
    let b = {
        let engine = h.engine.clone();
        let id = view.id.clone();
        tokio::spawn(async move {
            engine
                .process_micropayment(&id, dec!(2.0), dec!(2.0), "b")
                .await
        })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let session = h.engine.get_session(&view.id).await.unwrap();
    assert_eq!(session.total_amount_paid, dec!(3.0));
    assert_eq!(session.total_energy_used, dec!(3.0));
    assert_eq!(session.transaction_hashes.len(), 2);

    let history = h
        .engine
        .get_payment_history("user-1", HistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history
        .iter()
        .all(|t| t.status == TransactionStatus::Confirmed));
}

#[tokio::test]
async fn test_many_concurrent_callers_single_session() {
    let h = common::harness();
    let view = h
        .engine
        .initialize_session("chg-1", "user-1", "stn-1")
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..20 {
        let engine = h.engine.clone();
        let id = view.id.clone();
        handles.push(tokio::spawn(async move {
            engine
                .process_micropayment(&id, dec!(0.1), dec!(0.5), &format!("c{}", i))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let session = h.engine.get_session(&view.id).await.unwrap();
    assert_eq!(session.total_amount_paid, dec!(10.0));
    assert_eq!(session.transaction_hashes.len(), 20);
    assert_eq!(h.xrpl.executed_count().await, 20);
}

#[tokio::test]
async fn test_distinct_sessions_settle_independently() {
    let h = common::harness();
    let first = h
        .engine
        .initialize_session("chg-1", "user-1", "stn-1")
        .await
        .unwrap();
    let second = h
        .engine
        .initialize_session("chg-2", "user-2", "stn-2")
        .await
        .unwrap();

    let mut handles = Vec::new();
    for (view, amount) in [(first.clone(), dec!(1.0)), (second.clone(), dec!(2.0))] {
        let engine = h.engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .process_micropayment(&view.id, dec!(1.0), amount, "1")
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let s1 = h.engine.get_session(&first.id).await.unwrap();
    let s2 = h.engine.get_session(&second.id).await.unwrap();
    assert_eq!(s1.total_amount_paid, dec!(1.0));
    assert_eq!(s2.total_amount_paid, dec!(2.0));
}
