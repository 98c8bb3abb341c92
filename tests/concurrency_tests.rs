mod common;

use common::{transfer_request, TestLedger};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Awaits every spawned transfer, panicking if a task panicked.
async fn join_all<T>(handles: Vec<JoinHandle<T>>) -> Vec<T> {
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.expect("task panicked"));
    }
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_same_direction() {
    let ledger = TestLedger::new();
    let a = ledger.open("alice", dec!(100)).await;
    let b = ledger.open("bob", dec!(50)).await;

    let handles = (0..5)
        .map(|_| {
            let engine = ledger.engine.clone();
            let (from, to) = (a.id, b.id);
            tokio::spawn(async move { engine.transfer(transfer_request(from, to, dec!(10))).await })
        })
        .collect();

    let results = join_all(handles).await;

    let mut ids = HashSet::new();
    for result in results {
        let result = result.expect("Concurrent transfer failed");
        assert_eq!(result.from_entry.amount, dec!(-10));
        assert_eq!(result.to_entry.amount, dec!(10));
        ids.insert(result.transaction.id);
    }
    assert_eq!(ids.len(), 5);

    assert_eq!(ledger.balance(a.id).await, dec!(50));
    assert_eq!(ledger.balance(b.id).await, dec!(100));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposite_transfers_do_not_deadlock() {
    let ledger = TestLedger::new();
    let a = ledger.open("alice", dec!(100)).await;
    let b = ledger.open("bob", dec!(100)).await;

    let handles = (0..20)
        .map(|i| {
            let engine = ledger.engine.clone();
            let (from, to) = if i % 2 == 0 { (a.id, b.id) } else { (b.id, a.id) };
            tokio::spawn(async move { engine.transfer(transfer_request(from, to, dec!(1))).await })
        })
        .collect();

    let results = tokio::time::timeout(Duration::from_secs(10), join_all(handles))
        .await
        .expect("Transfers in opposite directions deadlocked");

    for result in results {
        result.expect("Transfer failed");
    }

    assert_eq!(ledger.balance(a.id).await, dec!(100));
    assert_eq!(ledger.balance(b.id).await, dec!(100));
    assert_eq!(ledger.store.transaction_count().await, 20);
    assert_eq!(ledger.store.entry_count().await, 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_total_balance_is_conserved() {
    let ledger = TestLedger::new();
    let mut accounts = Vec::new();
    for i in 0..5 {
        accounts.push(ledger.open(&format!("owner-{}", i), dec!(1000)).await);
    }
    let ids: Vec<i64> = accounts.iter().map(|a| a.id).collect();

    let handles = (0..50)
        .map(|i| {
            let engine = ledger.engine.clone();
            let from = ids[i % ids.len()];
            let to = ids[(i * 3 + 1) % ids.len()];
            let amount = Decimal::from((i % 7) as i64 + 1);
            tokio::spawn(async move {
                if from == to {
                    return None;
                }
                Some(engine.transfer(transfer_request(from, to, amount)).await)
            })
        })
        .collect();

    let results = tokio::time::timeout(Duration::from_secs(20), join_all(handles))
        .await
        .expect("Transfers deadlocked");

    let committed = results
        .into_iter()
        .flatten()
        .map(|result| result.expect("Transfer failed"))
        .count();
    assert_eq!(ledger.store.transaction_count().await, committed);

    let mut total = Decimal::ZERO;
    for id in &ids {
        let balance = ledger.balance(*id).await;
        assert!(balance >= Decimal::ZERO);
        assert_eq!(
            balance - dec!(1000),
            ledger.ledger.net_entry_sum(*id).await.unwrap()
        );
        total += balance;
    }
    assert_eq!(total, dec!(5000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_overdraft_attempts_never_go_negative() {
    let ledger = TestLedger::new();
    let a = ledger.open("alice", dec!(30)).await;
    let b = ledger.open("bob", dec!(0)).await;

    let handles = (0..10)
        .map(|_| {
            let engine = ledger.engine.clone();
            let (from, to) = (a.id, b.id);
            tokio::spawn(async move { engine.transfer(transfer_request(from, to, dec!(10))).await })
        })
        .collect();

    let results = join_all(handles).await;
    let succeeded = results.iter().filter(|r| r.is_ok()).count();

    assert_eq!(succeeded, 3);
    assert_eq!(ledger.balance(a.id).await, dec!(0));
    assert_eq!(ledger.balance(b.id).await, dec!(30));
    assert_eq!(ledger.store.transaction_count().await, 3);
}
