#![allow(missing_docs)]
//! Block events racing a WorldState export reach the client exactly once and
//! in order, and snapshot counts match what was streamed.

use std::sync::Arc;
use std::time::Duration;

use ledgerwire_core::backend::Ledger;
use ledgerwire_server::backend::MemoryLedger;
use ledgerwire_server::rpc::types::RpcRequest;
use ledgerwire_server::websocket::connection::{ClientConnection, Outbound};
use ledgerwire_server::websocket::session::Session;
use ledgerwire_settings::LedgerwireSettings;
use proptest::prelude::*;
use serde_json::Value;
use tokio::sync::mpsc;

#[derive(Clone, Debug)]
struct Plan {
    before: usize,
    during: Vec<(bool, u64)>,
    after: Vec<bool>,
}

fn plan() -> impl Strategy<Value = Plan> {
    (
        0usize..4,
        prop::collection::vec((any::<bool>(), 0u64..3), 0..6),
        prop::collection::vec(any::<bool>(), 0..4),
    )
        .prop_map(|(before, during, after)| Plan {
            before,
            during,
            after,
        })
}

async fn commit_block(ledger: &MemoryLedger, with_tx: bool, seq: usize) {
    if with_tx {
        let _ = ledger.tx(&format!("recipient{seq}"), "1").await.unwrap();
    }
    ledger.commit().await.unwrap();
}

async fn next_message(rx: &mut mpsc::Receiver<Outbound>) -> Value {
    loop {
        let item = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for outbound message")
            .expect("outbound queue closed");
        if let Outbound::Text(text) = item {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn run(plan: Plan) {
    let ledger = Arc::new(MemoryLedger::default());
    let mut seq = 0;
    for _ in 0..plan.before {
        commit_block(&ledger, true, seq).await;
        seq += 1;
    }
    let first_live = ledger.block_count().await.unwrap();

    let mut settings = LedgerwireSettings::default();
    settings.snapshot.pace_interval_ms = 0;
    let (conn, mut rx) = ClientConnection::channel("prop", 4096);
    let session = Session::open(
        Arc::clone(&ledger) as Arc<dyn Ledger>,
        Arc::new(settings),
        Arc::new(conn),
    )
    .unwrap();

    let racing = {
        let ledger = Arc::clone(&ledger);
        let during = plan.during.clone();
        tokio::spawn(async move {
            for (i, (with_tx, delay_ms)) in during.into_iter().enumerate() {
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                commit_block(&ledger, with_tx, 1_000 + i).await;
            }
        })
    };
    let reply = session
        .dispatch(RpcRequest::new("WorldState", None))
        .await
        .unwrap();
    assert!(reply.is_none());
    racing.await.unwrap();

    for (i, with_tx) in plan.after.iter().enumerate() {
        commit_block(&ledger, *with_tx, 2_000 + i).await;
    }
    let last = ledger.block_count().await.unwrap() - 1;

    let mut msgs = Vec::new();
    loop {
        let done_seen = msgs.iter().any(|m: &Value| m["id"] == "WorldStateDone");
        let last_seen = last < first_live
            || msgs
                .iter()
                .any(|m: &Value| m["id"] == "BlockAdded" && m["result"]["number"] == last);
        if done_seen && last_seen {
            break;
        }
        msgs.push(next_message(&mut rx).await);
    }
    session.close().await;

    let added: Vec<u64> = msgs
        .iter()
        .filter(|m| m["id"] == "BlockAdded")
        .map(|m| m["result"]["number"].as_u64().unwrap())
        .collect();
    let expected: Vec<u64> = (first_live..=last).collect();
    assert_eq!(added, expected, "every live block exactly once, in order");

    let done = msgs.iter().position(|m| m["id"] == "WorldStateDone").unwrap();
    let flow = &msgs[..done];
    let count = |id: &str| flow.iter().filter(|m| m["id"] == id).count() as u64;
    let announced = |id: &str| {
        flow.iter()
            .find(|m| m["id"] == id)
            .and_then(|m| m["result"].as_u64())
            .unwrap()
    };
    assert_eq!(announced("NumBlocks"), count("Blocks"));
    assert_eq!(announced("NumAccounts"), count("Accounts"));
    assert!(count("Blocks") >= first_live);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn block_events_delivered_exactly_once(plan in plan()) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(run(plan));
    }
}
