// tests/ingest_concurrency.rs
//
// Overlapping webhook batches carrying the same items must store each row once.

use std::sync::Arc;

use serde_json::json;

use newsdesk::ingest::{ingest_policy_batch, ingest_union_batch};
use newsdesk::store::MemoryStore;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_batches_store_each_item_once() {
    let store = Arc::new(MemoryStore::new());
    let unions = Arc::new(vec![json!({
        "title": "Hannam 3 general meeting",
        "event_type": "총회",
        "event_date": "2025-02-20",
    })]);
    let policies = Arc::new(vec![json!({
        "title": "Safety inspection relaxed",
        "published_date": "2025-02-18",
    })]);

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let (store, unions, policies) = (store.clone(), unions.clone(), policies.clone());
        tasks.push(tokio::spawn(async move {
            let u = ingest_union_batch(store.as_ref(), &unions, Some("u-1")).await;
            let p = ingest_policy_batch(store.as_ref(), &policies).await;
            (u, p)
        }));
    }

    let (mut union_saved, mut policy_saved) = (0, 0);
    for t in tasks {
        let (u, p) = t.await.unwrap();
        union_saved += u.success.len();
        policy_saved += p.success.len();
        for f in u.failed.iter().chain(p.failed.iter()) {
            assert_eq!(f.error, "already exists");
        }
    }
    assert_eq!(union_saved, 1);
    assert_eq!(policy_saved, 1);
    assert_eq!(store.counts().unwrap(), (1, 1));
}
