// tests/ingest_snapshot.rs
//
// Webhook ingestion against a snapshot-backed store: rows survive a reload and
// duplicates are detected across restarts.

use chrono::NaiveDate;
use serde_json::json;

use newsdesk::ingest::{ingest_policy_batch, ingest_union_batch};
use newsdesk::news::EventType;
use newsdesk::store::{MemoryStore, NewsStore, UnionNewsQuery};

#[tokio::test]
async fn snapshot_round_trips_and_keeps_dedup() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("data").join("news.json");

    let items = vec![
        json!({ "title": "Jamsil contractor vote", "event_type": "시공사선정",
                "event_date": "2025-02-14", "user_id": "u-7" }),
        json!({ "title": "Daechi bid", "event_type": "bid",
                "event_date": "2025-02-15T09:30:00+09:00", "user_id": "u-7" }),
    ];

    {
        let store = MemoryStore::with_snapshot(&path).unwrap();
        let report = ingest_union_batch(&store, &items, None).await;
        assert_eq!(report.message(), "2 saved, 0 failed");
        let policy = ingest_policy_batch(&store, &[json!({ "title": "Rule", "tags": [" a ", ""] })]).await;
        assert_eq!(policy.success.len(), 1);
    }
    assert!(path.exists());

    let store = MemoryStore::with_snapshot(&path).unwrap();
    assert_eq!(store.counts().unwrap(), (2, 1));

    let rows = store.union_news(&UnionNewsQuery::default()).await.unwrap();
    // Newest event first; RFC 3339 input keeps its date part.
    assert_eq!(rows[0].event_date, NaiveDate::from_ymd_opt(2025, 2, 15));
    assert_eq!(rows[0].event_type, Some(EventType::Bid));
    assert_eq!(rows[1].event_type, Some(EventType::ContractorSelection));
    assert_eq!(rows[1].published_at, rows[1].event_date);

    let again = ingest_union_batch(&store, &items[..1], None).await;
    assert_eq!(again.message(), "0 saved, 1 failed");
    assert_eq!(again.failed[0].error, "already exists");
}
