//! Runs the topic aggregator over a store snapshot and prints the suggestions as JSON.
//!
//! Usage: `topics-preview <snapshot.json> [days] [legacy]`

use chrono::{Duration, Utc};
use newsdesk::store::{MemoryStore, NewsStore, PolicyNewsQuery, UnionNewsQuery};
use newsdesk::topics::{generate_topics_at, ThresholdSet, TopicConfig, DEFAULT_WINDOW_DAYS};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: topics-preview <snapshot.json> [days] [legacy]"))?;
    let days: i64 = match args.next() {
        Some(d) => d.parse()?,
        None => DEFAULT_WINDOW_DAYS,
    };
    let mut cfg = TopicConfig::default();
    if args.next().as_deref() == Some("legacy") {
        cfg.thresholds = ThresholdSet::LEGACY;
    }

    let store = MemoryStore::with_snapshot(&path)?;
    let now = Utc::now();
    let since = now - Duration::days(days.clamp(1, 365));

    let union = store
        .union_news(&UnionNewsQuery {
            since: Some(since.date_naive()),
            ..Default::default()
        })
        .await?;
    let policy = store
        .policy_news(&PolicyNewsQuery {
            since: Some(since),
            ..Default::default()
        })
        .await?;

    let topics = generate_topics_at(&union, &policy, now, &cfg);
    println!("{}", serde_json::to_string_pretty(&topics)?);
    eprintln!(
        "{} topics from {} union / {} policy records",
        topics.len(),
        union.len(),
        policy.len()
    );
    Ok(())
}
