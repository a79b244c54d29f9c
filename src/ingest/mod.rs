// src/ingest/mod.rs
//! Webhook ingestion: field cleanup, per-item validation, duplicate check, insert.
//! A batch never fails as a whole; every item ends up in `success` or `failed`.

pub mod types;

use crate::ingest::types::{FailedItem, IngestReport, ItemError, RawPolicyItem, RawUnionItem};
use crate::news::EventType;
use crate::store::{NewPolicyBulletin, NewUnionBulletin, NewsStore};
use chrono::NaiveDate;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde_json::Value;

pub const DEFAULT_SOURCE_NAME: &str = "n8n";

const TITLE_MAX_CHARS: usize = 300;
const TEXT_MAX_CHARS: usize = 20_000;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Items received by ingestion webhooks.");
        describe_counter!("ingest_saved_total", "Items stored after validation.");
        describe_counter!(
            "ingest_failed_total",
            "Items rejected (validation, duplicate, store error)."
        );
        describe_counter!(
            "ingest_duplicates_total",
            "Items rejected because an equal record already exists."
        );
    });
}

/// Normalize a free-text field: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str, max_chars: usize) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[a-z][^>]*>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect();
    }
    out
}

/// Empty after cleanup counts as absent.
pub fn clean_field(raw: Option<&str>, max_chars: usize) -> Option<String> {
    raw.map(|s| normalize_text(s, max_chars))
        .filter(|s| !s.is_empty())
}

fn clean(raw: &Option<String>) -> Option<String> {
    clean_field(raw.as_deref(), TEXT_MAX_CHARS)
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp (date part is kept).
pub fn parse_date(field: &'static str, raw: Option<&str>) -> Result<Option<NaiveDate>, ItemError> {
    let Some(v) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Ok(d) = NaiveDate::parse_from_str(v, "%Y-%m-%d") {
        return Ok(Some(d));
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(v) {
        return Ok(Some(dt.date_naive()));
    }
    Err(ItemError::InvalidDate {
        field,
        value: v.to_string(),
    })
}

/// Short, anonymized identifier for log lines (raw titles are never logged).
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Validate a raw union item into an insertable row.
pub fn prepare_union(
    raw: &RawUnionItem,
    default_user_id: Option<&str>,
) -> Result<NewUnionBulletin, ItemError> {
    let title = clean_field(raw.title.as_deref(), TITLE_MAX_CHARS)
        .ok_or(ItemError::MissingField("title"))?;
    let event_date = parse_date("event_date", raw.event_date.as_deref())?
        .ok_or(ItemError::MissingField("event_date"))?;
    let published_at = parse_date("published_at", raw.published_at.as_deref())?.or(Some(event_date));

    let user_id = clean(&raw.user_id)
        .or_else(|| clean_field(default_user_id, TEXT_MAX_CHARS))
        .ok_or(ItemError::MissingOwner)?;

    let event_type = match clean(&raw.event_type) {
        None => EventType::Other,
        Some(label) => EventType::parse(&label).unwrap_or_else(|| {
            tracing::debug!(target: "ingest", %label, "unknown event type, stored as other");
            EventType::Other
        }),
    };

    Ok(NewUnionBulletin {
        user_id: Some(user_id),
        title,
        event_type: Some(event_type),
        association_name: clean(&raw.association_name),
        district_name: clean(&raw.district_name),
        region_si: clean(&raw.region_si),
        region_gu: clean(&raw.region_gu),
        event_date: Some(event_date),
        published_at,
        summary: clean(&raw.summary),
        source_name: clean(&raw.source_name).or_else(|| Some(DEFAULT_SOURCE_NAME.to_string())),
        source_url: clean(&raw.source_url),
    })
}

pub fn prepare_policy(raw: &RawPolicyItem) -> Result<NewPolicyBulletin, ItemError> {
    let title = clean_field(raw.title.as_deref(), TITLE_MAX_CHARS)
        .ok_or(ItemError::MissingField("title"))?;
    let tags = raw
        .tags
        .iter()
        .flatten()
        .filter_map(|t| clean_field(Some(t.as_str()), TITLE_MAX_CHARS))
        .collect();

    Ok(NewPolicyBulletin {
        title,
        policy_type: clean(&raw.policy_type),
        agency_name: clean(&raw.agency_name),
        region_si: clean(&raw.region_si),
        region_gu: clean(&raw.region_gu),
        published_date: parse_date("published_date", raw.published_date.as_deref())?,
        effective_date: parse_date("effective_date", raw.effective_date.as_deref())?,
        summary: clean(&raw.summary),
        content: clean(&raw.content),
        source_name: clean(&raw.source_name).or_else(|| Some(DEFAULT_SOURCE_NAME.to_string())),
        source_url: clean(&raw.source_url),
        tags,
    })
}

async fn store_union_item(
    store: &dyn NewsStore,
    item: &Value,
    default_user_id: Option<&str>,
) -> Result<String, ItemError> {
    let raw: RawUnionItem = serde_json::from_value(item.clone())?;
    let row = prepare_union(&raw, default_user_id)?;
    let saved = store
        .insert_union_if_absent(row)
        .await?
        .ok_or(ItemError::Duplicate)?;
    Ok(saved.title)
}

async fn store_policy_item(store: &dyn NewsStore, item: &Value) -> Result<String, ItemError> {
    let raw: RawPolicyItem = serde_json::from_value(item.clone())?;
    let row = prepare_policy(&raw)?;
    let saved = store
        .insert_policy_if_absent(row)
        .await?
        .ok_or(ItemError::Duplicate)?;
    Ok(saved.title)
}

fn record(kind: &'static str, report: &mut IngestReport, item: &Value, res: Result<String, ItemError>) {
    match res {
        Ok(title) => {
            tracing::info!(target: "ingest", kind, id = %anon_hash(&title), "item saved");
            counter!("ingest_saved_total", "kind" => kind).increment(1);
            report.success.push(title);
        }
        Err(e) => {
            if matches!(e, ItemError::Duplicate) {
                counter!("ingest_duplicates_total", "kind" => kind).increment(1);
            }
            if matches!(e, ItemError::Store(_)) {
                tracing::error!(target: "ingest", kind, error = %e, "store rejected item");
            } else {
                tracing::debug!(target: "ingest", kind, reason = e.reason(), "item rejected");
            }
            counter!("ingest_failed_total", "kind" => kind, "reason" => e.reason()).increment(1);
            report.failed.push(FailedItem {
                item: item.clone(),
                error: e.to_string(),
            });
        }
    }
}

/// Store every union item of a webhook batch, in order.
pub async fn ingest_union_batch(
    store: &dyn NewsStore,
    items: &[Value],
    default_user_id: Option<&str>,
) -> IngestReport {
    ensure_metrics_described();
    counter!("ingest_items_total", "kind" => "union").increment(items.len() as u64);

    let mut report = IngestReport::default();
    for item in items {
        let res = store_union_item(store, item, default_user_id).await;
        record("union", &mut report, item, res);
    }
    tracing::info!(
        target: "ingest",
        kind = "union",
        saved = report.success.len(),
        failed = report.failed.len(),
        "webhook batch processed"
    );
    report
}

pub async fn ingest_policy_batch(store: &dyn NewsStore, items: &[Value]) -> IngestReport {
    ensure_metrics_described();
    counter!("ingest_items_total", "kind" => "policy").increment(items.len() as u64);

    let mut report = IngestReport::default();
    for item in items {
        let res = store_policy_item(store, item).await;
        record("policy", &mut report, item, res);
    }
    tracing::info!(
        target: "ingest",
        kind = "policy",
        saved = report.success.len(),
        failed = report.failed.len(),
        "webhook batch processed"
    );
    report
}
