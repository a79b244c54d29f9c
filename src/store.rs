//! # News store
//! Query/insert interface over the bulletin tables, plus an in-memory adapter.
//!
//! `MemoryStore` optionally mirrors its contents to a JSON snapshot file. Writes go
//! through a temp file + rename so a crash never leaves a half-written snapshot.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::news::{EventType, NewsRecord, PolicyBulletin, UnionBulletin};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store lock poisoned")]
    Poisoned,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Union bulletins windowed by event date.
#[derive(Debug, Clone, Default)]
pub struct UnionNewsQuery {
    pub since: Option<NaiveDate>,
    pub region_si: Option<String>,
    pub region_gu: Option<String>,
    pub event_type: Option<EventType>,
    pub search: Option<String>,
}

/// Policy bulletins windowed by ingestion time.
#[derive(Debug, Clone, Default)]
pub struct PolicyNewsQuery {
    pub since: Option<DateTime<Utc>>,
    pub region_si: Option<String>,
    pub region_gu: Option<String>,
    pub policy_type: Option<String>,
    pub agency_name: Option<String>,
    pub search: Option<String>,
}

/// Distinct values for the policy list filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyFilterOptions {
    pub regions_si: Vec<String>,
    pub regions_gu: Vec<String>,
    pub policy_types: Vec<String>,
    pub agencies: Vec<String>,
}

/// Union bulletin as accepted by the store (id and created_at are assigned on insert).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUnionBulletin {
    pub user_id: Option<String>,
    pub title: String,
    pub event_type: Option<EventType>,
    pub association_name: Option<String>,
    pub district_name: Option<String>,
    pub region_si: Option<String>,
    pub region_gu: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub published_at: Option<NaiveDate>,
    pub summary: Option<String>,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPolicyBulletin {
    pub title: String,
    pub policy_type: Option<String>,
    pub agency_name: Option<String>,
    pub region_si: Option<String>,
    pub region_gu: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub effective_date: Option<NaiveDate>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub tags: Vec<String>,
}

#[async_trait::async_trait]
pub trait NewsStore: Send + Sync {
    /// Ordered by event date, newest first.
    async fn union_news(&self, query: &UnionNewsQuery) -> StoreResult<Vec<UnionBulletin>>;
    /// Ordered by `created_at`, newest first.
    async fn policy_news(&self, query: &PolicyNewsQuery) -> StoreResult<Vec<PolicyBulletin>>;
    async fn policy_filter_options(
        &self,
        since: Option<DateTime<Utc>>,
        region_si: Option<&str>,
    ) -> StoreResult<PolicyFilterOptions>;

    async fn find_union_duplicate(
        &self,
        title: &str,
        event_date: NaiveDate,
    ) -> StoreResult<Option<Uuid>>;
    /// Same title + published date, or same source URL when no date is known.
    async fn find_policy_duplicate(
        &self,
        title: &str,
        published_date: Option<NaiveDate>,
        source_url: Option<&str>,
    ) -> StoreResult<Option<Uuid>>;

    async fn insert_union(&self, row: NewUnionBulletin) -> StoreResult<UnionBulletin>;
    async fn insert_policy(&self, row: NewPolicyBulletin) -> StoreResult<PolicyBulletin>;

    /// Duplicate check and insert as one step; `None` when an equal row already exists.
    async fn insert_union_if_absent(&self, row: NewUnionBulletin)
        -> StoreResult<Option<UnionBulletin>>;
    async fn insert_policy_if_absent(
        &self,
        row: NewPolicyBulletin,
    ) -> StoreResult<Option<PolicyBulletin>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    #[serde(default)]
    union_news: Vec<UnionBulletin>,
    #[serde(default)]
    policy_news: Vec<PolicyBulletin>,
}

/// Thread-safe in-memory tables with optional JSON snapshot.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
    snapshot: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path` if it exists (missing file → empty store) and keep writing back to it.
    pub fn with_snapshot<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = match fs::read_to_string(&path) {
            Ok(s) => serde_json::from_str(&s)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Tables::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            inner: RwLock::new(tables),
            snapshot: Some(path),
        })
    }

    /// Seed rows directly, bypassing duplicate checks (fixtures, previews).
    pub fn from_rows(union: Vec<UnionBulletin>, policy: Vec<PolicyBulletin>) -> Self {
        Self {
            inner: RwLock::new(Tables {
                union_news: union,
                policy_news: policy,
            }),
            snapshot: None,
        }
    }

    pub fn counts(&self) -> StoreResult<(usize, usize)> {
        let t = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok((t.union_news.len(), t.policy_news.len()))
    }

    /// Rows only stay in memory once the snapshot write succeeded.
    fn commit_union(&self, t: &mut Tables, rec: UnionBulletin) -> StoreResult<UnionBulletin> {
        t.union_news.push(rec.clone());
        if let Err(e) = self.persist(t) {
            t.union_news.pop();
            return Err(e);
        }
        Ok(rec)
    }

    fn commit_policy(&self, t: &mut Tables, rec: PolicyBulletin) -> StoreResult<PolicyBulletin> {
        t.policy_news.push(rec.clone());
        if let Err(e) = self.persist(t) {
            t.policy_news.pop();
            return Err(e);
        }
        Ok(rec)
    }

    fn persist(&self, tables: &Tables) -> StoreResult<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(tables)?;
        let mut f = fs::File::create(&tmp)?;
        f.write_all(json.as_bytes())?;
        fs::rename(tmp, path)?;
        Ok(())
    }
}

fn eq_opt(field: Option<&str>, wanted: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(w) => field == Some(w),
    }
}

fn search_lower(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

fn distinct<'a, I: Iterator<Item = Option<&'a str>>>(it: I) -> Vec<String> {
    it.flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[async_trait::async_trait]
impl NewsStore for MemoryStore {
    async fn union_news(&self, q: &UnionNewsQuery) -> StoreResult<Vec<UnionBulletin>> {
        let needle = search_lower(q.search.as_deref());
        let t = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        let mut rows: Vec<UnionBulletin> = t
            .union_news
            .iter()
            .filter(|u| match q.since {
                Some(since) => u.event_date.is_some_and(|d| d >= since),
                None => true,
            })
            .filter(|u| eq_opt(u.region_si.as_deref(), q.region_si.as_deref()))
            .filter(|u| eq_opt(u.region_gu.as_deref(), q.region_gu.as_deref()))
            .filter(|u| q.event_type.is_none() || u.event_type == q.event_type)
            .filter(|u| needle.as_deref().map_or(true, |n| u.matches_query(n)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.event_date.cmp(&a.event_date));
        Ok(rows)
    }

    async fn policy_news(&self, q: &PolicyNewsQuery) -> StoreResult<Vec<PolicyBulletin>> {
        let needle = search_lower(q.search.as_deref());
        let t = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        let mut rows: Vec<PolicyBulletin> = t
            .policy_news
            .iter()
            .filter(|p| q.since.map_or(true, |since| p.created_at >= since))
            .filter(|p| eq_opt(p.region_si.as_deref(), q.region_si.as_deref()))
            .filter(|p| eq_opt(p.region_gu.as_deref(), q.region_gu.as_deref()))
            .filter(|p| eq_opt(p.policy_type.as_deref(), q.policy_type.as_deref()))
            .filter(|p| eq_opt(p.agency_name.as_deref(), q.agency_name.as_deref()))
            .filter(|p| needle.as_deref().map_or(true, |n| p.matches_query(n)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn policy_filter_options(
        &self,
        since: Option<DateTime<Utc>>,
        region_si: Option<&str>,
    ) -> StoreResult<PolicyFilterOptions> {
        let t = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        let window: Vec<&PolicyBulletin> = t
            .policy_news
            .iter()
            .filter(|p| since.map_or(true, |s| p.created_at >= s))
            .collect();

        let regions_gu = match region_si {
            Some(si) => distinct(
                window
                    .iter()
                    .filter(|p| p.region_si.as_deref() == Some(si))
                    .map(|p| p.region_gu.as_deref()),
            ),
            None => Vec::new(),
        };

        Ok(PolicyFilterOptions {
            regions_si: distinct(window.iter().map(|p| p.region_si.as_deref())),
            regions_gu,
            policy_types: distinct(window.iter().map(|p| p.policy_type.as_deref())),
            agencies: distinct(window.iter().map(|p| p.agency_name.as_deref())),
        })
    }

    async fn find_union_duplicate(
        &self,
        title: &str,
        event_date: NaiveDate,
    ) -> StoreResult<Option<Uuid>> {
        let t = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(union_duplicate(&t, title, event_date))
    }

    async fn find_policy_duplicate(
        &self,
        title: &str,
        published_date: Option<NaiveDate>,
        source_url: Option<&str>,
    ) -> StoreResult<Option<Uuid>> {
        let t = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(policy_duplicate(&t, title, published_date, source_url))
    }

    async fn insert_union(&self, row: NewUnionBulletin) -> StoreResult<UnionBulletin> {
        let mut t = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        self.commit_union(&mut t, union_record(row))
    }

    async fn insert_policy(&self, row: NewPolicyBulletin) -> StoreResult<PolicyBulletin> {
        let mut t = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        self.commit_policy(&mut t, policy_record(row))
    }

    async fn insert_union_if_absent(
        &self,
        row: NewUnionBulletin,
    ) -> StoreResult<Option<UnionBulletin>> {
        let mut t = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        if let Some(date) = row.event_date {
            if union_duplicate(&t, &row.title, date).is_some() {
                return Ok(None);
            }
        }
        self.commit_union(&mut t, union_record(row)).map(Some)
    }

    async fn insert_policy_if_absent(
        &self,
        row: NewPolicyBulletin,
    ) -> StoreResult<Option<PolicyBulletin>> {
        let mut t = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        if policy_duplicate(&t, &row.title, row.published_date, row.source_url.as_deref()).is_some() {
            return Ok(None);
        }
        self.commit_policy(&mut t, policy_record(row)).map(Some)
    }
}

fn union_duplicate(t: &Tables, title: &str, event_date: NaiveDate) -> Option<Uuid> {
    t.union_news
        .iter()
        .find(|u| u.title == title && u.event_date == Some(event_date))
        .map(|u| u.id)
}

fn policy_duplicate(
    t: &Tables,
    title: &str,
    published_date: Option<NaiveDate>,
    source_url: Option<&str>,
) -> Option<Uuid> {
    let hit = match (published_date, source_url) {
        (Some(date), _) => t
            .policy_news
            .iter()
            .find(|p| p.title == title && p.published_date == Some(date)),
        (None, Some(url)) => t
            .policy_news
            .iter()
            .find(|p| p.source_url.as_deref() == Some(url)),
        (None, None) => None,
    };
    hit.map(|p| p.id)
}

fn union_record(row: NewUnionBulletin) -> UnionBulletin {
    UnionBulletin {
        id: Uuid::new_v4(),
        user_id: row.user_id,
        title: row.title,
        event_type: row.event_type,
        association_name: row.association_name,
        district_name: row.district_name,
        region_si: row.region_si,
        region_gu: row.region_gu,
        event_date: row.event_date,
        published_at: row.published_at,
        summary: row.summary,
        source_name: row.source_name,
        source_url: row.source_url,
        created_at: Utc::now(),
    }
}

fn policy_record(row: NewPolicyBulletin) -> PolicyBulletin {
    PolicyBulletin {
        id: Uuid::new_v4(),
        title: row.title,
        policy_type: row.policy_type,
        agency_name: row.agency_name,
        region_si: row.region_si,
        region_gu: row.region_gu,
        published_date: row.published_date,
        effective_date: row.effective_date,
        summary: row.summary,
        content: row.content,
        source_name: row.source_name,
        source_url: row.source_url,
        tags: row.tags,
        created_at: Utc::now(),
    }
}
