// src/ingest/types.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw union item as posted by the collection workflow. Everything is optional here;
/// required fields are checked per item so one bad row never fails the batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUnionItem {
    pub title: Option<String>,
    pub event_type: Option<String>,
    pub association_name: Option<String>,
    pub district_name: Option<String>,
    pub region_si: Option<String>,
    pub region_gu: Option<String>,
    pub event_date: Option<String>,
    pub published_at: Option<String>,
    pub summary: Option<String>,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPolicyItem {
    pub title: Option<String>,
    pub policy_type: Option<String>,
    pub agency_name: Option<String>,
    pub region_si: Option<String>,
    pub region_gu: Option<String>,
    pub published_date: Option<String>,
    pub effective_date: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FailedItem {
    pub item: Value,
    pub error: String,
}

/// Per-batch outcome: saved titles and rejected items with the reason.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct IngestReport {
    pub success: Vec<String>,
    pub failed: Vec<FailedItem>,
}

impl IngestReport {
    pub fn message(&self) -> String {
        format!("{} saved, {} failed", self.success.len(), self.failed.len())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} is not a valid date: {value}")]
    InvalidDate { field: &'static str, value: String },

    #[error("already exists")]
    Duplicate,

    #[error("user_id is required: pass it per item or as default_user_id")]
    MissingOwner,

    #[error("invalid item: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),
}

impl ItemError {
    /// Short label for the `reason` metric dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            ItemError::MissingField(_) => "missing_field",
            ItemError::InvalidDate { .. } => "invalid_date",
            ItemError::Duplicate => "duplicate",
            ItemError::MissingOwner => "missing_owner",
            ItemError::Malformed(_) => "malformed",
            ItemError::Store(_) => "store",
        }
    }
}
