//! # News records
//! Immutable bulletins delivered by the ingestion webhook.
//!
//! Two shapes exist: union bulletins (association events such as general meetings,
//! bids and contractor selections) and policy bulletins (agency announcements).
//! The topic aggregator only reads them through [`NewsRecord`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of union event kinds.
///
/// Wire labels are the ones the ingestion tool sends; English snake_case aliases are
/// accepted so hand-written payloads stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "총회", alias = "general_meeting")]
    GeneralMeeting,
    #[serde(rename = "입찰", alias = "bid")]
    Bid,
    #[serde(rename = "시공사선정", alias = "contractor_selection")]
    ContractorSelection,
    #[serde(rename = "기타", alias = "other")]
    Other,
}

impl EventType {
    pub const ALL: [EventType; 4] = [
        EventType::GeneralMeeting,
        EventType::Bid,
        EventType::ContractorSelection,
        EventType::Other,
    ];

    /// Wire label, identical to the serde representation.
    pub fn label(self) -> &'static str {
        match self {
            EventType::GeneralMeeting => "총회",
            EventType::Bid => "입찰",
            EventType::ContractorSelection => "시공사선정",
            EventType::Other => "기타",
        }
    }

    /// Human-readable name used in generated topic text.
    pub fn display_name(self) -> &'static str {
        match self {
            EventType::GeneralMeeting => "general meeting",
            EventType::Bid => "bid",
            EventType::ContractorSelection => "contractor selection",
            EventType::Other => "other",
        }
    }

    /// Parse either the wire label or the English alias (case-insensitive for the latter).
    pub fn parse(raw: &str) -> Option<Self> {
        let t = raw.trim();
        Self::ALL.into_iter().find(|et| {
            et.label() == t
                || et.display_name().replace(' ', "_").eq_ignore_ascii_case(t)
                || et.display_name().eq_ignore_ascii_case(t)
        })
    }
}

/// Association bulletin (general meeting, bid, contractor selection, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionBulletin {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub event_type: Option<EventType>,
    #[serde(default)]
    pub association_name: Option<String>,
    #[serde(default)]
    pub district_name: Option<String>,
    /// Province / metropolitan city ("서울").
    #[serde(default)]
    pub region_si: Option<String>,
    /// District within the province ("강남구").
    #[serde(default)]
    pub region_gu: Option<String>,
    #[serde(default)]
    pub event_date: Option<NaiveDate>,
    #[serde(default)]
    pub published_at: Option<NaiveDate>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Policy announcement issued by an agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyBulletin {
    pub id: Uuid,
    pub title: String,
    /// Open-ended classification ("재개발", "재건축", "tax", ...).
    #[serde(default)]
    pub policy_type: Option<String>,
    #[serde(default)]
    pub agency_name: Option<String>,
    #[serde(default)]
    pub region_si: Option<String>,
    #[serde(default)]
    pub region_gu: Option<String>,
    #[serde(default)]
    pub published_date: Option<NaiveDate>,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Capability set shared by both bulletin kinds.
pub trait NewsRecord {
    fn title(&self) -> &str;
    fn province(&self) -> Option<&str>;
    fn district(&self) -> Option<&str>;
    /// Category label: event type for union bulletins, policy type for policy bulletins.
    fn category(&self) -> Option<&str>;
    fn body_text(&self) -> Option<&str>;
    fn created_at(&self) -> DateTime<Utc>;

    /// Case-insensitive substring search over the record's searchable text.
    fn matches_query(&self, query_lower: &str) -> bool;
}

impl NewsRecord for UnionBulletin {
    fn title(&self) -> &str {
        &self.title
    }
    fn province(&self) -> Option<&str> {
        self.region_si.as_deref()
    }
    fn district(&self) -> Option<&str> {
        self.region_gu.as_deref()
    }
    fn category(&self) -> Option<&str> {
        self.event_type.map(EventType::label)
    }
    fn body_text(&self) -> Option<&str> {
        self.summary.as_deref()
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn matches_query(&self, query_lower: &str) -> bool {
        contains_lower(Some(&self.title), query_lower)
            || contains_lower(self.association_name.as_deref(), query_lower)
            || contains_lower(self.district_name.as_deref(), query_lower)
            || contains_lower(self.summary.as_deref(), query_lower)
    }
}

impl NewsRecord for PolicyBulletin {
    fn title(&self) -> &str {
        &self.title
    }
    fn province(&self) -> Option<&str> {
        self.region_si.as_deref()
    }
    fn district(&self) -> Option<&str> {
        self.region_gu.as_deref()
    }
    fn category(&self) -> Option<&str> {
        self.policy_type.as_deref()
    }
    fn body_text(&self) -> Option<&str> {
        self.summary.as_deref().or(self.content.as_deref())
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn matches_query(&self, query_lower: &str) -> bool {
        contains_lower(Some(&self.title), query_lower)
            || contains_lower(self.summary.as_deref(), query_lower)
            || contains_lower(self.agency_name.as_deref(), query_lower)
            || contains_lower(self.content.as_deref(), query_lower)
    }
}

fn contains_lower(field: Option<&str>, query_lower: &str) -> bool {
    field.is_some_and(|f| f.to_lowercase().contains(query_lower))
}
