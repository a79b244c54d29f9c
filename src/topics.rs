//! # Topic Aggregator
//! Pure, testable logic that maps two windows of bulletins → ranked article topics.
//! No I/O; the only clock dependency is the `now` argument of [`generate_topics_at`].
//!
//! Pipeline: independent grouping rules emit candidates in a fixed order, candidates
//! are deduplicated according to [`MergeStrategy`], then ranked by support count
//! (stable, descending) and truncated to `max_topics` (never more than eight).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::news::{EventType, PolicyBulletin, UnionBulletin};

pub const DEFAULT_MAX_TOPICS: usize = 8;
pub const DEFAULT_WINDOW_DAYS: i64 = 14;

/// Agency / region rules emit at most this many groups (first-seen order, not size).
const GROUP_CAP: usize = 3;

/// Title keywords marking a large project (case-insensitive substring).
/// Terms that mark a union bulletin as policy-related (legacy rule).
pub const POLICY_KEYWORDS: &[&str] = &[
    "정책",
    "제도",
    "법안",
    "규제",
    "지원",
    "policy",
    "regulation",
    "subsid",
];

pub const LARGE_PROJECT_KEYWORDS: &[&str] = &[
    "대규모",
    "초대형",
    "메가",
    "large-scale",
    "super-large",
    "mega",
];

/// A suggested article topic. Recomputed on every call, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: String,
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    /// Number of bulletins backing this topic.
    pub related_news_count: usize,
}

/// Identity of the rule that produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicRule {
    PolicyType,
    Agency,
    PolicyRegion,
    UpcomingPolicy,
    UnionRegion,
    UnionEventType,
    UnionPolicyKeyword,
    LargeProject,
    ContractorSelection,
    Bid,
    Comprehensive,
}

/// Minimum group sizes. The large-project filter always needs just one hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub min_group_size: usize,
    pub comprehensive_min: usize,
    /// Emit a topic for union bulletins that mention policy terms.
    #[serde(default)]
    pub union_policy_keywords: bool,
}

impl ThresholdSet {
    /// Every rule fires on a single record; summary needs three union bulletins.
    pub const REVISED: ThresholdSet = ThresholdSet {
        min_group_size: 1,
        comprehensive_min: 3,
        union_policy_keywords: false,
    };

    /// Older behaviour: pairs required, summary needs five union bulletins,
    /// and union bulletins mentioning policy terms get their own topic.
    pub const LEGACY: ThresholdSet = ThresholdSet {
        min_group_size: 2,
        comprehensive_min: 5,
        union_policy_keywords: true,
    };
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self::REVISED
    }
}

/// What happens when two candidates collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Same title: the later candidate replaces the earlier one but keeps its slot.
    #[default]
    ReplaceByTitle,
    /// Same title: support counts add up and keywords are unioned.
    SumByTitle,
    /// Key is (rule, group key); identical titles from different rules both survive.
    ByRuleKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub thresholds: ThresholdSet,
    pub merge: MergeStrategy,
    /// Values above [`DEFAULT_MAX_TOPICS`] are treated as that limit.
    pub max_topics: usize,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            thresholds: ThresholdSet::default(),
            merge: MergeStrategy::default(),
            max_topics: DEFAULT_MAX_TOPICS,
        }
    }
}

/// A topic plus the identity of the rule/group that produced it.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub rule: TopicRule,
    pub group_key: String,
    pub topic: Topic,
}

/// Default config, current clock.
pub fn generate_topics(union: &[UnionBulletin], policy: &[PolicyBulletin]) -> Vec<Topic> {
    generate_topics_at(union, policy, Utc::now(), &TopicConfig::default())
}

/// Deterministic core: identical inputs and `now` always give identical output.
pub fn generate_topics_at(
    union: &[UnionBulletin],
    policy: &[PolicyBulletin],
    now: DateTime<Utc>,
    cfg: &TopicConfig,
) -> Vec<Topic> {
    if union.is_empty() && policy.is_empty() {
        return vec![market_trend_fallback()];
    }

    let candidates = collect_candidates(union, policy, now, &cfg.thresholds);
    let generated = candidates.len();

    let mut topics = dedup_candidates(candidates, cfg.merge);
    // Vec::sort_by is stable: ties keep post-dedup insertion order.
    topics.sort_by(|a, b| b.related_news_count.cmp(&a.related_news_count));
    topics.truncate(cfg.max_topics.min(DEFAULT_MAX_TOPICS));

    debug!(
        target: "topics",
        union = union.len(),
        policy = policy.len(),
        generated,
        kept = topics.len(),
        "topics generated"
    );

    if topics.is_empty() {
        return vec![recent_trends_fallback(union.len(), policy.len())];
    }
    topics
}

pub(crate) fn collect_candidates(
    union: &[UnionBulletin],
    policy: &[PolicyBulletin],
    now: DateTime<Utc>,
    th: &ThresholdSet,
) -> Vec<Candidate> {
    let min = th.min_group_size;
    let mut out = Vec::new();

    // 1) Policy type
    let by_type = group_by(policy, |p| present(p.policy_type.as_deref()).map(str::to_string));
    for (i, (ptype, items)) in by_type
        .into_iter()
        .filter(|(_, items)| items.len() >= min)
        .enumerate()
    {
        out.push(Candidate {
            rule: TopicRule::PolicyType,
            topic: Topic {
                id: format!("policy-type-{i}"),
                title: format!("{ptype} policy changes and market impact"),
                description: format!(
                    "Reviews recent {ptype} policy announcements and how they affect redevelopment and reconstruction projects"
                ),
                keywords: vec![
                    ptype.clone(),
                    "policy".into(),
                    "market impact".into(),
                    "redevelopment".into(),
                ],
                related_news_count: items.len(),
            },
            group_key: ptype,
        });
    }

    // 2) Issuing agency
    let by_agency = group_by(policy, |p| present(p.agency_name.as_deref()).map(str::to_string));
    for (i, (agency, items)) in by_agency
        .into_iter()
        .filter(|(_, items)| items.len() >= min)
        .take(GROUP_CAP)
        .enumerate()
    {
        out.push(Candidate {
            rule: TopicRule::Agency,
            topic: Topic {
                id: format!("agency-{i}"),
                title: format!("{agency} policy direction and key measures"),
                description: format!(
                    "Summarises the latest announcements from {agency} and the policy direction they signal"
                ),
                keywords: vec![agency.clone(), "policy".into(), "agency".into()],
                related_news_count: items.len(),
            },
            group_key: agency,
        });
    }

    // 3) Policy region
    let by_region = group_by(policy, policy_region_key);
    for (i, (region, items)) in by_region
        .into_iter()
        .filter(|(_, items)| items.len() >= min)
        .take(GROUP_CAP)
        .enumerate()
    {
        out.push(Candidate {
            rule: TopicRule::PolicyRegion,
            topic: Topic {
                id: format!("policy-region-{i}"),
                title: format!("{region} redevelopment policy outlook"),
                description: format!(
                    "Covers the policies recently announced for {region} and what they mean for local projects"
                ),
                keywords: vec![region.clone(), "regional policy".into(), "redevelopment".into()],
                related_news_count: items.len(),
            },
            group_key: region,
        });
    }

    // 4) Policies taking effect after `now`
    let upcoming = policy
        .iter()
        .filter(|p| {
            p.effective_date
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .is_some_and(|dt| dt.and_utc() > now)
        })
        .count();
    if upcoming >= min {
        out.push(Candidate {
            rule: TopicRule::UpcomingPolicy,
            group_key: String::new(),
            topic: Topic {
                id: "upcoming-policy-1".into(),
                title: "Upcoming policy changes and how to prepare".into(),
                description: "Walks through policies that take effect soon and the preparation unions and residents need".into(),
                keywords: vec!["effective date".into(), "policy".into(), "preparation".into()],
                related_news_count: upcoming,
            },
        });
    }

    // 5) Union region
    let by_union_region = group_by(union, union_region_key);
    for (i, (region, items)) in by_union_region
        .into_iter()
        .filter(|(_, items)| items.len() >= min)
        .take(GROUP_CAP)
        .enumerate()
    {
        out.push(Candidate {
            rule: TopicRule::UnionRegion,
            topic: Topic {
                id: format!("region-{i}"),
                title: format!("{region} redevelopment and reconstruction status and outlook"),
                description: format!(
                    "Analyses recent redevelopment activity in {region}, covering the main unions and what comes next"
                ),
                keywords: vec![
                    region.clone(),
                    "redevelopment".into(),
                    "reconstruction".into(),
                    "regional analysis".into(),
                ],
                related_news_count: items.len(),
            },
            group_key: region,
        });
    }

    // 6) Union event type (no cap)
    let by_event = group_by(union, |u| u.event_type);
    for (i, (event, items)) in by_event
        .into_iter()
        .filter(|(_, items)| items.len() >= min)
        .enumerate()
    {
        let name = event.display_name();
        out.push(Candidate {
            rule: TopicRule::UnionEventType,
            group_key: event.label().to_string(),
            topic: Topic {
                id: format!("event-{i}"),
                title: format!("Redevelopment {name} trend analysis"),
                description: format!(
                    "Looks at recent {name} bulletins to identify market direction and notable patterns"
                ),
                keywords: vec![
                    event.label().to_string(),
                    "trend".into(),
                    "analysis".into(),
                    "redevelopment".into(),
                ],
                related_news_count: items.len(),
            },
        });
    }

    // 6b) Union bulletins mentioning policy terms (legacy only)
    if th.union_policy_keywords {
        let mentions = union.iter().filter(|u| mentions_policy(u)).count();
        if mentions > 0 {
            out.push(Candidate {
                rule: TopicRule::UnionPolicyKeyword,
                group_key: String::new(),
                topic: Topic {
                    id: "policy-1".into(),
                    title: "Redevelopment policy changes and market impact".into(),
                    description: "Analyses how recent policy changes affect the redevelopment market, unions and residents".into(),
                    keywords: vec![
                        "policy".into(),
                        "regulation".into(),
                        "market impact".into(),
                        "redevelopment".into(),
                    ],
                    related_news_count: mentions,
                },
            });
        }
    }

    // 7) Large projects
    let large = union.iter().filter(|u| is_large_project(&u.title)).count();
    if large > 0 {
        out.push(Candidate {
            rule: TopicRule::LargeProject,
            group_key: String::new(),
            topic: Topic {
                id: "large-1".into(),
                title: "Large-scale redevelopment projects at a glance".into(),
                description: "Profiles the large-scale redevelopment and reconstruction projects currently under way".into(),
                keywords: vec![
                    "large-scale".into(),
                    "project".into(),
                    "redevelopment".into(),
                    "reconstruction".into(),
                ],
                related_news_count: large,
            },
        });
    }

    // 8) Contractor selection
    let contractor = count_event(union, EventType::ContractorSelection);
    if contractor >= min {
        out.push(Candidate {
            rule: TopicRule::ContractorSelection,
            group_key: String::new(),
            topic: Topic {
                id: "contractor-1".into(),
                title: "Contractor selection trends in redevelopment".into(),
                description: "Breaks down recent contractor selections by builder and tracks shifts in order share".into(),
                keywords: vec![
                    "contractor".into(),
                    "selection".into(),
                    "builder".into(),
                    "orders".into(),
                ],
                related_news_count: contractor,
            },
        });
    }

    // 9) Bids
    let bids = count_event(union, EventType::Bid);
    if bids >= min {
        out.push(Candidate {
            rule: TopicRule::Bid,
            group_key: String::new(),
            topic: Topic {
                id: "bidding-1".into(),
                title: "Redevelopment bid market trends".into(),
                description: "Reviews recent bid notices and results to gauge competition in the bid market".into(),
                keywords: vec!["bid".into(), "competition".into(), "market trend".into()],
                related_news_count: bids,
            },
        });
    }

    // 10) Roundup over every union bulletin
    if union.len() >= th.comprehensive_min {
        out.push(Candidate {
            rule: TopicRule::Comprehensive,
            group_key: String::new(),
            topic: Topic {
                id: "comprehensive-1".into(),
                title: "Redevelopment and reconstruction market roundup".into(),
                description: format!(
                    "Pulls together the {} most recent union bulletins into an overview of the market",
                    union.len()
                ),
                keywords: vec![
                    "roundup".into(),
                    "market trend".into(),
                    "redevelopment".into(),
                    "reconstruction".into(),
                ],
                related_news_count: union.len(),
            },
        });
    }

    out
}

/// Collapse colliding candidates. Output keeps first-insertion order.
pub(crate) fn dedup_candidates(candidates: Vec<Candidate>, strategy: MergeStrategy) -> Vec<Topic> {
    let mut slots: Vec<(TopicRule, Topic)> = Vec::with_capacity(candidates.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for c in candidates {
        let key = match strategy {
            MergeStrategy::ByRuleKey => format!("{:?}\u{1f}{}", c.rule, c.group_key),
            MergeStrategy::ReplaceByTitle | MergeStrategy::SumByTitle => c.topic.title.clone(),
        };

        let Some(&pos) = index.get(&key) else {
            index.insert(key, slots.len());
            slots.push((c.rule, c.topic));
            continue;
        };

        let (prev_rule, prev) = &mut slots[pos];
        warn!(
            target: "topics",
            title = %c.topic.title,
            kept_rule = ?c.rule,
            dropped_rule = ?prev_rule,
            ?strategy,
            "topic collision"
        );
        match strategy {
            MergeStrategy::SumByTitle => {
                prev.related_news_count += c.topic.related_news_count;
                for kw in c.topic.keywords {
                    if !prev.keywords.contains(&kw) {
                        prev.keywords.push(kw);
                    }
                }
            }
            MergeStrategy::ReplaceByTitle | MergeStrategy::ByRuleKey => {
                *prev_rule = c.rule;
                *prev = c.topic;
            }
        }
    }

    slots.into_iter().map(|(_, t)| t).collect()
}

/// Group items by an optional key, preserving first-seen key order.
fn group_by<'a, T, K, F>(items: &'a [T], key_of: F) -> Vec<(K, Vec<&'a T>)>
where
    K: Eq + std::hash::Hash + Clone,
    F: Fn(&T) -> Option<K>,
{
    let mut groups: Vec<(K, Vec<&'a T>)> = Vec::new();
    let mut pos: HashMap<K, usize> = HashMap::new();
    for it in items {
        let Some(k) = key_of(it) else { continue };
        match pos.get(&k) {
            Some(&i) => groups[i].1.push(it),
            None => {
                pos.insert(k.clone(), groups.len());
                groups.push((k, vec![it]));
            }
        }
    }
    groups
}

fn present(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// "province" or "province district"; records without a province are skipped.
fn policy_region_key(p: &PolicyBulletin) -> Option<String> {
    let si = present(p.region_si.as_deref())?;
    Some(match present(p.region_gu.as_deref()) {
        Some(gu) => format!("{si} {gu}"),
        None => si.to_string(),
    })
}

fn union_region_key(u: &UnionBulletin) -> Option<String> {
    let key = format!(
        "{} {}",
        u.region_si.as_deref().unwrap_or(""),
        u.region_gu.as_deref().unwrap_or("")
    );
    let key = key.trim();
    (!key.is_empty()).then(|| key.to_string())
}

fn is_large_project(title: &str) -> bool {
    let t = title.to_lowercase();
    LARGE_PROJECT_KEYWORDS.iter().any(|k| t.contains(k))
}

fn mentions_policy(u: &UnionBulletin) -> bool {
    let title = u.title.to_lowercase();
    let summary = u.summary.as_deref().unwrap_or_default().to_lowercase();
    POLICY_KEYWORDS
        .iter()
        .any(|k| title.contains(k) || summary.contains(k))
}

fn count_event(union: &[UnionBulletin], kind: EventType) -> usize {
    union.iter().filter(|u| u.event_type == Some(kind)).count()
}

fn market_trend_fallback() -> Topic {
    Topic {
        id: "1".into(),
        title: "Redevelopment and reconstruction market trend analysis".into(),
        description: "Comprehensive look at the main recent trends and shifts in the redevelopment and reconstruction market".into(),
        keywords: vec![
            "redevelopment".into(),
            "reconstruction".into(),
            "market trend".into(),
            "analysis".into(),
        ],
        related_news_count: 0,
    }
}

fn recent_trends_fallback(union: usize, policy: usize) -> Topic {
    let scope = match (union > 0, policy > 0) {
        (true, true) => "union and policy news",
        (true, false) => "union news",
        _ => "policy news",
    };
    Topic {
        id: "recent-trends-1".into(),
        title: format!("Recent trends in {scope}"),
        description: format!("Overview of the latest {scope} collected in the current window"),
        keywords: vec!["recent trends".into(), "redevelopment".into(), "analysis".into()],
        related_news_count: union + policy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    fn union(title: &str, et: Option<EventType>, si: Option<&str>, gu: Option<&str>) -> UnionBulletin {
        UnionBulletin {
            id: Uuid::new_v4(),
            user_id: None,
            title: title.into(),
            event_type: et,
            association_name: None,
            district_name: None,
            region_si: si.map(Into::into),
            region_gu: gu.map(Into::into),
            event_date: Some(NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()),
            published_at: None,
            summary: None,
            source_name: None,
            source_url: None,
            created_at: now() - Duration::days(2),
        }
    }

    fn policy(title: &str, ptype: Option<&str>, agency: Option<&str>) -> PolicyBulletin {
        PolicyBulletin {
            id: Uuid::new_v4(),
            title: title.into(),
            policy_type: ptype.map(Into::into),
            agency_name: agency.map(Into::into),
            region_si: None,
            region_gu: None,
            published_date: None,
            effective_date: None,
            summary: None,
            content: None,
            source_name: None,
            source_url: None,
            tags: vec![],
            created_at: now() - Duration::days(1),
        }
    }

    fn cand(rule: TopicRule, key: &str, title: &str, n: usize) -> Candidate {
        Candidate {
            rule,
            group_key: key.into(),
            topic: Topic {
                id: format!("{rule:?}-{key}"),
                title: title.into(),
                description: String::new(),
                keywords: vec![key.into()],
                related_news_count: n,
            },
        }
    }

    #[test]
    fn empty_inputs_give_fixed_fallback() {
        let out = generate_topics_at(&[], &[], now(), &TopicConfig::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].related_news_count, 0);
        assert_eq!(out[0].id, "1");
    }

    #[test]
    fn union_region_key_trims_and_skips_blank() {
        let a = union("a", None, Some("서울"), None);
        let b = union("b", None, None, None);
        let c = union("c", None, None, Some("강남구"));
        assert_eq!(union_region_key(&a).as_deref(), Some("서울"));
        assert_eq!(union_region_key(&b), None);
        assert_eq!(union_region_key(&c).as_deref(), Some("강남구"));
    }

    #[test]
    fn policy_region_requires_province() {
        let mut p = policy("p", None, None);
        p.region_gu = Some("강남구".into());
        assert_eq!(policy_region_key(&p), None);
        p.region_si = Some("서울".into());
        assert_eq!(policy_region_key(&p).as_deref(), Some("서울 강남구"));
    }

    #[test]
    fn region_groups_are_capped_in_first_seen_order() {
        let items = vec![
            union("1", None, Some("A"), None),
            union("2", None, Some("B"), None),
            union("3", None, Some("C"), None),
            union("4", None, Some("D"), None),
            union("5", None, Some("D"), None),
        ];
        let c = collect_candidates(&items, &[], now(), &ThresholdSet::REVISED);
        let regions: Vec<_> = c
            .iter()
            .filter(|c| c.rule == TopicRule::UnionRegion)
            .map(|c| c.group_key.as_str())
            .collect();
        // D is the largest group but arrives fourth.
        assert_eq!(regions, vec!["A", "B", "C"]);
    }

    #[test]
    fn legacy_thresholds_filter_before_capping() {
        let items = vec![
            union("1", None, Some("A"), None),
            union("2", None, Some("B"), None),
            union("3", None, Some("B"), None),
        ];
        let c = collect_candidates(&items, &[], now(), &ThresholdSet::LEGACY);
        let regions: Vec<_> = c
            .iter()
            .filter(|c| c.rule == TopicRule::UnionRegion)
            .map(|c| (c.group_key.as_str(), c.topic.related_news_count))
            .collect();
        assert_eq!(regions, vec![("B", 2)]);
    }

    #[test]
    fn large_project_match_is_case_insensitive() {
        assert!(is_large_project("MEGA complex approved"));
        assert!(is_large_project("초대형 단지 시공사 선정"));
        assert!(!is_large_project("Small lot rebuild"));
    }

    #[test]
    fn upcoming_uses_strict_future() {
        let mut today = policy("today", None, None);
        today.effective_date = Some(now().date_naive());
        let mut tomorrow = policy("tomorrow", None, None);
        tomorrow.effective_date = Some(now().date_naive() + Duration::days(1));
        let c = collect_candidates(&[], &[today, tomorrow], now(), &ThresholdSet::REVISED);
        let up = c
            .iter()
            .find(|c| c.rule == TopicRule::UpcomingPolicy)
            .expect("upcoming candidate");
        assert_eq!(up.topic.related_news_count, 1);
    }

    #[test]
    fn replace_by_title_keeps_first_slot_last_value() {
        let cands = vec![
            cand(TopicRule::Agency, "x", "Same", 5),
            cand(TopicRule::Bid, "", "Other", 2),
            cand(TopicRule::PolicyRegion, "y", "Same", 1),
        ];
        let out = dedup_candidates(cands, MergeStrategy::ReplaceByTitle);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "Same");
        assert_eq!(out[0].related_news_count, 1);
        assert_eq!(out[0].id, "PolicyRegion-y");
        assert_eq!(out[1].title, "Other");
    }

    #[test]
    fn sum_by_title_merges_support_and_keywords() {
        let cands = vec![
            cand(TopicRule::Agency, "x", "Same", 5),
            cand(TopicRule::PolicyRegion, "y", "Same", 1),
        ];
        let out = dedup_candidates(cands, MergeStrategy::SumByTitle);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].related_news_count, 6);
        assert_eq!(out[0].keywords, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn by_rule_key_keeps_title_collisions() {
        let cands = vec![
            cand(TopicRule::Agency, "x", "Same", 5),
            cand(TopicRule::PolicyRegion, "y", "Same", 1),
        ];
        let out = dedup_candidates(cands, MergeStrategy::ByRuleKey);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn ties_keep_generation_order() {
        let p = vec![policy("p", Some("재건축"), Some("국토교통부"))];
        let out = generate_topics_at(&[], &p, now(), &TopicConfig::default());
        // Both candidates have support 1; policy-type rule runs first.
        assert_eq!(out[0].id, "policy-type-0");
        assert_eq!(out[1].id, "agency-0");
    }

    #[test]
    fn legacy_sparse_input_falls_back_to_recent_trends() {
        let cfg = TopicConfig {
            thresholds: ThresholdSet::LEGACY,
            ..TopicConfig::default()
        };
        let u = vec![union("single", Some(EventType::Bid), Some("서울"), None)];
        let p = vec![policy("p", Some("tax"), None)];
        let out = generate_topics_at(&u, &p, now(), &cfg);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "recent-trends-1");
        assert_eq!(out[0].related_news_count, 2);
        assert!(out[0].title.contains("union and policy news"));
    }

    #[test]
    fn max_topics_never_exceeds_eight() {
        let cfg = TopicConfig {
            max_topics: 20,
            ..TopicConfig::default()
        };
        let regions = ["A", "B", "C", "D"];
        let u: Vec<_> = (0..12)
            .map(|i| union(&format!("u{i}"), Some(EventType::ALL[i % 4]), Some(regions[i % 4]), None))
            .collect();
        let p: Vec<_> = (0..10)
            .map(|i| {
                policy(
                    &format!("p{i}"),
                    Some(format!("type {i}").as_str()),
                    Some(format!("agency {i}").as_str()),
                )
            })
            .collect();
        let out = generate_topics_at(&u, &p, now(), &cfg);
        assert_eq!(out.len(), DEFAULT_MAX_TOPICS);
    }

    #[test]
    fn legacy_preset_adds_policy_mention_topic() {
        let a = union("정비사업 규제 완화 발표", None, None, None);
        let mut b = union("General meeting", None, None, None);
        b.summary = Some("New subsidy scheme explained".into());
        let c = union("Plain notice", None, None, None);
        let items = vec![a, b, c];

        let legacy = collect_candidates(&items, &[], now(), &ThresholdSet::LEGACY);
        let hit = legacy
            .iter()
            .find(|c| c.rule == TopicRule::UnionPolicyKeyword)
            .expect("policy mention candidate");
        assert_eq!(hit.topic.related_news_count, 2);

        let revised = collect_candidates(&items, &[], now(), &ThresholdSet::REVISED);
        assert!(revised.iter().all(|c| c.rule != TopicRule::UnionPolicyKeyword));
    }
}
