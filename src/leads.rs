//! Lead generation: client abstraction over the external drafting workflow.
//!
//! The workflow receives a topic + article type and answers with candidate leads,
//! fact items, an analysis paragraph and a verification checklist. Its JSON is loose
//! (items may be plain strings or objects), so everything is normalized here before it
//! reaches the API layer.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::LeadsConfig;

pub const DEFAULT_ARTICLE_TYPE: &str = "policy article";
const DEFAULT_FACT_SOURCE: &str = "source";

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Outbound payload. Field names follow the workflow's expectations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LeadsRequest {
    pub topic: String,
    pub article_type: String,
    pub user_id: String,
    pub user_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FactItem {
    pub text: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifyItem {
    pub text: String,
    pub checked: bool,
}

/// Normalized drafting material.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DraftLeads {
    pub leads: Vec<String>,
    pub facts: Vec<FactItem>,
    pub analysis: String,
    pub verify_list: Vec<VerifyItem>,
}

impl DraftLeads {
    /// Lenient conversion from the workflow's reply; unknown shapes are dropped.
    pub fn from_value(v: &Value) -> Self {
        let leads = array(v, "leads")
            .filter_map(|l| match l {
                Value::String(s) => Some(s.clone()),
                Value::Object(_) => l.get("text").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .filter(|s| !s.trim().is_empty())
            .collect();

        let facts = array(v, "facts")
            .filter_map(|f| match f {
                Value::String(s) => Some(FactItem {
                    text: s.clone(),
                    source: DEFAULT_FACT_SOURCE.to_string(),
                }),
                Value::Object(_) => Some(FactItem {
                    text: f
                        .get("text")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| f.to_string()),
                    source: f
                        .get("source")
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .unwrap_or(DEFAULT_FACT_SOURCE)
                        .to_string(),
                }),
                _ => None,
            })
            .collect();

        let verify_list = array(v, "verifyList")
            .filter_map(|it| match it {
                Value::String(s) => Some(VerifyItem {
                    text: s.clone(),
                    checked: false,
                }),
                Value::Object(_) => Some(VerifyItem {
                    text: it.get("text").and_then(Value::as_str)?.to_string(),
                    checked: it.get("checked").and_then(Value::as_bool).unwrap_or(false),
                }),
                _ => None,
            })
            .collect();

        Self {
            leads,
            facts,
            analysis: v
                .get("analysis")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            verify_list,
        }
    }
}

fn array<'a>(v: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    v.get(key)
        .and_then(Value::as_array)
        .map(|a| a.iter())
        .into_iter()
        .flatten()
}

#[derive(Debug, thiserror::Error)]
pub enum LeadsError {
    #[error("lead generation webhook URL is not configured")]
    NotConfigured,

    #[error("lead generation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("lead generation webhook error ({status}): {body}")]
    Upstream { status: u16, body: String },
}

/// Future returned by [`LeadsClient::generate`].
pub type LeadsFuture<'a> = Pin<Box<dyn Future<Output = Result<DraftLeads, LeadsError>> + Send + 'a>>;

/// Trait object used by the API layer (handlers/tests).
pub trait LeadsClient: Send + Sync {
    fn generate<'a>(&'a self, req: &'a LeadsRequest) -> LeadsFuture<'a>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynLeadsClient = Arc<dyn LeadsClient>;

/// Factory: build a client according to config and environment variables.
///
/// * If `LEADS_TEST_MODE=mock`, returns a deterministic mock client.
/// * Else if no webhook URL is configured, returns a disabled client.
/// * Else the HTTP webhook client.
pub fn build_leads_client(cfg: &LeadsConfig) -> DynLeadsClient {
    if std::env::var("LEADS_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockLeadsClient::default());
    }
    match cfg.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => Arc::new(WebhookLeadsClient::new(url, cfg)),
        None => Arc::new(DisabledLeadsClient),
    }
}

// ------------------------------------------------------------
// Concrete clients
// ------------------------------------------------------------

/// Posts the request to the workflow webhook, retrying transport errors and 5xx.
pub struct WebhookLeadsClient {
    http: reqwest::Client,
    url: String,
    max_retries: u8,
}

impl WebhookLeadsClient {
    pub fn new(url: &str, cfg: &LeadsConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("newsdesk/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            url: url.to_string(),
            max_retries: cfg.max_retries.max(1),
        }
    }

    async fn generate_impl(&self, req: &LeadsRequest) -> Result<DraftLeads, LeadsError> {
        info!(
            target: "leads",
            article_type = %req.article_type,
            user = %req.user_id,
            "calling lead generation webhook"
        );

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let backoff = Duration::from_millis(500u64 << (attempt - 1));

            let rsp = match self.http.post(&self.url).json(req).send().await {
                Ok(rsp) => rsp,
                Err(e) if attempt < self.max_retries => {
                    warn!(target: "leads", attempt, error = %e, "webhook request failed, retrying");
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = rsp.status();
            if status.is_server_error() && attempt < self.max_retries {
                warn!(target: "leads", attempt, status = status.as_u16(), "webhook 5xx, retrying");
                tokio::time::sleep(backoff).await;
                continue;
            }
            if !status.is_success() {
                let body = rsp.text().await.unwrap_or_default();
                return Err(LeadsError::Upstream {
                    status: status.as_u16(),
                    body,
                });
            }

            let body: Value = rsp.json().await?;
            let draft = DraftLeads::from_value(&body);
            info!(
                target: "leads",
                leads = draft.leads.len(),
                facts = draft.facts.len(),
                verify = draft.verify_list.len(),
                "lead generation finished"
            );
            return Ok(draft);
        }
    }
}

impl LeadsClient for WebhookLeadsClient {
    fn generate<'a>(&'a self, req: &'a LeadsRequest) -> LeadsFuture<'a> {
        Box::pin(self.generate_impl(req))
    }
    fn provider_name(&self) -> &'static str {
        "webhook"
    }
}

/// Always fails with `NotConfigured`; used when no webhook URL is set.
pub struct DisabledLeadsClient;

impl LeadsClient for DisabledLeadsClient {
    fn generate<'a>(&'a self, _req: &'a LeadsRequest) -> LeadsFuture<'a> {
        Box::pin(async { Err(LeadsError::NotConfigured) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic client for tests/local runs; echoes the topic into the first lead.
#[derive(Clone, Default)]
pub struct MockLeadsClient {
    pub fixed: Option<DraftLeads>,
}

impl LeadsClient for MockLeadsClient {
    fn generate<'a>(&'a self, req: &'a LeadsRequest) -> LeadsFuture<'a> {
        let out = self.fixed.clone().unwrap_or_else(|| DraftLeads {
            leads: vec![
                format!("{}: what changed this week", req.topic),
                format!("{}: who is affected", req.topic),
            ],
            facts: vec![FactItem {
                text: format!("{} (mock fact)", req.topic),
                source: "mock".into(),
            }],
            analysis: format!("Mock analysis for a {} on {}.", req.article_type, req.topic),
            verify_list: vec![VerifyItem {
                text: "Confirm figures with the issuing agency".into(),
                checked: false,
            }],
        });
        Box::pin(async move { Ok(out) })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
