// src/config/app.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::topics::{MergeStrategy, ThresholdSet, TopicConfig, DEFAULT_MAX_TOPICS, DEFAULT_WINDOW_DAYS};

pub const ENV_CONFIG_PATH: &str = "NEWSDESK_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/newsdesk.toml";

const ENV_WEBHOOK_API_KEY: &str = "NEWSDESK_WEBHOOK_API_KEY";
const ENV_LEADS_WEBHOOK_URL: &str = "LEADS_WEBHOOK_URL";
const ENV_AUTH_API_KEY: &str = "AUTH_API_KEY";
const ENV_AUTH_URL: &str = "AUTH_URL";
const ENV_SITE_URL: &str = "NEWSDESK_SITE_URL";

fn default_timeout_secs() -> u64 {
    60
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_max_retries() -> u8 {
    2
}
fn default_window_days() -> i64 {
    DEFAULT_WINDOW_DAYS
}
fn default_max_topics() -> usize {
    DEFAULT_MAX_TOPICS
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub leads: LeadsConfig,
    pub auth: AuthConfig,
    pub topics: TopicsSection,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Public base URL used for auth redirects. Falls back to the request Host.
    pub site_url: Option<String>,
    /// Bearer key for the ingestion webhooks; "ENV" reads NEWSDESK_WEBHOOK_API_KEY.
    pub webhook_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadsConfig {
    /// "ENV" reads LEADS_WEBHOOK_URL.
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_retries: u8,
}

impl Default for LeadsConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Base URL of the hosted auth service. None → in-memory provider.
    pub url: Option<String>,
    /// "ENV" reads AUTH_API_KEY.
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdPreset {
    Revised,
    Legacy,
}

/// Either a named preset (`thresholds = "legacy"`) or an explicit table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdSpec {
    Preset(ThresholdPreset),
    Custom(ThresholdSet),
}

impl Default for ThresholdSpec {
    fn default() -> Self {
        ThresholdSpec::Preset(ThresholdPreset::Revised)
    }
}

impl ThresholdSpec {
    pub fn resolve(&self) -> ThresholdSet {
        match self {
            ThresholdSpec::Preset(ThresholdPreset::Revised) => ThresholdSet::REVISED,
            ThresholdSpec::Preset(ThresholdPreset::Legacy) => ThresholdSet::LEGACY,
            ThresholdSpec::Custom(set) => *set,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicsSection {
    pub thresholds: ThresholdSpec,
    pub merge: MergeStrategy,
    #[serde(default = "default_max_topics")]
    pub max_topics: usize,
    #[serde(default = "default_window_days")]
    pub window_days: i64,
}

impl Default for TopicsSection {
    fn default() -> Self {
        Self {
            thresholds: ThresholdSpec::default(),
            merge: MergeStrategy::default(),
            max_topics: default_max_topics(),
            window_days: default_window_days(),
        }
    }
}

impl TopicsSection {
    pub fn topic_config(&self) -> TopicConfig {
        TopicConfig {
            thresholds: self.thresholds.resolve(),
            merge: self.merge,
            max_topics: self.max_topics,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot for the in-memory store; None keeps everything in memory.
    pub snapshot_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load from an explicit TOML file, then resolve secrets and sanitize.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: AppConfig = toml::from_str(&data)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.finish()
    }

    /// Env path, then `config/newsdesk.toml`, then built-in defaults.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        AppConfig::default().finish()
    }

    fn finish(mut self) -> Result<Self> {
        resolve_secret(&mut self.server.webhook_api_key, ENV_WEBHOOK_API_KEY)?;
        resolve_secret(&mut self.leads.webhook_url, ENV_LEADS_WEBHOOK_URL)?;
        resolve_secret(&mut self.auth.api_key, ENV_AUTH_API_KEY)?;
        resolve_secret(&mut self.auth.url, ENV_AUTH_URL)?;
        resolve_secret(&mut self.server.site_url, ENV_SITE_URL)?;

        if let Some(url) = self.server.site_url.as_mut() {
            while url.ends_with('/') {
                url.pop();
            }
        }
        self.topics.window_days = self.topics.window_days.clamp(1, 365);
        self.topics.max_topics = self.topics.max_topics.clamp(1, DEFAULT_MAX_TOPICS);
        self.leads.max_retries = self.leads.max_retries.max(1);
        Ok(self)
    }
}

/// "ENV" → required env var; absent → optional env var; anything else is kept.
fn resolve_secret(slot: &mut Option<String>, var: &str) -> Result<()> {
    match slot.as_deref().map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("env") => {
            let val = env::var(var).map_err(|_| anyhow!("Missing {var} env var"))?;
            *slot = Some(val);
        }
        Some("") => *slot = None,
        Some(_) => {}
        None => {
            *slot = env::var(var).ok().filter(|v| !v.trim().is_empty());
        }
    }
    Ok(())
}
