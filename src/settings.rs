// src/settings.rs
//! Per-user dashboard preferences.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::topics::DEFAULT_WINDOW_DAYS;

/// Periods offered by the date filter.
pub const PERIOD_OPTIONS: [i64; 4] = [7, 14, 30, 60];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub sidebar_collapsed: bool,
    pub default_period: i64,
    pub favorite_regions: Vec<String>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            sidebar_collapsed: false,
            default_period: DEFAULT_WINDOW_DAYS,
            favorite_regions: Vec::new(),
        }
    }
}

/// Partial update; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub sidebar_collapsed: Option<bool>,
    pub default_period: Option<i64>,
    pub favorite_regions: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("default_period must be one of 7, 14, 30, 60 (got {0})")]
    InvalidPeriod(i64),
}

#[derive(Debug, Default)]
pub struct SettingsStore {
    inner: RwLock<HashMap<String, UserSettings>>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> UserSettings {
        let g = self.inner.read().unwrap_or_else(|e| e.into_inner());
        g.get(user_id).cloned().unwrap_or_default()
    }

    pub fn update(&self, user_id: &str, patch: SettingsPatch) -> Result<UserSettings, SettingsError> {
        if let Some(p) = patch.default_period {
            if !PERIOD_OPTIONS.contains(&p) {
                return Err(SettingsError::InvalidPeriod(p));
            }
        }
        let mut g = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let entry = g.entry(user_id.to_string()).or_default();
        if let Some(v) = patch.sidebar_collapsed {
            entry.sidebar_collapsed = v;
        }
        if let Some(v) = patch.default_period {
            entry.default_period = v;
        }
        if let Some(regions) = patch.favorite_regions {
            let mut out: Vec<String> = Vec::with_capacity(regions.len());
            for r in regions {
                let r = r.trim().to_string();
                if !r.is_empty() && !out.contains(&r) {
                    out.push(r);
                }
            }
            entry.favorite_regions = out;
        }
        Ok(entry.clone())
    }
}
