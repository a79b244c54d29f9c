// src/config/mod.rs
mod app;

pub use app::{
    AppConfig, AuthConfig, LeadsConfig, ServerConfig, StoreConfig, ThresholdPreset, ThresholdSpec,
    TopicsSection, DEFAULT_CONFIG_PATH, ENV_CONFIG_PATH,
};
