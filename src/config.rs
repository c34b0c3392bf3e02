//! Everything the pipelines need to know about the outside world. A [Config] is built once by the
//! cli and handed to every pipeline explicitly.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

pub const NOTION_TOKEN_VAR: &str = "NOTION_TOKEN";
pub const GOOGLE_SHEETS_API_KEY_VAR: &str = "GOOGLE_SHEETS_API_KEY";
pub const ULTRAHUMAN_R1_TOKEN_VAR: &str = "ULTRAHUMAN_R1_TOKEN";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NotionDbIds {
    pub observations: String,
    pub meditations: String,
    /// Objectives and key results live here.
    pub nodes: String,
}

impl Default for NotionDbIds {
    fn default() -> Self {
        Self {
            observations: "71681b1b2a5a46549ac4b2e7009e13d8".into(),
            meditations: "5dbc0d1f7cab4a618295a8f0e11a89b5".into(),
            nodes: "4bcaa64e19504affa3add738ab93d45f".into(),
        }
    }
}

/// Objectives new key results get linked to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnchorNodeIds {
    pub meditate_every_day: String,
    pub workout_five_times_a_week: String,
    pub awareness: String,
}

impl Default for AnchorNodeIds {
    fn default() -> Self {
        Self {
            meditate_every_day: "0d589e8a12ef4c71a8a87a2492ad0257".into(),
            workout_five_times_a_week: "9e7aa2f59e7041718ce19b7f8511269b".into(),
            awareness: "6492e9e915be40a3a117a01363654402".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub notion_token: String,
    pub google_sheets_api_key: String,
    pub ultrahuman_token: String,
    pub notion_db_ids: NotionDbIds,
    pub anchor_node_ids: AnchorNodeIds,
    pub workout_tracker_sheet_id: String,
    pub ultrahuman_api_base: String,
    pub workout_stats_save_path: PathBuf,
    /// Folder holding weekly sleep snapshots and their `index.json`.
    pub ultrahuman_folder_path: PathBuf,
    pub ultrahuman_sleep_aggregates_save_path: PathBuf,
    pub meditation_aggregates_save_path: PathBuf,
    pub target_observations_per_day: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notion_token: String::new(),
            google_sheets_api_key: String::new(),
            ultrahuman_token: String::new(),
            notion_db_ids: NotionDbIds::default(),
            anchor_node_ids: AnchorNodeIds::default(),
            workout_tracker_sheet_id: "1_xT1rEBccwWMRKwZoxq6UDyHTYC9EygOU17TzxAsHbw".into(),
            ultrahuman_api_base: "https://api.ultrahuman.com/api/web_v1/ring_insights.json".into(),
            workout_stats_save_path: "./vault/workouts.json".into(),
            ultrahuman_folder_path: "./vault/ultrahuman".into(),
            ultrahuman_sleep_aggregates_save_path: "./vault/ultrahuman/sleep.json".into(),
            meditation_aggregates_save_path: "./vault/meditations.json".into(),
            target_observations_per_day: 3,
        }
    }
}

impl Config {
    /// Reads the optional toml file, then lets the environment provide tokens.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                debug!("Loading config from {path:?}");
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {path:?}"))?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };
        Ok(config.with_env_tokens(|name| std::env::var(name).ok()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Illegal config file")
    }

    fn with_env_tokens(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup(NOTION_TOKEN_VAR) {
            self.notion_token = v;
        }
        if let Some(v) = lookup(GOOGLE_SHEETS_API_KEY_VAR) {
            self.google_sheets_api_key = v;
        }
        if let Some(v) = lookup(ULTRAHUMAN_R1_TOKEN_VAR) {
            self.ultrahuman_token = v;
        }
        self
    }
}
