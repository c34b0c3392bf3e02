use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use super::SleepRingApi;

/// [SleepRingApi] backed by the Ultrahuman insights endpoint.
pub struct UltrahumanClient {
    client: reqwest::Client,
    base: String,
}

impl UltrahumanClient {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.into(),
        }
    }
}

#[async_trait]
impl SleepRingApi for UltrahumanClient {
    #[instrument(skip(self, token))]
    async fn fetch_insights(&self, token: &str, week_start: &str) -> Result<Value> {
        let response = self
            .client
            .get(&self.base)
            .query(&[("token", token), ("date", week_start)])
            .send()
            .await
            .context("Failed to reach the sleep ring api")?;
        let status = response.status();
        if !status.is_success() {
            bail!("Sleep ring api returned status {status}");
        }
        response
            .json()
            .await
            .context("Failed to parse sleep ring insights")
    }
}
