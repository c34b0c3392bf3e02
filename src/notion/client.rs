use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::{DatabaseQuery, NewPage, NotesDatabase, Page, QueryPage};

const NOTION_API_BASE: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

/// [NotesDatabase] backed by the Notion REST api. The token is opaque and only forwarded.
pub struct NotionClient {
    client: reqwest::Client,
    token: String,
    base: String,
}

impl NotionClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base(token, NOTION_API_BASE)
    }

    pub fn with_base(token: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            base: base.into(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{path}", self.base))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let response = request.send().await.context("Failed to reach Notion")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Notion API returned status {status}: {body}");
        }
        response
            .json()
            .await
            .context("Failed to parse Notion response")
    }
}

#[async_trait]
impl NotesDatabase for NotionClient {
    #[instrument(skip(self, query))]
    async fn query_database(&self, database_id: &str, query: &DatabaseQuery) -> Result<QueryPage> {
        debug!("Querying with cursor {:?}", query.start_cursor);
        Self::send(
            self.request(Method::POST, &format!("databases/{database_id}/query"))
                .json(query),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn retrieve_page(&self, page_id: &str) -> Result<Page> {
        Self::send(self.request(Method::GET, &format!("pages/{page_id}"))).await
    }

    #[instrument(skip(self, page))]
    async fn create_page(&self, page: &NewPage) -> Result<Page> {
        Self::send(self.request(Method::POST, "pages").json(page)).await
    }

    #[instrument(skip(self, properties))]
    async fn update_page(&self, page_id: &str, properties: &Value) -> Result<Page> {
        Self::send(
            self.request(Method::PATCH, &format!("pages/{page_id}"))
                .json(&json!({ "properties": properties })),
        )
        .await
    }
}
