use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Url;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, instrument};

use super::SpreadsheetSource;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct Sheet {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetInfo {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// [SpreadsheetSource] reading a public Google spreadsheet with an api key.
pub struct GoogleSheetsClient {
    client: reqwest::Client,
    api_key: String,
}

impl GoogleSheetsClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(SHEETS_API_BASE)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Sheets api base can't take path segments"))?
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url, query: &[(&str, &str)]) -> Result<T> {
        let response = self
            .client
            .get(url)
            .query(&[("key", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .context("Failed to reach Google Sheets")?;
        let status = response.status();
        if !status.is_success() {
            bail!("Google Sheets returned status {status}");
        }
        response
            .json()
            .await
            .context("Failed to parse Google Sheets response")
    }

    async fn header_row(&self, sheet_id: &str, title: &str) -> Result<Vec<String>> {
        let range = format!("'{}'!1:1", title.replace('\'', "''"));
        let url = self.url(&[sheet_id, "values", &range])?;
        let rows: ValueRange = self.get(url, &[]).await?;
        Ok(rows.values.into_iter().next().unwrap_or_default())
    }
}

#[async_trait]
impl SpreadsheetSource for GoogleSheetsClient {
    #[instrument(skip(self))]
    async fn header_values(&self, sheet_id: &str) -> Result<Vec<String>> {
        let info: SpreadsheetInfo = self
            .get(self.url(&[sheet_id])?, &[("fields", "sheets.properties.title")])
            .await?;
        debug!("Spreadsheet has {} worksheets", info.sheets.len());

        let headers = try_join_all(
            info.sheets
                .iter()
                .map(|sheet| self.header_row(sheet_id, &sheet.properties.title)),
        )
        .await?;

        Ok(headers.into_iter().flatten().collect())
    }
}
