use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use fs4::tokio::AsyncFileExt;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, error};

/// Reads a JSON document. A file that doesn't exist yet is `None`.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            let value = serde_json::from_str(&content)
                .with_context(|| format!("Illegal json in {path:?}"))?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {path:?}")),
    }
}

/// Replaces the whole file with `value`. Parent directories are created when missing.
pub async fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let buffer = serde_json::to_vec(value)?;

    if let Some(parent) = path.parent().filter(|v| !v.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = File::options()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .await
        .with_context(|| format!("Failed to open {path:?}"))?;

    // Truncate only while holding the lock.
    file.lock_exclusive()?;
    let result = async {
        file.set_len(0).await?;
        file.write_all(&buffer).await?;
        file.flush().await
    }
    .await;
    file.unlock_async().await?;
    result?;

    debug!("Wrote {} bytes into {path:?}", buffer.len());
    Ok(())
}

/// A vault document keyed by `year -> month`, with room for extra top level keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VaultFile {
    root: Map<String, Value>,
}

impl VaultFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the document at `path`. Missing and blank files are treated as an empty document.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e).with_context(|| format!("Failed to read {path:?}")),
        };

        if content.trim().is_empty() {
            return Ok(Self::new());
        }

        match serde_json::from_str::<Value>(&content)
            .with_context(|| format!("Illegal json in {path:?}"))?
        {
            Value::Object(root) => Ok(Self { root }),
            other => bail!("Vault file {path:?} should hold an object, found {other}"),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        write_json(path, &self.root).await
    }

    pub fn month(&self, year: i32, month: u32) -> Option<&Value> {
        self.root
            .get(&year.to_string())
            .and_then(|v| v.get(month.to_string()))
    }

    /// Puts `value` under `year -> month`, replacing whatever was stored there. Other months of
    /// the year stay untouched.
    pub fn set_month(&mut self, year: i32, month: u32, value: Value) {
        let year_entry = self
            .root
            .entry(year.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !year_entry.is_object() {
            *year_entry = Value::Object(Map::new());
        }
        if let Value::Object(months) = year_entry {
            months.insert(month.to_string(), value);
        }
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.root.insert(key.to_string(), value);
    }
}

/// What a pipeline reports after trying to persist into the vault.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub for_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub for_month: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub msg: String,
}

pub const SAVE_FAILED_MSG: &str = "Error saving stats";

impl SaveOutcome {
    /// Turns the result of a save into an outcome, logging failures instead of propagating them.
    pub fn from_result(result: Result<()>, save_path: &Path, msg: &str) -> Self {
        match result {
            Ok(()) => Self {
                save_path: Some(save_path.to_path_buf()),
                for_year: None,
                for_month: None,
                error: None,
                msg: msg.into(),
            },
            Err(e) => {
                error!("Failed to save into {save_path:?}: {e:?}");
                Self {
                    save_path: None,
                    for_year: None,
                    for_month: None,
                    error: Some(format!("{e:#}")),
                    msg: SAVE_FAILED_MSG.into(),
                }
            }
        }
    }

    pub fn for_period(mut self, year: i32, month: u32) -> Self {
        self.for_year = Some(year);
        self.for_month = Some(month);
        self
    }

    pub fn is_saved(&self) -> bool {
        self.error.is_none()
    }
}
