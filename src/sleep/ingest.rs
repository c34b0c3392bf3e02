//! Pulls the week following the last saved one. `index.json` in the sleep folder lists saved
//! week starts (`DD-MM-YYYY`) in order, each week lives next to it as `<start>.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    config::Config,
    fs::vault::{read_json, write_json},
    utils::time::add_days,
};

use super::{InsightsResponse, SleepRingApi};

/// The week tracking started with. An empty folder continues from here.
pub const FIRST_WEEK_START: &str = "13-03-2023";
const INDEX_FILE: &str = "index.json";
const DAYS_PER_WEEK: i64 = 7;

pub fn index_path(folder: &Path) -> PathBuf {
    folder.join(INDEX_FILE)
}

pub fn snapshot_path(folder: &Path, week_start: &str) -> PathBuf {
    folder.join(format!("{week_start}.json"))
}

/// Saved week starts, oldest first. A folder without an index starts at [FIRST_WEEK_START].
pub async fn read_week_index(folder: &Path) -> Result<Vec<String>> {
    Ok(read_json(&index_path(folder))
        .await?
        .unwrap_or_else(|| vec![FIRST_WEEK_START.to_string()]))
}

pub async fn fetch_last_saved_in_index(folder: &Path) -> Result<String> {
    Ok(read_week_index(folder)
        .await?
        .pop()
        .unwrap_or_else(|| FIRST_WEEK_START.to_string()))
}

pub async fn update_last_saved_index(folder: &Path, week_start: &str) -> Result<Vec<String>> {
    let mut index = read_week_index(folder).await?;
    index.push(week_start.to_string());
    write_json(&index_path(folder), &index).await?;
    Ok(index)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InsightsSave {
    #[serde(rename_all = "camelCase")]
    AlreadyWritten {
        msg: String,
        last_saved_week_start: String,
        insight_week_start: String,
    },
    #[serde(rename_all = "camelCase")]
    Written {
        msg: String,
        insight_week_start: String,
    },
}

/// Fetches the week after the last saved one and stores it, unless the ring answered with a week
/// that is already saved.
#[instrument(skip(api, config))]
pub async fn save_insights_to_vault(
    api: &impl SleepRingApi,
    config: &Config,
) -> Result<InsightsSave> {
    let folder = config.ultrahuman_folder_path.as_path();
    let last_saved = fetch_last_saved_in_index(folder).await?;
    let next_week = add_days(&last_saved, DAYS_PER_WEEK)?;
    info!("Last saved week is {last_saved}, fetching {next_week}");

    let raw = api
        .fetch_insights(&config.ultrahuman_token, &next_week)
        .await?;
    let insights: InsightsResponse =
        serde_json::from_value(raw.clone()).context("Unexpected insights payload")?;
    let insight_week_start = insights
        .data
        .and_then(|v| v.weeks)
        .map(|v| v.week_0.start)
        .context("Insights payload carries no current week")?;

    if insight_week_start == last_saved {
        info!("Week {insight_week_start} is saved already");
        return Ok(InsightsSave::AlreadyWritten {
            msg: "Insights written already".into(),
            last_saved_week_start: last_saved,
            insight_week_start,
        });
    }

    write_json(&snapshot_path(folder, &insight_week_start), &raw).await?;
    update_last_saved_index(folder, &insight_week_start).await?;
    info!("Saved week {insight_week_start}");
    Ok(InsightsSave::Written {
        msg: "Insights file written successfully".into(),
        insight_week_start,
    })
}

#[cfg(test)]
mod tests {
    use anyhow::{anyhow, Result};
    use serde_json::{json, Value};
    use tempfile::tempdir;

    use super::*;
    use crate::{
        sleep::{fixtures::insights, MockSleepRingApi},
        utils::logging::TEST_LOGGING,
    };

    fn config_for(folder: &Path) -> Config {
        Config {
            ultrahuman_folder_path: folder.to_path_buf(),
            ultrahuman_token: "ring-token".into(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_index_defaults() -> Result<()> {
        let dir = tempdir()?;
        assert_eq!(fetch_last_saved_in_index(dir.path()).await?, FIRST_WEEK_START);

        let index = update_last_saved_index(dir.path(), "20-03-2023").await?;
        assert_eq!(index, vec!["13-03-2023", "20-03-2023"]);
        assert_eq!(fetch_last_saved_in_index(dir.path()).await?, "20-03-2023");

        write_json(&index_path(dir.path()), &Vec::<String>::new()).await?;
        assert_eq!(fetch_last_saved_in_index(dir.path()).await?, FIRST_WEEK_START);
        Ok(())
    }

    #[tokio::test]
    async fn test_saves_next_week_once() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let config = config_for(dir.path());
        write_json(
            &index_path(dir.path()),
            &vec!["13-03-2023", "20-03-2023", "02-04-2023"],
        )
        .await?;

        // The ring snaps the requested day to the start of its week.
        let mut api = MockSleepRingApi::new();
        api.expect_fetch_insights()
            .withf(|token, week| token.to_string() == "ring-token" && week.to_string() == "09-04-2023")
            .times(1)
            .returning(|_, _| {
                Ok(insights("03-04-2023", "09-04-2023", Some(80.), 70., 60., &[]))
            });

        let result = save_insights_to_vault(&api, &config).await?;
        assert_eq!(
            result,
            InsightsSave::Written {
                msg: "Insights file written successfully".into(),
                insight_week_start: "03-04-2023".into(),
            }
        );
        assert_eq!(
            read_week_index(dir.path()).await?,
            vec!["13-03-2023", "20-03-2023", "02-04-2023", "03-04-2023"]
        );
        let stored: Option<Value> = read_json(&snapshot_path(dir.path(), "03-04-2023")).await?;
        assert_eq!(
            stored.map(|v| v["data"]["weeks"]["week_0"]["end"].clone()),
            Some(json!("09-04-2023"))
        );

        // The next run asks for 10-04 and gets the same week back.
        let mut api = MockSleepRingApi::new();
        api.expect_fetch_insights()
            .withf(|_, week| week.to_string() == "10-04-2023")
            .times(1)
            .returning(|_, _| {
                Ok(insights("03-04-2023", "09-04-2023", Some(80.), 70., 60., &[]))
            });

        let result = save_insights_to_vault(&api, &config).await?;
        assert_eq!(
            serde_json::to_value(&result)?,
            json!({
                "msg": "Insights written already",
                "lastSavedWeekStart": "03-04-2023",
                "insightWeekStart": "03-04-2023",
            })
        );
        assert_eq!(read_week_index(dir.path()).await?.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_failures_leave_index_untouched() -> Result<()> {
        let dir = tempdir()?;
        let config = config_for(dir.path());

        let mut api = MockSleepRingApi::new();
        api.expect_fetch_insights()
            .returning(|_, _| Err(anyhow!("unauthorized")));
        assert!(save_insights_to_vault(&api, &config).await.is_err());

        let mut api = MockSleepRingApi::new();
        api.expect_fetch_insights()
            .returning(|_, _| Ok(json!({ "data": null, "error": "no data" })));
        assert!(save_insights_to_vault(&api, &config).await.is_err());

        assert!(read_json::<Vec<String>>(&index_path(dir.path()))
            .await?
            .is_none());
        Ok(())
    }
}
