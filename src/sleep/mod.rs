//! Sleep ring insights. Weekly snapshots are pulled one week at a time into the vault
//! ([ingest]) and later rolled up per month ([aggregate]).

pub mod aggregate;
pub mod client;
pub mod ingest;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SleepRingApi: Send + Sync {
    /// Raw insights payload for the week containing `week_start` (`DD-MM-YYYY`). The payload is
    /// stored as is, [InsightsResponse] is the typed view over it.
    async fn fetch_insights(&self, token: &str, week_start: &str) -> Result<Value>;
}

/// Accepts numbers, numeric strings and null.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(v)) => v.as_f64(),
        Some(Value::String(v)) => v.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InsightsResponse {
    #[serde(default)]
    pub data: Option<InsightsData>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InsightsData {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub average_scores: Option<AverageScores>,
    #[serde(default)]
    pub selected_week: Option<String>,
    #[serde(default)]
    pub sleep_index: Option<IndexInsight>,
    #[serde(default)]
    pub recovery_index: Option<IndexInsight>,
    #[serde(default)]
    pub movement_index: Option<IndexInsight>,
    #[serde(default)]
    pub weeks: Option<Weeks>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AverageScores {
    #[serde(default)]
    pub sleep_index: Option<Score>,
    #[serde(default)]
    pub recovery_index: Option<Score>,
    #[serde(default)]
    pub movement_index: Option<Score>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Score {
    #[serde(default, deserialize_with = "lenient_number")]
    pub value: Option<f64>,
    #[serde(default)]
    pub trend: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IndexInsight {
    #[serde(default)]
    pub contributors: Vec<IndexContributor>,
}

/// A named part of an index, like "HR Drop" or "Timing".
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IndexContributor {
    pub title: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub weekly_average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeekBounds {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Weeks {
    pub week_0: WeekBounds,
}

impl InsightsData {
    fn score(&self, pick: impl Fn(&AverageScores) -> Option<&Score>) -> Option<f64> {
        self.average_scores.as_ref().and_then(pick).and_then(|v| v.value)
    }

    pub fn sleep_score(&self) -> Option<f64> {
        self.score(|v| v.sleep_index.as_ref())
    }

    pub fn recovery_score(&self) -> Option<f64> {
        self.score(|v| v.recovery_index.as_ref())
    }

    pub fn movement_score(&self) -> Option<f64> {
        self.score(|v| v.movement_index.as_ref())
    }

    /// Contributors of all three indexes.
    pub fn contributors(&self) -> impl Iterator<Item = &IndexContributor> {
        [&self.sleep_index, &self.recovery_index, &self.movement_index]
            .into_iter()
            .flatten()
            .flat_map(|index| index.contributors.iter())
    }
}


#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;

    use super::{fixtures::insights, *};

    #[test]
    fn test_typed_view() -> Result<()> {
        let response: InsightsResponse = serde_json::from_value(insights(
            "13-03-2023",
            "19-03-2023",
            Some(78.),
            81.,
            60.,
            &[("HR Drop", 70.), ("Timing", 90.)],
        ))?;
        let data = response.data.expect("data should be present");
        assert_eq!(
            data.weeks.as_ref().map(|v| v.week_0.start.as_str()),
            Some("13-03-2023")
        );
        assert_eq!(data.sleep_score(), Some(78.));
        assert_eq!(data.recovery_score(), Some(81.));
        assert_eq!(data.contributors().count(), 2);
        Ok(())
    }

    #[test]
    fn test_lenient_numbers() -> Result<()> {
        let contributor: IndexContributor =
            serde_json::from_value(json!({ "title": "Steps", "weekly_average": "7.5" }))?;
        assert_eq!(contributor.weekly_average, Some(7.5));

        let contributor: IndexContributor =
            serde_json::from_value(json!({ "title": "Steps", "weekly_average": "n/a" }))?;
        assert_eq!(contributor.weekly_average, None);

        let contributor: IndexContributor = serde_json::from_value(json!({ "title": "Steps" }))?;
        assert_eq!(contributor.weekly_average, None);
        Ok(())
    }
}
