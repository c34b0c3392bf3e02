//! Monthly roll up of the saved weekly snapshots. A week belongs to the month its start date falls
//! into.

use std::{collections::BTreeMap, path::Path};

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::Config,
    fs::vault::{read_json, SaveOutcome, VaultFile},
    utils::{
        clock::Clock,
        fixed::round2,
        time::{Period, WEEK_START_FORMAT},
    },
};

use super::{
    ingest::{read_week_index, snapshot_path},
    InsightsData, InsightsResponse,
};

pub const SAVED_MSG: &str = "Sleep aggregates saved successfully";

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklySnapshot {
    pub week_start: NaiveDate,
    pub insights: InsightsData,
}

impl WeeklySnapshot {
    pub fn period(&self) -> Period {
        Period::new(self.week_start.year(), self.week_start.month())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepMonthlyStats {
    pub sleep_index: Option<f64>,
    pub recovery_index: Option<f64>,
    pub movement_index: Option<f64>,
    /// Some week of the month has no sleep index, usually because the ring wasn't worn.
    pub sleep_tracker_missing_info: bool,
    pub contributor_averages: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SleepAggregates {
    pub by_month: BTreeMap<Period, SleepMonthlyStats>,
    /// Stats of the current month, if it has any weeks yet.
    pub latest: Option<SleepMonthlyStats>,
}

impl SleepAggregates {
    pub fn to_vault(&self) -> Result<VaultFile> {
        let mut vault = VaultFile::new();
        for (period, stats) in &self.by_month {
            vault.set_month(period.year, period.month, serde_json::to_value(stats)?);
        }
        vault.set("latest", serde_json::to_value(&self.latest)?);
        Ok(vault)
    }
}

/// Every indexed week that has a snapshot on disk, in index order. Index entries without a
/// snapshot are skipped.
pub async fn read_all_sleep_data_from_disk(folder: &Path) -> Result<Vec<WeeklySnapshot>> {
    let mut snapshots = vec![];
    for week_start in read_week_index(folder).await? {
        let Ok(date) = NaiveDate::parse_from_str(&week_start, WEEK_START_FORMAT) else {
            warn!("Skipping index entry {week_start:?}, not a DD-MM-YYYY date");
            continue;
        };
        let Some(response) =
            read_json::<InsightsResponse>(&snapshot_path(folder, &week_start)).await?
        else {
            debug!("No snapshot saved for {week_start}");
            continue;
        };
        let Some(insights) = response.data else {
            warn!("Snapshot {week_start} carries no data");
            continue;
        };
        snapshots.push(WeeklySnapshot {
            week_start: date,
            insights,
        });
    }
    Ok(snapshots)
}

pub fn group_all_data_by_year_and_month(
    snapshots: Vec<WeeklySnapshot>,
) -> BTreeMap<Period, Vec<WeeklySnapshot>> {
    let mut grouped: BTreeMap<Period, Vec<WeeklySnapshot>> = BTreeMap::new();
    for snapshot in snapshots {
        grouped.entry(snapshot.period()).or_default().push(snapshot);
    }
    grouped
}

/// Every recorded weekly average, per contributor title.
pub fn extract_contributors(snapshots: &[WeeklySnapshot]) -> BTreeMap<String, Vec<f64>> {
    let mut contributors: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for contributor in snapshots.iter().flat_map(|v| v.insights.contributors()) {
        if let Some(average) = contributor.weekly_average {
            contributors
                .entry(contributor.title.clone())
                .or_default()
                .push(average);
        }
    }
    contributors
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0., 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| round2(sum / count as f64))
}

pub fn monthly_stats(snapshots: &[WeeklySnapshot]) -> SleepMonthlyStats {
    let scores = |pick: fn(&InsightsData) -> Option<f64>| {
        mean(snapshots.iter().filter_map(|v| pick(&v.insights)))
    };
    SleepMonthlyStats {
        sleep_index: scores(InsightsData::sleep_score),
        recovery_index: scores(InsightsData::recovery_score),
        movement_index: scores(InsightsData::movement_score),
        sleep_tracker_missing_info: snapshots.iter().any(|v| v.insights.sleep_score().is_none()),
        contributor_averages: extract_contributors(snapshots)
            .into_iter()
            .filter_map(|(title, values)| mean(values).map(|v| (title, v)))
            .collect(),
    }
}

pub async fn aggregate_weekly_data(folder: &Path, clock: &dyn Clock) -> Result<SleepAggregates> {
    let snapshots = read_all_sleep_data_from_disk(folder).await?;
    info!("Aggregating {} weekly snapshots", snapshots.len());

    let by_month = group_all_data_by_year_and_month(snapshots)
        .into_iter()
        .map(|(period, weeks)| (period, monthly_stats(&weeks)))
        .collect::<BTreeMap<_, _>>();
    let latest = by_month.get(&Period::current(clock)).cloned();
    Ok(SleepAggregates { by_month, latest })
}

/// Rebuilds the sleep aggregates file from every saved week.
#[instrument(skip(config, clock))]
pub async fn save_sleep_stats_to_vault(config: &Config, clock: &dyn Clock) -> Result<SaveOutcome> {
    let aggregates = aggregate_weekly_data(&config.ultrahuman_folder_path, clock).await?;
    let save_path = &config.ultrahuman_sleep_aggregates_save_path;
    let result = async { aggregates.to_vault()?.save(save_path).await }.await;
    Ok(SaveOutcome::from_result(result, save_path, SAVED_MSG))
}
