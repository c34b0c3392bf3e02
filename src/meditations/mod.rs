//! Meditations and observations logged in the notes database, summarised per month.

pub mod aggregate;
pub mod report;

use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::{
    config::Config,
    fs::vault::{SaveOutcome, VaultFile},
    notion::{
        key_results::{
            create_monthly_key_result_page, set_key_result_current_value, CurrentValueUpdate,
            KeyResultCreation, KeyResultKind, KeyResultTemplate,
        },
        records::{meditations_for_month, observations_for_month},
        NotesDatabase,
    },
    utils::{
        clock::Clock,
        time::{current_day, month_name, Period},
    },
};

use aggregate::{compute_meditation_aggregate, MeditationAggregate};
use report::MeditationReport;

pub const SAVED_MSG: &str = "Meditation aggregates saved successfully";
pub const LATEST_KEY: &str = "latestForDashboard";
const MEDITATION_EMOJI: &str = "🧘";
const OBSERVATION_EMOJI: &str = "👀";

#[instrument(skip(db, config, clock))]
pub async fn fetch_data_and_compute_aggregates(
    db: &impl NotesDatabase,
    config: &Config,
    clock: &dyn Clock,
    period: Period,
) -> Result<MeditationAggregate> {
    let observations = observations_for_month(db, config, period).await?;
    let meditations = meditations_for_month(db, config, period).await?;
    Ok(compute_meditation_aggregate(
        &observations,
        &meditations,
        period,
        clock,
    ))
}

/// Date context the dashboard shows next to the latest month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardContext {
    current_day: u32,
    current_year: i32,
    current_month: u32,
    days_in_current_month: u32,
    target_observations_per_day: u32,
}

/// The current month's entry with date context merged in. Until the current month has an entry,
/// the previous month stands in as if it were complete. `Null` when neither month is stored.
pub fn latest_for_dashboard(vault: &VaultFile, config: &Config, clock: &dyn Clock) -> Result<Value> {
    let current = Period::current(clock);
    let target_observations_per_day = config.target_observations_per_day;

    let (entry, context) = match vault.month(current.year, current.month) {
        Some(entry) => (
            entry,
            DashboardContext {
                current_day: current_day(clock),
                current_year: current.year,
                current_month: current.month,
                days_in_current_month: current.last_day(),
                target_observations_per_day,
            },
        ),
        None => {
            let previous = current.previous();
            let Some(entry) = vault.month(previous.year, previous.month) else {
                return Ok(Value::Null);
            };
            let days = previous.last_day();
            (
                entry,
                DashboardContext {
                    current_day: days,
                    current_year: previous.year,
                    current_month: previous.month,
                    days_in_current_month: days,
                    target_observations_per_day,
                },
            )
        }
    };

    let mut latest = match entry {
        Value::Object(fields) => fields.clone(),
        _ => Map::new(),
    };
    if let Value::Object(context) = serde_json::to_value(context)? {
        latest.extend(context);
    }
    Ok(Value::Object(latest))
}

/// Computes the month and merges it into the aggregates file. Fetch failures propagate, failures
/// to persist are reported in the outcome.
pub async fn save_meditation_aggregates_to_vault(
    db: &impl NotesDatabase,
    config: &Config,
    clock: &dyn Clock,
    period: Period,
) -> Result<SaveOutcome> {
    let aggregate = fetch_data_and_compute_aggregates(db, config, clock, period).await?;
    let save_path = &config.meditation_aggregates_save_path;
    info!("Merging {}-{} into {save_path:?}", period.year, period.month);

    let result = async {
        let mut vault = VaultFile::load(save_path).await?;
        vault.set_month(period.year, period.month, serde_json::to_value(&aggregate)?);
        let latest = latest_for_dashboard(&vault, config, clock)?;
        vault.set(LATEST_KEY, latest);
        vault.save(save_path).await
    }
    .await;

    Ok(SaveOutcome::from_result(result, save_path, SAVED_MSG).for_period(period.year, period.month))
}

pub async fn meditation_report(
    db: &impl NotesDatabase,
    config: &Config,
    clock: &dyn Clock,
    period: Period,
) -> Result<MeditationReport> {
    let aggregate = fetch_data_and_compute_aggregates(db, config, clock, period).await?;
    MeditationReport::from_aggregate(&aggregate)
}

/// One sitting per day.
pub fn meditations_key_result_template(config: &Config, period: Period) -> KeyResultTemplate {
    let target = period.last_day();
    KeyResultTemplate {
        kind: KeyResultKind::Meditations,
        title: format!(
            "Meditate {target} times during {}, {} ⁂",
            month_name(period.month),
            period.year
        ),
        target,
        parents: vec![config.anchor_node_ids.meditate_every_day.clone()],
        emoji: MEDITATION_EMOJI.into(),
    }
}

pub fn observations_key_result_template(config: &Config, period: Period) -> KeyResultTemplate {
    let target = period.last_day() * config.target_observations_per_day;
    KeyResultTemplate {
        kind: KeyResultKind::Observations,
        title: format!(
            "Observe {target} times during {}, {} ⁂",
            month_name(period.month),
            period.year
        ),
        target,
        parents: vec![config.anchor_node_ids.awareness.clone()],
        emoji: OBSERVATION_EMOJI.into(),
    }
}

pub async fn create_monthly_meditations_key_result(
    db: &impl NotesDatabase,
    config: &Config,
    period: Period,
) -> Result<KeyResultCreation> {
    create_monthly_key_result_page(
        db,
        config,
        meditations_key_result_template(config, period),
        period,
    )
    .await
}

pub async fn create_monthly_observations_key_result(
    db: &impl NotesDatabase,
    config: &Config,
    period: Period,
) -> Result<KeyResultCreation> {
    create_monthly_key_result_page(
        db,
        config,
        observations_key_result_template(config, period),
        period,
    )
    .await
}

pub async fn set_current_value_of_meditations_key_result(
    db: &impl NotesDatabase,
    config: &Config,
    period: Period,
) -> Result<CurrentValueUpdate> {
    set_key_result_current_value(db, config, KeyResultKind::Meditations, period, move || async move {
        Ok(meditations_for_month(db, config, period).await?.len() as u32)
    })
    .await
}

pub async fn set_current_value_of_observations_key_result(
    db: &impl NotesDatabase,
    config: &Config,
    period: Period,
) -> Result<CurrentValueUpdate> {
    set_key_result_current_value(db, config, KeyResultKind::Observations, period, move || async move {
        Ok(observations_for_month(db, config, period).await?.len() as u32)
    })
    .await
}
