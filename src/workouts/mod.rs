//! Workouts tracked in a spreadsheet, one header cell per workout day.

pub mod aggregate;

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    config::Config,
    fs::vault::{write_json, SaveOutcome},
    notion::{
        key_results::{
            create_monthly_key_result_page, set_key_result_current_value, CurrentValueUpdate,
            KeyResultCreation, KeyResultKind, KeyResultTemplate,
        },
        NotesDatabase,
    },
    sheets::SpreadsheetSource,
    utils::{
        clock::Clock,
        time::{current_month, current_year, month_name, weekdays_in_month, weekdays_passed, Period},
    },
};

use aggregate::{
    count_by_year_month, generate_yearly_workout_aggregates, monthly_workout_data,
    parse_workout_dates, MonthlyWorkoutData, YearlyWorkoutAggregates,
};

pub const SAVED_MSG: &str = "Stats saved successfully";
const WORKOUT_EMOJI: &str = "🐒";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSheetData {
    pub by_year_month: BTreeMap<i32, BTreeMap<u32, MonthlyWorkoutData>>,
    pub aggregates: BTreeMap<i32, Option<YearlyWorkoutAggregates>>,
    pub current_year: i32,
    pub current_month: u32,
    pub weekdays: u32,
    pub weekdays_passed: u32,
    /// The current month, absent until the first workout of the month.
    pub latest: Option<MonthlyWorkoutData>,
}

impl WorkoutSheetData {
    pub fn count_for(&self, period: Period) -> u32 {
        self.by_year_month
            .get(&period.year)
            .and_then(|v| v.get(&period.month))
            .map_or(0, |v| v.count)
    }
}

#[instrument(skip(sheets, config, clock))]
pub async fn fetch_workout_sheet_data(
    sheets: &impl SpreadsheetSource,
    config: &Config,
    clock: &dyn Clock,
) -> Result<WorkoutSheetData> {
    let headers = sheets.header_values(&config.workout_tracker_sheet_id).await?;
    let dates = parse_workout_dates(&headers);
    info!("Found {} workout days in {} header cells", dates.len(), headers.len());

    let current_year = current_year(clock);
    let current_month = current_month(clock);
    let weekdays_passed = weekdays_passed(clock, current_year, current_month);

    let by_year_month = monthly_workout_data(&count_by_year_month(&dates), weekdays_passed);
    let aggregates = by_year_month
        .iter()
        .map(|(&year, months)| (year, generate_yearly_workout_aggregates(months)))
        .collect();
    let latest = by_year_month
        .get(&current_year)
        .and_then(|v| v.get(&current_month))
        .cloned();

    Ok(WorkoutSheetData {
        by_year_month,
        aggregates,
        current_year,
        current_month,
        weekdays: weekdays_in_month(current_year, current_month),
        weekdays_passed,
        latest,
    })
}

/// Tracker aiming for a workout every weekday of the month.
pub fn workout_key_result_template(config: &Config, period: Period) -> KeyResultTemplate {
    let weekdays = weekdays_in_month(period.year, period.month);
    KeyResultTemplate {
        kind: KeyResultKind::Workouts,
        title: format!(
            "Workout {weekdays} times during {}, {} ⁂",
            month_name(period.month),
            period.year
        ),
        target: weekdays,
        parents: vec![config.anchor_node_ids.workout_five_times_a_week.clone()],
        emoji: WORKOUT_EMOJI.into(),
    }
}

pub async fn set_current_value_of_workout_key_result(
    db: &impl NotesDatabase,
    sheets: &impl SpreadsheetSource,
    config: &Config,
    clock: &dyn Clock,
    period: Period,
) -> Result<CurrentValueUpdate> {
    set_key_result_current_value(db, config, KeyResultKind::Workouts, period, move || async move {
        let data = fetch_workout_sheet_data(sheets, config, clock).await?;
        Ok(data.count_for(period))
    })
    .await
}

pub async fn create_monthly_workout_key_result(
    db: &impl NotesDatabase,
    config: &Config,
    period: Period,
) -> Result<KeyResultCreation> {
    create_monthly_key_result_page(db, config, workout_key_result_template(config, period), period)
        .await
}

/// Writes the whole sheet summary, replacing the previous file.
pub async fn save_workout_stats_to_vault(
    sheets: &impl SpreadsheetSource,
    config: &Config,
    clock: &dyn Clock,
) -> Result<SaveOutcome> {
    let stats = fetch_workout_sheet_data(sheets, config, clock).await?;
    let save_path = &config.workout_stats_save_path;
    let result = write_json(save_path, &stats).await;
    Ok(SaveOutcome::from_result(result, save_path, SAVED_MSG))
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    use super::*;
    use crate::{
        fs::vault::read_json,
        notion::{test_pages::empty_page, MockNotesDatabase, QueryPage},
        sheets::MockSpreadsheetSource,
        utils::clock::FixedClock,
    };

    fn sheets() -> MockSpreadsheetSource {
        let mut sheets = MockSpreadsheetSource::new();
        sheets
            .expect_header_values()
            .withf(|id| id.to_string() == Config::default().workout_tracker_sheet_id)
            .returning(|_| {
                Ok(vec![
                    "December 28, 2023".into(),
                    "December 29, 2023".into(),
                    "Exercise".into(),
                    "January 2, 2024".into(),
                    "January 3, 2024".into(),
                    "January 4, 2024".into(),
                    "January 4, 2024".into(),
                ])
            });
        sheets
    }

    #[tokio::test]
    async fn test_fetch_workout_sheet_data() -> Result<()> {
        // Wednesday, 8 weekdays into January.
        let clock = FixedClock::ymd(2024, 1, 10);
        let data = fetch_workout_sheet_data(&sheets(), &Config::default(), &clock).await?;

        assert_eq!(data.current_year, 2024);
        assert_eq!(data.current_month, 1);
        assert_eq!(data.weekdays, 23);
        assert_eq!(data.weekdays_passed, 8);
        assert_eq!(data.count_for(Period::new(2024, 1)), 3);
        assert_eq!(data.count_for(Period::new(2023, 12)), 2);
        assert_eq!(data.count_for(Period::new(2023, 11)), 0);
        assert_eq!(data.latest.as_ref().map(|v| v.show_up_rate.as_str()), Some("38"));
        assert_eq!(data.by_year_month[&2023][&12].show_up_rate, "25");
        assert!(data.aggregates.contains_key(&2023));
        assert!(data.aggregates.contains_key(&2024));
        Ok(())
    }

    #[test]
    fn test_template() {
        let template = workout_key_result_template(&Config::default(), Period::new(2023, 12));
        assert_eq!(template.title, "Workout 21 times during December, 2023 ⁂");
        assert_eq!(template.target, 21);
        assert_eq!(
            template.parents,
            vec![Config::default().anchor_node_ids.workout_five_times_a_week]
        );
    }

    #[tokio::test]
    async fn test_save_workout_stats() -> Result<()> {
        let dir = tempdir()?;
        let config = Config {
            workout_stats_save_path: dir.path().join("vault/workouts.json"),
            ..Config::default()
        };

        let outcome =
            save_workout_stats_to_vault(&sheets(), &config, &FixedClock::ymd(2024, 1, 10)).await?;
        assert!(outcome.is_saved());
        assert_eq!(outcome.msg, SAVED_MSG);

        let stored: Value = read_json(&config.workout_stats_save_path)
            .await?
            .expect("stats should be written");
        assert_eq!(stored["latest"], json!({ "count": 3, "target": 23, "showUpRate": "38" }));
        assert_eq!(stored["byYearMonth"]["2023"]["12"]["count"], 2);
        assert_eq!(stored["aggregates"]["2024"]["totalWorkouts"], 3);
        assert_eq!(stored["weekdaysPassed"], 8);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_current_value() -> Result<()> {
        let mut db = MockNotesDatabase::new();
        db.expect_query_database().returning(|_, _| {
            Ok(QueryPage {
                results: vec![empty_page("kr")],
                next_cursor: None,
            })
        });
        db.expect_update_page()
            .withf(|_, properties| properties["Current"]["number"] == 2)
            .times(1)
            .returning(|id, _| Ok(empty_page(id)));

        let result = set_current_value_of_workout_key_result(
            &db,
            &sheets(),
            &Config::default(),
            &FixedClock::ymd(2024, 1, 10),
            Period::new(2023, 12),
        )
        .await?;
        assert!(matches!(result, CurrentValueUpdate::Updated { new_val: 2, .. }));
        Ok(())
    }
}
