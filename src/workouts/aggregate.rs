use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::utils::{
    fixed::{round2, to_fixed},
    time::{month_name, weekdays_in_month},
};

const HEADER_DATE_FORMATS: [&str; 2] = ["%B %d, %Y", "%B %d %Y"];

/// Counts per `year -> month`.
pub type CountByYearMonth = BTreeMap<i32, BTreeMap<u32, u32>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyWorkoutData {
    pub count: u32,
    /// Weekdays of the month.
    pub target: u32,
    pub show_up_rate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyWorkoutAggregates {
    pub total_workouts: u32,
    pub average_workouts_per_month: f64,
    pub month_with_most_workouts: String,
    pub month_with_least_workouts: String,
}

fn starts_with_month_name(header: &str) -> bool {
    (1..=12).map(month_name).any(|name| {
        header
            .get(..name.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(name))
            && header[name.len()..].starts_with(char::is_whitespace)
    })
}

fn parse_header_date(header: &str) -> Option<NaiveDate> {
    HEADER_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(header.trim(), format).ok())
}

/// Workout dates out of the tracker's header cells. Only cells like `January 5, 2024` count,
/// repeated cells are counted once.
pub fn parse_workout_dates(headers: &[String]) -> Vec<NaiveDate> {
    let mut seen = HashSet::new();
    headers
        .iter()
        .filter(|header| starts_with_month_name(header))
        .filter(|header| seen.insert(header.as_str()))
        .filter_map(|header| parse_header_date(header))
        .collect()
}

pub fn count_by_year_month(dates: &[NaiveDate]) -> CountByYearMonth {
    let mut counts = CountByYearMonth::new();
    for date in dates {
        *counts
            .entry(date.year())
            .or_default()
            .entry(date.month())
            .or_insert(0) += 1;
    }
    counts
}

/// Attaches target and show up rate to every month. The rate is measured against
/// `weekdays_passed` of the current month for every bucket.
pub fn monthly_workout_data(
    counts: &CountByYearMonth,
    weekdays_passed: u32,
) -> BTreeMap<i32, BTreeMap<u32, MonthlyWorkoutData>> {
    counts
        .iter()
        .map(|(&year, months)| {
            let months = months
                .iter()
                .map(|(&month, &count)| {
                    let data = MonthlyWorkoutData {
                        count,
                        target: weekdays_in_month(year, month),
                        show_up_rate: to_fixed(
                            f64::from(count) * 100. / f64::from(weekdays_passed),
                            0,
                        ),
                    };
                    (month, data)
                })
                .collect();
            (year, months)
        })
        .collect()
}

/// Totals of one year. `None` when the year has no months.
pub fn generate_yearly_workout_aggregates(
    by_month: &BTreeMap<u32, MonthlyWorkoutData>,
) -> Option<YearlyWorkoutAggregates> {
    if by_month.is_empty() {
        return None;
    }

    let total_workouts = by_month.values().map(|v| v.count).sum::<u32>();
    let average_workouts_per_month = round2(f64::from(total_workouts) / by_month.len() as f64);

    // Ties keep the month seen first.
    let (most, _) = by_month.iter().fold((None, 0), |max, (month, data)| {
        if data.count > max.1 {
            (Some(*month), data.count)
        } else {
            max
        }
    });
    let (least, _) = by_month.iter().fold((None, u32::MAX), |min, (month, data)| {
        if data.count < min.1 {
            (Some(*month), data.count)
        } else {
            min
        }
    });

    Some(YearlyWorkoutAggregates {
        total_workouts,
        average_workouts_per_month,
        month_with_most_workouts: most.map(|v| v.to_string()).unwrap_or_default(),
        month_with_least_workouts: least.map(|v| v.to_string()).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn months(counts: &[(u32, u32)]) -> BTreeMap<u32, MonthlyWorkoutData> {
        counts
            .iter()
            .map(|&(month, count)| {
                let data = MonthlyWorkoutData {
                    count,
                    target: 22,
                    show_up_rate: "0".into(),
                };
                (month, data)
            })
            .collect()
    }

    fn headers(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_parse_workout_dates() {
        let dates = parse_workout_dates(&headers(&[
            "January 2, 2024",
            "Exercise",
            "January 3, 2024",
            "January 3, 2024",
            "Jan 5, 2024",
            "Notes January 9, 2024",
            "December 29, 2023",
            "February 30, 2024",
            "March 1 2024",
        ]));
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
                NaiveDate::from_ymd_opt(2023, 12, 29).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            ]
        );
    }

    #[test]
    fn test_month_prefix_ignores_case() {
        assert!(starts_with_month_name("JANUARY 2, 2024"));
        assert!(starts_with_month_name("may 2, 2024"));
        assert!(!starts_with_month_name("Mayday"));
        assert!(!starts_with_month_name("June"));
    }

    #[test]
    fn test_count_and_rates() {
        let dates = parse_workout_dates(&headers(&[
            "January 2, 2024",
            "January 3, 2024",
            "January 4, 2024",
            "December 29, 2023",
        ]));
        let counts = count_by_year_month(&dates);
        assert_eq!(counts[&2024][&1], 3);
        assert_eq!(counts[&2023][&12], 1);

        let data = monthly_workout_data(&counts, 8);
        assert_eq!(
            data[&2024][&1],
            MonthlyWorkoutData {
                count: 3,
                target: 23,
                show_up_rate: "38".into(),
            }
        );
        assert_eq!(data[&2023][&12].target, 21);
        assert_eq!(data[&2023][&12].show_up_rate, "13");

        let data = monthly_workout_data(&counts, 0);
        assert_eq!(data[&2024][&1].show_up_rate, "Infinity");
    }

    #[test]
    fn test_yearly_aggregates() {
        let year_2023 = months(&[
            (5, 16),
            (6, 19),
            (7, 16),
            (8, 17),
            (9, 7),
            (10, 7),
            (11, 5),
            (12, 6),
        ]);
        assert_eq!(
            generate_yearly_workout_aggregates(&year_2023),
            Some(YearlyWorkoutAggregates {
                total_workouts: 93,
                average_workouts_per_month: 11.63,
                month_with_most_workouts: "6".into(),
                month_with_least_workouts: "11".into(),
            })
        );

        let year_2024 = months(&[
            (1, 12),
            (2, 14),
            (3, 18),
            (4, 22),
            (5, 25),
            (6, 28),
            (7, 30),
            (8, 19),
            (9, 26),
            (10, 20),
            (11, 18),
            (12, 15),
        ]);
        assert_eq!(
            generate_yearly_workout_aggregates(&year_2024),
            Some(YearlyWorkoutAggregates {
                total_workouts: 247,
                average_workouts_per_month: 20.58,
                month_with_most_workouts: "7".into(),
                month_with_least_workouts: "1".into(),
            })
        );
    }

    #[test]
    fn test_yearly_aggregates_edges() {
        assert_eq!(generate_yearly_workout_aggregates(&BTreeMap::new()), None);

        // Ties keep the first month.
        let tied = generate_yearly_workout_aggregates(&months(&[(3, 4), (4, 4)]));
        assert_eq!(
            tied.map(|v| (v.month_with_most_workouts, v.month_with_least_workouts)),
            Some(("3".to_string(), "3".to_string()))
        );
    }
}
