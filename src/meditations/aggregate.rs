use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    notion::records::{Meditation, Observation},
    utils::{
        clock::Clock,
        fixed::{percentage_of, to_fixed},
        frequency::{count_frequencies, count_missing_days, flatten, Nested},
        time::{current_day, current_month, current_year, has_month_passed, last_day_of_month, Period},
    },
};

pub type FrequencyDistribution = BTreeMap<String, u32>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeditationStats {
    pub num_observations: usize,
    /// Every sitting, including the ones that didn't work.
    pub num_meditations: usize,
    pub avg_observations_per_day: String,
    pub avg_meditations_per_day: String,
    pub meditations_missed_days_count: usize,
    pub observations_missed_day_count: usize,
    pub sat_but_could_not_meditate_count: usize,
    pub water_boiled_meditations_count: usize,
    /// Share of sittings where the water boiled. `NaN` for a month without sittings.
    pub meditation_efficiency: String,
    /// Days in the current month.
    pub target: u32,
    pub show_up_rate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeditationAggregate {
    pub month: u32,
    pub year: i32,
    pub stats: MeditationStats,
    pub egos_observed_frequency_distribution: FrequencyDistribution,
    pub egos_in_meditation_frequency_distribution: FrequencyDistribution,
    pub underlying_causes_observed_frequency_distribution: FrequencyDistribution,
    pub underlying_causes_meditated_on_frequency_distribution: FrequencyDistribution,
}

/// Days of the month that count so far: all of them once the month is over, today's day of the
/// month otherwise.
pub fn total_days_in_month(period: Period, clock: &dyn Clock) -> u32 {
    if has_month_passed(clock, period.year, period.month) {
        period.last_day()
    } else {
        current_day(clock)
    }
}

fn distribution(values: impl IntoIterator<Item = Nested<String>>) -> FrequencyDistribution {
    count_frequencies(flatten(values))
}

fn meditated_on_causes(meditations: &[Meditation]) -> FrequencyDistribution {
    let causes = meditations.iter().map(|m| {
        Nested::from(m.observation_underlying_causes.as_deref().map(|causes| {
            causes
                .split(',')
                .filter(|v| !v.is_empty())
                .map(String::from)
                .collect::<Vec<_>>()
        }))
    });
    distribution(causes)
}

fn meditation_efficiency(water_boiled: usize, meditations: usize) -> String {
    if meditations == 0 {
        return "NaN".into();
    }
    to_fixed(percentage_of(water_boiled as f64, meditations as f64), 2)
}

pub fn compute_meditation_aggregate(
    observations: &[Observation],
    meditations: &[Meditation],
    period: Period,
    clock: &dyn Clock,
) -> MeditationAggregate {
    let total_days = total_days_in_month(period, clock);

    let observation_dates = observations.iter().map(|o| o.date.as_str()).collect::<Vec<_>>();
    let meditation_dates = meditations.iter().map(|m| m.date.as_str()).collect::<Vec<_>>();
    let observations_missing =
        count_missing_days(&observation_dates, period.year, period.month, total_days);
    let meditations_missing =
        count_missing_days(&meditation_dates, period.year, period.month, total_days);

    let water_boiled = meditations.iter().filter(|m| m.water_boiled).count();
    let per_day = |count: usize| to_fixed(count as f64 / f64::from(total_days), 2);

    let stats = MeditationStats {
        num_observations: observations.len(),
        num_meditations: meditations.len(),
        avg_observations_per_day: per_day(observations.len()),
        avg_meditations_per_day: per_day(meditations.len()),
        meditations_missed_days_count: meditations_missing.count,
        observations_missed_day_count: observations_missing.count,
        sat_but_could_not_meditate_count: meditations.iter().filter(|m| m.did_not_work).count(),
        water_boiled_meditations_count: water_boiled,
        meditation_efficiency: meditation_efficiency(water_boiled, meditations.len()),
        target: last_day_of_month(current_year(clock), current_month(clock)),
        show_up_rate: to_fixed(
            percentage_of(
                f64::from(total_days) - meditations_missing.count as f64,
                f64::from(total_days),
            ),
            0,
        ),
    };

    MeditationAggregate {
        month: period.month,
        year: period.year,
        stats,
        egos_observed_frequency_distribution: distribution(
            observations.iter().map(|o| Nested::from(o.egos.clone())),
        ),
        egos_in_meditation_frequency_distribution: distribution(
            meditations.iter().map(|m| Nested::from(m.egos.clone())),
        ),
        underlying_causes_observed_frequency_distribution: distribution(
            observations
                .iter()
                .map(|o| Nested::from(o.underlying_causes.clone())),
        ),
        underlying_causes_meditated_on_frequency_distribution: meditated_on_causes(meditations),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::notion::records::{Meditation, Observation};

    fn names(values: &[&str]) -> Option<Vec<String>> {
        Some(values.iter().map(|v| v.to_string()).collect())
    }

    pub fn observation(date: &str, egos: &[&str], causes: &[&str]) -> Observation {
        Observation {
            id: format!("o-{date}"),
            date: date.into(),
            egos: names(egos),
            underlying_causes: names(causes),
        }
    }

    pub fn meditation(
        date: &str,
        egos: &[&str],
        causes: Option<&str>,
        water_boiled: bool,
        did_not_work: bool,
    ) -> Meditation {
        Meditation {
            id: format!("m-{date}"),
            date: date.into(),
            egos: names(egos),
            observation_underlying_causes: causes.map(String::from),
            water_boiled,
            did_not_work,
        }
    }

    /// Three days of November 2023.
    pub fn november() -> (Vec<Observation>, Vec<Meditation>) {
        (
            vec![
                observation("2023-11-01", &["Anger", "Pride"], &["Tired"]),
                observation("2023-11-01T20:00:00.000+05:30", &["Anger"], &["Hungry"]),
                Observation {
                    egos: None,
                    underlying_causes: None,
                    ..observation("2023-11-03", &[], &[])
                },
            ],
            vec![
                meditation("2023-11-01", &["Anger"], Some("Tired,Hungry"), true, false),
                meditation("2023-11-02", &["Pride"], None, false, true),
                meditation("2023-11-03", &[], Some(""), true, false),
            ],
        )
    }
}
