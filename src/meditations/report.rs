//! A shareable summary of a month: bar charts comparing what was observed with what was meditated
//! on, rendered through image-charts, and a chat-ready text message.

use anyhow::{Context, Result};
use reqwest::Url;
use serde::Serialize;
use serde_json::{json, Value};

use super::aggregate::{FrequencyDistribution, MeditationAggregate, MeditationStats};

const CHART_BASE_URL: &str = "https://image-charts.com/chart.js/2.8.0";
const OBSERVED_COLOR: (&str, &str) = ("rgba(54, 162, 235, 0.5)", "rgba(54, 162, 235, 1)");
const MEDITATED_COLOR: (&str, &str) = ("rgba(255, 99, 132, 0.5)", "rgba(255, 99, 132, 1)");

fn dataset(label: &str, data: Vec<u32>, (background, border): (&str, &str)) -> Value {
    json!({
        "label": label,
        "data": data,
        "backgroundColor": background,
        "borderColor": border,
        "borderWidth": 0,
    })
}

/// Grouped bar chart over the union of both distributions. Observed labels come first, labels
/// only meditated on are appended after them.
pub fn generate_bar_chart_config(
    observed: &FrequencyDistribution,
    meditated: &FrequencyDistribution,
    observed_label: &str,
    meditated_label: &str,
) -> Value {
    let labels = observed
        .keys()
        .chain(meditated.keys().filter(|v| !observed.contains_key(*v)))
        .collect::<Vec<_>>();
    let data_of = |distribution: &FrequencyDistribution| {
        labels
            .iter()
            .map(|label| distribution.get(*label).copied().unwrap_or(0))
            .collect::<Vec<_>>()
    };

    json!({
        "type": "bar",
        "data": {
            "labels": labels,
            "datasets": [
                dataset(observed_label, data_of(observed), OBSERVED_COLOR),
                dataset(meditated_label, data_of(meditated), MEDITATED_COLOR),
            ],
        },
        "options": {
            "rectangleRadius": 16,
            "legend": { "labels": { "fontColor": "#333" } },
            "scales": {
                "xAxes": [{ "ticks": { "fontColor": "#333" } }],
                "yAxes": [{
                    "ticks": { "beginAtZero": true, "fontColor": "#333" },
                    "gridLines": { "color": "#eee" },
                }],
            },
            "plugins": {},
        },
    })
}

pub fn generate_chart_url(chart: &Value) -> Result<String> {
    let chart = serde_json::to_string(chart)?;
    let url = Url::parse_with_params(
        CHART_BASE_URL,
        [
            ("bkg", "white"),
            ("c", chart.as_str()),
            ("encoding", "url"),
            ("height", "480"),
            ("width", "1200"),
        ],
    )
    .context("Failed to build chart url")?;
    Ok(url.into())
}

pub fn generate_summary_message(
    stats: &MeditationStats,
    causes_chart_url: &str,
    egos_chart_url: &str,
) -> String {
    format!(
        "🧘‍♂️ *Meditation Stats*
----------------------
💭 *Total Meditations*: {}
👀 *Total Observations*: {}
📈 *Meditation Efficiency*: {}
🌅 *Avg. Meditations per Day*: {}
📅 *Avg. Observations per Day*: {}
🚫 *Missed Meditation Days*: {}
🚷 *Missed Observation Days*: {}
😞 *Sat But Could Not Meditate Days*: {}
💧 *Water Boiled During Meditations*: {}

📊 *Causes Chart*: {causes_chart_url}
📊 *Egos Bar Chart*: {egos_chart_url}
",
        stats.num_meditations,
        stats.num_observations,
        stats.meditation_efficiency,
        stats.avg_meditations_per_day,
        stats.avg_observations_per_day,
        stats.meditations_missed_days_count,
        stats.observations_missed_day_count,
        stats.sat_but_could_not_meditate_count,
        stats.water_boiled_meditations_count,
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeditationReport {
    pub year: i32,
    pub month: u32,
    pub egos_bar_chart_url: String,
    pub causes_chart_url: String,
    pub message: String,
}

impl MeditationReport {
    pub fn from_aggregate(aggregate: &MeditationAggregate) -> Result<Self> {
        let egos_bar_chart_url = generate_chart_url(&generate_bar_chart_config(
            &aggregate.egos_observed_frequency_distribution,
            &aggregate.egos_in_meditation_frequency_distribution,
            "Observed egos",
            "Meditated on egos",
        ))?;
        let causes_chart_url = generate_chart_url(&generate_bar_chart_config(
            &aggregate.underlying_causes_observed_frequency_distribution,
            &aggregate.underlying_causes_meditated_on_frequency_distribution,
            "Observed causes",
            "Meditated on causes",
        ))?;
        let message =
            generate_summary_message(&aggregate.stats, &causes_chart_url, &egos_bar_chart_url);
        Ok(Self {
            year: aggregate.year,
            month: aggregate.month,
            egos_bar_chart_url,
            causes_chart_url,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;
    use crate::{
        meditations::aggregate::{compute_meditation_aggregate, fixtures::november},
        utils::{clock::FixedClock, time::Period},
    };

    fn distribution(values: &[(&str, u32)]) -> FrequencyDistribution {
        values.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_bar_chart_union() {
        let chart = generate_bar_chart_config(
            &distribution(&[("Anger", 3), ("Pride", 1)]),
            &distribution(&[("Envy", 2), ("Pride", 4)]),
            "Observed egos",
            "Meditated on egos",
        );
        assert_eq!(chart["data"]["labels"], json!(["Anger", "Pride", "Envy"]));
        assert_eq!(chart["data"]["datasets"][0]["data"], json!([3, 1, 0]));
        assert_eq!(chart["data"]["datasets"][1]["data"], json!([0, 4, 2]));
        assert_eq!(chart["data"]["datasets"][1]["label"], "Meditated on egos");
        assert_eq!(
            chart["data"]["datasets"][0]["backgroundColor"],
            "rgba(54, 162, 235, 0.5)"
        );
    }

    #[test]
    fn test_chart_url_round_trips() -> Result<()> {
        let chart = json!({ "type": "bar", "data": { "labels": ["a b", "c&d"] } });
        let url = Url::parse(&generate_chart_url(&chart)?)?;
        assert_eq!(url.host_str(), Some("image-charts.com"));
        assert_eq!(url.path(), "/chart.js/2.8.0");

        let params = url.query_pairs().into_owned().collect::<Vec<_>>();
        assert_eq!(params[0], ("bkg".to_string(), "white".to_string()));
        assert_eq!(params[1].0, "c");
        assert_eq!(serde_json::from_str::<Value>(&params[1].1)?, chart);
        assert_eq!(params[4], ("width".to_string(), "1200".to_string()));
        Ok(())
    }

    #[test]
    fn test_report() -> Result<()> {
        let (observations, meditations) = november();
        let aggregate = compute_meditation_aggregate(
            &observations,
            &meditations,
            Period::new(2023, 11),
            &FixedClock::ymd(2024, 1, 10),
        );
        let report = MeditationReport::from_aggregate(&aggregate)?;
        assert!(report.message.contains("*Total Meditations*: 3"));
        assert!(report.message.contains("*Meditation Efficiency*: 66.67"));
        assert!(report
            .message
            .contains(&format!("*Causes Chart*: {}", report.causes_chart_url)));
        assert!(report.egos_bar_chart_url.starts_with(CHART_BASE_URL));
        Ok(())
    }
}
