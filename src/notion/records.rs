//! Typed views over observation and meditation pages. Properties are validated here once, pages
//! that don't fit the schema are skipped.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{config::Config, utils::time::Period};

use super::{query_all, DatabaseQuery, NotesDatabase, Page};

const RECORDS_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct DateValue {
    start: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct DateProperty {
    date: Option<DateValue>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct SelectOption {
    name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct MultiSelectProperty {
    multi_select: Option<Vec<SelectOption>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct CheckboxProperty {
    #[serde(default)]
    checkbox: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct FormulaValue {
    string: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct FormulaProperty {
    formula: Option<FormulaValue>,
}

impl DateProperty {
    fn start(self) -> Result<String> {
        self.date.map(|v| v.start).context("Date property is empty")
    }
}

impl MultiSelectProperty {
    fn names(self) -> Option<Vec<String>> {
        self.multi_select
            .map(|options| options.into_iter().map(|v| v.name).collect())
    }
}

#[derive(Debug, Deserialize)]
struct ObservationProperties {
    #[serde(rename = "Date")]
    date: DateProperty,
    #[serde(rename = "Egos", default)]
    egos: MultiSelectProperty,
    #[serde(rename = "Underlying cause", default)]
    underlying_cause: MultiSelectProperty,
}

#[derive(Debug, Deserialize)]
struct MeditationProperties {
    #[serde(rename = "Date")]
    date: DateProperty,
    #[serde(rename = "Egos", default)]
    egos: MultiSelectProperty,
    #[serde(rename = "Observation underlying causes", default)]
    observation_underlying_causes: FormulaProperty,
    #[serde(rename = "Water boiled ?", default)]
    water_boiled: CheckboxProperty,
    #[serde(rename = "Didn't work at all?", default)]
    did_not_work: CheckboxProperty,
}

fn properties_of<T: DeserializeOwned>(page: &Page) -> Result<T> {
    serde_json::from_value(Value::Object(page.properties.clone()))
        .with_context(|| format!("Page {} doesn't match the expected schema", page.id))
}

/// A noticed ego, logged during the day.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub id: String,
    /// `YYYY-MM-DD`, possibly followed by a time part.
    pub date: String,
    pub egos: Option<Vec<String>>,
    pub underlying_causes: Option<Vec<String>>,
}

impl TryFrom<&Page> for Observation {
    type Error = anyhow::Error;

    fn try_from(page: &Page) -> Result<Self> {
        let properties: ObservationProperties = properties_of(page)?;
        Ok(Self {
            id: page.id.clone(),
            date: properties.date.start()?,
            egos: properties.egos.names(),
            underlying_causes: properties.underlying_cause.names(),
        })
    }
}

/// A sitting, usually working on egos that were observed earlier.
#[derive(Debug, Clone, PartialEq)]
pub struct Meditation {
    pub id: String,
    pub date: String,
    pub egos: Option<Vec<String>>,
    /// Comma separated causes of the observations this sitting worked on.
    pub observation_underlying_causes: Option<String>,
    pub water_boiled: bool,
    pub did_not_work: bool,
}

impl TryFrom<&Page> for Meditation {
    type Error = anyhow::Error;

    fn try_from(page: &Page) -> Result<Self> {
        let properties: MeditationProperties = properties_of(page)?;
        Ok(Self {
            id: page.id.clone(),
            date: properties.date.start()?,
            egos: properties.egos.names(),
            observation_underlying_causes: properties
                .observation_underlying_causes
                .formula
                .and_then(|v| v.string),
            water_boiled: properties.water_boiled.checkbox,
            did_not_work: properties.did_not_work.checkbox,
        })
    }
}

/// Filter matching pages whose `Date` falls into the month, both ends included.
pub fn month_filter(period: Period) -> Value {
    json!({
        "and": [
            {
                "property": "Date",
                "date": {
                    "on_or_after": period.first_iso_date(),
                    "is_not_empty": true,
                },
            },
            {
                "property": "Date",
                "date": {
                    "is_not_empty": true,
                    "on_or_before": period.last_iso_date(),
                },
            },
        ]
    })
}

fn parse_pages<T>(pages: &[Page]) -> Vec<T>
where
    T: for<'a> TryFrom<&'a Page, Error = anyhow::Error>,
{
    pages
        .iter()
        .filter_map(|page| match T::try_from(page) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Skipping page {}: {e:#}", page.id);
                None
            }
        })
        .collect()
}

async fn records_for_month<T, D>(db: &D, database_id: &str, period: Period) -> Result<Vec<T>>
where
    T: for<'a> TryFrom<&'a Page, Error = anyhow::Error>,
    D: NotesDatabase,
{
    let pages = query_all(
        db,
        database_id,
        DatabaseQuery::new(month_filter(period), RECORDS_PER_PAGE),
    )
    .await?;
    let records = parse_pages(&pages);
    info!(
        "Read {} of {} pages from {database_id} for {}-{}",
        records.len(),
        pages.len(),
        period.year,
        period.month
    );
    Ok(records)
}

pub async fn observations_for_month(
    db: &impl NotesDatabase,
    config: &Config,
    period: Period,
) -> Result<Vec<Observation>> {
    records_for_month(db, &config.notion_db_ids.observations, period).await
}

pub async fn meditations_for_month(
    db: &impl NotesDatabase,
    config: &Config,
    period: Period,
) -> Result<Vec<Meditation>> {
    records_for_month(db, &config.notion_db_ids.meditations, period).await
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{json, Value};

    use crate::notion::{test_pages::page, Page};

    fn multi_select(names: &[&str]) -> Value {
        json!({ "multi_select": names.iter().map(|name| json!({ "name": name })).collect::<Vec<_>>() })
    }

    pub fn observation_page(id: &str, date: &str, egos: &[&str], causes: &[&str]) -> Page {
        page(
            id,
            json!({
                "Date": { "date": { "start": date } },
                "Egos": multi_select(egos),
                "Underlying cause": multi_select(causes),
            }),
        )
    }

    pub fn meditation_page(
        id: &str,
        date: &str,
        egos: &[&str],
        causes: Option<&str>,
        water_boiled: bool,
        did_not_work: bool,
    ) -> Page {
        page(
            id,
            json!({
                "Date": { "date": { "start": date } },
                "Egos": multi_select(egos),
                "Observation underlying causes": { "formula": { "string": causes } },
                "Water boiled ?": { "checkbox": water_boiled },
                "Didn't work at all?": { "checkbox": did_not_work },
            }),
        )
    }
}
