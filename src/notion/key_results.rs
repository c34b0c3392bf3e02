//! Monthly key result trackers. A tracker page carries a state tag `<kind>-<month>-<year>` which
//! makes it findable, so creating one is a check first, create second affair.
//!
//! Rolling over to a new month happens in two phases:
//!  1. Every tracker of the same kind still marked in progress is closed.
//!  2. The tracker for the new month is created.
//!
//! The parent objectives are retrieved before either phase, so a wrong objective id fails the run
//! before anything is touched.
//!
//! There is no rollback between the phases. Both are safe to repeat though. A failure in either
//! phase is reported together with the trackers that did get closed, and running the command again
//! reconciles: the first phase only finds what is still open and the second one creates the missing
//! tracker.

use std::{fmt::Display, future::Future, str::FromStr};

use anyhow::{anyhow, bail, ensure, Context, Result};
use futures::future::{join_all, try_join_all};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

use crate::{config::Config, utils::time::Period};

use super::{query_all, DatabaseQuery, NewPage, NotesDatabase, Page, PageIcon, PageParent};

pub const STATE_TAG_PROPERTY: &str = "Windmill State";
pub const STATUS_PROPERTY: &str = "Status";
pub const CURRENT_PROPERTY: &str = "Current";
pub const KEY_RESULT_TYPE: &str = "Key Result";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    InProgress,
    Done,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::InProgress => "In Progress",
            Status::Done => "Done",
        }
    }

    fn properties(&self) -> Value {
        json!({ STATUS_PROPERTY: { "select": { "name": self.as_str() } } })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyResultKind {
    Meditations,
    Workouts,
    Observations,
}

impl KeyResultKind {
    pub fn state_prefix(&self) -> &'static str {
        match self {
            KeyResultKind::Meditations => "AutoMeditationKeyResult",
            KeyResultKind::Workouts => "AutoWorkoutKeyResult",
            KeyResultKind::Observations => "AutoObservationsKeyResult",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            KeyResultKind::Meditations => "Meditation",
            KeyResultKind::Workouts => "Workout",
            KeyResultKind::Observations => "Observations",
        }
    }
}

impl Display for KeyResultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.state_prefix())
    }
}

impl FromStr for KeyResultKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            KeyResultKind::Meditations,
            KeyResultKind::Workouts,
            KeyResultKind::Observations,
        ]
        .into_iter()
        .find(|kind| kind.state_prefix() == s)
        .ok_or_else(|| anyhow!("Invalid key result kind: {s}"))
    }
}

/// `<kind>-<month>-<year>`, month without padding.
pub fn state_tag(kind: KeyResultKind, period: Period) -> String {
    format!("{}-{}-{}", kind.state_prefix(), period.month, period.year)
}

/// Reverse of [state_tag].
pub fn parse_state_tag(tag: &str) -> Result<(KeyResultKind, Period)> {
    let mut parts = tag.trim().rsplitn(3, '-');
    let (Some(year), Some(month), Some(kind)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("Malformed state tag {tag:?}");
    };
    let year: i32 = year
        .parse()
        .with_context(|| format!("Invalid year in state tag {tag:?}"))?;
    let month: u32 = month
        .parse()
        .with_context(|| format!("Invalid month in state tag {tag:?}"))?;
    ensure!((1..=12).contains(&month), "Invalid month in state tag {tag:?}");
    Ok((kind.parse::<KeyResultKind>()?, Period::new(year, month)))
}

/// The state tag as stored on a page, joined from its rich text fragments.
fn page_state_tag(page: &Page) -> Option<String> {
    let fragments = page
        .properties
        .get(STATE_TAG_PROPERTY)?
        .get("rich_text")?
        .as_array()?;
    Some(
        fragments
            .iter()
            .filter_map(|v| v.get("plain_text").and_then(Value::as_str))
            .collect(),
    )
}

fn is_tracker_of(page: &Page, kind: KeyResultKind) -> bool {
    match page_state_tag(page).as_deref().map(parse_state_tag) {
        Some(Ok((page_kind, _))) => page_kind == kind,
        Some(Err(e)) => {
            warn!("Leaving {} open: {e:#}", page.id);
            false
        }
        None => {
            warn!("Leaving {} open, it has no state tag", page.id);
            false
        }
    }
}

/// What a new tracker page should look like.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyResultTemplate {
    pub kind: KeyResultKind,
    pub title: String,
    pub target: u32,
    /// Objectives the key result belongs to.
    pub parents: Vec<String>,
    pub emoji: String,
}

impl KeyResultTemplate {
    fn into_page(self, database_id: &str, tag: &str) -> NewPage {
        NewPage {
            parent: PageParent {
                database_id: database_id.into(),
            },
            properties: json!({
                "Name": { "title": [{ "text": { "content": self.title } }] },
                "Target": { "number": self.target },
                CURRENT_PROPERTY: { "number": 0 },
                STATE_TAG_PROPERTY: { "rich_text": [{ "text": { "content": tag } }] },
                STATUS_PROPERTY: { "select": { "name": Status::InProgress.as_str() } },
                "Type": { "select": { "name": KEY_RESULT_TYPE } },
                "Parent": {
                    "relation": self.parents.iter().map(|id| json!({ "id": id })).collect::<Vec<_>>()
                },
            }),
            icon: PageIcon::emoji(&self.emoji),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum KeyResultCreation {
    #[serde(rename_all = "camelCase")]
    AlreadyExists {
        msg: String,
        id: String,
        state_tag: String,
    },
    #[serde(rename_all = "camelCase")]
    Created {
        msg: String,
        id: String,
        state_tag: String,
        closed: Vec<String>,
    },
    /// Some stale trackers couldn't be closed, so nothing was created. `closed` lists the ones that
    /// were.
    #[serde(rename_all = "camelCase")]
    NotAllClosed {
        msg: String,
        state_tag: String,
        closed: Vec<String>,
        error: String,
    },
    /// Stale trackers got closed but the new one couldn't be created. Running again finishes the
    /// job.
    #[serde(rename_all = "camelCase")]
    ClosedButNotCreated {
        msg: String,
        state_tag: String,
        closed: Vec<String>,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum CurrentValueUpdate {
    #[serde(rename_all = "camelCase")]
    Updated { msg: String, new_val: u32, id: String },
    #[serde(rename_all = "camelCase")]
    UpdateFailed {
        msg: String,
        new_val: u32,
        id: String,
        error: String,
    },
    Missing { msg: String },
}

fn text_contains(property: &str, value: &str) -> Value {
    json!({ "property": property, "rich_text": { "contains": value } })
}

/// Looks up the tracker page carrying `tag`.
pub async fn find_by_state_tag(
    db: &impl NotesDatabase,
    config: &Config,
    tag: &str,
) -> Result<Option<Page>> {
    ensure!(!tag.is_empty(), "Empty search term not allowed");
    let query = DatabaseQuery::new(json!({ "and": [text_contains(STATE_TAG_PROPERTY, tag)] }), 1);
    let response = db
        .query_database(&config.notion_db_ids.nodes, &query)
        .await?;
    Ok(response.results.into_iter().next())
}

async fn in_progress_of_kind(
    db: &impl NotesDatabase,
    config: &Config,
    kind: KeyResultKind,
) -> Result<Vec<Page>> {
    let filter = json!({
        "and": [
            text_contains(STATE_TAG_PROPERTY, kind.state_prefix()),
            { "property": STATUS_PROPERTY, "select": { "equals": Status::InProgress.as_str() } },
        ]
    });
    let pages = query_all(db, &config.notion_db_ids.nodes, DatabaseQuery::new(filter, 100)).await?;
    Ok(pages
        .into_iter()
        .filter(|page| is_tracker_of(page, kind))
        .collect())
}

async fn retrieve_parents(db: &impl NotesDatabase, parents: &[String]) -> Result<Vec<Page>> {
    try_join_all(parents.iter().map(|id| async move {
        db.retrieve_page(id)
            .await
            .with_context(|| format!("Parent objective {id} is not accessible"))
    }))
    .await
}

/// Creates the tracker for `period` unless it already exists, closing stale trackers of the same
/// kind first.
#[instrument(skip(db, config, template), fields(kind = %template.kind))]
pub async fn create_monthly_key_result_page(
    db: &impl NotesDatabase,
    config: &Config,
    template: KeyResultTemplate,
    period: Period,
) -> Result<KeyResultCreation> {
    let tag = state_tag(template.kind, period);

    if let Some(existing) = find_by_state_tag(db, config, &tag).await? {
        info!("Key result {tag} already exists as {}", existing.id);
        return Ok(KeyResultCreation::AlreadyExists {
            msg: format!("Key Result for {tag} already exists"),
            id: existing.id,
            state_tag: tag,
        });
    }

    let parents = retrieve_parents(db, &template.parents).await?;
    info!("Found {} parent objectives", parents.len());

    let stale = in_progress_of_kind(db, config, template.kind).await?;
    let done = Status::Done.properties();
    let results = join_all(stale.iter().map(|page| db.update_page(&page.id, &done))).await;

    let mut closed = vec![];
    let mut failures = vec![];
    for (page, result) in stale.iter().zip(results) {
        match result {
            Ok(_) => closed.push(page.id.clone()),
            Err(e) => {
                error!("Failed to close {}: {e:?}", page.id);
                failures.push(format!("{}: {e:#}", page.id));
            }
        }
    }
    info!("Closed {} stale key results", closed.len());

    if !failures.is_empty() {
        return Ok(KeyResultCreation::NotAllClosed {
            msg: "Unable to close stale key results".into(),
            state_tag: tag,
            closed,
            error: failures.join("; "),
        });
    }

    let new_page = template.into_page(&config.notion_db_ids.nodes, &tag);
    match db.create_page(&new_page).await {
        Ok(page) => {
            info!("Created key result {tag} as {}", page.id);
            Ok(KeyResultCreation::Created {
                msg: "New key result page created".into(),
                id: page.id,
                state_tag: tag,
                closed,
            })
        }
        Err(e) => {
            error!("Closed {closed:?} but failed to create {tag}: {e:?}");
            Ok(KeyResultCreation::ClosedButNotCreated {
                msg: "Unable to create new page".into(),
                state_tag: tag,
                closed,
                error: format!("{e:#}"),
            })
        }
    }
}

/// Writes a freshly computed value into the tracker's current value. The value is only computed
/// when the tracker exists.
#[instrument(skip(db, config, current_value))]
pub async fn set_key_result_current_value<F, Fut>(
    db: &impl NotesDatabase,
    config: &Config,
    kind: KeyResultKind,
    period: Period,
    current_value: F,
) -> Result<CurrentValueUpdate>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<u32>>,
{
    let tag = state_tag(kind, period);
    let Some(page) = find_by_state_tag(db, config, &tag).await? else {
        return Ok(CurrentValueUpdate::Missing {
            msg: format!("Key Result for {tag} does not exist yet"),
        });
    };

    let new_val = current_value().await?;
    let properties = json!({ CURRENT_PROPERTY: { "number": new_val } });
    match db.update_page(&page.id, &properties).await {
        Ok(_) => Ok(CurrentValueUpdate::Updated {
            msg: format!("{} key result current value updated", kind.label()),
            new_val,
            id: page.id,
        }),
        Err(e) => {
            error!("Failed to update {tag}: {e:?}");
            Ok(CurrentValueUpdate::UpdateFailed {
                msg: format!("Unable to update {} key result current value", kind.label()),
                new_val,
                id: page.id,
                error: format!("{e:#}"),
            })
        }
    }
}
