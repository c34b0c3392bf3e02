//! Access to the notes database. Observations, meditations and key result trackers are all pages
//! in it. [NotesDatabase] is the seam, [client::NotionClient] talks to the real service.

pub mod client;
pub mod key_results;
pub mod records;

use anyhow::Result;
use async_trait::async_trait;
use futures::{stream, Stream, TryStreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// A page with its raw property bag. Typed views are built in [records] and [key_results].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// One page of query results. `next_cursor` is set while there is more to read.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryPage {
    #[serde(default)]
    pub results: Vec<Page>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    pub page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<String>,
}

impl DatabaseQuery {
    pub fn new(filter: Value, page_size: u32) -> Self {
        Self {
            filter: Some(filter),
            page_size,
            start_cursor: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageParent {
    pub database_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageIcon {
    #[serde(rename = "type")]
    pub kind: String,
    pub emoji: String,
}

impl PageIcon {
    pub fn emoji(emoji: &str) -> Self {
        Self {
            kind: "emoji".into(),
            emoji: emoji.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPage {
    pub parent: PageParent,
    pub properties: Value,
    pub icon: PageIcon,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotesDatabase: Send + Sync {
    async fn query_database(&self, database_id: &str, query: &DatabaseQuery) -> Result<QueryPage>;

    async fn retrieve_page(&self, page_id: &str) -> Result<Page>;

    async fn create_page(&self, page: &NewPage) -> Result<Page>;

    /// Overwrites the given properties, leaving the rest of the page alone.
    async fn update_page(&self, page_id: &str, properties: &Value) -> Result<Page>;
}

/// Follows the query cursor until the database stops handing one out. The first failed request
/// ends the stream.
pub fn paginate<'a, D: NotesDatabase>(
    db: &'a D,
    database_id: &'a str,
    query: DatabaseQuery,
) -> impl Stream<Item = Result<QueryPage>> + 'a {
    stream::unfold(Some(query), move |state| async move {
        let query = state?;
        let result = db.query_database(database_id, &query).await;
        match result {
            Ok(page) => {
                let next = page
                    .next_cursor
                    .clone()
                    .filter(|cursor| !cursor.is_empty())
                    .map(|cursor| DatabaseQuery {
                        start_cursor: Some(cursor),
                        ..query
                    });
                Some((Ok(page), next))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
}

/// Drains every page of a query into one list.
pub async fn query_all<D: NotesDatabase>(
    db: &D,
    database_id: &str,
    query: DatabaseQuery,
) -> Result<Vec<Page>> {
    let pages: Vec<QueryPage> = paginate(db, database_id, query).try_collect().await?;
    debug!("Read {} result pages from {database_id}", pages.len());
    Ok(pages.into_iter().flat_map(|page| page.results).collect())
}

#[cfg(test)]
pub(crate) mod test_pages {
    use serde_json::{json, Value};

    use super::Page;

    pub fn page(id: &str, properties: Value) -> Page {
        Page {
            id: id.into(),
            properties: properties
                .as_object()
                .cloned()
                .expect("Test properties should be an object"),
        }
    }

    pub fn empty_page(id: &str) -> Page {
        page(id, json!({}))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{anyhow, Result};
    use mockall::Sequence;
    use serde_json::json;

    use super::{test_pages::empty_page, *};

    fn results(ids: &[&str], next_cursor: Option<&str>) -> QueryPage {
        QueryPage {
            results: ids.iter().map(|id| empty_page(id)).collect(),
            next_cursor: next_cursor.map(Into::into),
        }
    }

    #[tokio::test]
    async fn test_query_all_follows_cursor() -> Result<()> {
        let mut db = MockNotesDatabase::new();
        let mut sequence = Sequence::new();
        db.expect_query_database()
            .withf(|id, query| id.to_string() == "db" && query.start_cursor.is_none())
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(results(&["a", "b"], Some("c1"))));
        db.expect_query_database()
            .withf(|_, query| query.start_cursor.as_deref() == Some("c1"))
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(results(&["c"], Some("c2"))));
        db.expect_query_database()
            .withf(|_, query| query.start_cursor.as_deref() == Some("c2") && query.page_size == 2)
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_, _| Ok(results(&[], None)));

        let pages = query_all(&db, "db", DatabaseQuery::new(json!({}), 2)).await?;
        let ids = pages.iter().map(|page| page.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "b", "c"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_query_all_stops_on_empty_cursor() -> Result<()> {
        let mut db = MockNotesDatabase::new();
        db.expect_query_database()
            .times(1)
            .returning(|_, _| Ok(results(&["a"], Some(""))));

        let pages = query_all(&db, "db", DatabaseQuery::new(json!({}), 100)).await?;
        assert_eq!(pages.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_query_all_surfaces_errors() {
        let mut db = MockNotesDatabase::new();
        db.expect_query_database()
            .times(1)
            .returning(|_, _| Err(anyhow!("unauthorized")));

        let result = query_all(&db, "db", DatabaseQuery::new(json!({}), 100)).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_query_serialization_skips_missing_cursor() {
        let query = DatabaseQuery::new(json!({ "and": [] }), 1);
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({ "filter": { "and": [] }, "page_size": 1 })
        );
    }
}
