//! The workout tracker spreadsheet. Every worksheet's header row holds the dates a workout
//! happened on, so the header cells are all that's ever read.

pub mod client;

use anyhow::Result;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpreadsheetSource: Send + Sync {
    /// Header row cells of every worksheet, flattened in worksheet order.
    async fn header_values(&self, sheet_id: &str) -> Result<Vec<String>>;
}
