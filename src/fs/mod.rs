//! The vault is a directory of JSON documents consumed by the dashboard.
//!  - Aggregate documents are keyed `year -> month -> aggregate`, plus a convenience key for the
//!    latest month.
//!  - Documents are always rewritten as a whole, never appended to.

pub mod vault;
