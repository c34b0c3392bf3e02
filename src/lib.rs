//! Personal life tracking automation. Pulls meditation and observation logs from the notes
//! database, workout days from a spreadsheet and weekly insights from a sleep ring, then keeps
//! monthly aggregates in a JSON vault the dashboard reads and the monthly key result pages up to
//! date.

pub mod cli;
pub mod config;
pub mod fs;
pub mod meditations;
pub mod notion;
pub mod sheets;
pub mod sleep;
pub mod utils;
pub mod workouts;
