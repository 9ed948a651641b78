//! Sync body-weight measurements from a fitness service into a local SQLite file.
//!
//! A pass runs fetch → normalize → upsert over a date range. The store holds at
//! most one row per calendar date, and re-running a pass is idempotent.

pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod normalize;
pub mod schedule;
pub mod source;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;
