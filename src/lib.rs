//! venture-journal - guided five-step business-opportunity journal
//!
//! Step validators score each section, the aggregator gates later steps on
//! earlier ones, and the sync store reconciles debounced local edits with a
//! storage backend and its change feed.

pub mod config;
pub mod env_vars;
pub mod export;
pub mod generation;
pub mod logging;
pub mod progress;
pub mod steps;
pub mod store;
pub mod sync;
pub mod types;
pub mod wizard;
