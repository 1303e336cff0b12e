//! Storage collaborator.
//!
//! One table per step entity, keyed by journal id (step 1 additionally by
//! member id). Singleton steps are upserted by natural key; list steps are
//! replaced wholesale, preserving the order and row ids they were given.
//! Every write is announced on a broadcast change feed.

mod file;
mod memory;
mod watcher;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use watcher::{classify_path, StoreWatcher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::types::{
    ActivityEntry, BuyerPersona, Idea, Journal, JournalStatus, MemberMeans, Problem, StepId, Team,
    Trend, ValueCanvas,
};

/// Capacity of change-feed channels; slow subscribers skip ahead
pub(crate) const CHANGE_FEED_CAPACITY: usize = 256;

/// The six step tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepTable {
    Means,
    Problem,
    Trends,
    Ideas,
    Buyer,
    Canvas,
}

impl StepTable {
    pub const ALL: [StepTable; 6] = [
        StepTable::Means,
        StepTable::Problem,
        StepTable::Trends,
        StepTable::Ideas,
        StepTable::Buyer,
        StepTable::Canvas,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepTable::Means => "means",
            StepTable::Problem => "problem",
            StepTable::Trends => "trends",
            StepTable::Ideas => "ideas",
            StepTable::Buyer => "buyer",
            StepTable::Canvas => "canvas",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// The journal step this table belongs to
    pub fn step(&self) -> StepId {
        match self {
            StepTable::Means => StepId::Means,
            StepTable::Problem => StepId::Problem,
            StepTable::Trends => StepId::Trends,
            StepTable::Ideas => StepId::Ideation,
            StepTable::Buyer | StepTable::Canvas => StepId::ValueProposition,
        }
    }
}

impl fmt::Display for StepTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutation to one step table of one journal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub journal_id: Uuid,
    pub table: StepTable,
}

impl ChangeEvent {
    pub fn new(journal_id: Uuid, table: StepTable) -> Self {
        Self { journal_id, table }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn journal_not_found(id: Uuid) -> Self {
        StoreError::NotFound(format!("journal {id}"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Remote persistent store for teams, journals and step rows
#[async_trait]
pub trait JournalStorage: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    async fn list_teams(&self) -> StoreResult<Vec<Team>>;
    async fn insert_team(&self, team: &Team) -> StoreResult<()>;

    /// Journals of a team, newest first
    async fn list_journals(&self, team_id: Uuid) -> StoreResult<Vec<Journal>>;
    async fn get_journal(&self, journal_id: Uuid) -> StoreResult<Option<Journal>>;
    async fn insert_journal(&self, journal: &Journal) -> StoreResult<()>;
    /// Write back the derived status and progress
    async fn update_journal_summary(
        &self,
        journal_id: Uuid,
        status: JournalStatus,
        progress: u8,
    ) -> StoreResult<()>;
    /// Delete a journal together with all of its step rows
    async fn delete_journal(&self, journal_id: Uuid) -> StoreResult<()>;

    async fn fetch_means(&self, journal_id: Uuid) -> StoreResult<Vec<MemberMeans>>;
    async fn fetch_problem(&self, journal_id: Uuid) -> StoreResult<Option<Problem>>;
    async fn fetch_trends(&self, journal_id: Uuid) -> StoreResult<Vec<Trend>>;
    async fn fetch_ideas(&self, journal_id: Uuid) -> StoreResult<Vec<Idea>>;
    async fn fetch_buyer(&self, journal_id: Uuid) -> StoreResult<Option<BuyerPersona>>;
    async fn fetch_canvas(&self, journal_id: Uuid) -> StoreResult<Option<ValueCanvas>>;

    /// Upsert by (journal, member)
    async fn upsert_means(&self, journal_id: Uuid, means: &MemberMeans) -> StoreResult<()>;
    async fn upsert_problem(&self, journal_id: Uuid, problem: &Problem) -> StoreResult<()>;
    async fn replace_trends(&self, journal_id: Uuid, trends: &[Trend]) -> StoreResult<()>;
    async fn replace_ideas(&self, journal_id: Uuid, ideas: &[Idea]) -> StoreResult<()>;
    async fn upsert_buyer(&self, journal_id: Uuid, buyer: &BuyerPersona) -> StoreResult<()>;
    async fn upsert_canvas(&self, journal_id: Uuid, canvas: &ValueCanvas) -> StoreResult<()>;

    /// Append to the write-only activity log
    async fn append_activity(&self, entry: &ActivityEntry) -> StoreResult<()>;

    /// Subscribe to step-table mutations
    fn changes(&self) -> broadcast::Receiver<ChangeEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names_round_trip() {
        for table in StepTable::ALL {
            assert_eq!(StepTable::parse(table.as_str()), Some(table));
        }
        assert_eq!(StepTable::parse("journal"), None);
    }

    #[test]
    fn test_value_proposition_has_two_tables() {
        let tables: Vec<StepTable> = StepTable::ALL
            .into_iter()
            .filter(|t| t.step() == StepId::ValueProposition)
            .collect();
        assert_eq!(tables, vec![StepTable::Buyer, StepTable::Canvas]);
    }
}
