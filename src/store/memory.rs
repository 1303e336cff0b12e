//! In-process storage backend.
//!
//! Used for `storage.backend = "memory"` and as the test double for the
//! sync store: reads and writes can be made to fail per table, and reads for
//! a journal can be delayed to exercise out-of-order load completion.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::{ChangeEvent, JournalStorage, StepTable, StoreError, StoreResult, CHANGE_FEED_CAPACITY};
use crate::types::{
    ActivityEntry, BuyerPersona, Idea, Journal, JournalStatus, MemberMeans, Problem, Team, Trend,
    ValueCanvas,
};

#[derive(Default)]
struct Tables {
    teams: Vec<Team>,
    journals: Vec<Journal>,
    means: HashMap<Uuid, Vec<MemberMeans>>,
    problems: HashMap<Uuid, Problem>,
    trends: HashMap<Uuid, Vec<Trend>>,
    ideas: HashMap<Uuid, Vec<Idea>>,
    buyers: HashMap<Uuid, BuyerPersona>,
    canvases: HashMap<Uuid, ValueCanvas>,
    activity: Vec<ActivityEntry>,
}

impl Tables {
    fn require_journal(&self, journal_id: Uuid) -> StoreResult<()> {
        if self.journals.iter().any(|j| j.id == journal_id) {
            Ok(())
        } else {
            Err(StoreError::journal_not_found(journal_id))
        }
    }
}

pub struct MemoryStorage {
    tables: RwLock<Tables>,
    changes: broadcast::Sender<ChangeEvent>,
    failing_reads: Mutex<HashSet<StepTable>>,
    failing_writes: Mutex<HashSet<StepTable>>,
    catalog_offline: AtomicBool,
    read_delays: Mutex<HashMap<Uuid, Duration>>,
    write_counts: Mutex<HashMap<StepTable, usize>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            tables: RwLock::new(Tables::default()),
            changes,
            failing_reads: Mutex::new(HashSet::new()),
            failing_writes: Mutex::new(HashSet::new()),
            catalog_offline: AtomicBool::new(false),
            read_delays: Mutex::new(HashMap::new()),
            write_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Make reads of `table` fail (or succeed again)
    pub fn fail_reads(&self, table: StepTable, fail: bool) {
        toggle(&self.failing_reads, table, fail);
    }

    /// Make writes to `table` fail (or succeed again)
    pub fn fail_writes(&self, table: StepTable, fail: bool) {
        toggle(&self.failing_writes, table, fail);
    }

    /// Make team and journal listing fail
    pub fn set_catalog_offline(&self, offline: bool) {
        self.catalog_offline.store(offline, Ordering::SeqCst);
    }

    /// Delay every step read for one journal
    pub fn delay_reads(&self, journal_id: Uuid, delay: Duration) {
        if let Ok(mut delays) = self.read_delays.lock() {
            delays.insert(journal_id, delay);
        }
    }

    /// Number of successful writes to a table
    pub fn write_count(&self, table: StepTable) -> usize {
        self.write_counts
            .lock()
            .map(|counts| counts.get(&table).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub async fn activity(&self, journal_id: Uuid) -> Vec<ActivityEntry> {
        let tables = self.tables.read().await;
        tables
            .activity
            .iter()
            .filter(|a| a.journal_id == journal_id)
            .cloned()
            .collect()
    }

    async fn before_read(&self, journal_id: Uuid, table: StepTable) -> StoreResult<()> {
        let delay = self
            .read_delays
            .lock()
            .ok()
            .and_then(|delays| delays.get(&journal_id).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if contains(&self.failing_reads, table) {
            return Err(StoreError::Unavailable(format!("read of {table} failed")));
        }
        Ok(())
    }

    fn before_write(&self, table: StepTable) -> StoreResult<()> {
        if contains(&self.failing_writes, table) {
            return Err(StoreError::Unavailable(format!("write to {table} failed")));
        }
        Ok(())
    }

    fn after_write(&self, journal_id: Uuid, table: StepTable) {
        if let Ok(mut counts) = self.write_counts.lock() {
            *counts.entry(table).or_default() += 1;
        }
        // No receivers is fine
        let _ = self.changes.send(ChangeEvent::new(journal_id, table));
    }

    fn check_catalog(&self) -> StoreResult<()> {
        if self.catalog_offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("catalog offline".to_string()));
        }
        Ok(())
    }
}

fn toggle(set: &Mutex<HashSet<StepTable>>, table: StepTable, on: bool) {
    if let Ok(mut set) = set.lock() {
        if on {
            set.insert(table);
        } else {
            set.remove(&table);
        }
    }
}

fn contains(set: &Mutex<HashSet<StepTable>>, table: StepTable) -> bool {
    set.lock().map(|s| s.contains(&table)).unwrap_or(false)
}

#[async_trait]
impl JournalStorage for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_teams(&self) -> StoreResult<Vec<Team>> {
        self.check_catalog()?;
        let mut teams = self.tables.read().await.teams.clone();
        teams.sort_by_key(|t| t.created_at);
        Ok(teams)
    }

    async fn insert_team(&self, team: &Team) -> StoreResult<()> {
        self.check_catalog()?;
        self.tables.write().await.teams.push(team.clone());
        Ok(())
    }

    async fn list_journals(&self, team_id: Uuid) -> StoreResult<Vec<Journal>> {
        self.check_catalog()?;
        let tables = self.tables.read().await;
        let mut journals: Vec<Journal> = tables
            .journals
            .iter()
            .filter(|j| j.team_id == team_id)
            .cloned()
            .collect();
        journals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(journals)
    }

    async fn get_journal(&self, journal_id: Uuid) -> StoreResult<Option<Journal>> {
        self.check_catalog()?;
        let tables = self.tables.read().await;
        Ok(tables.journals.iter().find(|j| j.id == journal_id).cloned())
    }

    async fn insert_journal(&self, journal: &Journal) -> StoreResult<()> {
        self.check_catalog()?;
        let mut tables = self.tables.write().await;
        if !tables.teams.iter().any(|t| t.id == journal.team_id) {
            return Err(StoreError::NotFound(format!("team {}", journal.team_id)));
        }
        tables.journals.push(journal.clone());
        Ok(())
    }

    async fn update_journal_summary(
        &self,
        journal_id: Uuid,
        status: JournalStatus,
        progress: u8,
    ) -> StoreResult<()> {
        self.check_catalog()?;
        let mut tables = self.tables.write().await;
        let journal = tables
            .journals
            .iter_mut()
            .find(|j| j.id == journal_id)
            .ok_or_else(|| StoreError::journal_not_found(journal_id))?;
        journal.status = status;
        journal.progress = progress;
        journal.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_journal(&self, journal_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.require_journal(journal_id)?;
        tables.journals.retain(|j| j.id != journal_id);
        tables.means.remove(&journal_id);
        tables.problems.remove(&journal_id);
        tables.trends.remove(&journal_id);
        tables.ideas.remove(&journal_id);
        tables.buyers.remove(&journal_id);
        tables.canvases.remove(&journal_id);
        tables.activity.retain(|a| a.journal_id != journal_id);
        Ok(())
    }

    async fn fetch_means(&self, journal_id: Uuid) -> StoreResult<Vec<MemberMeans>> {
        self.before_read(journal_id, StepTable::Means).await?;
        let tables = self.tables.read().await;
        Ok(tables.means.get(&journal_id).cloned().unwrap_or_default())
    }

    async fn fetch_problem(&self, journal_id: Uuid) -> StoreResult<Option<Problem>> {
        self.before_read(journal_id, StepTable::Problem).await?;
        Ok(self.tables.read().await.problems.get(&journal_id).cloned())
    }

    async fn fetch_trends(&self, journal_id: Uuid) -> StoreResult<Vec<Trend>> {
        self.before_read(journal_id, StepTable::Trends).await?;
        let tables = self.tables.read().await;
        Ok(tables.trends.get(&journal_id).cloned().unwrap_or_default())
    }

    async fn fetch_ideas(&self, journal_id: Uuid) -> StoreResult<Vec<Idea>> {
        self.before_read(journal_id, StepTable::Ideas).await?;
        let tables = self.tables.read().await;
        Ok(tables.ideas.get(&journal_id).cloned().unwrap_or_default())
    }

    async fn fetch_buyer(&self, journal_id: Uuid) -> StoreResult<Option<BuyerPersona>> {
        self.before_read(journal_id, StepTable::Buyer).await?;
        Ok(self.tables.read().await.buyers.get(&journal_id).cloned())
    }

    async fn fetch_canvas(&self, journal_id: Uuid) -> StoreResult<Option<ValueCanvas>> {
        self.before_read(journal_id, StepTable::Canvas).await?;
        Ok(self.tables.read().await.canvases.get(&journal_id).cloned())
    }

    async fn upsert_means(&self, journal_id: Uuid, means: &MemberMeans) -> StoreResult<()> {
        self.before_write(StepTable::Means)?;
        {
            let mut tables = self.tables.write().await;
            tables.require_journal(journal_id)?;
            let rows = tables.means.entry(journal_id).or_default();
            match rows.iter_mut().find(|m| m.member_id == means.member_id) {
                Some(row) => *row = means.clone(),
                None => rows.push(means.clone()),
            }
        }
        self.after_write(journal_id, StepTable::Means);
        Ok(())
    }

    async fn upsert_problem(&self, journal_id: Uuid, problem: &Problem) -> StoreResult<()> {
        self.before_write(StepTable::Problem)?;
        {
            let mut tables = self.tables.write().await;
            tables.require_journal(journal_id)?;
            tables.problems.insert(journal_id, problem.clone());
        }
        self.after_write(journal_id, StepTable::Problem);
        Ok(())
    }

    async fn replace_trends(&self, journal_id: Uuid, trends: &[Trend]) -> StoreResult<()> {
        self.before_write(StepTable::Trends)?;
        {
            let mut tables = self.tables.write().await;
            tables.require_journal(journal_id)?;
            tables.trends.insert(journal_id, trends.to_vec());
        }
        self.after_write(journal_id, StepTable::Trends);
        Ok(())
    }

    async fn replace_ideas(&self, journal_id: Uuid, ideas: &[Idea]) -> StoreResult<()> {
        self.before_write(StepTable::Ideas)?;
        {
            let mut tables = self.tables.write().await;
            tables.require_journal(journal_id)?;
            tables.ideas.insert(journal_id, ideas.to_vec());
        }
        self.after_write(journal_id, StepTable::Ideas);
        Ok(())
    }

    async fn upsert_buyer(&self, journal_id: Uuid, buyer: &BuyerPersona) -> StoreResult<()> {
        self.before_write(StepTable::Buyer)?;
        {
            let mut tables = self.tables.write().await;
            tables.require_journal(journal_id)?;
            tables.buyers.insert(journal_id, buyer.clone());
        }
        self.after_write(journal_id, StepTable::Buyer);
        Ok(())
    }

    async fn upsert_canvas(&self, journal_id: Uuid, canvas: &ValueCanvas) -> StoreResult<()> {
        self.before_write(StepTable::Canvas)?;
        {
            let mut tables = self.tables.write().await;
            tables.require_journal(journal_id)?;
            tables.canvases.insert(journal_id, canvas.clone());
        }
        self.after_write(journal_id, StepTable::Canvas);
        Ok(())
    }

    async fn append_activity(&self, entry: &ActivityEntry) -> StoreResult<()> {
        self.tables.write().await.activity.push(entry.clone());
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Feasibility, InnovationLevel, StepId};

    async fn seeded() -> (MemoryStorage, Journal) {
        let store = MemoryStorage::new();
        let team = Team::new("Equipo Sur", ["Ana"]);
        store.insert_team(&team).await.unwrap();
        let journal = Journal::new(team.id, "Huertos urbanos");
        store.insert_journal(&journal).await.unwrap();
        (store, journal)
    }

    #[tokio::test]
    async fn test_means_upsert_by_member() {
        let (store, journal) = seeded().await;
        let member = Uuid::new_v4();

        let mut means = MemberMeans::new(member);
        means.identity = "Agrónoma".to_string();
        store.upsert_means(journal.id, &means).await.unwrap();
        means.network = "Cooperativas".to_string();
        store.upsert_means(journal.id, &means).await.unwrap();

        let rows = store.fetch_means(journal.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].network, "Cooperativas");
        assert_eq!(store.write_count(StepTable::Means), 2);
    }

    #[tokio::test]
    async fn test_list_replace_keeps_order_and_ids() {
        let (store, journal) = seeded().await;
        let ideas: Vec<Idea> = ["a", "b", "c"]
            .into_iter()
            .map(|d| Idea::new(d, "Producto", InnovationLevel::Radical, Feasibility::Low))
            .collect();
        store.replace_ideas(journal.id, &ideas).await.unwrap();
        store.replace_ideas(journal.id, &ideas[1..]).await.unwrap();

        let stored = store.fetch_ideas(journal.id).await.unwrap();
        assert_eq!(stored, ideas[1..].to_vec());
    }

    #[tokio::test]
    async fn test_writes_publish_change_events() {
        let (store, journal) = seeded().await;
        let mut changes = store.changes();
        store
            .upsert_problem(journal.id, &Problem::default())
            .await
            .unwrap();
        let event = changes.recv().await.unwrap();
        assert_eq!(event, ChangeEvent::new(journal.id, StepTable::Problem));
    }

    #[tokio::test]
    async fn test_write_to_unknown_journal_fails() {
        let store = MemoryStorage::new();
        let err = store
            .upsert_canvas(Uuid::new_v4(), &ValueCanvas::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let (store, journal) = seeded().await;
        store.fail_reads(StepTable::Trends, true);
        assert!(store.fetch_trends(journal.id).await.is_err());
        assert!(store.fetch_ideas(journal.id).await.is_ok());
        store.fail_reads(StepTable::Trends, false);
        assert!(store.fetch_trends(journal.id).await.is_ok());

        store.fail_writes(StepTable::Buyer, true);
        assert!(store
            .upsert_buyer(journal.id, &BuyerPersona::default())
            .await
            .is_err());
        assert_eq!(store.write_count(StepTable::Buyer), 0);

        store.set_catalog_offline(true);
        assert!(store.list_teams().await.is_err());
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let (store, journal) = seeded().await;
        store
            .upsert_problem(journal.id, &Problem::default())
            .await
            .unwrap();
        store
            .append_activity(&ActivityEntry::new(journal.id, StepId::Problem, "saved"))
            .await
            .unwrap();

        store.delete_journal(journal.id).await.unwrap();

        assert!(store.get_journal(journal.id).await.unwrap().is_none());
        assert!(store.fetch_problem(journal.id).await.unwrap().is_none());
        assert!(store.activity(journal.id).await.is_empty());
    }

    #[tokio::test]
    async fn test_summary_write_back() {
        let (store, journal) = seeded().await;
        store
            .update_journal_summary(journal.id, JournalStatus::InProgress, 42)
            .await
            .unwrap();
        let stored = store.get_journal(journal.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JournalStatus::InProgress);
        assert_eq!(stored.progress, 42);
        assert!(stored.updated_at >= journal.updated_at);
    }
}
