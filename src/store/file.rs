//! JSON-file storage backend.
//!
//! Layout under the data directory:
//!
//! ```text
//! teams.json
//! journals/<journal-id>/journal.json
//! journals/<journal-id>/{means,problem,trends,ideas,buyer,canvas}.json
//! journals/<journal-id>/activity.jsonl
//! ```
//!
//! Files are written to a temporary sibling and renamed into place so a
//! concurrent reader never sees a half-written table.

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use super::watcher::StoreWatcher;
use super::{ChangeEvent, JournalStorage, StepTable, StoreError, StoreResult, CHANGE_FEED_CAPACITY};
use crate::types::{
    ActivityEntry, BuyerPersona, Idea, Journal, JournalStatus, MemberMeans, Problem, Team, Trend,
    ValueCanvas,
};

pub(crate) const JOURNALS_DIR: &str = "journals";
const TEAMS_FILE: &str = "teams.json";
const JOURNAL_FILE: &str = "journal.json";
const ACTIVITY_FILE: &str = "activity.jsonl";

pub struct FileStorage {
    root: PathBuf,
    changes: broadcast::Sender<ChangeEvent>,
    /// Serializes read-modify-write of shared files
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            root: root.into(),
            changes,
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start forwarding on-disk edits made by other processes into the
    /// change feed. Dropping the returned watcher stops it.
    pub fn watch(&self, poll_interval: Duration) -> anyhow::Result<StoreWatcher> {
        StoreWatcher::with_poll_interval(&self.root, self.changes.clone(), poll_interval)
    }

    fn journal_dir(&self, journal_id: Uuid) -> PathBuf {
        self.root.join(JOURNALS_DIR).join(journal_id.to_string())
    }

    fn table_path(&self, journal_id: Uuid, table: StepTable) -> PathBuf {
        self.journal_dir(journal_id)
            .join(format!("{}.json", table.as_str()))
    }

    async fn require_journal(&self, journal_id: Uuid) -> StoreResult<()> {
        let path = self.journal_dir(journal_id).join(JOURNAL_FILE);
        match fs::metadata(&path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::journal_not_found(journal_id))
            }
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    async fn write_table<T: Serialize + ?Sized>(
        &self,
        journal_id: Uuid,
        table: StepTable,
        value: &T,
    ) -> StoreResult<()> {
        self.require_journal(journal_id).await?;
        write_json(&self.table_path(journal_id, table), value).await?;
        debug!(journal_id = %journal_id, table = %table, "Wrote step table");
        let _ = self.changes.send(ChangeEvent::new(journal_id, table));
        Ok(())
    }

    async fn read_journal_file(&self, dir: &Path) -> StoreResult<Option<Journal>> {
        read_json(&dir.join(JOURNAL_FILE)).await
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| StoreError::Serialization {
            path: path.to_path_buf(),
            source,
        })
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let contents = serde_json::to_string_pretty(value).map_err(|source| {
        StoreError::Serialization {
            path: path.to_path_buf(),
            source,
        }
    })?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    // One temp file per write; concurrent writers to a table must not share it
    let tmp = path.with_extension(format!("json.{}.tmp", Uuid::new_v4()));
    fs::write(&tmp, contents).await.map_err(io_err)?;
    if let Err(source) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(io_err(source));
    }
    Ok(())
}

#[async_trait]
impl JournalStorage for FileStorage {
    fn name(&self) -> &str {
        "file"
    }

    async fn list_teams(&self) -> StoreResult<Vec<Team>> {
        let mut teams: Vec<Team> = read_json(&self.root.join(TEAMS_FILE))
            .await?
            .unwrap_or_default();
        teams.sort_by_key(|t| t.created_at);
        Ok(teams)
    }

    async fn insert_team(&self, team: &Team) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.root.join(TEAMS_FILE);
        let mut teams: Vec<Team> = read_json(&path).await?.unwrap_or_default();
        teams.push(team.clone());
        write_json(&path, &teams).await
    }

    async fn list_journals(&self, team_id: Uuid) -> StoreResult<Vec<Journal>> {
        let dir = self.root.join(JOURNALS_DIR);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path: dir, source }),
        };

        let mut journals = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    return Err(StoreError::Io {
                        path: dir.clone(),
                        source,
                    })
                }
            };
            match self.read_journal_file(&entry.path()).await {
                Ok(Some(journal)) if journal.team_id == team_id => journals.push(journal),
                Ok(_) => {}
                // One unreadable journal should not hide the rest
                Err(e) => warn!(error = %e, "Skipping unreadable journal"),
            }
        }
        journals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(journals)
    }

    async fn get_journal(&self, journal_id: Uuid) -> StoreResult<Option<Journal>> {
        self.read_journal_file(&self.journal_dir(journal_id)).await
    }

    async fn insert_journal(&self, journal: &Journal) -> StoreResult<()> {
        let teams = self.list_teams().await?;
        if !teams.iter().any(|t| t.id == journal.team_id) {
            return Err(StoreError::NotFound(format!("team {}", journal.team_id)));
        }
        write_json(&self.journal_dir(journal.id).join(JOURNAL_FILE), journal).await
    }

    async fn update_journal_summary(
        &self,
        journal_id: Uuid,
        status: JournalStatus,
        progress: u8,
    ) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let dir = self.journal_dir(journal_id);
        let mut journal = self
            .read_journal_file(&dir)
            .await?
            .ok_or_else(|| StoreError::journal_not_found(journal_id))?;
        journal.status = status;
        journal.progress = progress;
        journal.updated_at = Utc::now();
        write_json(&dir.join(JOURNAL_FILE), &journal).await
    }

    async fn delete_journal(&self, journal_id: Uuid) -> StoreResult<()> {
        self.require_journal(journal_id).await?;
        let dir = self.journal_dir(journal_id);
        fs::remove_dir_all(&dir)
            .await
            .map_err(|source| StoreError::Io { path: dir, source })
    }

    async fn fetch_means(&self, journal_id: Uuid) -> StoreResult<Vec<MemberMeans>> {
        Ok(read_json(&self.table_path(journal_id, StepTable::Means))
            .await?
            .unwrap_or_default())
    }

    async fn fetch_problem(&self, journal_id: Uuid) -> StoreResult<Option<Problem>> {
        read_json(&self.table_path(journal_id, StepTable::Problem)).await
    }

    async fn fetch_trends(&self, journal_id: Uuid) -> StoreResult<Vec<Trend>> {
        Ok(read_json(&self.table_path(journal_id, StepTable::Trends))
            .await?
            .unwrap_or_default())
    }

    async fn fetch_ideas(&self, journal_id: Uuid) -> StoreResult<Vec<Idea>> {
        Ok(read_json(&self.table_path(journal_id, StepTable::Ideas))
            .await?
            .unwrap_or_default())
    }

    async fn fetch_buyer(&self, journal_id: Uuid) -> StoreResult<Option<BuyerPersona>> {
        read_json(&self.table_path(journal_id, StepTable::Buyer)).await
    }

    async fn fetch_canvas(&self, journal_id: Uuid) -> StoreResult<Option<ValueCanvas>> {
        read_json(&self.table_path(journal_id, StepTable::Canvas)).await
    }

    async fn upsert_means(&self, journal_id: Uuid, means: &MemberMeans) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut rows = self.fetch_means(journal_id).await?;
        match rows.iter_mut().find(|m| m.member_id == means.member_id) {
            Some(row) => *row = means.clone(),
            None => rows.push(means.clone()),
        }
        self.write_table(journal_id, StepTable::Means, &rows).await
    }

    async fn upsert_problem(&self, journal_id: Uuid, problem: &Problem) -> StoreResult<()> {
        self.write_table(journal_id, StepTable::Problem, problem).await
    }

    async fn replace_trends(&self, journal_id: Uuid, trends: &[Trend]) -> StoreResult<()> {
        self.write_table(journal_id, StepTable::Trends, trends).await
    }

    async fn replace_ideas(&self, journal_id: Uuid, ideas: &[Idea]) -> StoreResult<()> {
        self.write_table(journal_id, StepTable::Ideas, ideas).await
    }

    async fn upsert_buyer(&self, journal_id: Uuid, buyer: &BuyerPersona) -> StoreResult<()> {
        self.write_table(journal_id, StepTable::Buyer, buyer).await
    }

    async fn upsert_canvas(&self, journal_id: Uuid, canvas: &ValueCanvas) -> StoreResult<()> {
        self.write_table(journal_id, StepTable::Canvas, canvas).await
    }

    async fn append_activity(&self, entry: &ActivityEntry) -> StoreResult<()> {
        self.require_journal(entry.journal_id).await?;
        let path = self.journal_dir(entry.journal_id).join(ACTIVITY_FILE);
        let mut line = serde_json::to_string(entry).map_err(|source| {
            StoreError::Serialization {
                path: path.clone(),
                source,
            }
        })?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;
        file.write_all(line.as_bytes()).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StepId, TrendKind};
    use tempfile::TempDir;

    async fn seeded(dir: &TempDir) -> (FileStorage, Team, Journal) {
        let store = FileStorage::new(dir.path());
        let team = Team::new("Equipo Norte", ["Ana", "Luis"]);
        store.insert_team(&team).await.unwrap();
        let journal = Journal::new(team.id, "Movilidad");
        store.insert_journal(&journal).await.unwrap();
        (store, team, journal)
    }

    #[tokio::test]
    async fn test_missing_tables_read_as_empty() {
        let dir = TempDir::new().unwrap();
        let (store, _, journal) = seeded(&dir).await;
        assert!(store.fetch_means(journal.id).await.unwrap().is_empty());
        assert!(store.fetch_problem(journal.id).await.unwrap().is_none());
        assert!(store.fetch_canvas(journal.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tables_persist_across_instances() {
        let dir = TempDir::new().unwrap();
        let (store, team, journal) = seeded(&dir).await;
        let trends = vec![Trend::new("Teletrabajo", TrendKind::Social, "Más casa", "Cowork")];
        store.replace_trends(journal.id, &trends).await.unwrap();

        let reopened = FileStorage::new(dir.path());
        assert_eq!(reopened.fetch_trends(journal.id).await.unwrap(), trends);
        assert_eq!(reopened.list_teams().await.unwrap(), vec![team.clone()]);
        let journals = reopened.list_journals(team.id).await.unwrap();
        assert_eq!(journals.len(), 1);
        assert_eq!(journals[0].id, journal.id);
    }

    #[tokio::test]
    async fn test_corrupt_table_is_an_error() {
        let dir = TempDir::new().unwrap();
        let (store, _, journal) = seeded(&dir).await;
        let path = store.table_path(journal.id, StepTable::Problem);
        std::fs::write(&path, "{not json").unwrap();
        let err = store.fetch_problem(journal.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_writes_to_one_table() {
        let dir = TempDir::new().unwrap();
        let (store, _, journal) = seeded(&dir).await;
        let titles = ["Agua", "Luz", "Gas", "Internet"];
        let problems: Vec<Problem> = titles
            .iter()
            .map(|t| Problem {
                title: (*t).to_string(),
                ..Default::default()
            })
            .collect();
        let (a, b, c, d) = tokio::join!(
            store.upsert_problem(journal.id, &problems[0]),
            store.upsert_problem(journal.id, &problems[1]),
            store.upsert_problem(journal.id, &problems[2]),
            store.upsert_problem(journal.id, &problems[3]),
        );
        for result in [a, b, c, d] {
            result.unwrap();
        }

        let stored = store.fetch_problem(journal.id).await.unwrap().unwrap();
        assert!(titles.contains(&stored.title.as_str()));

        let table = store.table_path(journal.id, StepTable::Problem);
        let leftovers: Vec<_> = std::fs::read_dir(table.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[tokio::test]
    async fn test_write_requires_existing_journal() {
        let dir = TempDir::new().unwrap();
        let store = FileStorage::new(dir.path());
        let err = store
            .upsert_problem(Uuid::new_v4(), &Problem::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_journal_needs_known_team() {
        let dir = TempDir::new().unwrap();
        let store = FileStorage::new(dir.path());
        let journal = Journal::new(Uuid::new_v4(), "Huérfano");
        assert!(store.insert_journal(&journal).await.is_err());
    }

    #[tokio::test]
    async fn test_means_upsert_and_change_feed() {
        let dir = TempDir::new().unwrap();
        let (store, team, journal) = seeded(&dir).await;
        let mut changes = store.changes();

        let mut means = MemberMeans::new(team.members[0].id);
        means.resources = "Una furgoneta".to_string();
        store.upsert_means(journal.id, &means).await.unwrap();
        means.resources = "Dos furgonetas".to_string();
        store.upsert_means(journal.id, &means).await.unwrap();

        let rows = store.fetch_means(journal.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].resources, "Dos furgonetas");
        assert_eq!(
            changes.recv().await.unwrap(),
            ChangeEvent::new(journal.id, StepTable::Means)
        );
    }

    #[tokio::test]
    async fn test_activity_is_appended_and_delete_cascades() {
        let dir = TempDir::new().unwrap();
        let (store, _, journal) = seeded(&dir).await;
        for action in ["saved", "saved again"] {
            store
                .append_activity(&ActivityEntry::new(journal.id, StepId::Trends, action))
                .await
                .unwrap();
        }
        let log = std::fs::read_to_string(store.journal_dir(journal.id).join(ACTIVITY_FILE))
            .unwrap();
        assert_eq!(log.lines().count(), 2);

        store.delete_journal(journal.id).await.unwrap();
        assert!(store.get_journal(journal.id).await.unwrap().is_none());
        assert!(store.fetch_trends(journal.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary_write_back_persists() {
        let dir = TempDir::new().unwrap();
        let (store, _, journal) = seeded(&dir).await;
        store
            .update_journal_summary(journal.id, JournalStatus::Ready, 100)
            .await
            .unwrap();
        let stored = store.get_journal(journal.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JournalStatus::Ready);
        assert_eq!(stored.progress, 100);
    }
}
