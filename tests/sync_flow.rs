//! Wizard and sync store flows against the bundled storage backends
//!
//! ```bash
//! cargo test --test sync_flow
//! ```

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;
use uuid::Uuid;
use venture_journal::generation::{GenerationError, GenerationRequest, StepGenerator};
use venture_journal::store::{FileStorage, JournalStorage, MemoryStorage, StepTable};
use venture_journal::sync::{JournalSync, SyncEvent};
use venture_journal::types::{Journal, MeansPatch, ProblemPatch, StepId, Team, Trend, TrendKind};
use venture_journal::wizard::Wizard;

// ─── Helpers ─────────────────────────────────────────────────────────────────

struct Session {
    storage: Arc<MemoryStorage>,
    sync: JournalSync,
    team: Team,
    journal: Journal,
}

async fn session() -> Session {
    let storage = Arc::new(MemoryStorage::new());
    let sync = JournalSync::new(storage.clone());
    let team = sync
        .create_team("Equipo Sol", ["Marta", "Iván"])
        .await
        .unwrap();
    sync.select_team(team.clone()).await;
    let journal = sync.create_journal(team.id, "Reparación local").await.unwrap();
    assert!(sync.open_journal(journal.clone()).await);
    Session {
        storage,
        sync,
        team,
        journal,
    }
}

fn trends(count: usize) -> Vec<Trend> {
    (0..count)
        .map(|i| Trend::new(format!("Tendencia {i}"), TrendKind::Social, "Breve", "Ejemplo"))
        .collect()
}

async fn wait_for<F>(events: &mut broadcast::Receiver<SyncEvent>, mut matches: F) -> SyncEvent
where
    F: FnMut(&SyncEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for sync event")
}

/// Generator answering every request with the same JSON
struct CannedGenerator(Value);

#[async_trait]
impl StepGenerator for CannedGenerator {
    fn name(&self) -> &str {
        "canned"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<Value, GenerationError> {
        Ok(self.0.clone())
    }
}

// ─── Flows ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_edits_reach_the_store_when_advancing() {
    let s = session().await;
    let mut wizard = Wizard::new(s.sync.clone());

    let patch = ProblemPatch {
        title: Some("Aparatos que nadie repara".to_string()),
        ..Default::default()
    };
    wizard.edit_problem(patch).await.unwrap();

    // Visible locally before it is persisted
    assert_eq!(s.sync.pending_writes(), 1);
    assert_eq!(
        s.sync.data().await.problem.map(|p| p.title),
        Some("Aparatos que nadie repara".to_string())
    );
    assert!(s.storage.fetch_problem(s.journal.id).await.unwrap().is_none());

    assert_eq!(wizard.advance().await, Some(StepId::Problem));
    assert_eq!(s.sync.pending_writes(), 0);
    let stored = s.storage.fetch_problem(s.journal.id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Aparatos que nadie repara");
}

#[tokio::test(start_paused = true)]
async fn test_rapid_edits_collapse_into_one_write() {
    let s = session().await;
    let wizard = Wizard::new(s.sync.clone());

    wizard.edit_trends(trends(1)).await.unwrap();
    wizard.edit_trends(trends(2)).await.unwrap();
    let gating = wizard.edit_trends(trends(3)).await.unwrap();
    assert_eq!(gating.step(StepId::Trends).progress, 100);
    assert_eq!(s.storage.write_count(StepTable::Trends), 0);

    tokio::time::sleep(Duration::from_millis(700)).await;

    assert_eq!(s.storage.write_count(StepTable::Trends), 1);
    assert_eq!(s.storage.fetch_trends(s.journal.id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_remote_change_reloads_current_journal() {
    let s = session().await;
    let mut events = s.sync.events();
    s.sync.subscribe(s.journal.id);

    s.storage.replace_trends(s.journal.id, &trends(2)).await.unwrap();

    let event = wait_for(&mut events, |e| matches!(e, SyncEvent::Reloaded { .. })).await;
    assert_eq!(
        event,
        SyncEvent::Reloaded {
            journal_id: s.journal.id,
            failed: Vec::new(),
        }
    );
    assert_eq!(s.sync.data().await.trends.len(), 2);

    s.sync.unsubscribe();
    assert_eq!(s.sync.subscription_count(), 0);
}

#[tokio::test]
async fn test_switching_journal_clears_cached_steps() {
    let s = session().await;
    assert!(s.sync.save_trends(s.journal.id, trends(3)).await);
    assert_eq!(s.sync.data().await.trends.len(), 3);

    let other = s.sync.create_journal(s.team.id, "Segunda idea").await.unwrap();
    s.sync.select_journal(other.clone()).await;

    let data = s.sync.data().await;
    assert!(data.trends.is_empty());
    assert_eq!(s.sync.current_journal().await.map(|j| j.id), Some(other.id));
}

#[tokio::test]
async fn test_generated_ideas_are_saved() {
    let s = session().await;
    let wizard = Wizard::new(s.sync.clone());
    let reply = json!({
        "ideas": [
            {"description": "Taller móvil de reparaciones a domicilio", "kind": "Servicio", "innovation": "incremental", "feasibility": "high", "selected": true},
            {"description": "Banco de repuestos recuperados", "kind": "Producto", "innovation": "radical", "feasibility": "medium", "selected": true}
        ]
    });

    let result = wizard
        .prefill(&CannedGenerator(reply), StepId::Ideation, "ideas de reparación", None)
        .await
        .unwrap();
    assert!(!result.is_fallback());

    let stored = s.storage.fetch_ideas(s.journal.id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored[0].selected);
    assert!(!stored[1].selected);
}

#[tokio::test]
async fn test_summary_written_back() {
    let s = session().await;
    let wizard = Wizard::new(s.sync.clone());
    let member = s.team.members[0].id;

    wizard
        .edit_means(
            member,
            MeansPatch {
                identity: Some("Electricista".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let gating = wizard.sync_summary().await;
    assert_eq!(gating.step(StepId::Means).progress, 50);

    let stored = s.storage.get_journal(s.journal.id).await.unwrap().unwrap();
    assert_eq!(stored.progress, gating.total_progress);
    assert_eq!(stored.status.as_str(), "in_progress");
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = TempDir::new().unwrap();
    let team = Team::new("Equipo Norte", ["Paula"]);
    let journal = Journal::new(team.id, "Cooperativa");
    let journal_id = journal.id;

    {
        let storage = FileStorage::new(dir.path());
        storage.insert_team(&team).await.unwrap();
        storage.insert_journal(&journal).await.unwrap();
        storage.replace_trends(journal_id, &trends(3)).await.unwrap();
    }

    let reopened = Arc::new(FileStorage::new(dir.path()));
    let sync = JournalSync::new(reopened.clone());
    assert!(sync.load_teams().await);
    assert_eq!(sync.snapshot().await.teams.len(), 1);

    let stored = reopened.get_journal(journal_id).await.unwrap().unwrap();
    assert!(sync.open_journal(stored).await);
    let persisted = reopened.fetch_trends(journal_id).await.unwrap();
    assert_eq!(persisted.len(), 3);
    assert_eq!(sync.data().await.trends, persisted);
    assert_eq!(sync.overall().await.step(StepId::Trends).progress, 100);
    assert!(reopened.get_journal(Uuid::new_v4()).await.unwrap().is_none());
}
