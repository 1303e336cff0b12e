//! Journal synchronization store.
//!
//! Holds the current team/journal selection and the five cached step
//! datasets, reconciled with a [`JournalStorage`] collaborator:
//!
//! - reads degrade: a failed fetch keeps (or empties) only its own slot
//! - writes are fire-and-forget: failures are logged and reported as
//!   [`SyncEvent::SaveFailed`], and `saving` always clears
//! - keystroke edits are debounced per field group and collapsed to the
//!   latest value; navigation flushes immediately
//! - remote change notifications trigger a full reload of the journal
//!
//! `JournalSync` is a cheap handle; clones share the same state.

mod debounce;
mod state;

pub use debounce::{Clock, Collapse, Debouncer, TokioClock};
pub use state::{StepWrite, SyncEvent, SyncState, WriteKey, WriteSlot};

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::progress::{compute_overall, OverallProgress};
use crate::steps::ProgressContext;
use crate::store::{JournalStorage, StepTable, StoreError, StoreResult};
use crate::types::{
    ActivityEntry, BuyerPatch, CanvasPatch, Idea, Journal, JournalData, JournalStatus, MeansPatch,
    MemberMeans, ProblemPatch, StepId, Team, Trend,
};

/// Default quiet window for keystroke autosave
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(600);

const EVENT_CAPACITY: usize = 256;

#[derive(Default)]
struct Shared {
    view: SyncState,
    saves_in_flight: usize,
    /// Sequence number of the most recently issued journal-data load
    load_seq: u64,
}

struct Inner {
    storage: Arc<dyn JournalStorage>,
    clock: Arc<dyn Clock>,
    shared: RwLock<Shared>,
    pending: Mutex<Debouncer<WriteKey, StepWrite>>,
    /// Serializes read-modify-write against the store
    save_gate: tokio::sync::Mutex<()>,
    subscriptions: Mutex<HashMap<Uuid, JoinHandle<()>>>,
    events: broadcast::Sender<SyncEvent>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut subs) = self.subscriptions.lock() {
            for (_, handle) in subs.drain() {
                handle.abort();
            }
        }
    }
}

#[derive(Clone)]
pub struct JournalSync {
    inner: Arc<Inner>,
}

impl JournalSync {
    pub fn new(storage: Arc<dyn JournalStorage>) -> Self {
        Self::with_clock(storage, Arc::new(TokioClock), DEFAULT_DEBOUNCE)
    }

    pub fn with_clock(
        storage: Arc<dyn JournalStorage>,
        clock: Arc<dyn Clock>,
        debounce: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                storage,
                clock,
                shared: RwLock::new(Shared::default()),
                pending: Mutex::new(Debouncer::new(debounce)),
                save_gate: tokio::sync::Mutex::new(()),
                subscriptions: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    pub fn storage(&self) -> &Arc<dyn JournalStorage> {
        &self.inner.storage
    }

    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.inner.events.send(event);
    }

    // ─── Read access ─────────────────────────────────────────────────────────

    pub async fn snapshot(&self) -> SyncState {
        self.inner.shared.read().await.view.clone()
    }

    pub async fn data(&self) -> JournalData {
        self.inner.shared.read().await.view.data.clone()
    }

    pub async fn current_journal(&self) -> Option<Journal> {
        self.inner.shared.read().await.view.current_journal.clone()
    }

    pub async fn is_saving(&self) -> bool {
        self.inner.shared.read().await.view.saving
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.shared.read().await.view.loading
    }

    /// Scoring context for the current journal's team
    pub async fn progress_context(&self) -> ProgressContext {
        let shared = self.inner.shared.read().await;
        ProgressContext::for_team(shared.view.journal_team())
    }

    /// Recompute gating from the cached data
    pub async fn overall(&self) -> OverallProgress {
        let shared = self.inner.shared.read().await;
        let ctx = ProgressContext::for_team(shared.view.journal_team());
        compute_overall(&shared.view.data, &ctx)
    }

    /// Number of debounced writes not yet flushed
    pub fn pending_writes(&self) -> usize {
        self.inner.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    // ─── Selection ───────────────────────────────────────────────────────────

    /// Select a team; a different team drops the journal selection
    pub async fn select_team(&self, team: Team) {
        let team_id = team.id;
        {
            let mut shared = self.inner.shared.write().await;
            let changed = shared.view.current_team.as_ref().map(|t| t.id) != Some(team_id);
            if changed {
                shared.view.journals.clear();
                shared.view.current_journal = None;
                shared.view.data = JournalData::default();
            }
            shared.view.current_team = Some(team);
        }
        self.emit(SyncEvent::Selection {
            team_id: Some(team_id),
            journal_id: None,
        });
    }

    /// Select a journal; switching journals clears all cached step data
    pub async fn select_journal(&self, journal: Journal) {
        let (team_id, journal_id) = (journal.team_id, journal.id);
        {
            let mut shared = self.inner.shared.write().await;
            if shared.view.current_journal_id() != Some(journal_id) {
                shared.view.data = JournalData::default();
            }
            shared.view.current_journal = Some(journal);
        }
        self.emit(SyncEvent::Selection {
            team_id: Some(team_id),
            journal_id: Some(journal_id),
        });
    }

    pub async fn clear_selection(&self) {
        {
            let mut shared = self.inner.shared.write().await;
            shared.view.current_team = None;
            shared.view.current_journal = None;
            shared.view.journals.clear();
            shared.view.data = JournalData::default();
        }
        self.emit(SyncEvent::Selection {
            team_id: None,
            journal_id: None,
        });
    }

    /// Select a journal and load its step data
    pub async fn open_journal(&self, journal: Journal) -> bool {
        let journal_id = journal.id;
        self.select_journal(journal).await;
        self.load_journal_data(journal_id).await
    }

    // ─── Loads ───────────────────────────────────────────────────────────────

    /// Replace the team list; on failure the previous list is kept
    #[instrument(skip(self))]
    pub async fn load_teams(&self) -> bool {
        match self.inner.storage.list_teams().await {
            Ok(teams) => {
                let count = teams.len();
                self.inner.shared.write().await.view.teams = teams;
                self.emit(SyncEvent::TeamsLoaded { count });
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to load teams, keeping cached list");
                self.emit(SyncEvent::LoadFailed {
                    what: "teams".to_string(),
                    error: e.to_string(),
                });
                false
            }
        }
    }

    /// Replace the journal list; on failure the previous list is kept
    #[instrument(skip(self))]
    pub async fn load_journals_for_team(&self, team_id: Uuid) -> bool {
        match self.inner.storage.list_journals(team_id).await {
            Ok(journals) => {
                let count = journals.len();
                {
                    let mut shared = self.inner.shared.write().await;
                    let selected = shared.view.current_team.as_ref().map(|t| t.id);
                    if selected.is_some_and(|id| id != team_id) {
                        debug!(team_id = %team_id, "Ignoring journals of a deselected team");
                        return false;
                    }
                    shared.view.journals = journals;
                }
                self.emit(SyncEvent::JournalsLoaded { team_id, count });
                true
            }
            Err(e) => {
                warn!(team_id = %team_id, error = %e, "Failed to load journals, keeping cached list");
                self.emit(SyncEvent::LoadFailed {
                    what: format!("journals of team {team_id}"),
                    error: e.to_string(),
                });
                false
            }
        }
    }

    /// Fetch all five steps concurrently and replace the cache
    ///
    /// Each failed fetch degrades to empty for its own slot only. The result
    /// is dropped if another load was issued meanwhile or the journal is no
    /// longer selected. Returns whether the result was applied.
    #[instrument(skip(self))]
    pub async fn load_journal_data(&self, journal_id: Uuid) -> bool {
        let seq = {
            let mut shared = self.inner.shared.write().await;
            shared.load_seq += 1;
            shared.view.loading = true;
            shared.load_seq
        };

        let storage = &self.inner.storage;
        let (means, problem, trends, ideas, buyer, canvas) = tokio::join!(
            storage.fetch_means(journal_id),
            storage.fetch_problem(journal_id),
            storage.fetch_trends(journal_id),
            storage.fetch_ideas(journal_id),
            storage.fetch_buyer(journal_id),
            storage.fetch_canvas(journal_id),
        );

        let mut failed = Vec::new();
        let mut data = JournalData {
            means: degrade(journal_id, StepTable::Means, means, &mut failed),
            problem: degrade(journal_id, StepTable::Problem, problem, &mut failed),
            trends: degrade(journal_id, StepTable::Trends, trends, &mut failed),
            ideas: degrade(journal_id, StepTable::Ideas, ideas, &mut failed),
            buyer: degrade(journal_id, StepTable::Buyer, buyer, &mut failed),
            canvas: degrade(journal_id, StepTable::Canvas, canvas, &mut failed),
        };

        {
            let mut shared = self.inner.shared.write().await;
            let latest = shared.load_seq == seq;
            if latest {
                shared.view.loading = false;
            }
            if !latest || shared.view.current_journal_id() != Some(journal_id) {
                debug!(journal_id = %journal_id, "Discarding stale journal load");
                return false;
            }
            self.reapply_pending(journal_id, &mut data);
            shared.view.data = data;
        }

        self.emit(SyncEvent::Reloaded { journal_id, failed });
        true
    }

    /// Overlay debounced-but-unsaved edits onto freshly loaded data
    fn reapply_pending(&self, journal_id: Uuid, data: &mut JournalData) {
        if let Ok(pending) = self.inner.pending.lock() {
            for write in pending.peek_matching(|k| k.journal_id == journal_id) {
                write.apply_local(data);
            }
        }
    }

    // ─── Creation ────────────────────────────────────────────────────────────

    /// Create a team, list it locally at once, then refresh from the store
    #[instrument(skip(self, members))]
    pub async fn create_team<I, S>(&self, name: &str, members: I) -> StoreResult<Team>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let team = Team::new(name, members);
        self.inner.storage.insert_team(&team).await?;
        info!(team_id = %team.id, members = team.members.len(), "Created team");

        self.inner.shared.write().await.view.teams.push(team.clone());
        let this = self.clone();
        tokio::spawn(async move {
            this.load_teams().await;
        });
        Ok(team)
    }

    /// Create a journal, list it locally at once, then refresh from the store
    #[instrument(skip(self))]
    pub async fn create_journal(&self, team_id: Uuid, title: &str) -> StoreResult<Journal> {
        let journal = Journal::new(team_id, title);
        self.inner.storage.insert_journal(&journal).await?;
        info!(journal_id = %journal.id, "Created journal");

        {
            let mut shared = self.inner.shared.write().await;
            let selected = shared.view.current_team.as_ref().map(|t| t.id);
            if selected.is_none_or(|id| id == team_id) {
                shared.view.journals.insert(0, journal.clone());
            }
        }
        let this = self.clone();
        tokio::spawn(async move {
            this.load_journals_for_team(team_id).await;
        });
        Ok(journal)
    }

    // ─── Saves ───────────────────────────────────────────────────────────────

    pub async fn save_means(&self, journal_id: Uuid, member_id: Uuid, patch: MeansPatch) -> bool {
        self.save(journal_id, StepWrite::Means { member_id, patch })
            .await
    }

    pub async fn save_problem(&self, journal_id: Uuid, patch: ProblemPatch) -> bool {
        self.save(journal_id, StepWrite::Problem(patch)).await
    }

    pub async fn save_trends(&self, journal_id: Uuid, trends: Vec<Trend>) -> bool {
        self.save(journal_id, StepWrite::Trends(trends)).await
    }

    pub async fn save_ideas(&self, journal_id: Uuid, ideas: Vec<Idea>) -> bool {
        self.save(journal_id, StepWrite::Ideas(ideas)).await
    }

    /// Save either or both halves of step 5
    pub async fn save_value_proposition(
        &self,
        journal_id: Uuid,
        buyer: Option<BuyerPatch>,
        canvas: Option<CanvasPatch>,
    ) -> bool {
        let mut ok = true;
        if let Some(patch) = buyer {
            ok &= self.save(journal_id, StepWrite::Buyer(patch)).await;
        }
        if let Some(patch) = canvas {
            ok &= self.save(journal_id, StepWrite::Canvas(patch)).await;
        }
        ok
    }

    /// Persist one write immediately
    ///
    /// `saving` is set for the duration and cleared whatever the outcome.
    /// Failures are logged and published, never returned as errors.
    pub async fn save(&self, journal_id: Uuid, write: StepWrite) -> bool {
        self.begin_save().await;
        let step = write.step();

        let outcome = {
            let _gate = self.inner.save_gate.lock().await;
            self.persist(journal_id, &write).await
        };

        let ok = match outcome {
            Ok(()) => {
                self.record_activity(journal_id, step).await;
                self.refresh_slot(journal_id, &write).await;
                self.emit(SyncEvent::StepSaved { journal_id, step });
                true
            }
            Err(e) => {
                warn!(journal_id = %journal_id, table = %write.table(), error = %e, "Save failed");
                self.emit(SyncEvent::SaveFailed {
                    journal_id,
                    step,
                    error: e.to_string(),
                });
                false
            }
        };

        self.end_save().await;
        ok
    }

    async fn begin_save(&self) {
        let mut shared = self.inner.shared.write().await;
        shared.saves_in_flight += 1;
        shared.view.saving = true;
    }

    async fn end_save(&self) {
        let mut shared = self.inner.shared.write().await;
        shared.saves_in_flight = shared.saves_in_flight.saturating_sub(1);
        shared.view.saving = shared.saves_in_flight > 0;
    }

    /// Merge the write into the stored row (or replace the list) and store it
    async fn persist(&self, journal_id: Uuid, write: &StepWrite) -> StoreResult<()> {
        let storage = &self.inner.storage;
        match write {
            StepWrite::Means { member_id, patch } => {
                let rows = storage.fetch_means(journal_id).await?;
                let existing = rows.into_iter().find(|m| m.member_id == *member_id);
                let is_new = existing.is_none();
                let mut row = existing.unwrap_or_else(|| MemberMeans::new(*member_id));
                patch.apply(&mut row);
                if is_new && !row.has_data() {
                    debug!(member_id = %member_id, "Skipping blank first save for member");
                    return Ok(());
                }
                row.updated_at = Some(Utc::now());
                storage.upsert_means(journal_id, &row).await
            }
            StepWrite::Problem(patch) => {
                let mut problem = storage.fetch_problem(journal_id).await?.unwrap_or_default();
                patch.apply(&mut problem);
                storage.upsert_problem(journal_id, &problem).await
            }
            StepWrite::Trends(trends) => storage.replace_trends(journal_id, trends).await,
            StepWrite::Ideas(ideas) => storage.replace_ideas(journal_id, ideas).await,
            StepWrite::Buyer(patch) => {
                let mut buyer = storage.fetch_buyer(journal_id).await?.unwrap_or_default();
                patch.apply(&mut buyer);
                storage.upsert_buyer(journal_id, &buyer).await
            }
            StepWrite::Canvas(patch) => {
                let mut canvas = storage.fetch_canvas(journal_id).await?.unwrap_or_default();
                patch.apply(&mut canvas);
                storage.upsert_canvas(journal_id, &canvas).await
            }
        }
    }

    async fn record_activity(&self, journal_id: Uuid, step: StepId) {
        let entry = ActivityEntry::new(journal_id, step, format!("saved {}", step.title()));
        if let Err(e) = self.inner.storage.append_activity(&entry).await {
            warn!(journal_id = %journal_id, error = %e, "Failed to append activity");
        }
    }

    /// Re-read the saved slot; if that fails, merge the write locally instead
    async fn refresh_slot(&self, journal_id: Uuid, write: &StepWrite) {
        let table = write.table();
        let mut fresh = JournalData::default();
        let fetched = self.fetch_table(journal_id, table, &mut fresh).await;

        let mut shared = self.inner.shared.write().await;
        if shared.view.current_journal_id() != Some(journal_id) {
            return;
        }
        let data = &mut shared.view.data;
        match fetched {
            Ok(()) => {
                move_table(table, fresh, data);
                self.reapply_pending(journal_id, data);
            }
            Err(e) => {
                debug!(error = %e, "Refresh after save failed, merging locally");
                write.apply_local(data);
            }
        }
    }

    async fn fetch_table(
        &self,
        journal_id: Uuid,
        table: StepTable,
        into: &mut JournalData,
    ) -> StoreResult<()> {
        let storage = &self.inner.storage;
        match table {
            StepTable::Means => into.means = storage.fetch_means(journal_id).await?,
            StepTable::Problem => into.problem = storage.fetch_problem(journal_id).await?,
            StepTable::Trends => into.trends = storage.fetch_trends(journal_id).await?,
            StepTable::Ideas => into.ideas = storage.fetch_ideas(journal_id).await?,
            StepTable::Buyer => into.buyer = storage.fetch_buyer(journal_id).await?,
            StepTable::Canvas => into.canvas = storage.fetch_canvas(journal_id).await?,
        }
        Ok(())
    }

    // ─── Debounced writes ────────────────────────────────────────────────────

    /// Schedule a write after the quiet window, applying it locally now
    ///
    /// Successive writes to the same field group collapse into one and
    /// restart the window.
    pub async fn queue(&self, journal_id: Uuid, write: StepWrite) {
        let key = WriteKey {
            journal_id,
            slot: write.slot(),
        };
        let step = write.step();
        let now = self.inner.clock.now();
        let deadline = self
            .inner
            .pending
            .lock()
            .ok()
            .map(|mut pending| pending.push(key, write.clone(), now));
        let Some(deadline) = deadline else {
            warn!("Pending write queue poisoned, saving immediately");
            self.save(journal_id, write).await;
            return;
        };

        {
            let mut shared = self.inner.shared.write().await;
            if shared.view.current_journal_id() == Some(journal_id) {
                write.apply_local(&mut shared.view.data);
            }
        }
        self.emit(SyncEvent::LocalEdit { journal_id, step });

        let this = self.clone();
        tokio::spawn(async move {
            this.inner.clock.sleep_until(deadline).await;
            this.flush_due().await;
        });
    }

    /// Save every write whose quiet window has elapsed
    pub async fn flush_due(&self) -> bool {
        let now = self.inner.clock.now();
        let due = match self.inner.pending.lock() {
            Ok(mut pending) => pending.take_due(now),
            Err(_) => return false,
        };
        self.save_all(due).await
    }

    /// Save a journal's pending writes now, bypassing the quiet window
    pub async fn flush_journal(&self, journal_id: Uuid) -> bool {
        let writes = match self.inner.pending.lock() {
            Ok(mut pending) => pending.take_matching(|k| k.journal_id == journal_id),
            Err(_) => return false,
        };
        self.save_all(writes).await
    }

    pub async fn flush_all(&self) -> bool {
        let writes = match self.inner.pending.lock() {
            Ok(mut pending) => pending.take_matching(|_| true),
            Err(_) => return false,
        };
        self.save_all(writes).await
    }

    async fn save_all(&self, writes: Vec<(WriteKey, StepWrite)>) -> bool {
        let mut ok = true;
        for (key, write) in writes {
            ok &= self.save(key.journal_id, write).await;
        }
        ok
    }

    // ─── Derived summary ─────────────────────────────────────────────────────

    /// Write derived status/progress back when they differ from the cached
    /// journal row. Returns whether a write was attempted.
    pub async fn write_back_summary(&self, overall: &OverallProgress) -> bool {
        let status = JournalStatus::derive(overall);
        let progress = overall.total_progress;
        let Some(journal) = self.current_journal().await else {
            return false;
        };
        if journal.status == status && journal.progress == progress {
            return false;
        }

        if let Err(e) = self
            .inner
            .storage
            .update_journal_summary(journal.id, status, progress)
            .await
        {
            warn!(journal_id = %journal.id, error = %e, "Failed to write back journal summary");
            return true;
        }

        let mut shared = self.inner.shared.write().await;
        let view = &mut shared.view;
        let now = Utc::now();
        for j in view
            .current_journal
            .iter_mut()
            .chain(view.journals.iter_mut())
            .filter(|j| j.id == journal.id)
        {
            j.status = status;
            j.progress = progress;
            j.updated_at = now;
        }
        true
    }

    // ─── Change notifications ────────────────────────────────────────────────

    /// Reload the journal whenever any of its step tables changes remotely
    ///
    /// Subscribing twice to the same journal keeps the first registration.
    pub fn subscribe(&self, journal_id: Uuid) {
        let Ok(mut subs) = self.inner.subscriptions.lock() else {
            warn!("Subscription registry poisoned");
            return;
        };
        if subs.get(&journal_id).is_some_and(|h| !h.is_finished()) {
            return;
        }

        let mut changes = self.inner.storage.changes();
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            loop {
                let table = match changes.recv().await {
                    Ok(event) if event.journal_id == journal_id => Some(event.table),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Change feed lagged, reloading");
                        None
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let sync = JournalSync { inner };
                if let Some(table) = table {
                    sync.emit(SyncEvent::RemoteChange { journal_id, table });
                }
                sync.load_journal_data(journal_id).await;
            }
            debug!(journal_id = %journal_id, "Change subscription ended");
        });
        subs.insert(journal_id, handle);
        debug!(journal_id = %journal_id, "Subscribed to journal changes");
    }

    /// Tear down every subscription; safe to call when none exist
    pub fn unsubscribe(&self) {
        if let Ok(mut subs) = self.inner.subscriptions.lock() {
            for (journal_id, handle) in subs.drain() {
                handle.abort();
                debug!(journal_id = %journal_id, "Unsubscribed from journal changes");
            }
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.inner
            .subscriptions
            .lock()
            .map(|subs| subs.values().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }
}

fn move_table(table: StepTable, from: JournalData, to: &mut JournalData) {
    match table {
        StepTable::Means => to.means = from.means,
        StepTable::Problem => to.problem = from.problem,
        StepTable::Trends => to.trends = from.trends,
        StepTable::Ideas => to.ideas = from.ideas,
        StepTable::Buyer => to.buyer = from.buyer,
        StepTable::Canvas => to.canvas = from.canvas,
    }
}

/// Unwrap a step fetch, logging and defaulting on failure
fn degrade<T: Default>(
    journal_id: Uuid,
    table: StepTable,
    result: Result<T, StoreError>,
    failed: &mut Vec<StepTable>,
) -> T {
    result.unwrap_or_else(|e| {
        warn!(journal_id = %journal_id, table = %table, error = %e, "Step load failed, showing empty");
        failed.push(table);
        T::default()
    })
}
