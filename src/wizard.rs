//! Wizard controller over the five journal steps
//!
//! Tracks the active step, routes edits through the sync store's debounced
//! autosave and recomputes gating after every change. Moving forward with
//! [`Wizard::advance`] flushes pending edits first and does not consult the
//! lock state; activating a step directly refuses locked steps.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::generation::{self, GenerationRequest, Prefill, StepGenerator, StepPayload};
use crate::progress::OverallProgress;
use crate::steps::{self, ideation, FieldIssue};
use crate::sync::{JournalSync, StepWrite};
use crate::types::{BuyerPatch, CanvasPatch, Idea, MeansPatch, ProblemPatch, StepId, Trend};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WizardError {
    #[error("No journal selected")]
    NoJournalSelected,

    #[error("{0} is locked until the previous step is complete")]
    StepLocked(StepId),

    #[error("No idea at position {index} (journal has {len})")]
    IdeaOutOfRange { index: usize, len: usize },

    #[error("Step 1 data belongs to a team member; pick one")]
    MemberRequired,

    #[error("{0} is not a member of the journal's team")]
    UnknownMember(Uuid),
}

pub struct Wizard {
    sync: JournalSync,
    active: StepId,
}

impl Wizard {
    pub fn new(sync: JournalSync) -> Self {
        Self {
            sync,
            active: StepId::Means,
        }
    }

    pub fn active(&self) -> StepId {
        self.active
    }

    pub fn sync(&self) -> &JournalSync {
        &self.sync
    }

    /// Fresh gating for the cached data
    pub async fn gating(&self) -> OverallProgress {
        self.sync.overall().await
    }

    /// Field-level messages for a step; empty once it is complete
    pub async fn issues(&self, step: StepId) -> Vec<FieldIssue> {
        let data = self.sync.data().await;
        let ctx = self.sync.progress_context().await;
        steps::issues(step, &data, &ctx)
    }

    /// Flush pending edits and move to the next step, if there is one
    pub async fn advance(&mut self) -> Option<StepId> {
        self.flush().await;
        let next = self.active.next()?;
        debug!(from = self.active.number(), to = next.number(), "Advancing");
        self.active = next;
        Some(next)
    }

    /// Flush pending edits and move to the previous step, if there is one
    pub async fn back(&mut self) -> Option<StepId> {
        self.flush().await;
        let previous = self.active.previous()?;
        self.active = previous;
        Some(previous)
    }

    /// Jump to `step` unless the gating locks it
    pub async fn activate(&mut self, step: StepId) -> Result<OverallProgress, WizardError> {
        let gating = self.gating().await;
        if gating.is_locked(step) {
            return Err(WizardError::StepLocked(step));
        }
        self.flush().await;
        self.active = step;
        Ok(self.gating().await)
    }

    /// Recompute gating and write the derived summary back to the journal
    pub async fn sync_summary(&self) -> OverallProgress {
        let gating = self.gating().await;
        self.sync.write_back_summary(&gating).await;
        gating
    }

    async fn flush(&self) {
        if let Some(journal) = self.sync.current_journal().await {
            self.sync.flush_journal(journal.id).await;
        }
    }

    async fn journal_id(&self) -> Result<Uuid, WizardError> {
        self.sync
            .current_journal()
            .await
            .map(|j| j.id)
            .ok_or(WizardError::NoJournalSelected)
    }

    async fn edit(&self, write: StepWrite) -> Result<OverallProgress, WizardError> {
        let journal_id = self.journal_id().await?;
        self.sync.queue(journal_id, write).await;
        Ok(self.gating().await)
    }

    async fn check_member(&self, member_id: Uuid) -> Result<(), WizardError> {
        let snapshot = self.sync.snapshot().await;
        match snapshot.journal_team() {
            Some(team) if team.member(member_id).is_none() => {
                Err(WizardError::UnknownMember(member_id))
            }
            _ => Ok(()),
        }
    }

    // ─── Edits ───────────────────────────────────────────────────────────────

    pub async fn edit_means(
        &self,
        member_id: Uuid,
        patch: MeansPatch,
    ) -> Result<OverallProgress, WizardError> {
        self.check_member(member_id).await?;
        self.edit(StepWrite::Means { member_id, patch }).await
    }

    pub async fn edit_problem(&self, patch: ProblemPatch) -> Result<OverallProgress, WizardError> {
        self.edit(StepWrite::Problem(patch)).await
    }

    pub async fn edit_trends(&self, trends: Vec<Trend>) -> Result<OverallProgress, WizardError> {
        self.edit(StepWrite::Trends(trends)).await
    }

    pub async fn edit_ideas(&self, ideas: Vec<Idea>) -> Result<OverallProgress, WizardError> {
        self.edit(StepWrite::Ideas(ideas)).await
    }

    pub async fn edit_buyer(&self, patch: BuyerPatch) -> Result<OverallProgress, WizardError> {
        self.edit(StepWrite::Buyer(patch)).await
    }

    pub async fn edit_canvas(&self, patch: CanvasPatch) -> Result<OverallProgress, WizardError> {
        self.edit(StepWrite::Canvas(patch)).await
    }

    /// Select the idea at `index`, clearing every other selection; selecting
    /// it again clears it
    pub async fn toggle_idea(&self, index: usize) -> Result<OverallProgress, WizardError> {
        self.journal_id().await?;
        let mut ideas = self.sync.data().await.ideas;
        let len = ideas.len();
        ideation::toggle_selection(&mut ideas, index)
            .ok_or(WizardError::IdeaOutOfRange { index, len })?;
        self.edit(StepWrite::Ideas(ideas)).await
    }

    // ─── Generation ──────────────────────────────────────────────────────────

    /// Draft `step` with the generator (or the local dataset) and save it
    ///
    /// Step 1 drafts are written for `member`.
    pub async fn prefill(
        &self,
        generator: &dyn StepGenerator,
        step: StepId,
        prompt: &str,
        member: Option<Uuid>,
    ) -> Result<Prefill, WizardError> {
        let journal_id = self.journal_id().await?;
        self.resolve_member(step, member).await?;

        let context = serde_json::to_value(self.sync.data().await).unwrap_or(Value::Null);
        let request = GenerationRequest::new(step, prompt, context);
        let result = generation::prefill(generator, &request).await;

        self.apply_payload(result.payload.clone(), member).await?;
        info!(
            journal_id = %journal_id,
            step = step.number(),
            fallback = result.is_fallback(),
            "Prefilled step"
        );
        Ok(result)
    }

    /// Save a whole step payload immediately
    ///
    /// Pending edits of the journal are flushed first so the payload is the
    /// last write. Returns whether every write succeeded.
    pub async fn apply_payload(
        &self,
        payload: StepPayload,
        member: Option<Uuid>,
    ) -> Result<bool, WizardError> {
        let journal_id = self.journal_id().await?;
        let member = self.resolve_member(payload.step(), member).await?;

        self.sync.flush_journal(journal_id).await;
        let mut ok = true;
        for write in payload_writes(payload, member) {
            ok &= self.sync.save(journal_id, write).await;
        }
        Ok(ok)
    }

    /// Step 1 needs a roster member; other steps ignore `member`
    async fn resolve_member(
        &self,
        step: StepId,
        member: Option<Uuid>,
    ) -> Result<Option<Uuid>, WizardError> {
        match (step, member) {
            (StepId::Means, None) => Err(WizardError::MemberRequired),
            (StepId::Means, Some(id)) => {
                self.check_member(id).await?;
                Ok(Some(id))
            }
            _ => Ok(None),
        }
    }
}

/// Writes persisting a generated payload
fn payload_writes(payload: StepPayload, member: Option<Uuid>) -> Vec<StepWrite> {
    match payload {
        StepPayload::Means(patch) => member
            .map(|member_id| StepWrite::Means { member_id, patch })
            .into_iter()
            .collect(),
        StepPayload::Problem(problem) => vec![StepWrite::Problem(problem.into())],
        StepPayload::Trends(trends) => vec![StepWrite::Trends(trends)],
        StepPayload::Ideas(mut ideas) => {
            // Keep only the first selection
            let mut seen = false;
            for idea in &mut ideas {
                if seen {
                    idea.selected = false;
                }
                seen |= idea.selected;
            }
            vec![StepWrite::Ideas(ideas)]
        }
        StepPayload::ValueProposition { buyer, canvas } => vec![
            StepWrite::Buyer(buyer.into()),
            StepWrite::Canvas(canvas.into()),
        ],
    }
}
