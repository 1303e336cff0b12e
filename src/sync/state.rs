use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::debounce::Collapse;
use crate::store::StepTable;
use crate::types::{
    BuyerPatch, CanvasPatch, Idea, Journal, JournalData, MeansPatch, MemberMeans, ProblemPatch,
    StepId, Team, Trend,
};

/// Client-side view of the current selection and its cached step data
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    pub teams: Vec<Team>,
    pub journals: Vec<Journal>,
    pub current_team: Option<Team>,
    pub current_journal: Option<Journal>,
    pub data: JournalData,
    pub loading: bool,
    pub saving: bool,
}

impl SyncState {
    pub fn current_journal_id(&self) -> Option<Uuid> {
        self.current_journal.as_ref().map(|j| j.id)
    }

    /// Team owning the current journal, from the selection or the team list
    pub fn journal_team(&self) -> Option<&Team> {
        let team_id = self.current_journal.as_ref()?.team_id;
        self.current_team
            .as_ref()
            .filter(|t| t.id == team_id)
            .or_else(|| self.teams.iter().find(|t| t.id == team_id))
    }
}

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    TeamsLoaded { count: usize },
    JournalsLoaded { team_id: Uuid, count: usize },
    Selection {
        team_id: Option<Uuid>,
        journal_id: Option<Uuid>,
    },
    /// Step data for the current journal was replaced; `failed` lists the
    /// tables that degraded to empty
    Reloaded {
        journal_id: Uuid,
        failed: Vec<StepTable>,
    },
    LoadFailed { what: String, error: String },
    LocalEdit { journal_id: Uuid, step: StepId },
    StepSaved { journal_id: Uuid, step: StepId },
    SaveFailed {
        journal_id: Uuid,
        step: StepId,
        error: String,
    },
    RemoteChange { journal_id: Uuid, table: StepTable },
}

/// Field group a debounced write belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteSlot {
    Means(Uuid),
    Problem,
    Trends,
    Ideas,
    Buyer,
    Canvas,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriteKey {
    pub journal_id: Uuid,
    pub slot: WriteSlot,
}

/// A pending change to one step table
#[derive(Debug, Clone, PartialEq)]
pub enum StepWrite {
    Means { member_id: Uuid, patch: MeansPatch },
    Problem(ProblemPatch),
    /// Full list, replaced wholesale
    Trends(Vec<Trend>),
    /// Full list, replaced wholesale
    Ideas(Vec<Idea>),
    Buyer(BuyerPatch),
    Canvas(CanvasPatch),
}

impl StepWrite {
    pub fn slot(&self) -> WriteSlot {
        match self {
            StepWrite::Means { member_id, .. } => WriteSlot::Means(*member_id),
            StepWrite::Problem(_) => WriteSlot::Problem,
            StepWrite::Trends(_) => WriteSlot::Trends,
            StepWrite::Ideas(_) => WriteSlot::Ideas,
            StepWrite::Buyer(_) => WriteSlot::Buyer,
            StepWrite::Canvas(_) => WriteSlot::Canvas,
        }
    }

    pub fn table(&self) -> StepTable {
        match self {
            StepWrite::Means { .. } => StepTable::Means,
            StepWrite::Problem(_) => StepTable::Problem,
            StepWrite::Trends(_) => StepTable::Trends,
            StepWrite::Ideas(_) => StepTable::Ideas,
            StepWrite::Buyer(_) => StepTable::Buyer,
            StepWrite::Canvas(_) => StepTable::Canvas,
        }
    }

    pub fn step(&self) -> StepId {
        self.table().step()
    }

    /// Merge this write into cached step data
    pub fn apply_local(&self, data: &mut JournalData) {
        match self {
            StepWrite::Means { member_id, patch } => {
                match data.means.iter_mut().find(|m| m.member_id == *member_id) {
                    Some(row) => patch.apply(row),
                    None => {
                        let mut row = MemberMeans::new(*member_id);
                        patch.apply(&mut row);
                        if row.has_data() {
                            row.updated_at = Some(Utc::now());
                            data.means.push(row);
                        }
                    }
                }
            }
            StepWrite::Problem(patch) => patch.apply(data.problem.get_or_insert_with(Default::default)),
            StepWrite::Trends(trends) => data.trends.clone_from(trends),
            StepWrite::Ideas(ideas) => data.ideas.clone_from(ideas),
            StepWrite::Buyer(patch) => patch.apply(data.buyer.get_or_insert_with(Default::default)),
            StepWrite::Canvas(patch) => patch.apply(data.canvas.get_or_insert_with(Default::default)),
        }
    }
}

impl Collapse for StepWrite {
    fn collapse(self, newer: Self) -> Self {
        match (self, newer) {
            (
                StepWrite::Means { member_id, patch },
                StepWrite::Means {
                    member_id: newer_id,
                    patch: newer_patch,
                },
            ) if member_id == newer_id => StepWrite::Means {
                member_id,
                patch: patch.absorb(newer_patch),
            },
            (StepWrite::Problem(a), StepWrite::Problem(b)) => StepWrite::Problem(a.absorb(b)),
            (StepWrite::Buyer(a), StepWrite::Buyer(b)) => StepWrite::Buyer(a.absorb(b)),
            (StepWrite::Canvas(a), StepWrite::Canvas(b)) => StepWrite::Canvas(a.absorb(b)),
            // Lists are replaced wholesale, so the newest list wins
            (_, newer) => newer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Problem, TrendKind};

    #[test]
    fn test_problem_patches_collapse_field_by_field() {
        let first = StepWrite::Problem(ProblemPatch {
            title: Some("Agua".to_string()),
            ..Default::default()
        });
        let second = StepWrite::Problem(ProblemPatch {
            description: Some("Falta de agua".to_string()),
            ..Default::default()
        });
        let merged = first.collapse(second);

        let mut data = JournalData::default();
        merged.apply_local(&mut data);
        assert_eq!(
            data.problem,
            Some(Problem {
                title: "Agua".to_string(),
                description: "Falta de agua".to_string(),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_list_writes_keep_newest() {
        let old = StepWrite::Trends(vec![]);
        let trend = Trend::new("IA", TrendKind::Technological, "Modelos", "Chatbots");
        let new = StepWrite::Trends(vec![trend.clone()]);
        assert_eq!(old.collapse(new), StepWrite::Trends(vec![trend]));
    }

    #[test]
    fn test_blank_means_patch_creates_no_row() {
        let mut data = JournalData::default();
        StepWrite::Means {
            member_id: Uuid::new_v4(),
            patch: MeansPatch {
                identity: Some("   ".to_string()),
                ..Default::default()
            },
        }
        .apply_local(&mut data);
        assert!(data.means.is_empty());
    }

    #[test]
    fn test_journal_team_falls_back_to_team_list() {
        let team = Team::new("Equipo", ["Ana"]);
        let journal = Journal::new(team.id, "Diario");
        let state = SyncState {
            teams: vec![team.clone()],
            current_journal: Some(journal),
            ..Default::default()
        };
        assert_eq!(state.journal_team().map(|t| t.id), Some(team.id));
    }
}
