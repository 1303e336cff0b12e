//! Overall progress aggregation and step gating.
//!
//! Steps are scored in order in a single pass. Step `n` is locked iff step
//! `n - 1` is not completed; step 1 is never locked. The total is the
//! rounded mean of the five step scores regardless of locking.

use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

use crate::steps::{self, ProgressContext, StepScore};
use crate::types::{JournalData, JournalStatus, StepId};

/// Gating entry for one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepProgress {
    /// 1-based step number
    pub step: u8,
    pub completed: bool,
    pub progress: u8,
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverallProgress {
    pub total_progress: u8,
    pub steps: [StepProgress; 5],
}

impl OverallProgress {
    pub fn step(&self, step: StepId) -> &StepProgress {
        &self.steps[step.index()]
    }

    pub fn is_locked(&self, step: StepId) -> bool {
        self.step(step).locked
    }

    pub fn all_completed(&self) -> bool {
        self.steps.iter().all(|s| s.completed)
    }
}

impl JournalStatus {
    /// Status implied by an aggregate: draft until anything scores, ready
    /// once every step is complete
    pub fn derive(overall: &OverallProgress) -> Self {
        if overall.all_completed() {
            JournalStatus::Ready
        } else if overall.total_progress == 0 {
            JournalStatus::Draft
        } else {
            JournalStatus::InProgress
        }
    }
}

/// Aggregate the five step validators into the gating structure
pub fn compute_overall(data: &JournalData, ctx: &ProgressContext) -> OverallProgress {
    compute_overall_with(data, ctx, steps::score)
}

/// Aggregate with a custom per-step scorer
///
/// A scorer that panics or returns an out-of-range score degrades that step
/// to `{completed: false, progress: 0}`; the other steps are unaffected.
pub fn compute_overall_with<F>(data: &JournalData, ctx: &ProgressContext, scorer: F) -> OverallProgress
where
    F: Fn(StepId, &JournalData, &ProgressContext) -> StepScore,
{
    let mut entries = [StepProgress {
        step: 0,
        completed: false,
        progress: 0,
        locked: false,
    }; 5];

    let mut previous_completed = true;
    for step in StepId::ALL {
        let score = safe_score(&scorer, step, data, ctx);
        entries[step.index()] = StepProgress {
            step: step.number(),
            completed: score.completed,
            progress: score.progress,
            locked: !previous_completed,
        };
        previous_completed = score.completed;
    }

    let sum: usize = entries.iter().map(|e| usize::from(e.progress)).sum();
    // round(sum / 5), halves up
    let total_progress = ((2 * sum + 5) / 10) as u8;

    OverallProgress {
        total_progress,
        steps: entries,
    }
}

fn safe_score<F>(scorer: &F, step: StepId, data: &JournalData, ctx: &ProgressContext) -> StepScore
where
    F: Fn(StepId, &JournalData, &ProgressContext) -> StepScore,
{
    match catch_unwind(AssertUnwindSafe(|| scorer(step, data, ctx))) {
        Ok(score) if score.progress > 100 || (score.completed && score.progress != 100) => {
            warn!(
                step = step.number(),
                progress = score.progress,
                completed = score.completed,
                "Discarding malformed step score"
            );
            StepScore::default()
        }
        Ok(score) => score,
        Err(_) => {
            warn!(step = step.number(), "Step scorer panicked, defaulting to zero");
            StepScore::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::fixtures::{complete_data, text};

    fn ctx() -> ProgressContext {
        ProgressContext::new(2)
    }

    #[test]
    fn test_complete_journal_is_fully_unlocked() {
        let overall = compute_overall(&complete_data(), &ctx());
        assert_eq!(overall.total_progress, 100);
        for (i, s) in overall.steps.iter().enumerate() {
            assert_eq!(usize::from(s.step), i + 1);
            assert!(s.completed);
            assert_eq!(s.progress, 100);
            assert!(!s.locked);
        }
        assert_eq!(JournalStatus::derive(&overall), JournalStatus::Ready);
    }

    #[test]
    fn test_short_affected_field_locks_step_three() {
        let mut data = complete_data();
        if let Some(p) = data.problem.as_mut() {
            p.affected = text(199);
        }
        let overall = compute_overall(&data, &ctx());

        let problem = overall.step(StepId::Problem);
        assert!(!problem.completed);
        assert_eq!(problem.progress, 80);
        assert!(overall.is_locked(StepId::Trends));
        // Later steps are still complete; only step 3's lock depends on step 2
        assert!(!overall.is_locked(StepId::Ideation));
        assert_eq!(overall.total_progress, 96);
        assert_eq!(JournalStatus::derive(&overall), JournalStatus::InProgress);
    }

    #[test]
    fn test_empty_journal_locks_everything_after_step_one() {
        let overall = compute_overall(&JournalData::default(), &ctx());
        assert!(!overall.steps[0].locked);
        assert!(overall.steps[1..].iter().all(|s| s.locked));
        assert_eq!(overall.total_progress, 0);
        assert_eq!(JournalStatus::derive(&overall), JournalStatus::Draft);
    }

    #[test]
    fn test_gating_follows_previous_step_only() {
        let mut data = complete_data();
        data.means.clear();
        let overall = compute_overall(&data, &ctx());
        for i in 1..5 {
            if !overall.steps[i - 1].completed {
                assert!(overall.steps[i].locked);
            }
        }
        assert!(overall.is_locked(StepId::Problem));
        assert!(!overall.is_locked(StepId::Trends));
        assert_eq!(overall.total_progress, 80);
    }

    #[test]
    fn test_compute_is_idempotent() {
        let data = complete_data();
        assert_eq!(compute_overall(&data, &ctx()), compute_overall(&data, &ctx()));
    }

    #[test]
    fn test_total_rounds_half_up() {
        let overall = compute_overall_with(&JournalData::default(), &ctx(), |step, _, _| {
            StepScore {
                completed: false,
                progress: if step == StepId::Means { 2 } else { 0 },
            }
        });
        // 2 / 5 = 0.4
        assert_eq!(overall.total_progress, 0);

        let overall = compute_overall_with(&JournalData::default(), &ctx(), |step, _, _| {
            StepScore {
                completed: false,
                progress: if step == StepId::Means { 3 } else { 0 },
            }
        });
        // 3 / 5 = 0.6
        assert_eq!(overall.total_progress, 1);
    }

    #[test]
    fn test_panicking_scorer_degrades_only_that_step() {
        let data = complete_data();
        let overall = compute_overall_with(&data, &ctx(), |step, data, ctx| {
            assert!(step != StepId::Trends, "scorer failure");
            steps::score(step, data, ctx)
        });
        let trends = overall.step(StepId::Trends);
        assert!(!trends.completed);
        assert_eq!(trends.progress, 0);
        assert!(overall.is_locked(StepId::Ideation));
        assert_eq!(overall.step(StepId::ValueProposition).progress, 100);
        assert_eq!(overall.total_progress, 80);
    }

    #[test]
    fn test_malformed_scores_are_replaced() {
        let overall = compute_overall_with(&JournalData::default(), &ctx(), |step, _, _| {
            match step {
                StepId::Means => StepScore {
                    completed: false,
                    progress: 250,
                },
                StepId::Problem => StepScore {
                    completed: true,
                    progress: 40,
                },
                _ => StepScore::default(),
            }
        });
        assert_eq!(overall.steps[0].progress, 0);
        assert!(!overall.steps[1].completed);
        assert_eq!(overall.steps[1].progress, 0);
    }
}
