//! Step validators.
//!
//! Each submodule exposes pure functions over a (possibly partial) step
//! dataset:
//! - `is_complete` - structural validity plus every count/length minimum
//! - `progress` - partial credit in `0..=100`, reaching 100 whenever complete
//! - `issues` - field-level messages explaining what is still missing
//!
//! None of them fail: absent or malformed input scores as incomplete.

pub mod ideation;
pub mod means;
pub mod problem;
pub mod trends;
pub mod value;

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::types::{JournalData, StepId, Team};

/// Minimum trimmed length for long-form answers
pub const MIN_LONG_TEXT: usize = 200;

/// External inputs the validators cannot derive from step data alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressContext {
    /// Roster size of the journal's team
    pub expected_members: usize,
    /// Member ids on the roster; empty when only the size is known
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roster: Vec<Uuid>,
}

impl ProgressContext {
    pub fn new(expected_members: usize) -> Self {
        Self {
            expected_members,
            roster: Vec::new(),
        }
    }

    pub fn for_team(team: Option<&Team>) -> Self {
        team.map_or_else(Self::default, |t| Self {
            expected_members: t.expected_members(),
            roster: t.members.iter().map(|m| m.id).collect(),
        })
    }

    /// Whether a member's rows count toward step 1
    pub fn on_roster(&self, member_id: Uuid) -> bool {
        self.roster.is_empty() || self.roster.contains(&member_id)
    }
}

/// A validation message attached to one field (or row) of a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub(crate) fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn required(field: impl Into<String>) -> Self {
        Self::new(field, "is required")
    }

    pub(crate) fn too_short(field: impl Into<String>, actual: usize) -> Self {
        Self::new(
            field,
            format!("must be at least {MIN_LONG_TEXT} characters (currently {actual})"),
        )
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

/// Result of scoring one step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StepScore {
    pub completed: bool,
    pub progress: u8,
}

/// Score a single step from the journal's cached data
pub fn score(step: StepId, data: &JournalData, ctx: &ProgressContext) -> StepScore {
    match step {
        StepId::Means => StepScore {
            completed: means::is_complete(&data.means, ctx),
            progress: means::progress(&data.means, ctx),
        },
        StepId::Problem => StepScore {
            completed: problem::is_complete(data.problem.as_ref()),
            progress: problem::progress(data.problem.as_ref()),
        },
        StepId::Trends => StepScore {
            completed: trends::is_complete(&data.trends),
            progress: trends::progress(&data.trends),
        },
        StepId::Ideation => StepScore {
            completed: ideation::is_complete(&data.ideas),
            progress: ideation::progress(&data.ideas),
        },
        StepId::ValueProposition => StepScore {
            completed: value::is_complete(data.buyer.as_ref(), data.canvas.as_ref()),
            progress: value::progress(data.buyer.as_ref(), data.canvas.as_ref()),
        },
    }
}

/// Field-level messages for a step; empty iff the step is complete
pub fn issues(step: StepId, data: &JournalData, ctx: &ProgressContext) -> Vec<FieldIssue> {
    match step {
        StepId::Means => means::issues(&data.means, ctx),
        StepId::Problem => problem::issues(data.problem.as_ref()),
        StepId::Trends => trends::issues(&data.trends),
        StepId::Ideation => ideation::issues(&data.ideas),
        StepId::ValueProposition => value::issues(data.buyer.as_ref(), data.canvas.as_ref()),
    }
}

pub(crate) fn is_filled(s: &str) -> bool {
    !s.trim().is_empty()
}

/// Character count after trimming surrounding whitespace
pub(crate) fn trimmed_len(s: &str) -> usize {
    s.trim().chars().count()
}

pub(crate) fn is_long_enough(s: &str) -> bool {
    trimmed_len(s) >= MIN_LONG_TEXT
}

/// `round(points * part / whole)` with halves rounded up; 0 when `whole` is 0
pub(crate) fn scaled(points: usize, part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    let part = part.min(whole);
    let value = (2 * points * part + whole) / (2 * whole);
    value.min(100) as u8
}

pub(crate) fn percent(part: usize, whole: usize) -> u8 {
    scaled(100, part, whole)
}
