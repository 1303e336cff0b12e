//! Domain types for venture-journal.
//!
//! Teams own journals, journals own the five step datasets. These types are
//! shared by the validators, the sync store and every collaborator adapter,
//! and derive `JsonSchema` so the generation prompt can describe their shape.

mod journal;
mod steps;

pub use journal::{ActivityEntry, Journal, JournalStatus, Team, TeamMember};
pub use steps::{
    BuyerPatch, BuyerPersona, CanvasPatch, Feasibility, Idea, InnovationLevel, JournalData,
    MeansPatch, MemberMeans, Problem, ProblemPatch, StepId, Trend, TrendKind, ValueCanvas,
};
