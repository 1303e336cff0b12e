use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::StepId;

/// A member of a team's roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TeamMember {
    pub id: Uuid,
    pub name: String,
}

impl TeamMember {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// A team owns journals and provides the roster used to score step 1
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub members: Vec<TeamMember>,
    pub created_at: DateTime<Utc>,
}

impl Team {
    pub fn new<I, S>(name: impl Into<String>, member_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            members: member_names.into_iter().map(TeamMember::new).collect(),
            created_at: Utc::now(),
        }
    }

    /// Number of members expected to fill in step 1
    pub fn expected_members(&self) -> usize {
        self.members.len()
    }

    pub fn member(&self, member_id: Uuid) -> Option<&TeamMember> {
        self.members.iter().find(|m| m.id == member_id)
    }
}

/// Derived journal status, written back opportunistically
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JournalStatus {
    #[default]
    Draft,
    InProgress,
    Ready,
}

impl JournalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in_progress",
            Self::Ready => "ready",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "in_progress" => Some(Self::InProgress),
            "ready" => Some(Self::Ready),
            _ => None,
        }
    }
}

impl fmt::Display for JournalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// The top-level opportunity-analysis document
///
/// `status` and `progress` are derived by the aggregator; the stored values
/// are only a cache of the last write-back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Journal {
    pub id: Uuid,
    pub team_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub status: JournalStatus,
    #[serde(default)]
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Journal {
    pub fn new(team_id: Uuid, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            team_id,
            title: title.into(),
            status: JournalStatus::Draft,
            progress: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Append-only activity row; write-only from the core's point of view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub journal_id: Uuid,
    pub step: StepId,
    pub action: String,
    pub at: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(journal_id: Uuid, step: StepId, action: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            journal_id,
            step,
            action: action.into(),
            at: Utc::now(),
        }
    }
}
