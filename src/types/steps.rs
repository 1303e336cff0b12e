use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// One of the five fixed journal steps, in validation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    Means,
    Problem,
    Trends,
    Ideation,
    ValueProposition,
}

impl StepId {
    pub const ALL: [StepId; 5] = [
        StepId::Means,
        StepId::Problem,
        StepId::Trends,
        StepId::Ideation,
        StepId::ValueProposition,
    ];

    /// 1-based step number
    pub fn number(self) -> u8 {
        match self {
            StepId::Means => 1,
            StepId::Problem => 2,
            StepId::Trends => 3,
            StepId::Ideation => 4,
            StepId::ValueProposition => 5,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(StepId::Means),
            2 => Some(StepId::Problem),
            3 => Some(StepId::Trends),
            4 => Some(StepId::Ideation),
            5 => Some(StepId::ValueProposition),
            _ => None,
        }
    }

    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    pub fn previous(self) -> Option<Self> {
        Self::from_number(self.number().checked_sub(1)?)
    }

    /// Zero-based position in [`StepId::ALL`]
    pub fn index(self) -> usize {
        usize::from(self.number() - 1)
    }

    pub fn title(self) -> &'static str {
        match self {
            StepId::Means => "Means",
            StepId::Problem => "Problem",
            StepId::Trends => "Trends",
            StepId::Ideation => "Ideation",
            StepId::ValueProposition => "Buyer & Value Proposition",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step {} ({})", self.number(), self.title())
    }
}

// ─── Step 1: Means ────────────────────────────────────────────────────────────

/// What one team member brings to the venture
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MemberMeans {
    #[schemars(skip)]
    pub member_id: Uuid,
    /// Who I am: background, values, personality
    #[serde(default)]
    pub identity: String,
    /// What I know: studies, skills, experience
    #[serde(default)]
    pub knowledge: String,
    /// Whom I know: contacts and networks
    #[serde(default)]
    pub network: String,
    /// What I have: material and financial resources
    #[serde(default)]
    pub resources: String,
    #[serde(default)]
    #[schemars(skip)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl MemberMeans {
    pub fn new(member_id: Uuid) -> Self {
        Self {
            member_id,
            ..Default::default()
        }
    }

    /// A member counts as having contributed once any field is non-blank
    pub fn has_data(&self) -> bool {
        [&self.identity, &self.knowledge, &self.network, &self.resources]
            .iter()
            .any(|f| !f.trim().is_empty())
    }
}

/// Partial update for one member's means
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MeansPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<String>,
}

impl MeansPatch {
    pub fn apply(&self, target: &mut MemberMeans) {
        merge_field(&mut target.identity, &self.identity);
        merge_field(&mut target.knowledge, &self.knowledge);
        merge_field(&mut target.network, &self.network);
        merge_field(&mut target.resources, &self.resources);
    }

    /// Collapse two successive patches; fields set in `newer` win
    pub fn absorb(self, newer: Self) -> Self {
        Self {
            identity: newer.identity.or(self.identity),
            knowledge: newer.knowledge.or(self.knowledge),
            network: newer.network.or(self.network),
            resources: newer.resources.or(self.resources),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.identity.is_none()
            && self.knowledge.is_none()
            && self.network.is_none()
            && self.resources.is_none()
    }
}

// ─── Step 2: Problem ──────────────────────────────────────────────────────────

/// The problem statement; at most one per journal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Problem {
    #[serde(default)]
    pub title: String,
    /// What the problem is (at least 200 characters)
    #[serde(default)]
    pub description: String,
    /// Who is affected (at least 200 characters)
    #[serde(default)]
    pub affected: String,
    /// Why it matters (at least 200 characters)
    #[serde(default)]
    pub relevance: String,
    /// How it connects to the team's means (at least 200 characters)
    #[serde(default)]
    pub means_link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub means_link: Option<String>,
}

impl ProblemPatch {
    pub fn apply(&self, target: &mut Problem) {
        merge_field(&mut target.title, &self.title);
        merge_field(&mut target.description, &self.description);
        merge_field(&mut target.affected, &self.affected);
        merge_field(&mut target.relevance, &self.relevance);
        merge_field(&mut target.means_link, &self.means_link);
    }

    pub fn absorb(self, newer: Self) -> Self {
        Self {
            title: newer.title.or(self.title),
            description: newer.description.or(self.description),
            affected: newer.affected.or(self.affected),
            relevance: newer.relevance.or(self.relevance),
            means_link: newer.means_link.or(self.means_link),
        }
    }
}

impl From<Problem> for ProblemPatch {
    fn from(p: Problem) -> Self {
        Self {
            title: Some(p.title),
            description: Some(p.description),
            affected: Some(p.affected),
            relevance: Some(p.relevance),
            means_link: Some(p.means_link),
        }
    }
}

// ─── Step 3: Trends ───────────────────────────────────────────────────────────

/// Fixed trend categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum TrendKind {
    #[serde(rename = "Social")]
    Social,
    #[serde(rename = "Tecnológica")]
    Technological,
    #[serde(rename = "Ambiental")]
    Environmental,
    #[serde(rename = "Cultural")]
    Cultural,
    #[serde(rename = "Consumo")]
    Consumer,
}

impl TrendKind {
    pub fn label(&self) -> &'static str {
        match self {
            TrendKind::Social => "Social",
            TrendKind::Technological => "Tecnológica",
            TrendKind::Environmental => "Ambiental",
            TrendKind::Cultural => "Cultural",
            TrendKind::Consumer => "Consumo",
        }
    }

    pub fn all() -> &'static [TrendKind] {
        &[
            TrendKind::Social,
            TrendKind::Technological,
            TrendKind::Environmental,
            TrendKind::Cultural,
            TrendKind::Consumer,
        ]
    }
}

/// One observed trend; rows keep their id across saves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Trend {
    #[serde(default = "Uuid::new_v4")]
    #[schemars(skip)]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient")]
    #[schemars(with = "Option<TrendKind>")]
    pub kind: Option<TrendKind>,
    #[serde(default)]
    pub brief: String,
    #[serde(default)]
    pub example: String,
    /// Source citation
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl Trend {
    pub fn new(
        name: impl Into<String>,
        kind: TrendKind,
        brief: impl Into<String>,
        example: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind: Some(kind),
            brief: brief.into(),
            example: example.into(),
            source: None,
            comment: None,
        }
    }
}

// ─── Step 4: Ideation ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InnovationLevel {
    Incremental,
    Radical,
    Disruptive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Feasibility {
    Low,
    Medium,
    High,
}

/// A candidate business idea; exactly one should end up selected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Idea {
    #[serde(default = "Uuid::new_v4")]
    #[schemars(skip)]
    pub id: Uuid,
    #[serde(default)]
    pub description: String,
    /// Product, service, platform...
    #[serde(default)]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient")]
    #[schemars(with = "Option<InnovationLevel>")]
    pub innovation: Option<InnovationLevel>,
    #[serde(default, deserialize_with = "lenient")]
    #[schemars(with = "Option<Feasibility>")]
    pub feasibility: Option<Feasibility>,
    #[serde(default)]
    pub selected: bool,
    /// Why this idea was chosen (at least 200 characters when selected)
    #[serde(default)]
    pub justification: Option<String>,
}

impl Idea {
    pub fn new(
        description: impl Into<String>,
        kind: impl Into<String>,
        innovation: InnovationLevel,
        feasibility: Feasibility,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            kind: kind.into(),
            innovation: Some(innovation),
            feasibility: Some(feasibility),
            selected: false,
            justification: None,
        }
    }
}

// ─── Step 5: Buyer persona + value proposition canvas ────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BuyerPersona {
    #[serde(default)]
    pub name: String,
    /// Age in years, 1 to 120
    #[serde(default, deserialize_with = "lenient")]
    #[schemars(with = "Option<f64>")]
    pub age: Option<f64>,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub motivations: String,
    #[serde(default)]
    pub pains: String,
    #[serde(default)]
    pub needs: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuyerPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `Some(None)` clears a stored age, `None` leaves it unchanged
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub age: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivations: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs: Option<String>,
}

impl BuyerPatch {
    pub fn apply(&self, target: &mut BuyerPersona) {
        merge_field(&mut target.name, &self.name);
        if let Some(age) = self.age {
            target.age = age;
        }
        merge_field(&mut target.occupation, &self.occupation);
        merge_field(&mut target.motivations, &self.motivations);
        merge_field(&mut target.pains, &self.pains);
        merge_field(&mut target.needs, &self.needs);
    }

    pub fn absorb(self, newer: Self) -> Self {
        Self {
            name: newer.name.or(self.name),
            age: newer.age.or(self.age),
            occupation: newer.occupation.or(self.occupation),
            motivations: newer.motivations.or(self.motivations),
            pains: newer.pains.or(self.pains),
            needs: newer.needs.or(self.needs),
        }
    }
}

impl From<BuyerPersona> for BuyerPatch {
    fn from(b: BuyerPersona) -> Self {
        Self {
            name: Some(b.name),
            age: Some(b.age),
            occupation: Some(b.occupation),
            motivations: Some(b.motivations),
            pains: Some(b.pains),
            needs: Some(b.needs),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValueCanvas {
    #[serde(default)]
    pub customer_jobs: String,
    #[serde(default)]
    pub customer_pains: String,
    #[serde(default)]
    pub customer_gains: String,
    #[serde(default)]
    pub products_services: String,
    #[serde(default)]
    pub pain_relievers: String,
    #[serde(default)]
    pub gain_creators: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_jobs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_pains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_gains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products_services: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pain_relievers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain_creators: Option<String>,
}

impl CanvasPatch {
    pub fn apply(&self, target: &mut ValueCanvas) {
        merge_field(&mut target.customer_jobs, &self.customer_jobs);
        merge_field(&mut target.customer_pains, &self.customer_pains);
        merge_field(&mut target.customer_gains, &self.customer_gains);
        merge_field(&mut target.products_services, &self.products_services);
        merge_field(&mut target.pain_relievers, &self.pain_relievers);
        merge_field(&mut target.gain_creators, &self.gain_creators);
    }

    pub fn absorb(self, newer: Self) -> Self {
        Self {
            customer_jobs: newer.customer_jobs.or(self.customer_jobs),
            customer_pains: newer.customer_pains.or(self.customer_pains),
            customer_gains: newer.customer_gains.or(self.customer_gains),
            products_services: newer.products_services.or(self.products_services),
            pain_relievers: newer.pain_relievers.or(self.pain_relievers),
            gain_creators: newer.gain_creators.or(self.gain_creators),
        }
    }
}

impl From<ValueCanvas> for CanvasPatch {
    fn from(c: ValueCanvas) -> Self {
        Self {
            customer_jobs: Some(c.customer_jobs),
            customer_pains: Some(c.customer_pains),
            customer_gains: Some(c.customer_gains),
            products_services: Some(c.products_services),
            pain_relievers: Some(c.pain_relievers),
            gain_creators: Some(c.gain_creators),
        }
    }
}

// ─── Aggregate ────────────────────────────────────────────────────────────────

/// Everything cached for one journal: the five step datasets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JournalData {
    #[serde(default)]
    pub means: Vec<MemberMeans>,
    #[serde(default)]
    pub problem: Option<Problem>,
    #[serde(default)]
    pub trends: Vec<Trend>,
    #[serde(default)]
    pub ideas: Vec<Idea>,
    #[serde(default)]
    pub buyer: Option<BuyerPersona>,
    #[serde(default)]
    pub canvas: Option<ValueCanvas>,
}

impl JournalData {
    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
            && self.problem.is_none()
            && self.trends.is_empty()
            && self.ideas.is_empty()
            && self.buyer.is_none()
            && self.canvas.is_none()
    }

    pub fn means_for(&self, member_id: Uuid) -> Option<&MemberMeans> {
        self.means.iter().find(|m| m.member_id == member_id)
    }
}

/// Unknown enum labels or mistyped values read as absent instead of failing the row
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// A key that is present, even as `null`, is an explicit value
fn present<'de, D>(deserializer: D) -> Result<Option<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient(deserializer).map(Some)
}

fn merge_field(target: &mut String, value: &Option<String>) {
    if let Some(v) = value {
        target.clone_from(v);
    }
}
