//! Generation collaborator: drafts step data from a free-text prompt
//!
//! Generators return raw JSON; [`prefill`] shapes it into the target step
//! and substitutes a complete local dataset whenever generation is
//! unavailable, fails, or produces nothing usable.

mod anthropic;
mod error;
mod fallback;
mod prompt;

pub use anthropic::{extract_json, AnthropicGenerator};
pub use error::GenerationError;
pub use fallback::fallback;
pub use prompt::{schema_for_step, PromptBuilder, ValuePropositionDraft};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::types::{BuyerPersona, Idea, MeansPatch, Problem, StepId, Trend, ValueCanvas};

/// Input for one generation call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub step: StepId,
    /// Free-text request from the user; may be blank
    pub prompt: String,
    /// Step values entered so far
    pub context: Value,
}

impl GenerationRequest {
    pub fn new(step: StepId, prompt: impl Into<String>, context: Value) -> Self {
        Self {
            step,
            prompt: prompt.into(),
            context,
        }
    }
}

/// A service able to draft step data
#[async_trait]
pub trait StepGenerator: Send + Sync {
    /// Provider name used in logs and errors
    fn name(&self) -> &str;

    /// Whether credentials are available
    fn is_configured(&self) -> bool;

    /// Produce a JSON value shaped like the requested step
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, GenerationError>;
}

/// Generated data for one step
#[derive(Debug, Clone, PartialEq)]
pub enum StepPayload {
    Means(MeansPatch),
    Problem(Problem),
    Trends(Vec<Trend>),
    Ideas(Vec<Idea>),
    ValueProposition {
        buyer: BuyerPersona,
        canvas: ValueCanvas,
    },
}

impl StepPayload {
    pub fn step(&self) -> StepId {
        match self {
            StepPayload::Means(_) => StepId::Means,
            StepPayload::Problem(_) => StepId::Problem,
            StepPayload::Trends(_) => StepId::Trends,
            StepPayload::Ideas(_) => StepId::Ideation,
            StepPayload::ValueProposition { .. } => StepId::ValueProposition,
        }
    }

    /// True when nothing in the payload carries text
    pub fn is_empty(&self) -> bool {
        fn blank(s: &str) -> bool {
            s.trim().is_empty()
        }
        fn blank_opt(s: &Option<String>) -> bool {
            s.as_deref().is_none_or(blank)
        }

        match self {
            StepPayload::Means(p) => {
                blank_opt(&p.identity)
                    && blank_opt(&p.knowledge)
                    && blank_opt(&p.network)
                    && blank_opt(&p.resources)
            }
            StepPayload::Problem(p) => [
                &p.title,
                &p.description,
                &p.affected,
                &p.relevance,
                &p.means_link,
            ]
            .iter()
            .all(|s| blank(s)),
            StepPayload::Trends(t) => t.is_empty(),
            StepPayload::Ideas(i) => i.is_empty(),
            StepPayload::ValueProposition { buyer, canvas } => {
                *buyer == BuyerPersona::default() && *canvas == ValueCanvas::default()
            }
        }
    }

    /// Shape a generator reply into `step`'s data
    ///
    /// List steps accept a bare array or an object wrapping a single array
    /// (`{"trends": [...]}`).
    pub fn parse(step: StepId, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match step {
            StepId::Means => StepPayload::Means(serde_json::from_value(value)?),
            StepId::Problem => StepPayload::Problem(serde_json::from_value(value)?),
            StepId::Trends => StepPayload::Trends(parse_list(value)?),
            StepId::Ideation => StepPayload::Ideas(parse_list(value)?),
            StepId::ValueProposition => {
                let draft: ValuePropositionDraft = serde_json::from_value(value)?;
                StepPayload::ValueProposition {
                    buyer: draft.buyer,
                    canvas: draft.canvas,
                }
            }
        })
    }
}

fn parse_list<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, serde_json::Error> {
    let value = match value {
        Value::Object(map) => {
            let mut arrays = map.into_iter().filter(|(_, v)| v.is_array());
            match (arrays.next(), arrays.next()) {
                (Some((_, array)), None) => array,
                (first, _) => Value::Object(first.into_iter().collect()),
            }
        }
        other => other,
    };
    serde_json::from_value(value)
}

/// Outcome of [`prefill`]
#[derive(Debug, Clone, PartialEq)]
pub struct Prefill {
    pub payload: StepPayload,
    /// Why the local dataset was used instead of generated data
    pub fallback_reason: Option<GenerationError>,
}

impl Prefill {
    pub fn is_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }
}

/// Generate data for a step, falling back to the local dataset on any failure
pub async fn prefill(generator: &dyn StepGenerator, request: &GenerationRequest) -> Prefill {
    let step = request.step;
    let provider = generator.name().to_string();

    let attempt = async {
        if !generator.is_configured() {
            return Err(GenerationError::not_configured(&provider));
        }
        let value = generator.generate(request).await?;
        let payload = StepPayload::parse(step, value)
            .map_err(|e| GenerationError::invalid(&provider, e.to_string()))?;
        if payload.is_empty() {
            return Err(GenerationError::empty(&provider));
        }
        Ok(payload)
    };

    match attempt.await {
        Ok(payload) => {
            info!(step = step.number(), provider = %provider, "Generated step data");
            Prefill {
                payload,
                fallback_reason: None,
            }
        }
        Err(e) => {
            warn!(step = step.number(), error = %e, "Generation unavailable, using local dataset");
            Prefill {
                payload: fallback(step),
                fallback_reason: Some(e),
            }
        }
    }
}

/// Generator replying with a fixed value, or a fixed error
#[cfg(test)]
pub(crate) struct StaticGenerator {
    reply: Result<Value, GenerationError>,
    configured: bool,
}

#[cfg(test)]
impl StaticGenerator {
    pub fn replying(value: Value) -> Self {
        Self {
            reply: Ok(value),
            configured: true,
        }
    }

    pub fn failing(error: GenerationError) -> Self {
        Self {
            reply: Err(error),
            configured: true,
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            reply: Ok(Value::Null),
            configured: false,
        }
    }
}

#[cfg(test)]
#[async_trait]
impl StepGenerator for StaticGenerator {
    fn name(&self) -> &str {
        "static"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<Value, GenerationError> {
        self.reply.clone()
    }
}
