//! Handlebars prompt rendering for step generation

use handlebars::Handlebars;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{GenerationError, GenerationRequest};
use crate::types::{BuyerPersona, Idea, MeansPatch, Problem, StepId, Trend, ValueCanvas};

/// Shape requested for step 5: both singleton rows at once
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValuePropositionDraft {
    #[serde(default)]
    pub buyer: BuyerPersona,
    #[serde(default)]
    pub canvas: ValueCanvas,
}

const PROMPT_TEMPLATE: &str = r#"You are helping an entrepreneurship team fill in their opportunity journal.

Current step: {{step_title}} (step {{step_number}} of 5)
{{step_guidance}}

Team request:
{{#if prompt}}{{prompt}}{{else}}Suggest a sensible first draft for this step.{{/if}}

What the team has written so far, as JSON:
{{context}}

Reply with a single JSON value and nothing else. It must match this JSON schema:
{{schema}}
"#;

fn guidance(step: StepId) -> &'static str {
    match step {
        StepId::Means => {
            "Describe one team member's means: who they are, what they know, whom they know and what they have."
        }
        StepId::Problem => {
            "State the problem with a short title. Description, affected population, relevance and the link to the team's means need at least 200 characters each."
        }
        StepId::Trends => {
            "List at least 3 trends. Each needs a name, a kind (Social, Tecnológica, Ambiental, Cultural or Consumo), a brief and a concrete example."
        }
        StepId::Ideation => {
            "List at least 5 business ideas with kind, innovation level and feasibility. Select exactly one and justify the choice in at least 200 characters."
        }
        StepId::ValueProposition => {
            "Describe the buyer persona (age between 1 and 120) and complete all six fields of the value proposition canvas."
        }
    }
}

/// JSON schema of the value a generator must return for `step`
pub fn schema_for_step(step: StepId) -> Value {
    let schema = match step {
        StepId::Means => schema_for!(MeansPatch),
        StepId::Problem => schema_for!(Problem),
        StepId::Trends => schema_for!(Vec<Trend>),
        StepId::Ideation => schema_for!(Vec<Idea>),
        StepId::ValueProposition => schema_for!(ValuePropositionDraft),
    };
    serde_json::to_value(schema).unwrap_or(Value::Null)
}

pub struct PromptBuilder {
    handlebars: Handlebars<'static>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        // Prompts are plain text
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.set_strict_mode(false);
        Self { handlebars }
    }

    pub fn render(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let pretty = |v: &Value| serde_json::to_string_pretty(v).unwrap_or_default();
        let context = json!({
            "step_title": request.step.title(),
            "step_number": request.step.number(),
            "step_guidance": guidance(request.step),
            "prompt": request.prompt.trim(),
            "context": pretty(&request.context),
            "schema": pretty(&schema_for_step(request.step)),
        });
        self.handlebars
            .render_template(PROMPT_TEMPLATE, &context)
            .map_err(|e| GenerationError::invalid("prompt", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(step: StepId, prompt: &str) -> GenerationRequest {
        GenerationRequest {
            step,
            prompt: prompt.to_string(),
            context: json!({"problem": {"title": "Agua & saneamiento"}}),
        }
    }

    #[test]
    fn test_prompt_is_not_html_escaped() {
        let rendered = PromptBuilder::new()
            .render(&request(StepId::Problem, "Zonas rurales <Andes>"))
            .unwrap();
        assert!(rendered.contains("Zonas rurales <Andes>"));
        assert!(rendered.contains("Agua & saneamiento"));
        assert!(rendered.contains("step 2 of 5"));
    }

    #[test]
    fn test_blank_prompt_uses_default_request() {
        let rendered = PromptBuilder::new()
            .render(&request(StepId::Trends, "   "))
            .unwrap();
        assert!(rendered.contains("Suggest a sensible first draft"));
    }

    #[test]
    fn test_schema_describes_step_fields() {
        let schema = schema_for_step(StepId::Problem).to_string();
        for field in ["title", "description", "affected", "relevance", "means_link"] {
            assert!(schema.contains(field), "{field}");
        }

        let schema = schema_for_step(StepId::ValueProposition).to_string();
        assert!(schema.contains("buyer"));
        assert!(schema.contains("gain_creators"));

        // Row ids are assigned locally, never requested
        let schema = schema_for_step(StepId::Trends).to_string();
        assert!(!schema.contains("\"id\""));
    }
}
