//! Markdown export of a journal
//!
//! Read-only over the cached step data. Steps with no data render a
//! placeholder instead of failing.

use handlebars::Handlebars;
use serde_json::{json, Value};
use thiserror::Error;

use crate::progress::OverallProgress;
use crate::types::{Journal, JournalData, StepId, Team};

const TEMPLATE_NAME: &str = "journal";

pub const NOT_COMPLETED: &str = "_Not completed yet_";

const JOURNAL_TEMPLATE: &str = r"# {{journal.title}}

{{#if team}}Team: **{{team.name}}**{{#if members}} ({{#each members}}{{#unless @first}}, {{/unless}}{{this}}{{/each}}){{/if}}
{{/if}}Status: {{journal.status}} | Progress: {{total_progress}}%

{{#each steps}}- {{#if locked}}[locked] {{/if}}{{title}}: {{progress}}%{{#if completed}} (complete){{/if}}
{{/each}}
## 1. Means

{{#if means}}{{#each means}}### {{member}}

- **Who I am:** {{identity}}
- **What I know:** {{knowledge}}
- **Whom I know:** {{network}}
- **What I have:** {{resources}}

{{/each}}{{else}}{{placeholder}}

{{/if}}## 2. Problem

{{#if problem}}### {{problem.title}}

**Description.** {{problem.description}}

**Who is affected.** {{problem.affected}}

**Why it matters.** {{problem.relevance}}

**Link to our means.** {{problem.means_link}}

{{else}}{{placeholder}}

{{/if}}## 3. Trends

{{#if trends}}| Trend | Kind | Brief | Example | Source |
|---|---|---|---|---|
{{#each trends}}| {{name}} | {{kind}} | {{brief}} | {{example}} | {{source}} |
{{/each}}
{{else}}{{placeholder}}

{{/if}}## 4. Ideation

{{#if ideas}}{{#each ideas}}{{index_1}}{{#if selected}}**{{description}}** (selected){{else}}{{description}}{{/if}} - {{kind}}, {{innovation}} innovation, {{feasibility}} feasibility
{{/each}}
{{#if justification}}**Why this idea.** {{justification}}

{{/if}}{{else}}{{placeholder}}

{{/if}}## 5. Buyer & Value Proposition

{{#if buyer}}### Buyer persona: {{buyer.name}}

- **Age:** {{buyer.age}}
- **Occupation:** {{buyer.occupation}}
- **Motivations:** {{buyer.motivations}}
- **Pains:** {{buyer.pains}}
- **Needs:** {{buyer.needs}}

{{else}}{{placeholder}}

{{/if}}{{#if canvas}}### Value proposition canvas

| Customer | | Offer | |
|---|---|---|---|
| Jobs | {{canvas.customer_jobs}} | Products & services | {{canvas.products_services}} |
| Pains | {{canvas.customer_pains}} | Pain relievers | {{canvas.pain_relievers}} |
| Gains | {{canvas.customer_gains}} | Gain creators | {{canvas.gain_creators}} |
{{else}}{{placeholder}}
{{/if}}";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Export template is invalid: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[error("Failed to render export: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// Everything the export reads
pub struct ExportInput<'a> {
    pub team: Option<&'a Team>,
    pub journal: &'a Journal,
    pub data: &'a JournalData,
    pub overall: &'a OverallProgress,
}

/// Render the journal as a markdown document
pub fn render_markdown(input: &ExportInput<'_>) -> Result<String, ExportError> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(false);
    handlebars.register_template_string(TEMPLATE_NAME, JOURNAL_TEMPLATE)?;

    Ok(handlebars.render(TEMPLATE_NAME, &build_context(input))?)
}

fn build_context(input: &ExportInput<'_>) -> Value {
    let data = input.data;
    let member_name = |id| {
        input
            .team
            .and_then(|t| t.member(id))
            .map_or_else(|| "Team member".to_string(), |m| m.name.clone())
    };

    let means: Vec<Value> = data
        .means
        .iter()
        .filter(|m| m.has_data())
        .map(|m| {
            json!({
                "member": member_name(m.member_id),
                "identity": m.identity,
                "knowledge": m.knowledge,
                "network": m.network,
                "resources": m.resources,
            })
        })
        .collect();

    let trends: Vec<Value> = data
        .trends
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "kind": t.kind.map_or("-", |k| k.label()),
                "brief": t.brief,
                "example": t.example,
                "source": t.source.as_deref().unwrap_or("-"),
            })
        })
        .collect();

    let ideas: Vec<Value> = data
        .ideas
        .iter()
        .enumerate()
        .map(|(i, idea)| {
            json!({
                "index_1": format!("{}. ", i + 1),
                "description": idea.description,
                "kind": idea.kind,
                "innovation": idea.innovation.map_or("-".to_string(), |v| format!("{v:?}").to_lowercase()),
                "feasibility": idea.feasibility.map_or("-".to_string(), |v| format!("{v:?}").to_lowercase()),
                "selected": idea.selected,
            })
        })
        .collect();
    let justification = data
        .ideas
        .iter()
        .find(|i| i.selected)
        .and_then(|i| i.justification.clone())
        .filter(|j| !j.trim().is_empty());

    let problem = data
        .problem
        .as_ref()
        .filter(|p| !p.title.trim().is_empty() || !p.description.trim().is_empty());
    let buyer = data.buyer.as_ref().map(|b| {
        json!({
            "name": b.name,
            "age": b.age.map_or("-".to_string(), |a| format!("{a}")),
            "occupation": b.occupation,
            "motivations": b.motivations,
            "pains": b.pains,
            "needs": b.needs,
        })
    });

    let steps: Vec<Value> = StepId::ALL
        .iter()
        .map(|&step| {
            let s = input.overall.step(step);
            json!({
                "title": step.to_string(),
                "progress": s.progress,
                "completed": s.completed,
                "locked": s.locked,
            })
        })
        .collect();

    json!({
        "journal": {
            "title": input.journal.title,
            "status": input.journal.status.as_str(),
        },
        "team": input.team.map(|t| json!({ "name": t.name })),
        "members": input.team.map(|t| t.members.iter().map(|m| m.name.clone()).collect::<Vec<_>>()),
        "total_progress": input.overall.total_progress,
        "steps": steps,
        "means": means,
        "problem": problem,
        "trends": trends,
        "ideas": ideas,
        "justification": justification,
        "buyer": buyer,
        "canvas": data.canvas,
        "placeholder": NOT_COMPLETED,
    })
}
