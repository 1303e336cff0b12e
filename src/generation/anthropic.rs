//! Anthropic Messages API step generator

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::prompt::PromptBuilder;
use super::{GenerationError, GenerationRequest, StepGenerator};
use crate::config::GenerationConfig;
use crate::env_vars;

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_API_VERSION: &str = "2023-06-01";
const PROVIDER_NAME: &str = "anthropic";

const SYSTEM_PROMPT: &str =
    "You draft content for a guided business-opportunity journal. Answer with JSON only.";

pub struct AnthropicGenerator {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    max_retries: usize,
    prompts: PromptBuilder,
}

#[derive(Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl AnthropicGenerator {
    pub fn new(api_key: impl Into<String>, config: &GenerationConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("venture-journal/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::network(PROVIDER_NAME, e.to_string()))?;

        Ok(Self {
            api_key: api_key.into(),
            client,
            base_url: ANTHROPIC_API_BASE.to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            prompts: PromptBuilder::new(),
        })
    }

    /// Build from the API key environment variable; unconfigured when it is
    /// missing or generation is disabled
    pub fn from_env(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let key = if config.enabled {
            env::var(env_vars::ANTHROPIC_API_KEY).unwrap_or_default()
        } else {
            String::new()
        };
        Self::new(key, config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn retry_strategy(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(10))
            .with_max_times(self.max_retries)
    }

    async fn send_once(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = MessageRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: SYSTEM_PROMPT,
            messages: vec![Message {
                role: "user",
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::network(PROVIDER_NAME, e.to_string()))?;

        let status = response.status().as_u16();
        match status {
            200..=299 => {}
            401 | 403 => {
                return Err(GenerationError::Unauthorized {
                    provider: PROVIDER_NAME.to_string(),
                    status,
                })
            }
            429 => {
                let retry_after_secs = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse().ok());
                return Err(GenerationError::RateLimited {
                    provider: PROVIDER_NAME.to_string(),
                    retry_after_secs,
                });
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(GenerationError::http(PROVIDER_NAME, status, body));
            }
        }

        let reply: MessageResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::invalid(PROVIDER_NAME, e.to_string()))?;
        Ok(reply
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[async_trait]
impl StepGenerator for AnthropicGenerator {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    #[instrument(skip(self, request), fields(step = request.step.number()))]
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        if !self.is_configured() {
            return Err(GenerationError::not_configured(PROVIDER_NAME));
        }
        let prompt = self.prompts.render(request)?;

        let op = || async { self.send_once(&prompt).await };
        let text = op
            .retry(self.retry_strategy())
            .when(GenerationError::is_transient)
            .notify(|err, dur| {
                warn!("Retrying generation after {:?}: {}", dur, err);
            })
            .await?;

        debug!(chars = text.len(), "Received generation reply");
        extract_json(&text).ok_or_else(|| {
            GenerationError::invalid(PROVIDER_NAME, "reply contained no JSON value")
        })
    }
}

/// Pull the first JSON object or array out of a model reply
///
/// Accepts bare JSON, fenced code blocks and JSON surrounded by prose.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let start = trimmed.find(['{', '['])?;
    let candidate = &trimmed[start..];
    let mut stream = serde_json::Deserializer::from_str(candidate).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) => Some(value),
        _ => None,
    }
}
