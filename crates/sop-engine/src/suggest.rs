//! AI-drafted SOP content
//!
//! [`CompletionClient`] talks to an OpenAI-compatible chat-completions
//! endpoint (Perplexity by default). The credential is only ever read from
//! the environment and is redacted from `Debug` output.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const API_KEY_VAR: &str = "PERPLEXITY_API_KEY";
pub const BASE_URL_VAR: &str = "SOP_COMPLETION_BASE_URL";
pub const MODEL_VAR: &str = "SOP_COMPLETION_MODEL";

pub const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";
pub const DEFAULT_MODEL: &str = "sonar-reasoning-pro";

/// Instructions sent ahead of every request
pub const SYSTEM_PROMPT: &str = "\
Create a clear and simple Standard Operating Procedure (SOP)

Each SOP should have the following sections:

1. Procedures
   - Brief overview, then numbered steps.

2. Definitions (optional)
   - Explain unclear terms or acronyms.

Note: These will be US Air Force specific SOPs. Be sure to search for all relevant information from the Air Force from AFIs and DAFMANs.

- Search the user provided title and actions and provide the most accurate and up to date information based on their starting point, if given.
- Return only the SOP content, no other text.
- Relentlessly optimize for clarity and simplicity.
- Format: Plain text, no citations, no markdown.
- Do not include information that can become outdated.
";

lazy_static! {
    static ref REASONING_BLOCK: Regex = Regex::new(r"(?s)<think>.*?</think>").unwrap();
}

/// Errors from the completion service
#[derive(Error, Debug)]
pub enum SuggestError {
    #[error("Completion service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed completion response: {0}")]
    Malformed(String),

    #[error("Completion request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Missing or unusable service configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("PERPLEXITY_API_KEY is not set")]
    MissingApiKey,
}

/// Anything that can draft SOP actions from a title
#[async_trait]
pub trait SuggestionService: Send + Sync {
    async fn suggest(&self, title: &str, actions: &str) -> Result<String, SuggestError>;
}

/// Endpoint, model and credential for [`CompletionClient`]
#[derive(Clone)]
pub struct SuggestConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl std::fmt::Debug for SuggestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuggestConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl SuggestConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Read `PERPLEXITY_API_KEY` plus the optional endpoint/model overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_blank = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = non_blank(API_KEY_VAR).ok_or(ConfigError::MissingApiKey)?;
        Ok(Self {
            api_key,
            base_url: non_blank(BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: non_blank(MODEL_VAR).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: String,
}

/// reqwest client for an OpenAI-compatible `/chat/completions` endpoint
pub struct CompletionClient {
    config: SuggestConfig,
    client: reqwest::Client,
}

impl CompletionClient {
    pub fn new(config: SuggestConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        SuggestConfig::from_env().map(Self::new)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn build_request(&self, title: &str, actions: &str) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: build_messages(title, actions),
        }
    }
}

#[async_trait]
impl SuggestionService for CompletionClient {
    async fn suggest(&self, title: &str, actions: &str) -> Result<String, SuggestError> {
        let url = self.config.completions_url();
        debug!("Requesting SOP suggestion from {} ({})", url, self.config.model);

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&self.build_request(title, actions))
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            warn!("Completion service returned {}", status);
            return Err(SuggestError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_completion(&body)
    }
}

fn build_messages(title: &str, actions: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: "system",
            content: SYSTEM_PROMPT.to_string(),
        },
        ChatMessage {
            role: "user",
            content: format!(
                "User has provided the following title and actions as a starting point for the SOP: {} - {}",
                title, actions
            ),
        },
    ]
}

/// Pull the first choice out of a completions response body
fn parse_completion(body: &str) -> Result<String, SuggestError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| SuggestError::Malformed(e.to_string()))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| SuggestError::Malformed("response has no choices".to_string()))?;
    Ok(strip_reasoning(&choice.message.content))
}

/// Remove every `<think>...</think>` block and trim what is left
pub fn strip_reasoning(text: &str) -> String {
    REASONING_BLOCK.replace_all(text, "").trim().to_string()
}
