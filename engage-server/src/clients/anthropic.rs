use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{ensure_success, ClientError, ClientResult};
use super::CommentGenerator;
use crate::config::Generation;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Used when no prompt file is configured
const DEFAULT_INSTRUCTIONS: &str = "Write one short, specific LinkedIn comment (1-3 sentences) \
responding to the post above. Reference a concrete detail from the post, stay warm and \
professional, no hashtags, no emojis, no sales pitch. Reply with the comment text only.";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<WireMessage>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Drafts comments through the Anthropic Messages API
pub struct AnthropicGenerator {
    http: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    instructions: String,
    base_url: String,
}

impl AnthropicGenerator {
    pub fn new(settings: &Generation, prompt: Option<String>) -> ClientResult<Self> {
        let http = Client::builder().timeout(settings.timeout()).build()?;
        Ok(Self {
            http,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            instructions: prompt
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
            base_url: ANTHROPIC_API_URL.to_string(),
        })
    }
}

/// The user message: author, quoted post text, then the instructions
pub fn compose_message(author: &str, post_text: &str, instructions: &str) -> String {
    format!(
        "AUTHOR: {}\n\nPOST TEXT:\n\"\"\"\n{}\n\"\"\"\n\n---\n{}",
        author,
        post_text.trim(),
        instructions.trim()
    )
}

#[async_trait]
impl CommentGenerator for AnthropicGenerator {
    async fn generate(&self, author: &str, post_text: &str) -> ClientResult<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![WireMessage {
                role: "user",
                content: compose_message(author, post_text, &self.instructions),
            }],
        };

        debug!(model = %self.model, author = %author, "Requesting comment draft");

        let response = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;
        let body: MessagesResponse = ensure_success(response).await?.json().await?;

        let text = body
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::Text { text } => Some(text.trim().to_string()),
                ContentBlock::Other => None,
            })
            .filter(|text| !text.is_empty());

        text.ok_or_else(|| ClientError::Rejected {
            service: "anthropic",
            reason: "response contained no text".to_string(),
        })
    }
}

/// Deterministic drafts for dry runs and local testing
#[derive(Debug, Clone, Copy, Default)]
pub struct StubGenerator;

#[async_trait]
impl CommentGenerator for StubGenerator {
    async fn generate(&self, author: &str, _post_text: &str) -> ClientResult<String> {
        Ok(format!("TEST comment for {}", author))
    }
}
