//! External collaborators behind traits, with their HTTP implementations.

pub mod anthropic;
pub mod error;
pub mod slack;
pub mod unipile;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use engage_types::{GenerationProvider, MessageRef, PendingReview};

use crate::config::Generation;

pub use anthropic::{AnthropicGenerator, StubGenerator};
pub use error::{ClientError, ClientResult};
pub use slack::SlackClient;
pub use unipile::UnipileClient;

/// One page of people from a saved search
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub items: Vec<Value>,
    pub cursor: Option<String>,
}

/// People search, identifier lookup and post listing
#[async_trait]
pub trait LeadSource: Send + Sync {
    async fn search_page(&self, search_url: &str, cursor: Option<&str>) -> ClientResult<SearchPage>;

    /// Convert a lead reference into a posts-queryable identifier
    async fn resolve_lead(&self, lead_id: &str) -> ClientResult<Option<String>>;

    /// One page of a person's posts, raw
    async fn list_posts(&self, identifier: &str, limit: u32) -> ClientResult<Vec<Value>>;
}

#[async_trait]
pub trait CommentPublisher: Send + Sync {
    async fn publish_comment(&self, social_id: &str, text: &str) -> ClientResult<()>;
}

#[async_trait]
pub trait CommentGenerator: Send + Sync {
    async fn generate(&self, author: &str, post_text: &str) -> ClientResult<String>;
}

/// What a review message shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewCard {
    pub social_id: String,
    pub author: String,
    pub post_text: String,
    pub proposed_comment: String,
}

impl From<&PendingReview> for ReviewCard {
    fn from(review: &PendingReview) -> Self {
        Self {
            social_id: review.social_id.clone(),
            author: review.profile_name.clone(),
            post_text: review.post_text.clone(),
            proposed_comment: review.generated_text.clone(),
        }
    }
}

/// The chat surface where humans review drafts
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post an interactive review message; returns where it landed
    async fn send_review(&self, card: &ReviewCard) -> ClientResult<MessageRef>;

    /// Re-render a review message with a notice, keeping its controls
    async fn refresh_review(
        &self,
        message: &MessageRef,
        card: &ReviewCard,
        notice: &str,
    ) -> ClientResult<()>;

    /// Replace a review message with its final disposition, removing controls
    async fn close_review(&self, message: &MessageRef, text: &str) -> ClientResult<()>;

    /// Open the edit form pre-filled with `initial_text`
    async fn open_editor(&self, trigger_id: &str, social_id: &str, initial_text: &str)
        -> ClientResult<()>;
}

/// Build the configured comment generator
pub fn build_generator(settings: &Generation) -> anyhow::Result<Arc<dyn CommentGenerator>> {
    Ok(match settings.provider {
        GenerationProvider::Anthropic => {
            let prompt = settings.load_prompt()?;
            Arc::new(AnthropicGenerator::new(settings, prompt)?)
        }
        GenerationProvider::Stub => Arc::new(StubGenerator),
    })
}
