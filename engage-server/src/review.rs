//! Review state machine: pending drafts to posted or skipped.
//!
//! Decisions are idempotent per social_id. The data layer decides who wins:
//! a terminal commit only lands if it removed the pending row (posted) or no
//! terminal row exists yet (skipped). A comment that went out while a skip
//! committed is still recorded as posted. Message updates are best effort and
//! never undo a committed transition.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, warn};

use engage_types::{MessageRef, PendingReview};

use crate::clients::{CommentPublisher, Notifier, ReviewCard};
use crate::db::repositories::ReviewRepository;
use crate::pacing::Pacer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    Posted { edited: bool },
    Skipped,
    /// No pending row: another decision already reached a terminal state
    AlreadyHandled,
    /// Publish failed; the pending row is untouched for a retry
    PublishFailed(String),
    /// A blank replacement was submitted; nothing changed
    EmptyEdit,
}

impl ReviewOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ReviewOutcome::Posted { edited: false } => "posted",
            ReviewOutcome::Posted { edited: true } => "posted-edited",
            ReviewOutcome::Skipped => "skipped",
            ReviewOutcome::AlreadyHandled => "already-handled",
            ReviewOutcome::PublishFailed(_) => "publish-failed",
            ReviewOutcome::EmptyEdit => "empty-edit",
        }
    }
}

const ALREADY_HANDLED_TEXT: &str = ":warning: Already handled (no pending review).";
const SKIPPED_TEXT: &str = ":next_track_button: Skipped. (removed from queue)";
const EMPTY_EDIT_NOTICE: &str = ":warning: The edited comment was empty. Nothing was posted.";

#[derive(Clone)]
pub struct ReviewMachine {
    reviews: ReviewRepository,
    publisher: Arc<dyn CommentPublisher>,
    notifier: Arc<dyn Notifier>,
    pacer: Pacer,
    dry_run: bool,
}

impl ReviewMachine {
    pub fn new(
        reviews: ReviewRepository,
        publisher: Arc<dyn CommentPublisher>,
        notifier: Arc<dyn Notifier>,
        pacer: Pacer,
        dry_run: bool,
    ) -> Self {
        Self {
            reviews,
            publisher,
            notifier,
            pacer,
            dry_run,
        }
    }

    /// Publish the stored draft. `message` overrides the stored message ref,
    /// e.g. when the decision came from a click on that message.
    pub async fn approve(&self, social_id: &str, message: Option<MessageRef>) -> Result<ReviewOutcome> {
        let Some(pending) = self.reviews.get_pending(social_id)? else {
            return Ok(self.already_handled(social_id, message.as_ref()).await);
        };
        let text = pending.generated_text.clone();
        self.publish_and_commit(pending, text, false, message).await
    }

    /// Publish `replacement` in place of the stored draft
    pub async fn edit(
        &self,
        social_id: &str,
        replacement: &str,
        message: Option<MessageRef>,
    ) -> Result<ReviewOutcome> {
        let Some(pending) = self.reviews.get_pending(social_id)? else {
            return Ok(self.already_handled(social_id, message.as_ref()).await);
        };
        let replacement = replacement.trim();
        if replacement.is_empty() {
            warn!(social_id = %social_id, "Rejecting blank edited comment");
            let message = message.or_else(|| pending.message_ref.clone());
            self.refresh(message.as_ref(), &pending, EMPTY_EDIT_NOTICE).await;
            return Ok(ReviewOutcome::EmptyEdit);
        }
        self.publish_and_commit(pending, replacement.to_string(), true, message)
            .await
    }

    /// Retire the review without publishing
    pub async fn skip(&self, social_id: &str, message: Option<MessageRef>) -> Result<ReviewOutcome> {
        let stored = self
            .reviews
            .get_pending(social_id)?
            .and_then(|pending| pending.message_ref);
        let message = message.or(stored);

        if !self.reviews.commit_skipped(social_id, Utc::now())? {
            return Ok(self.already_handled(social_id, message.as_ref()).await);
        }
        info!(social_id = %social_id, "Review skipped");
        self.close(message.as_ref(), social_id, SKIPPED_TEXT).await;
        Ok(ReviewOutcome::Skipped)
    }

    /// Open the edit form. `prefill` comes from the clicked message; the stored
    /// draft is used when it is missing.
    pub async fn open_editor(&self, trigger_id: &str, social_id: &str, prefill: Option<String>) -> Result<()> {
        let initial = match prefill.filter(|text| !text.trim().is_empty()) {
            Some(text) => text,
            None => self
                .reviews
                .get_pending(social_id)?
                .map(|pending| pending.generated_text)
                .unwrap_or_default(),
        };
        if let Err(e) = self.notifier.open_editor(trigger_id, social_id, &initial).await {
            warn!(social_id = %social_id, error = %e, "Failed to open edit form");
        }
        Ok(())
    }

    async fn publish_and_commit(
        &self,
        pending: PendingReview,
        text: String,
        edited: bool,
        message: Option<MessageRef>,
    ) -> Result<ReviewOutcome> {
        let social_id = pending.social_id.as_str();
        let message = message.or_else(|| pending.message_ref.clone());

        if self.dry_run {
            info!(social_id = %social_id, edited, "Dry run, not publishing comment");
        } else {
            self.pacer.before_publish().await;
            if let Err(e) = self.publisher.publish_comment(social_id, &text).await {
                warn!(social_id = %social_id, error = %e, "Publishing comment failed");
                let notice = format!(":x: Failed to post ({}). The review is still pending, try again.", e);
                self.refresh(message.as_ref(), &pending, &notice).await;
                return Ok(ReviewOutcome::PublishFailed(e.to_string()));
            }
        }

        if !self
            .reviews
            .commit_posted(social_id, &text, edited, Utc::now())?
        {
            if self.dry_run {
                warn!(social_id = %social_id, "Review was decided concurrently");
                return Ok(ReviewOutcome::AlreadyHandled);
            }
            // Already live, record it even though a skip won
            if !self
                .reviews
                .commit_late_publish(social_id, &text, edited, Utc::now())?
            {
                warn!(social_id = %social_id, "Comment published twice, keeping the first record");
                return Ok(ReviewOutcome::AlreadyHandled);
            }
            error!(social_id = %social_id, "Comment published after the review was skipped, recording it as posted");
        } else {
            info!(social_id = %social_id, edited, dry_run = self.dry_run, "Comment posted");
        }

        self.close(message.as_ref(), social_id, &posted_text(edited, self.dry_run))
            .await;
        Ok(ReviewOutcome::Posted { edited })
    }

    async fn already_handled(&self, social_id: &str, message: Option<&MessageRef>) -> ReviewOutcome {
        info!(social_id = %social_id, "No pending review, already handled");
        self.close(message, social_id, ALREADY_HANDLED_TEXT).await;
        ReviewOutcome::AlreadyHandled
    }

    async fn close(&self, message: Option<&MessageRef>, social_id: &str, text: &str) {
        let Some(message) = message else {
            warn!(social_id = %social_id, "No message reference, review message not updated");
            return;
        };
        if let Err(e) = self.notifier.close_review(message, text).await {
            warn!(social_id = %social_id, error = %e, "Failed to update review message");
        }
    }

    async fn refresh(&self, message: Option<&MessageRef>, pending: &PendingReview, notice: &str) {
        let Some(message) = message else {
            return;
        };
        let card = ReviewCard::from(pending);
        if let Err(e) = self.notifier.refresh_review(message, &card, notice).await {
            warn!(social_id = %pending.social_id, error = %e, "Failed to refresh review message");
        }
    }
}

fn posted_text(edited: bool, dry_run: bool) -> String {
    let mut text = String::from(":white_check_mark: Posted");
    if edited {
        text.push_str(" (edited)");
    }
    if dry_run {
        text.push_str(" [dry run]");
    }
    text.push_str(". (removed from queue)");
    text
}
