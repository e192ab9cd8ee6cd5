//! Slack Web API notifier and the Block Kit layouts it sends.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use engage_types::{DecisionKind, MessageRef};

use super::error::{ensure_success, truncate, ClientError, ClientResult};
use super::{Notifier, ReviewCard};
use crate::config::Slack;

const SLACK_API: &str = "https://slack.com/api";

pub const REVIEW_TITLE: &str = "Review LinkedIn comment";
pub const EDIT_CALLBACK_ID: &str = "edit_comment_submit";
pub const COMMENT_BLOCK_ID: &str = "comment_block";
pub const COMMENT_INPUT_ID: &str = "comment_input";

const PROPOSED_LABEL: &str = "Proposed comment";
const FENCE: &str = "```";
const POST_PREVIEW_CHARS: usize = 1500;
/// Slack caps block ids at 255 chars
const BLOCK_ID_SOCIAL_CHARS: usize = 60;

#[derive(Clone)]
pub struct SlackClient {
    client: Client,
    token: String,
    recipient: String,
    base_url: String,
}

impl SlackClient {
    pub fn new(settings: &Slack) -> ClientResult<Self> {
        let client = Client::builder().timeout(settings.timeout()).build()?;
        Ok(Self {
            client,
            token: settings.bot_token.clone(),
            recipient: settings.user_id.clone(),
            base_url: SLACK_API.to_string(),
        })
    }

    /// Call a Web API method; Slack reports failures as `ok: false` with HTTP 200
    async fn call(&self, method: &str, payload: &Value) -> ClientResult<Value> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?;
        let data: Value = ensure_success(response).await?.json().await?;
        if data.get("ok").and_then(Value::as_bool) != Some(true) {
            let reason = data
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| truncate(&data.to_string(), 500));
            return Err(ClientError::Rejected {
                service: "slack",
                reason: format!("{} failed: {}", method, reason),
            });
        }
        Ok(data)
    }
}

#[async_trait]
impl Notifier for SlackClient {
    async fn send_review(&self, card: &ReviewCard) -> ClientResult<MessageRef> {
        let payload = json!({
            "channel": self.recipient,
            "text": REVIEW_TITLE,
            "blocks": review_blocks(card, None),
        });
        let data = self.call("chat.postMessage", &payload).await?;
        let channel = data.get("channel").and_then(Value::as_str);
        let ts = data
            .pointer("/message/ts")
            .or_else(|| data.get("ts"))
            .and_then(Value::as_str);
        match (channel, ts) {
            (Some(channel), Some(ts)) => Ok(MessageRef::new(channel, ts)),
            _ => Err(ClientError::Rejected {
                service: "slack",
                reason: "chat.postMessage returned no channel/ts".to_string(),
            }),
        }
    }

    async fn refresh_review(
        &self,
        message: &MessageRef,
        card: &ReviewCard,
        notice: &str,
    ) -> ClientResult<()> {
        let payload = json!({
            "channel": message.channel,
            "ts": message.ts,
            "text": REVIEW_TITLE,
            "blocks": review_blocks(card, Some(notice)),
        });
        self.call("chat.update", &payload).await?;
        Ok(())
    }

    async fn close_review(&self, message: &MessageRef, text: &str) -> ClientResult<()> {
        let payload = json!({
            "channel": message.channel,
            "ts": message.ts,
            "text": text,
            "blocks": final_blocks(text),
        });
        self.call("chat.update", &payload).await?;
        Ok(())
    }

    async fn open_editor(
        &self,
        trigger_id: &str,
        social_id: &str,
        initial_text: &str,
    ) -> ClientResult<()> {
        self.call("views.open", &edit_modal(trigger_id, social_id, initial_text))
            .await?;
        Ok(())
    }
}

/// Review message: header, post preview, proposed comment, buttons, footer.
/// A notice, when given, is shown above the buttons.
pub fn review_blocks(card: &ReviewCard, notice: Option<&str>) -> Value {
    let post_preview = truncate(card.post_text.trim(), POST_PREVIEW_CHARS);
    let mut blocks = vec![
        json!({
            "type": "header",
            "text": { "type": "plain_text", "text": REVIEW_TITLE }
        }),
        json!({
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": format!("*Post by:* {}\n\n*Post text:*\n{}", card.author, post_preview)
            }
        }),
        json!({ "type": "divider" }),
        json!({
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": format!(
                    "*{}:*\n{}{}{}",
                    PROPOSED_LABEL,
                    FENCE,
                    card.proposed_comment.trim(),
                    FENCE
                )
            }
        }),
    ];
    if let Some(notice) = notice {
        blocks.push(json!({
            "type": "context",
            "elements": [{ "type": "mrkdwn", "text": notice }]
        }));
    }
    blocks.push(json!({
        "type": "actions",
        "block_id": format!("review_{}", truncate(&card.social_id, BLOCK_ID_SOCIAL_CHARS)),
        "elements": [
            button("Approve", Some("primary"), DecisionKind::Approve, &card.social_id),
            button("Edit", None, DecisionKind::Edit, &card.social_id),
            button("Skip", Some("danger"), DecisionKind::Skip, &card.social_id),
        ]
    }));
    blocks.push(json!({
        "type": "context",
        "elements": [{ "type": "mrkdwn", "text": format!("`social_id`: {}", card.social_id) }]
    }));
    Value::Array(blocks)
}

fn button(label: &str, style: Option<&str>, kind: DecisionKind, social_id: &str) -> Value {
    let mut button = json!({
        "type": "button",
        "text": { "type": "plain_text", "text": label },
        "value": social_id,
        "action_id": kind.action_id(),
    });
    if let Some(style) = style {
        button["style"] = json!(style);
    }
    button
}

/// A closed review: one section, no controls
pub fn final_blocks(text: &str) -> Value {
    json!([{ "type": "section", "text": { "type": "mrkdwn", "text": text } }])
}

/// `views.open` payload for the edit form
pub fn edit_modal(trigger_id: &str, social_id: &str, initial_text: &str) -> Value {
    json!({
        "trigger_id": trigger_id,
        "view": {
            "type": "modal",
            "callback_id": EDIT_CALLBACK_ID,
            "private_metadata": social_id,
            "title": { "type": "plain_text", "text": "Edit LinkedIn Comment" },
            "submit": { "type": "plain_text", "text": "Post" },
            "close": { "type": "plain_text", "text": "Cancel" },
            "blocks": [{
                "type": "input",
                "block_id": COMMENT_BLOCK_ID,
                "label": { "type": "plain_text", "text": "Comment" },
                "element": {
                    "type": "plain_text_input",
                    "action_id": COMMENT_INPUT_ID,
                    "multiline": true,
                    "initial_value": initial_text,
                }
            }]
        }
    })
}

/// Recover the proposed comment from a review message's blocks
pub fn proposed_comment_from_blocks(blocks: &[Value]) -> Option<String> {
    blocks
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("section"))
        .filter_map(|block| block.pointer("/text/text").and_then(Value::as_str))
        .find(|text| text.contains(PROPOSED_LABEL) && text.contains(FENCE))
        .and_then(|text| {
            let (_, rest) = text.split_once(FENCE)?;
            let (inner, _) = rest.rsplit_once(FENCE)?;
            let inner = inner.trim();
            (!inner.is_empty()).then(|| inner.to_string())
        })
}

/// The text typed into the edit form, if present
pub fn submitted_comment(view: &Value) -> Option<String> {
    view.pointer(&format!(
        "/state/values/{}/{}/value",
        COMMENT_BLOCK_ID, COMMENT_INPUT_ID
    ))
    .and_then(Value::as_str)
    .map(str::to_string)
}
