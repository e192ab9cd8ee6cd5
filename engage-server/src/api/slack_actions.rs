//! Slack interactivity endpoint: button clicks and edit-form submissions.
//!
//! The handler only parses the interaction and queues a [`DecisionJob`]; the
//! publish and bookkeeping happen on the worker pool so Slack gets its
//! acknowledgment well inside its three second limit.

use axum::{
    extract::{rejection::FormRejection, State},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use engage_types::{DecisionKind, MessageRef};

use crate::api::ApiResult;
use crate::clients::slack::{proposed_comment_from_blocks, submitted_comment, EDIT_CALLBACK_ID};
use crate::state::AppState;
use crate::worker::DecisionJob;

#[derive(Debug, Deserialize)]
pub struct InteractionForm {
    payload: String,
}

/// What an interaction payload asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    /// A review button click
    Action(DecisionJob),
    /// The edit form was submitted
    Submission(Option<DecisionJob>),
    /// Anything else; acknowledged and dropped
    Ignored,
}

fn ack() -> Response {
    Json(json!({ "ok": true })).into_response()
}

fn clear_view() -> Response {
    Json(json!({ "response_action": "clear" })).into_response()
}

/// POST /slack/actions - Queue the decision carried by an interaction payload
pub async fn slack_actions(
    State(state): State<AppState>,
    form: Result<Form<InteractionForm>, FormRejection>,
) -> ApiResult<Response> {
    let payload = match form {
        Ok(Form(form)) => match serde_json::from_str::<Value>(&form.payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Interaction payload is not JSON");
                return Ok(ack());
            }
        },
        Err(e) => {
            warn!(error = %e, "Interaction request without a payload field");
            return Ok(ack());
        }
    };

    match parse_interaction(&payload) {
        Interaction::Action(job) => {
            debug!(social_id = %job.social_id(), decision = job.kind().as_str(), "Queueing decision");
            state.queue.submit(job)?;
            Ok(ack())
        }
        Interaction::Submission(job) => {
            match job {
                Some(job) => state.queue.submit(job)?,
                None => warn!("Edit form submitted without a social id or comment"),
            }
            Ok(clear_view())
        }
        Interaction::Ignored => Ok(ack()),
    }
}

/// Translate a Slack interaction payload into a job
pub fn parse_interaction(payload: &Value) -> Interaction {
    match payload.get("type").and_then(Value::as_str) {
        Some("block_actions") => parse_block_action(payload)
            .map(Interaction::Action)
            .unwrap_or(Interaction::Ignored),
        Some("view_submission") => {
            let view = payload.get("view").unwrap_or(&Value::Null);
            if view.get("callback_id").and_then(Value::as_str) != Some(EDIT_CALLBACK_ID) {
                return Interaction::Submission(None);
            }
            let social_id = non_empty(view.get("private_metadata"));
            let text = submitted_comment(view);
            Interaction::Submission(social_id.zip(text).map(|(social_id, text)| DecisionJob::Edit {
                social_id,
                text,
                message: None,
            }))
        }
        _ => Interaction::Ignored,
    }
}

fn parse_block_action(payload: &Value) -> Option<DecisionJob> {
    let action = payload.get("actions")?.as_array()?.first()?;
    let kind = DecisionKind::from_action_id(action.get("action_id")?.as_str()?)?;
    let social_id = non_empty(action.get("value"))?;
    let message = message_ref(payload);

    Some(match kind {
        DecisionKind::Approve => DecisionJob::Approve { social_id, message },
        DecisionKind::Skip => DecisionJob::Skip { social_id, message },
        DecisionKind::Edit => {
            let prefill = payload
                .pointer("/message/blocks")
                .and_then(Value::as_array)
                .and_then(|blocks| proposed_comment_from_blocks(blocks));
            DecisionJob::OpenEditor {
                trigger_id: non_empty(payload.get("trigger_id"))?,
                social_id,
                prefill,
            }
        }
    })
}

/// Where the clicked message lives
fn message_ref(payload: &Value) -> Option<MessageRef> {
    let channel = non_empty(payload.pointer("/channel/id"))
        .or_else(|| non_empty(payload.pointer("/container/channel_id")))?;
    let ts = non_empty(payload.pointer("/message/ts"))
        .or_else(|| non_empty(payload.pointer("/container/message_ts")))?;
    Some(MessageRef::new(channel, ts))
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
