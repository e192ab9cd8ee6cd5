use serde::{Deserialize, Serialize};

/// Final disposition recorded in the handled-posts audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Posted,
    Skipped,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Posted => "posted",
            Disposition::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "posted" => Some(Disposition::Posted),
            "skipped" => Some(Disposition::Skipped),
            _ => None,
        }
    }
}

/// Status of a row in the pending review queue.
///
/// Only `Pending` is ever persisted; a decided review is deleted and replaced
/// by terminal rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReviewStatus::Pending),
            _ => None,
        }
    }
}

/// What to do with a listed post whose timestamp cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnparsedTimestampPolicy {
    #[default]
    Drop,
    Retain,
}

impl UnparsedTimestampPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnparsedTimestampPolicy::Drop => "drop",
            UnparsedTimestampPolicy::Retain => "retain",
        }
    }
}

/// Backend used to draft comments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    #[default]
    Anthropic,
    Stub,
}

/// A human decision on a pending review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Approve,
    Edit,
    Skip,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::Approve => "approve",
            DecisionKind::Edit => "edit",
            DecisionKind::Skip => "skip",
        }
    }

    /// Map a notification action id onto a decision
    pub fn from_action_id(action_id: &str) -> Option<Self> {
        match action_id {
            "approve_comment" => Some(DecisionKind::Approve),
            "edit_comment" => Some(DecisionKind::Edit),
            "skip_comment" => Some(DecisionKind::Skip),
            _ => None,
        }
    }

    pub fn action_id(&self) -> &'static str {
        match self {
            DecisionKind::Approve => "approve_comment",
            DecisionKind::Edit => "edit_comment",
            DecisionKind::Skip => "skip_comment",
        }
    }
}
