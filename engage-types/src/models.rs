use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{Disposition, ReviewStatus};

// Custom serde module for DateTime to ensure RFC3339 string format
mod datetime_format {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = date.to_rfc3339();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<DateTime<Utc>>().map_err(serde::de::Error::custom)
    }
}

/// A person we track, keyed by the URL the search returned for them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub canonical_url: String,
    /// Listing-specific lead reference (Sales Navigator `ACw...` id)
    #[serde(default)]
    pub raw_lead_reference: Option<String>,
    /// Posts-queryable identifier; once known it never changes
    #[serde(default)]
    pub resolved_identifier: Option<String>,
    pub display_name: String,
}

/// Field values for one registry upsert. `None` never clears a stored value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetUpsert {
    pub canonical_url: String,
    pub raw_lead_reference: Option<String>,
    pub resolved_identifier: Option<String>,
    pub display_name: Option<String>,
}

/// A post seen in some target's feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostPoolEntry {
    pub social_id: String,
    pub target_identifier: String,
    pub text: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(with = "datetime_format")]
    pub last_seen_at: DateTime<Utc>,
}

/// An eligible pool entry joined with its author's display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub entry: PostPoolEntry,
    pub author_name: String,
}

/// Opaque reference to a sent notification (channel + message timestamp)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel: String,
    pub ts: String,
}

impl MessageRef {
    pub fn new(channel: impl Into<String>, ts: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            ts: ts.into(),
        }
    }
}

/// A drafted comment awaiting a human decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReview {
    pub social_id: String,
    pub profile_name: String,
    pub post_text: String,
    pub generated_text: String,
    pub status: ReviewStatus,
    #[serde(default)]
    pub message_ref: Option<MessageRef>,
    #[serde(with = "datetime_format")]
    pub created_at: DateTime<Utc>,
}

/// Everything needed to queue a new review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
    pub social_id: String,
    pub profile_name: String,
    pub post_text: String,
    pub generated_text: String,
}

/// Record that a comment was actually published
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub social_id: String,
    pub comment_text: String,
    #[serde(with = "datetime_format")]
    pub commented_at: DateTime<Utc>,
    /// True when the reviewer replaced the generated text
    pub edited: bool,
}

/// Audit trail entry for a decided post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandledPost {
    pub social_id: String,
    pub disposition: Disposition,
    #[serde(with = "datetime_format")]
    pub handled_at: DateTime<Utc>,
}

/// Error body returned by the HTTP surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Option<String>,
}
