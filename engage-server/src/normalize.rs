//! Typed views over the loosely shaped JSON the upstream API returns.
//!
//! Every field lookup against raw upstream data happens here, once; the rest
//! of the crate works with [`PersonRecord`] and [`PostRecord`].

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::resolver::{extract_lead_id, first_string};
use crate::timestamps::parse_timestamp;

const ITEM_KEYS: &[&str] = &["items", "data", "results"];
const CURSOR_KEYS: &[&str] = &["cursor", "next_cursor", "nextCursor"];
const PERSON_URL_FIELDS: &[&str] = &["profile_url", "profileUrl", "url"];
const PERSON_NAME_FIELDS: &[&str] = &["name", "full_name", "fullName"];
const POST_ID_FIELDS: &[&str] = &["social_id", "id"];
const POST_TEXT_FIELDS: &[&str] = &["text", "commentary"];
const POST_TIME_FIELDS: &[&str] = &["parsed_datetime", "date", "created_at", "createdAt"];

/// List items from a response that may be a bare array or an object holding
/// the array under one of several keys. Unknown shapes yield no items.
pub fn items_from_response(data: &Value) -> Vec<Value> {
    match data {
        Value::Array(items) => items.clone(),
        Value::Object(object) => ITEM_KEYS
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_array))
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Pagination cursor, top-level or under `paging`
pub fn next_cursor(data: &Value) -> Option<String> {
    first_string(data, CURSOR_KEYS).or_else(|| {
        data.get("paging")
            .and_then(|paging| first_string(paging, CURSOR_KEYS))
    })
}

/// A person from a search page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonRecord {
    pub profile_url: Option<String>,
    pub display_name: Option<String>,
    pub lead_id: Option<String>,
}

impl PersonRecord {
    /// `None` when the item is not an object
    pub fn from_value(item: &Value) -> Option<Self> {
        item.as_object()?;
        let display_name = first_string(item, PERSON_NAME_FIELDS).or_else(|| {
            let first = first_string(item, &["first_name", "firstName"]);
            let last = first_string(item, &["last_name", "lastName"]);
            match (first, last) {
                (Some(f), Some(l)) => Some(format!("{} {}", f, l)),
                (f, l) => f.or(l),
            }
        });
        Some(Self {
            profile_url: first_string(item, PERSON_URL_FIELDS),
            display_name,
            lead_id: extract_lead_id(item),
        })
    }

    /// Registry key: the profile URL, else a stable key derived from the lead id
    pub fn canonical_url(&self) -> Option<String> {
        self.profile_url.clone().or_else(|| {
            self.lead_id
                .as_ref()
                .map(|lead| format!("salesnav://lead/{}", lead))
        })
    }
}

/// A post from a feed listing
#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    pub social_id: String,
    pub text: String,
    /// `None` when no timestamp field could be parsed
    pub created_at: Option<DateTime<Utc>>,
}

impl PostRecord {
    /// `None` when the item is not an object or carries no post id
    pub fn from_value(item: &Value, now: DateTime<Utc>) -> Option<Self> {
        let social_id = first_string(item, POST_ID_FIELDS)?;
        let text = first_string(item, POST_TEXT_FIELDS).unwrap_or_default();
        let created_at = POST_TIME_FIELDS.iter().find_map(|field| {
            item.get(*field)
                .and_then(Value::as_str)
                .and_then(|raw| parse_timestamp(raw, now))
        });
        Some(Self {
            social_id,
            text,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use serde_json::json;

    #[test]
    fn test_items_envelopes() {
        assert_eq!(items_from_response(&json!([1, 2])).len(), 2);
        assert_eq!(items_from_response(&json!({ "items": [1] })).len(), 1);
        assert_eq!(items_from_response(&json!({ "data": [1, 2, 3] })).len(), 3);
        assert_eq!(items_from_response(&json!({ "results": [] })).len(), 0);
        assert!(items_from_response(&json!({ "items": "nope" })).is_empty());
        assert!(items_from_response(&json!("text")).is_empty());
    }

    #[test]
    fn test_cursor_locations() {
        assert_eq!(next_cursor(&json!({ "cursor": "abc" })).as_deref(), Some("abc"));
        assert_eq!(next_cursor(&json!({ "nextCursor": "n1" })).as_deref(), Some("n1"));
        assert_eq!(
            next_cursor(&json!({ "paging": { "cursor": "deep" } })).as_deref(),
            Some("deep")
        );
        assert_eq!(next_cursor(&json!({ "cursor": null, "items": [] })), None);
        assert_eq!(next_cursor(&json!({ "cursor": "" })), None);
    }

    #[test]
    fn test_person_record() {
        let person = PersonRecord::from_value(&json!({
            "fullName": "Grace Hopper",
            "profileUrl": "https://www.linkedin.com/sales/lead/ACwGRACE0001,NAME_SEARCH,x",
        }))
        .unwrap();
        assert_eq!(person.display_name.as_deref(), Some("Grace Hopper"));
        assert_eq!(person.lead_id.as_deref(), Some("ACwGRACE0001"));
        assert_eq!(
            person.canonical_url().as_deref(),
            Some("https://www.linkedin.com/sales/lead/ACwGRACE0001,NAME_SEARCH,x")
        );
    }

    #[test]
    fn test_person_without_url_falls_back_to_lead_key() {
        let person = PersonRecord::from_value(&json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "id": "ACwADA0000001"
        }))
        .unwrap();
        assert_eq!(person.display_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(
            person.canonical_url().as_deref(),
            Some("salesnav://lead/ACwADA0000001")
        );
        assert!(PersonRecord::from_value(&json!("ACwADA0000001")).is_none());
    }

    #[test]
    fn test_post_record_timestamp_priority() {
        let now: DateTime<Utc> = "2024-06-15T12:00:00Z".parse().unwrap();
        let post = PostRecord::from_value(
            &json!({
                "social_id": "urn:li:activity:7001",
                "id": "7001",
                "text": "We shipped",
                "parsed_datetime": "not a date",
                "date": "3d"
            }),
            now,
        )
        .unwrap();
        assert_eq!(post.social_id, "urn:li:activity:7001");
        assert_eq!(post.created_at, Some(now - TimeDelta::days(3)));

        let post = PostRecord::from_value(
            &json!({ "id": "7002", "parsed_datetime": "2024-06-14T08:00:00.000Z", "date": "1w" }),
            now,
        )
        .unwrap();
        assert_eq!(post.social_id, "7002");
        assert_eq!(post.text, "");
        assert_eq!(post.created_at, Some("2024-06-14T08:00:00Z".parse().unwrap()));
    }

    #[test]
    fn test_post_record_without_id_or_time() {
        let now = Utc::now();
        assert!(PostRecord::from_value(&json!({ "text": "orphan" }), now).is_none());
        let post = PostRecord::from_value(&json!({ "id": "1", "date": "abc" }), now).unwrap();
        assert_eq!(post.created_at, None);
    }
}
