//! Identifier extraction from loosely shaped people-search records.
//!
//! Search results do not have a fixed shape: the lead reference may sit in a
//! lead URL, in one of several id fields, or be buried inside an URN. Rather
//! than probing fields ad hoc, callers run a record through an ordered list of
//! [`ExtractionRule`]s and take the first match.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// `/sales/lead/<ID>,...` inside a Sales Navigator lead URL
static LEAD_URL_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/sales/lead/([^,/?#]+)").expect("Failed to compile lead URL regex")
});

/// A value that is nothing but a lead id
static BARE_LEAD_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ACw[A-Za-z0-9_-]{7,}$").expect("Failed to compile lead id regex")
});

/// A lead id embedded in a longer string (URNs, odd URLs)
static EMBEDDED_LEAD_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"ACw[A-Za-z0-9_-]{6,}").expect("Failed to compile lead token regex")
});

const ID_FIELDS: &[&str] = &[
    "salesnav_id",
    "lead_id",
    "leadId",
    "id",
    "urn",
    "profile_urn",
    "profileUrn",
];

const ALL_FIELDS: &[&str] = &[
    "profile_url",
    "profileUrl",
    "url",
    "lead_url",
    "leadUrl",
    "salesnav_id",
    "lead_id",
    "leadId",
    "id",
    "urn",
    "profile_urn",
    "profileUrn",
];

/// Fields of a profile lookup response that carry the posts-queryable id
pub const CANONICAL_ID_FIELDS: &[&str] =
    &["provider_internal_id", "provider_id", "id", "identifier"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Capture the id segment of a lead URL path
    UrlPath,
    /// Accept a field whose whole value is a lead id
    ExplicitId,
    /// Find a lead id anywhere inside the value
    TokenScan,
}

impl Strategy {
    pub fn apply(&self, candidate: &str) -> Option<String> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return None;
        }
        let found = match self {
            Strategy::UrlPath => LEAD_URL_PATH
                .captures(candidate)
                .and_then(|cap| cap.get(1))
                .map(|m| m.as_str()),
            Strategy::ExplicitId => BARE_LEAD_ID.is_match(candidate).then_some(candidate),
            Strategy::TokenScan => EMBEDDED_LEAD_ID.find(candidate).map(|m| m.as_str()),
        };
        found.filter(|s| !s.is_empty()).map(str::to_string)
    }
}

/// One step of the extraction pipeline: a strategy and the fields it reads
#[derive(Debug, Clone, Copy)]
pub struct ExtractionRule {
    pub name: &'static str,
    pub strategy: Strategy,
    pub fields: &'static [&'static str],
}

/// Lead-id rules in priority order
pub const LEAD_ID_RULES: &[ExtractionRule] = &[
    ExtractionRule {
        name: "url-path",
        strategy: Strategy::UrlPath,
        fields: ALL_FIELDS,
    },
    ExtractionRule {
        name: "explicit-id",
        strategy: Strategy::ExplicitId,
        fields: ID_FIELDS,
    },
    ExtractionRule {
        name: "token-scan",
        strategy: Strategy::TokenScan,
        fields: ALL_FIELDS,
    },
];

/// A successful extraction and the rule that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub value: String,
    pub rule: &'static str,
}

/// Run `rules` in order against a record or a bare reference string.
///
/// Objects are read field by field in each rule's priority order, first at the
/// top level and then one level down in nested objects. Never panics.
pub fn apply_rules(input: &Value, rules: &[ExtractionRule]) -> Option<Extracted> {
    rules.iter().find_map(|rule| {
        candidates(input, rule.fields)
            .into_iter()
            .find_map(|candidate| rule.strategy.apply(candidate))
            .map(|value| Extracted {
                value,
                rule: rule.name,
            })
    })
}

/// Extract the Sales Navigator lead id from a search record or reference string
pub fn extract_lead_id(input: &Value) -> Option<String> {
    apply_rules(input, LEAD_ID_RULES).map(|e| e.value)
}

/// Pick the canonical identifier out of a profile lookup response
pub fn canonical_identifier(response: &Value) -> Option<String> {
    first_string(response, CANONICAL_ID_FIELDS)
}

/// First non-blank string among `fields`, trimmed
pub fn first_string(record: &Value, fields: &[&str]) -> Option<String> {
    let object = record.as_object()?;
    fields.iter().find_map(|field| {
        object
            .get(*field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn candidates<'a>(input: &'a Value, fields: &[&str]) -> Vec<&'a str> {
    match input {
        Value::String(s) => vec![s.as_str()],
        Value::Object(object) => {
            let mut found: Vec<&str> = fields
                .iter()
                .filter_map(|field| object.get(*field).and_then(Value::as_str))
                .collect();
            for nested in object.values().filter_map(Value::as_object) {
                found.extend(
                    fields
                        .iter()
                        .filter_map(|field| nested.get(*field).and_then(Value::as_str)),
                );
            }
            found
        }
        _ => Vec::new(),
    }
}
