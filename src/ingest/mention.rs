//! Raw Mention Parsing
//!
//! Mentions arrive in one of two JSON shapes:
//!
//! ```text
//! nested:    {"event_time": ..., "data": [{"id", "context_annotations"}], "includes": {"users": [{"username"}]}}
//! flattened: {"event_time": ..., "id", "context_annotations", "users": [{"username"}]}
//! ```
//!
//! Both normalize to a [`MentionRecord`]: the author's account handle and the
//! first athlete-domain entity name.

use crate::stream::clock::{parse_timestamp, Millis};
use serde::Deserialize;
use serde_json::Value;

/// Context annotation domain carrying athlete entities.
pub const ATHLETE_DOMAIN_ID: &str = "60";

// =============================================================================
// ERRORS
// =============================================================================

/// Why a raw mention could not be parsed. Recoverable: the record is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionParseError {
    /// Payload is not valid JSON for either mention shape
    Malformed(String),
    MissingEventTime,
    InvalidEventTime(String),
    /// No author username present
    MissingAuthor,
}

impl std::fmt::Display for MentionParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(reason) => write!(f, "malformed mention payload: {}", reason),
            Self::MissingEventTime => write!(f, "missing event_time"),
            Self::InvalidEventTime(raw) => write!(f, "unparseable event_time: {}", raw),
            Self::MissingAuthor => write!(f, "missing author username"),
        }
    }
}

impl std::error::Error for MentionParseError {}

// =============================================================================
// WIRE SHAPES
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawMention {
    event_time: Option<Value>,
    #[serde(default)]
    data: Vec<TweetData>,
    includes: Option<Includes>,
    // Flattened form
    id: Option<Value>,
    #[serde(default)]
    context_annotations: Vec<Annotation>,
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: Option<Value>,
    #[serde(default)]
    context_annotations: Vec<Annotation>,
}

#[derive(Debug, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct User {
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Annotation {
    domain: AnnotationRef,
    entity: AnnotationRef,
}

#[derive(Debug, Deserialize)]
struct AnnotationRef {
    id: Option<Value>,
    name: Option<String>,
}

/// A parsed mention, not yet resolved against the player directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionRecord {
    /// Tweet id, used for duplicate suppression
    pub id: Option<String>,
    pub event_time: Millis,
    pub source_account: String,
    /// First athlete entity named by the mention, if any
    pub athlete: Option<String>,
}

/// Ids appear as strings or numbers depending on the producer.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn event_time(value: Option<&Value>) -> Result<Millis, MentionParseError> {
    match value {
        None | Some(Value::Null) => Err(MentionParseError::MissingEventTime),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| MentionParseError::InvalidEventTime(n.to_string())),
        Some(Value::String(s)) => {
            parse_timestamp(s).ok_or_else(|| MentionParseError::InvalidEventTime(s.clone()))
        }
        Some(other) => Err(MentionParseError::InvalidEventTime(other.to_string())),
    }
}

fn first_athlete(annotations: &[Annotation]) -> Option<String> {
    annotations
        .iter()
        .find(|a| a.domain.id.as_ref().and_then(id_string).as_deref() == Some(ATHLETE_DOMAIN_ID))
        .and_then(|a| a.entity.name.clone())
        .filter(|name| !name.is_empty())
}

fn first_username(users: &[User]) -> Option<String> {
    users
        .first()
        .and_then(|u| u.username.clone())
        .filter(|name| !name.is_empty())
}

impl MentionRecord {
    /// Parse one raw payload in either shape.
    pub fn parse(payload: &str) -> Result<Self, MentionParseError> {
        let raw: RawMention = serde_json::from_str(payload)
            .map_err(|e| MentionParseError::Malformed(e.to_string()))?;
        Self::from_raw(raw)
    }

    pub fn from_value(value: Value) -> Result<Self, MentionParseError> {
        let raw: RawMention = serde_json::from_value(value)
            .map_err(|e| MentionParseError::Malformed(e.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawMention) -> Result<Self, MentionParseError> {
        let event_time = event_time(raw.event_time.as_ref())?;

        // Nested form wins when present; only the first tweet is considered.
        let (id, athlete) = match raw.data.first() {
            Some(tweet) => (
                tweet.id.as_ref().and_then(id_string),
                first_athlete(&tweet.context_annotations),
            ),
            None => (
                raw.id.as_ref().and_then(id_string),
                first_athlete(&raw.context_annotations),
            ),
        };

        let source_account = raw
            .includes
            .as_ref()
            .and_then(|inc| first_username(&inc.users))
            .or_else(|| first_username(&raw.users))
            .ok_or(MentionParseError::MissingAuthor)?;

        Ok(Self {
            id,
            event_time,
            source_account,
            athlete,
        })
    }
}
