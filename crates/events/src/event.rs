use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value as JsonValue;

/// A post was published by the subject.
pub const EVENT_POST_CREATED: &str = "post.created";
/// An existing post was edited.
pub const EVENT_POST_EDITED: &str = "post.edited";
/// A post was removed.
pub const EVENT_POST_DELETED: &str = "post.deleted";

/// A single fact in a subject's stream.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **sequenced**: `seq` is monotonic per subject, starting at 1
/// - **unique** per `(subject, seq)`; a redelivered event carries the same `seq`
///
/// The payload is opaque to the projector.
///
/// A negative `seq` cannot be represented and is refused while decoding; `seq == 0`
/// decodes and is refused by the projector as a malformed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(deserialize_with = "deserialize_seq")]
    pub seq: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: JsonValue,
}

impl Event {
    pub fn new(
        seq: u64,
        event_type: impl Into<String>,
        occurred_at: DateTime<Utc>,
        payload: JsonValue,
    ) -> Self {
        Self {
            seq,
            event_type: event_type.into(),
            occurred_at,
            payload,
        }
    }
}

/// Wire sequence numbers are signed BIGINTs.
fn deserialize_seq<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    u64::try_from(raw)
        .map_err(|_| de::Error::custom(format!("malformed event: seq must not be negative, got {raw}")))
}
