use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use streakproj_core::SubjectId;
use streakproj_events::SubjectEvent;

/// Event log operation error.
#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("publish failed after append: {0}")]
    Publish(String),
}

/// Append-only per-subject stream storage.
///
/// Sequence numbers are assigned by the log: the first event of a subject gets
/// `seq = 1`, every later one `last + 1`. They are never reused.
pub trait EventLog: Send + Sync {
    /// Append one event to a subject's stream and return it with its assigned `seq`.
    fn append(
        &self,
        subject_id: SubjectId,
        event_type: &str,
        occurred_at: DateTime<Utc>,
        payload: JsonValue,
    ) -> Result<SubjectEvent, EventLogError>;

    /// Events with `seq > after_seq`, ascending.
    fn load_after(
        &self,
        subject_id: SubjectId,
        after_seq: u64,
    ) -> Result<Vec<SubjectEvent>, EventLogError>;

    /// The subject's full history, ascending.
    fn load_stream(&self, subject_id: SubjectId) -> Result<Vec<SubjectEvent>, EventLogError> {
        self.load_after(subject_id, 0)
    }
}

impl<L> EventLog for Arc<L>
where
    L: EventLog + ?Sized,
{
    fn append(
        &self,
        subject_id: SubjectId,
        event_type: &str,
        occurred_at: DateTime<Utc>,
        payload: JsonValue,
    ) -> Result<SubjectEvent, EventLogError> {
        (**self).append(subject_id, event_type, occurred_at, payload)
    }

    fn load_after(
        &self,
        subject_id: SubjectId,
        after_seq: u64,
    ) -> Result<Vec<SubjectEvent>, EventLogError> {
        (**self).load_after(subject_id, after_seq)
    }
}
