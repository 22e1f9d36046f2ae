//! Append-only, per-subject event log boundary.
//!
//! The log is the source of truth for projections: it assigns each subject's
//! sequence numbers and can replay any suffix of a stream after a checkpoint.

pub mod in_memory;
pub mod r#trait;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use streakproj_core::SubjectId;
use streakproj_events::{EventBus, SubjectEvent};

pub use in_memory::InMemoryEventLog;
pub use r#trait::{EventLog, EventLogError};

/// Adapter that publishes appended events to an `EventBus` after the append succeeds.
///
/// Ordering invariant: **publish happens only after append succeeds**, so a consumer
/// never sees an event the log could not replay.
pub struct PublishingEventLog<L, B> {
    log: L,
    bus: B,
}

impl<L, B> PublishingEventLog<L, B> {
    pub fn new(log: L, bus: B) -> Self {
        Self { log, bus }
    }
}

impl<L, B> EventLog for PublishingEventLog<L, B>
where
    L: EventLog,
    B: EventBus<SubjectEvent>,
{
    fn append(
        &self,
        subject_id: SubjectId,
        event_type: &str,
        occurred_at: DateTime<Utc>,
        payload: JsonValue,
    ) -> Result<SubjectEvent, EventLogError> {
        let appended = self.log.append(subject_id, event_type, occurred_at, payload)?;

        self.bus
            .publish(appended.clone())
            .map_err(|err| EventLogError::Publish(format!("{err:?}")))?;

        Ok(appended)
    }

    fn load_after(
        &self,
        subject_id: SubjectId,
        after_seq: u64,
    ) -> Result<Vec<SubjectEvent>, EventLogError> {
        self.log.load_after(subject_id, after_seq)
    }
}
