use serde::{Deserialize, Serialize};
use uuid::Uuid;

use streakproj_core::SubjectId;

use crate::Event;

/// An [`Event`] addressed to the subject whose stream it belongs to.
///
/// This is the unit appended to an event log and carried over a bus.
///
/// Notes:
/// - **Ownership** is expressed via `subject_id`; a projection never mixes subjects.
/// - `event.seq` is monotonic per subject stream.
/// - `event_id` is a transport-level identity; deduplication uses `seq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectEvent {
    event_id: Uuid,
    subject_id: SubjectId,
    event: Event,
}

impl SubjectEvent {
    pub fn new(event_id: Uuid, subject_id: SubjectId, event: Event) -> Self {
        Self {
            event_id,
            subject_id,
            event,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    pub fn seq(&self) -> u64 {
        self.event.seq
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn into_event(self) -> Event {
        self.event
    }
}
