use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use streakproj_core::SubjectId;
use streakproj_events::{Event, SubjectEvent};

use super::r#trait::{EventLog, EventLogError};

/// In-memory append-only event log.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    streams: RwLock<HashMap<SubjectId, Vec<SubjectEvent>>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventLog for InMemoryEventLog {
    fn append(
        &self,
        subject_id: SubjectId,
        event_type: &str,
        occurred_at: DateTime<Utc>,
        payload: JsonValue,
    ) -> Result<SubjectEvent, EventLogError> {
        if event_type.trim().is_empty() {
            return Err(EventLogError::InvalidAppend(
                "event type must not be empty".to_string(),
            ));
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventLogError::Storage("lock poisoned".to_string()))?;

        let stream = streams.entry(subject_id).or_default();
        let next = stream.last().map(SubjectEvent::seq).unwrap_or(0) + 1;

        let appended = SubjectEvent::new(
            Uuid::now_v7(),
            subject_id,
            Event::new(next, event_type, occurred_at, payload),
        );
        stream.push(appended.clone());

        Ok(appended)
    }

    fn load_after(
        &self,
        subject_id: SubjectId,
        after_seq: u64,
    ) -> Result<Vec<SubjectEvent>, EventLogError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventLogError::Storage("lock poisoned".to_string()))?;

        Ok(streams
            .get(&subject_id)
            .map(|stream| {
                stream
                    .iter()
                    .filter(|e| e.seq() > after_seq)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
