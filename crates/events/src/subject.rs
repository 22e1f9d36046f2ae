use streakproj_core::SubjectId;

use crate::SubjectEvent;

/// Helper trait for subject-scoped messages.
///
/// Workers use this to pin themselves to one subject, or to route a message to the
/// state it belongs to.
///
/// ```ignore
/// let worker = ProjectionWorker::spawn("projector", &bus, SubjectFilter::Only(subject_id), handler)?;
/// // Worker ignores events for other subjects
/// ```
pub trait SubjectScoped {
    fn subject_id(&self) -> SubjectId;
}

impl SubjectScoped for SubjectEvent {
    fn subject_id(&self) -> SubjectId {
        SubjectEvent::subject_id(self)
    }
}
