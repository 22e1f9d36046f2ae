use std::collections::BTreeSet;

use streakproj_events::EVENT_POST_CREATED;

/// Which event types count as a contribution.
///
/// Only qualifying events touch `last_contribution_date` / `current_day_post_count`;
/// every other event merely advances the checkpoint. The default policy counts
/// published posts only: edits and deletions are not contributions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifyingPolicy {
    types: BTreeSet<String>,
}

impl QualifyingPolicy {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            types: types.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
        self.types.insert(event_type.into());
        self
    }

    pub fn qualifies(&self, event_type: &str) -> bool {
        self.types.contains(event_type)
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for QualifyingPolicy {
    fn default() -> Self {
        Self::new([EVENT_POST_CREATED])
    }
}
