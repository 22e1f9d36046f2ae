use thiserror::Error;

/// Why a batch could not be folded.
///
/// Every variant is raised before any event of the batch is applied, so the caller's
/// stored checkpoint is never advanced past a rejected batch. The projector never
/// retries on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    /// An event has an invalid sequence number or shape. Retryable after the data is fixed.
    #[error("malformed event (seq={seq}): {reason}")]
    MalformedEvent { seq: u64, reason: String },

    /// The stored state was produced by different fold logic and needs a rebuild.
    #[error("incompatible projection state: stored by '{found}', projector is '{expected}'")]
    IncompatibleState { found: String, expected: String },

    /// An event's timestamp cannot be attributed to a calendar day for this subject.
    #[error("cannot resolve contribution day: {0}")]
    ClockAmbiguity(String),
}

impl ProjectionError {
    pub fn malformed(seq: u64, reason: impl Into<String>) -> Self {
        Self::MalformedEvent {
            seq,
            reason: reason.into(),
        }
    }
}
