//! Optimistic concurrency token for projection checkpoints.

/// Expectation about the stored checkpoint (`applied_seq`) when persisting a state.
///
/// Writers pass the `applied_seq` they loaded; the store rejects the write if
/// another writer advanced the checkpoint in between. This is how updates to a
/// single subject are serialized without a lock inside the fold.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip the checkpoint match. Used to replace a stored state that can no longer be
    /// read; stores still refuse a write that lowers `applied_seq`.
    Any,
    /// Require the stored checkpoint to be exactly this value (0 = no state stored).
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }
}
