//! Projection state persistence.
//!
//! Stores hold one [`ProjectionState`](streakproj_projector::ProjectionState) per
//! subject and serialize concurrent writers with a conditional write keyed on the
//! stored `applied_seq` (see [`ExpectedVersion`](streakproj_core::ExpectedVersion)).

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStateStore;
pub use postgres::PostgresStateStore;
pub use r#trait::{StateStore, StateStoreError};
