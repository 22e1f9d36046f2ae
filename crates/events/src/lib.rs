//! `streakproj-events`: event records and the distribution plumbing around them.
//!
//! - [`Event`]: the per-subject fact folded by the projector
//! - [`SubjectEvent`]: an event addressed to its subject (what logs store and buses carry)
//! - [`EventBus`]: at-least-once pub/sub abstraction, with an in-memory implementation

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod subject;

pub use bus::{EventBus, Subscription};
pub use envelope::SubjectEvent;
pub use event::{EVENT_POST_CREATED, EVENT_POST_DELETED, EVENT_POST_EDITED, Event};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use subject::SubjectScoped;
