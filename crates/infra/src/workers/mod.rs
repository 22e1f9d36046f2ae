//! Background workers driving projections from a bus.

pub mod projection_worker;

pub use projection_worker::{ProjectionWorker, SubjectFilter, WorkerHandle};
