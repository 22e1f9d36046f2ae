//! `streakproj-core`: shared building blocks.
//!
//! This crate contains **pure** primitives (no infrastructure concerns): identifiers,
//! the domain error model, and the optimistic concurrency token used at the
//! persistence boundary.

pub mod error;
pub mod id;
pub mod version;

pub use error::DomainError;
pub use id::SubjectId;
pub use version::ExpectedVersion;
