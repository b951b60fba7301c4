//! Event decoding and snapshot persistence.
//!
//! A raw log is classified by its signature topic into [`EventKind`],
//! decoded into a typed [`LendingEvent`], validated, and finally turned into
//! at most one snapshot insert by [`EventProcessor`].

pub mod events;
pub mod processor;

pub use events::{DecodeError, EventKind, LendingEvent};
pub use processor::{EventProcessor, ProcessOutcome};
