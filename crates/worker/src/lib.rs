//! Shared worker runtime primitives.
//!
//! Work is classified by [`TaskClass`] for tracing, spawned on the ambient
//! Tokio runtime (or a lazily-built global one), cancelled through
//! generation-scoped tokens, and serialized through [`SerialLane`]s where
//! ordering matters.

mod class;
mod lane;
mod spawn;
mod token;

pub use class::TaskClass;
pub use lane::SerialLane;
pub use spawn::{spawn, spawn_blocking};
pub use token::{GenerationClock, GenerationToken};
