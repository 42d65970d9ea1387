//! Core types for replicated text editing: ranges, rope helpers, and changesets.

/// Operation-based edits: apply, position mapping, composition, and rebase.
pub mod operation;
/// Character-indexed text ranges.
pub mod range;
/// Rope utilities and line arithmetic.
pub mod rope;

pub use operation::{Bias, ChangeSet, Insertion, Operation};
pub use range::{CharIdx, CharLen, TextRange};
pub use ropey::{Rope, RopeSlice};
