//! Operation-based text edits.
//!
//! A [`ChangeSet`] describes one edit as retain/delete/insert runs over a source
//! document. Changesets apply to a [`Rope`](crate::Rope), map positions through
//! the edit, compose sequentially, and transform (rebase) over a concurrent edit.

mod changeset;
mod cursor;
mod types;


pub use changeset::ChangeSet;
pub use types::{Bias, Insertion, Operation};
