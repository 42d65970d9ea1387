//! Error types for replica reads and mutations.

use strand_primitives::TextRange;
use strand_store::{RecordId, StoreError};
use thiserror::Error;

use crate::log::Revision;

/// Errors surfaced by [`ReplicaDocument`](crate::ReplicaDocument) and the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicaError {
	/// A mutation ran outside a change scope of the backing store.
	#[error("mutation attempted outside a change scope")]
	NotInTransaction,

	/// An offset, line, or range lies outside the current text.
	#[error("{what} {value} out of range (limit {limit})")]
	OutOfRange {
		/// Which argument was rejected.
		what: &'static str,
		/// The rejected value.
		value: usize,
		/// The largest accepted value.
		limit: usize,
	},

	/// An edit was observed against a revision no longer kept in the log.
	#[error("revision {revision} is older than the retained log (oldest {oldest})")]
	StaleRevision {
		/// Revision the caller observed.
		revision: Revision,
		/// Oldest revision the log can still rebase from.
		oldest: Revision,
	},

	/// An edit claims to be based on a revision the log has not reached.
	#[error("revision {revision} is ahead of the log head {head}")]
	UnknownRevision {
		/// Revision the caller observed.
		revision: Revision,
		/// Current head of the log.
		head: Revision,
	},

	/// The record has not been materialized or was already deleted.
	#[error("document record {0} does not exist")]
	RecordMissing(RecordId),

	/// The external document and the replica disagree after a sync.
	#[error("replica diverged from its document:\n  document: {expected:?}\n  replica:  {actual:?}")]
	ConsistencyViolation {
		/// Text of the external document.
		expected: String,
		/// Text of the replica.
		actual: String,
	},
}

impl From<StoreError> for ReplicaError {
	fn from(err: StoreError) -> Self {
		match err {
			StoreError::NotInTransaction => Self::NotInTransaction,
		}
	}
}

/// Result type for replica operations.
pub type Result<T> = std::result::Result<T, ReplicaError>;

/// Rejects ranges that are inverted or extend past `len`.
pub(crate) fn check_range(range: TextRange, len: usize) -> Result<()> {
	if range.end > len {
		return Err(ReplicaError::OutOfRange {
			what: "range end",
			value: range.end,
			limit: len,
		});
	}
	if range.start > range.end {
		return Err(ReplicaError::OutOfRange {
			what: "range start",
			value: range.start,
			limit: range.end,
		});
	}
	Ok(())
}
