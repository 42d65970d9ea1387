//! Bounded, append-only log of applied operations.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use strand_primitives::{Bias, ChangeSet, CharLen, Rope};
use uuid::Uuid;

use crate::error::{ReplicaError, Result};

/// Number of operations ever applied to a record. The initial text is revision 0.
pub type Revision = u64;

/// Unique identity of one edit, used to make log appends idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(Uuid);

impl OperationId {
	/// Generates a fresh operation id.
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for OperationId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for OperationId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}

/// One applied operation.
#[derive(Debug, PartialEq, Eq)]
pub struct LogEntry {
	/// Identity of the edit.
	pub id: OperationId,
	/// The operation as it was applied, already rebased onto its predecessor.
	pub changes: ChangeSet,
}

/// Ordered log of the operations applied to one record.
///
/// Only the newest `retention` entries are kept. Older entries are folded into
/// the origin text, so [`Self::replay`] always reproduces the head text.
#[derive(Debug, Clone)]
pub struct OperationLog {
	origin: Rope,
	origin_revision: Revision,
	entries: VecDeque<Arc<LogEntry>>,
	retention: usize,
}

impl OperationLog {
	/// Creates an empty log rooted at `origin`.
	pub fn new(origin: Rope, retention: usize) -> Self {
		Self {
			origin,
			origin_revision: 0,
			entries: VecDeque::new(),
			retention: retention.max(1),
		}
	}

	/// Revision reached after the last retained entry.
	pub fn head(&self) -> Revision {
		self.origin_revision + self.entries.len() as Revision
	}

	/// Oldest revision an edit can still be rebased from.
	pub fn oldest(&self) -> Revision {
		self.origin_revision
	}

	/// Text at [`Self::oldest`].
	pub fn origin(&self) -> &Rope {
		&self.origin
	}

	/// Number of retained entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns true if no entry is retained.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Returns true if the retained window holds an entry with this id.
	pub fn contains(&self, id: OperationId) -> bool {
		self.entries.iter().any(|entry| entry.id == id)
	}

	/// Retained entries, oldest first.
	pub fn entries(&self) -> impl DoubleEndedIterator<Item = &LogEntry> + '_ {
		self.entries.iter().map(Arc::as_ref)
	}

	/// Length of the text at `revision`.
	pub fn len_at(&self, revision: Revision) -> Result<CharLen> {
		let offset = self.offset_of(revision)?;
		Ok(match offset.checked_sub(1) {
			None => self.origin.len_chars(),
			Some(idx) => self.entries[idx].changes.len_after(),
		})
	}

	/// Composes every operation applied after `revision` into one changeset.
	///
	/// Returns `None` when `revision` is the head.
	pub fn since(&self, revision: Revision) -> Result<Option<ChangeSet>> {
		let offset = self.offset_of(revision)?;
		let mut later = self.entries.range(offset..);
		let Some(first) = later.next() else {
			return Ok(None);
		};
		let composed = later.fold(first.changes.clone(), |acc, entry| acc.compose(&entry.changes));
		Ok(Some(composed))
	}

	/// Rebases `changes`, built against the text at `observed`, onto the head.
	///
	/// Logged operations win insertion ties: text they inserted at the same
	/// position stays before the rebased insertion.
	pub fn rebase(&self, observed: Revision, changes: &ChangeSet) -> Result<ChangeSet> {
		let expected = self.len_at(observed)?;
		if changes.len() != expected {
			return Err(ReplicaError::OutOfRange {
				what: "operation length",
				value: changes.len(),
				limit: expected,
			});
		}
		Ok(match self.since(observed)? {
			None => changes.clone(),
			Some(later) => {
				tracing::trace!(observed, head = self.head(), "replica.log.rebase");
				changes.transform(&later, Bias::Right)
			}
		})
	}

	/// Appends an operation that applies to the head text.
	///
	/// Returns `false` without changing anything when `id` is already retained.
	pub fn append(&mut self, id: OperationId, changes: ChangeSet) -> bool {
		if self.contains(id) {
			return false;
		}
		self.entries.push_back(Arc::new(LogEntry { id, changes }));
		while self.entries.len() > self.retention {
			if let Some(dropped) = self.entries.pop_front() {
				dropped.changes.apply(&mut self.origin);
				self.origin_revision += 1;
			}
		}
		true
	}

	/// Rebuilds the head text by applying every retained entry to the origin.
	pub fn replay(&self) -> Rope {
		let mut text = self.origin.clone();
		for entry in &self.entries {
			entry.changes.apply(&mut text);
		}
		text
	}

	fn offset_of(&self, revision: Revision) -> Result<usize> {
		if revision < self.origin_revision {
			return Err(ReplicaError::StaleRevision {
				revision,
				oldest: self.origin_revision,
			});
		}
		let head = self.head();
		if revision > head {
			return Err(ReplicaError::UnknownRevision { revision, head });
		}
		Ok((revision - self.origin_revision) as usize)
	}
}
