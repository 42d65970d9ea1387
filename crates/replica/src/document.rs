//! Document-like facade over one [`DocumentRecord`].

use std::fmt;
use std::sync::Arc;

use strand_primitives::{ChangeSet, CharIdx, Rope, TextRange, rope};
use strand_store::{RecordId, Store};

use crate::anchor::{Anchor, AnchorId, AnchorQuery, Stickiness};
use crate::error::{ReplicaError, Result, check_range};
use crate::log::{OperationId, Revision};
use crate::record::DocumentRecord;

/// Reads and mutates one replicated document through the versioned store.
///
/// Reads observe the ambient change scope or pinned snapshot when one is
/// active, and the latest committed record otherwise. Mutations require an
/// enclosing [`Self::change`] scope and commit with it.
#[derive(Clone)]
pub struct ReplicaDocument {
	store: Arc<Store<DocumentRecord>>,
	id: RecordId,
}

impl fmt::Debug for ReplicaDocument {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ReplicaDocument").field("id", &self.id).finish_non_exhaustive()
	}
}

impl ReplicaDocument {
	/// Creates a view of the record stored under `id`. The record need not exist yet.
	pub fn new(store: Arc<Store<DocumentRecord>>, id: RecordId) -> Self {
		Self { store, id }
	}

	/// Returns the record, creating it from `text` and `mod_stamp` if absent.
	pub fn materialize(
		store: Arc<Store<DocumentRecord>>,
		id: RecordId,
		text: Rope,
		mod_stamp: i64,
		retention: usize,
	) -> Result<Self> {
		let created = store.change(|| {
			store.with_tx(|tx| {
				if tx.contains(id) {
					return false;
				}
				tx.write(id, DocumentRecord::new(text, mod_stamp, retention));
				true
			})
		})?;
		tracing::debug!(record = %id, created, "replica.document.materialized");
		Ok(Self::new(store, id))
	}

	/// Id of the backing record.
	pub fn id(&self) -> RecordId {
		self.id
	}

	/// Store holding the backing record.
	pub fn store(&self) -> &Arc<Store<DocumentRecord>> {
		&self.store
	}

	/// Returns true if the backing record exists in the current view.
	pub fn exists(&self) -> bool {
		self.store.read(self.id).is_some()
	}

	/// Runs `f` in a change scope of the backing store.
	pub fn change<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
		self.store.change(f)
	}

	/// Runs `f` against one consistent view of the record.
	pub fn read<T>(&self, f: impl FnOnce(&DocumentRecord) -> T) -> Result<T> {
		let _scope = self.store.pin();
		let record = self.record()?;
		Ok(f(&record))
	}

	/// Current text.
	pub fn text(&self) -> Result<Rope> {
		Ok(self.record()?.text().clone())
	}

	/// Stamp of the last accepted edit.
	pub fn mod_stamp(&self) -> Result<i64> {
		Ok(self.record()?.mod_stamp())
	}

	/// Revision of the current text.
	pub fn revision(&self) -> Result<Revision> {
		Ok(self.record()?.revision())
	}

	/// Text covered by `range`.
	pub fn substring(&self, range: TextRange) -> Result<String> {
		let text = self.text()?;
		check_range(range, text.len_chars())?;
		rope::substring(text.slice(..), range).ok_or(ReplicaError::OutOfRange {
			what: "range end",
			value: range.end,
			limit: text.len_chars(),
		})
	}

	/// Number of lines, counting the empty line after a trailing break.
	pub fn line_count(&self) -> Result<usize> {
		Ok(rope::line_count(self.record()?.text().slice(..)))
	}

	/// Offset where `line` starts.
	pub fn line_start_offset(&self, line: usize) -> Result<CharIdx> {
		let record = self.record()?;
		let text = record.text().slice(..);
		rope::line_start(text, line).ok_or_else(|| line_out_of_range(line, text.len_lines()))
	}

	/// Offset where `line` ends, excluding its line break.
	pub fn line_end_offset(&self, line: usize) -> Result<CharIdx> {
		let record = self.record()?;
		let text = record.text().slice(..);
		rope::line_end(text, line).ok_or_else(|| line_out_of_range(line, text.len_lines()))
	}

	/// Replaces `[start, end)` of the current text with `text`.
	///
	/// Returns the revision the edit produced.
	pub fn replace(&self, start: CharIdx, end: CharIdx, text: &str, mod_stamp: i64) -> Result<Revision> {
		let observed = self.tx_record()?.revision();
		self.replace_from(observed, start, end, text, mod_stamp)
	}

	/// Replaces `[start, end)` of the text as it was at `observed`.
	///
	/// The edit is rebased over every operation applied since, so it lands
	/// where the caller meant it.
	pub fn replace_from(
		&self,
		observed: Revision,
		start: CharIdx,
		end: CharIdx,
		text: &str,
		mod_stamp: i64,
	) -> Result<Revision> {
		let len = self.tx_record()?.log().len_at(observed)?;
		check_range(TextRange { start, end }, len)?;
		let changes = ChangeSet::replace(len, start, end, text);
		self.apply_operation(OperationId::new(), observed, &changes, mod_stamp)
	}

	/// Applies an operation built against the text at `observed`.
	///
	/// Re-applying an id still held by the log is a no-op that returns the
	/// current revision.
	pub fn apply_operation(
		&self,
		id: OperationId,
		observed: Revision,
		changes: &ChangeSet,
		mod_stamp: i64,
	) -> Result<Revision> {
		let record = self.tx_record()?;
		if record.log().contains(id) {
			tracing::trace!(record = %self.id, op = %id, "replica.document.duplicate_operation");
			return Ok(record.revision());
		}
		let next = record.apply(id, observed, changes, mod_stamp)?;
		let revision = next.revision();
		self.store.with_tx(|tx| tx.write(self.id, next))?;
		tracing::trace!(record = %self.id, op = %id, revision, "replica.document.applied");
		Ok(revision)
	}

	/// Adds an anchor over `range` and returns its id.
	pub fn add_anchor(&self, range: TextRange, stickiness: Stickiness) -> Result<AnchorId> {
		let ids = self.add_anchors([(range, stickiness)])?;
		ids.into_iter().next().ok_or(ReplicaError::RecordMissing(self.id))
	}

	/// Adds anchors in one rewrite, returning their ids in order.
	///
	/// Nothing is added when any range is out of bounds.
	pub fn add_anchors(&self, anchors: impl IntoIterator<Item = (TextRange, Stickiness)>) -> Result<Vec<AnchorId>> {
		let record = self.tx_record()?;
		let len = record.text().len_chars();
		let anchors = anchors
			.into_iter()
			.map(|(range, stickiness)| {
				check_range(range, len)?;
				Ok(Anchor::new(range).with_stickiness(stickiness))
			})
			.collect::<Result<Vec<_>>>()?;
		let mut store = record.anchors().clone();
		let ids = store.insert_batch(anchors);
		self.store.with_tx(|tx| tx.write(self.id, record.with_anchors(store)))?;
		Ok(ids)
	}

	/// Removes an anchor. Returns whether it existed.
	pub fn remove_anchor(&self, id: AnchorId) -> Result<bool> {
		let record = self.tx_record()?;
		let mut store = record.anchors().clone();
		if store.remove(id).is_none() {
			return Ok(false);
		}
		self.store.with_tx(|tx| tx.write(self.id, record.with_anchors(store)))?;
		Ok(true)
	}

	/// Current state of one anchor.
	pub fn anchor(&self, id: AnchorId) -> Result<Option<Anchor>> {
		Ok(self.record()?.anchors().get(id))
	}

	/// Lazily yields `(id, range)` of every anchor intersecting `range`.
	///
	/// All results come from the record as it was when the query was made.
	pub fn query_anchors(&self, range: TextRange) -> Result<AnchorQuery> {
		let record = self.record()?;
		check_range(range, record.text().len_chars())?;
		Ok(record.anchors().query(range))
	}

	/// Deletes the backing record. Returns whether it existed.
	pub fn delete(&self) -> Result<bool> {
		let existed = self.store.change(|| self.store.with_tx(|tx| tx.delete(self.id)))?;
		tracing::debug!(record = %self.id, existed, "replica.document.deleted");
		Ok(existed)
	}

	fn record(&self) -> Result<Arc<DocumentRecord>> {
		self.store.read(self.id).ok_or(ReplicaError::RecordMissing(self.id))
	}

	fn tx_record(&self) -> Result<Arc<DocumentRecord>> {
		self.store
			.with_tx(|tx| tx.read(self.id))?
			.ok_or(ReplicaError::RecordMissing(self.id))
	}
}

fn line_out_of_range(line: usize, count: usize) -> ReplicaError {
	ReplicaError::OutOfRange {
		what: "line",
		value: line,
		limit: count.saturating_sub(1),
	}
}
