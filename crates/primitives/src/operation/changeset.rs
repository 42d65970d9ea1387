use super::cursor::{Head, OpCursor};
use super::types::{Bias, Insertion, Operation};
use crate::Rope;
use crate::range::{CharIdx, CharLen};

/// A sequence of operations representing a set of changes to a document.
///
/// ChangeSet uses Operational Transformation (OT) principles to represent document
/// changes as a sequence of retain, delete, and insert operations. This representation
/// enables composition, rebasing over concurrent changes, and position mapping.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
	changes: Vec<Operation>,
	/// Length of the source document before changes.
	len: usize,
	/// Length of the document after applying changes.
	len_after: usize,
}

impl ChangeSet {
	/// Creates a changeset that keeps a document of `len` characters unchanged.
	pub fn identity(len: CharLen) -> Self {
		let mut cs = Self::default();
		cs.retain(len);
		cs
	}

	/// Creates a changeset replacing `[start, end)` of a `doc_len` document with `text`.
	///
	/// # Panics
	/// Debug builds assert `start <= end <= doc_len`; callers validate bounds first.
	pub fn replace(doc_len: CharLen, start: CharIdx, end: CharIdx, text: &str) -> Self {
		debug_assert!(start <= end && end <= doc_len, "replace {start}..{end} outside 0..{doc_len}");
		let mut cs = Self::default();
		cs.retain(start);
		cs.delete(end - start);
		cs.insert(text);
		cs.retain(doc_len - end);
		cs
	}

	/// Returns the length of the source document (before changes).
	pub fn len(&self) -> usize {
		self.len
	}

	/// Returns the length of the document after applying changes.
	pub fn len_after(&self) -> usize {
		self.len_after
	}

	/// Returns true if this changeset contains no operations.
	pub fn is_empty(&self) -> bool {
		self.changes.is_empty()
	}

	/// Returns true if applying this changeset leaves the document unchanged.
	pub fn is_identity(&self) -> bool {
		self.changes.iter().all(|op| matches!(op, Operation::Retain(_)))
	}

	/// Returns a slice of all operations in this changeset.
	pub fn changes(&self) -> &[Operation] {
		&self.changes
	}

	/// Adds a retain operation, preserving N characters from the source.
	///
	/// Consecutive retain operations are automatically merged.
	pub fn retain(&mut self, n: CharLen) {
		if n == 0 {
			return;
		}

		self.len += n;
		self.len_after += n;

		if let Some(Operation::Retain(count)) = self.changes.last_mut() {
			*count += n;
		} else {
			self.changes.push(Operation::Retain(n));
		}
	}

	/// Adds a delete operation, removing N characters from the source.
	///
	/// Consecutive delete operations are automatically merged.
	pub fn delete(&mut self, n: CharLen) {
		if n == 0 {
			return;
		}

		self.len += n;

		if let Some(Operation::Delete(count)) = self.changes.last_mut() {
			*count += n;
		} else {
			self.changes.push(Operation::Delete(n));
		}
	}

	/// Adds an insert operation at the current position.
	///
	/// Inserts merge with an adjacent insert and are kept ahead of a trailing
	/// delete, so equal edits always have one canonical form.
	pub fn insert(&mut self, text: &str) {
		if text.is_empty() {
			return;
		}

		let ins = Insertion::new(text.to_owned());
		self.len_after += ins.char_len;

		match self.changes.as_mut_slice() {
			[.., Operation::Insert(prev)] | [.., Operation::Insert(prev), Operation::Delete(_)] => {
				prev.text.push_str(&ins.text);
				prev.char_len += ins.char_len;
			}
			[.., last @ Operation::Delete(_)] => {
				let del = std::mem::replace(last, Operation::Insert(ins));
				self.changes.push(del);
			}
			_ => {
				self.changes.push(Operation::Insert(ins));
			}
		}
	}

	/// Applies this changeset to a document, modifying it in place.
	pub fn apply(&self, doc: &mut Rope) {
		debug_assert_eq!(doc.len_chars(), self.len, "changeset applied to a document of the wrong length");
		if self.changes.is_empty() {
			return;
		}

		let mut pos = 0;
		for op in &self.changes {
			match op {
				Operation::Retain(n) => {
					pos += n;
				}
				Operation::Delete(n) => {
					doc.remove(pos..pos + n);
				}
				Operation::Insert(ins) => {
					doc.insert(pos, &ins.text);
					pos += ins.char_len;
				}
			}
		}
	}

	/// Maps a position through this changeset using the specified bias.
	///
	/// Positions inside a deleted span collapse to the point after any text
	/// inserted in its place.
	pub fn map_pos(&self, pos: CharIdx, bias: Bias) -> CharIdx {
		let mut old_pos = 0;
		let mut new_pos = 0;

		for op in &self.changes {
			if old_pos > pos {
				break;
			}

			match op {
				Operation::Retain(n) => {
					if old_pos + n > pos {
						return new_pos + (pos - old_pos);
					}
					old_pos += n;
					new_pos += n;
				}
				Operation::Delete(n) => {
					if old_pos + n > pos {
						return new_pos;
					}
					old_pos += n;
				}
				Operation::Insert(ins) => {
					if !(old_pos == pos && bias == Bias::Left) {
						new_pos += ins.char_len;
					}
				}
			}
		}

		new_pos + (pos - old_pos)
	}

	/// Composes two changesets into a single equivalent changeset.
	///
	/// The result is equivalent to applying `self` then `other`.
	///
	/// # Debug Assertions
	/// Asserts that `self.len_after == other.len` (the changesets must be compatible).
	pub fn compose(&self, other: &ChangeSet) -> ChangeSet {
		debug_assert_eq!(self.len_after, other.len);

		let mut result = ChangeSet::default();
		let mut a = OpCursor::new(&self.changes);
		let mut b = OpCursor::new(&other.changes);

		loop {
			match (a.peek(), b.peek()) {
				(None, None) => break,
				(Some(Head::Delete(n)), _) => {
					result.delete(n);
					a.next();
				}
				(_, Some(Head::Insert(text, _))) => {
					result.insert(text);
					b.next();
				}
				(None, _) | (_, None) => {
					debug_assert!(false, "compose over mismatched lengths");
					break;
				}
				(Some(ha), Some(hb)) => {
					let n = ha.len().min(hb.len());
					match (a.take(n), b.take(n)) {
						(Some(Head::Retain(_)), Some(Head::Retain(_))) => result.retain(n),
						(Some(Head::Retain(_)), Some(Head::Delete(_))) => result.delete(n),
						(Some(Head::Insert(text, _)), Some(Head::Retain(_))) => result.insert(text),
						(Some(Head::Insert(..)), Some(Head::Delete(_))) => {}
						_ => unreachable!(),
					}
				}
			}
		}

		result
	}

	/// Rebases this changeset over `other`, which was applied to the same source first.
	///
	/// The returned changeset applies to the document produced by `other` and keeps
	/// the intent of `self`: text `other` deleted stays deleted, and text `other`
	/// inserted is retained. When both insert at the same position, `bias`
	/// decides whose insertion comes first: [`Bias::Right`] places ours after theirs.
	///
	/// # Debug Assertions
	/// Asserts that `self.len == other.len`.
	pub fn transform(&self, other: &ChangeSet, bias: Bias) -> ChangeSet {
		debug_assert_eq!(self.len, other.len);

		let mut result = ChangeSet::default();
		let mut a = OpCursor::new(&self.changes);
		let mut b = OpCursor::new(&other.changes);

		loop {
			match (a.peek(), b.peek()) {
				(None, None) => break,
				(Some(Head::Insert(..)), Some(Head::Insert(_, len))) if bias == Bias::Right => {
					result.retain(len);
					b.next();
				}
				(Some(Head::Insert(text, _)), _) => {
					result.insert(text);
					a.next();
				}
				(_, Some(Head::Insert(_, len))) => {
					result.retain(len);
					b.next();
				}
				(None, _) | (_, None) => {
					debug_assert!(false, "transform over mismatched lengths");
					break;
				}
				(Some(ha), Some(hb)) => {
					let n = ha.len().min(hb.len());
					match (a.take(n), b.take(n)) {
						(Some(Head::Retain(_)), Some(Head::Retain(_))) => result.retain(n),
						(Some(Head::Delete(_)), Some(Head::Retain(_))) => result.delete(n),
						(Some(Head::Retain(_) | Head::Delete(_)), Some(Head::Delete(_))) => {}
						_ => unreachable!(),
					}
				}
			}
		}

		result
	}
}
