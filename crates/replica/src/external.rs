//! The mutable document a replica mirrors.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use strand_primitives::{CharIdx, CharLen, Rope, TextRange};

use crate::error::{Result, check_range};

/// One edit of a [`MutableDocument`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEvent {
	/// Start of the replaced span.
	pub offset: CharIdx,
	/// Length of the replaced span before the edit.
	pub old_len: CharLen,
	/// Text that replaced the span.
	pub fragment: String,
	/// Stamp of the document after the edit.
	pub mod_stamp: i64,
}

/// Callback invoked for every edit, in edit order.
pub type DocumentListener = Arc<dyn Fn(&DocumentEvent) + Send + Sync>;

/// Handle for removing a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// UI-facing document whose edits a replica follows.
pub trait MutableDocument: Send + Sync {
	/// Current full text.
	fn text(&self) -> Rope;

	/// Stamp of the last edit. Increases with every edit.
	fn modification_stamp(&self) -> i64;

	/// Text and stamp observed together.
	fn text_and_stamp(&self) -> (Rope, i64) {
		(self.text(), self.modification_stamp())
	}

	/// Installs a change listener.
	fn add_listener(&self, listener: DocumentListener) -> ListenerId;

	/// Removes a listener. Returns whether it was installed.
	fn remove_listener(&self, id: ListenerId) -> bool;
}

/// In-memory [`MutableDocument`].
///
/// Edits are serialized and listeners run synchronously on the editing
/// thread before the next edit starts.
pub struct MemoryDocument {
	state: RwLock<(Rope, i64)>,
	listeners: Mutex<Vec<(ListenerId, DocumentListener)>>,
	next_listener: AtomicU64,
	edit: Mutex<()>,
}

impl fmt::Debug for MemoryDocument {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state.read();
		f.debug_struct("MemoryDocument")
			.field("len", &state.0.len_chars())
			.field("mod_stamp", &state.1)
			.finish_non_exhaustive()
	}
}

impl MemoryDocument {
	/// Creates a document holding `text` at stamp 0.
	pub fn new(text: &str) -> Self {
		Self {
			state: RwLock::new((Rope::from(text), 0)),
			listeners: Mutex::new(Vec::new()),
			next_listener: AtomicU64::new(0),
			edit: Mutex::new(()),
		}
	}

	/// Replaces `[start, end)` with `text` and notifies listeners.
	///
	/// Returns the new stamp.
	pub fn replace(&self, start: CharIdx, end: CharIdx, text: &str) -> Result<i64> {
		let _edit = self.edit.lock();
		let mod_stamp = {
			let mut state = self.state.write();
			check_range(TextRange { start, end }, state.0.len_chars())?;
			state.0.remove(start..end);
			state.0.insert(start, text);
			state.1 += 1;
			state.1
		};

		let event = DocumentEvent {
			offset: start,
			old_len: end - start,
			fragment: text.to_string(),
			mod_stamp,
		};
		let listeners: Vec<DocumentListener> = self
			.listeners
			.lock()
			.iter()
			.map(|(_, listener)| Arc::clone(listener))
			.collect();
		for listener in listeners {
			listener(&event);
		}
		Ok(mod_stamp)
	}

	/// Inserts `text` at `offset`.
	pub fn insert(&self, offset: CharIdx, text: &str) -> Result<i64> {
		self.replace(offset, offset, text)
	}

	/// Deletes `[start, end)`.
	pub fn delete(&self, start: CharIdx, end: CharIdx) -> Result<i64> {
		self.replace(start, end, "")
	}

	/// Number of installed listeners.
	pub fn listener_count(&self) -> usize {
		self.listeners.lock().len()
	}
}

impl MutableDocument for MemoryDocument {
	fn text(&self) -> Rope {
		self.state.read().0.clone()
	}

	fn modification_stamp(&self) -> i64 {
		self.state.read().1
	}

	fn text_and_stamp(&self) -> (Rope, i64) {
		let state = self.state.read();
		(state.0.clone(), state.1)
	}

	fn add_listener(&self, listener: DocumentListener) -> ListenerId {
		let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
		self.listeners.lock().push((id, listener));
		id
	}

	fn remove_listener(&self, id: ListenerId) -> bool {
		let mut listeners = self.listeners.lock();
		let before = listeners.len();
		listeners.retain(|(installed, _)| *installed != id);
		listeners.len() != before
	}
}
