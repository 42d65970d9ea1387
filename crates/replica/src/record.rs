use strand_primitives::{ChangeSet, Rope};

use crate::anchor::AnchorStore;
use crate::error::Result;
use crate::log::{OperationId, OperationLog, Revision};

/// Versioned state of one replicated document.
///
/// Records are immutable. Every accepted edit produces a successor holding the
/// new text, the caller's stamp, the extended log, and the re-derived anchors,
/// which the store commits as one value.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
	text: Rope,
	mod_stamp: i64,
	log: OperationLog,
	anchors: AnchorStore,
}

impl DocumentRecord {
	pub(crate) fn new(text: Rope, mod_stamp: i64, retention: usize) -> Self {
		Self {
			log: OperationLog::new(text.clone(), retention),
			text,
			mod_stamp,
			anchors: AnchorStore::new(),
		}
	}

	/// Current text.
	pub fn text(&self) -> &Rope {
		&self.text
	}

	/// Stamp supplied with the last accepted edit (or at creation).
	pub fn mod_stamp(&self) -> i64 {
		self.mod_stamp
	}

	/// Log of applied operations.
	pub fn log(&self) -> &OperationLog {
		&self.log
	}

	/// Live anchors.
	pub fn anchors(&self) -> &AnchorStore {
		&self.anchors
	}

	/// Revision of the current text.
	pub fn revision(&self) -> Revision {
		self.log.head()
	}

	/// Produces the successor record for an operation observed at `observed`.
	pub(crate) fn apply(&self, id: OperationId, observed: Revision, changes: &ChangeSet, mod_stamp: i64) -> Result<Self> {
		let rebased = self.log.rebase(observed, changes)?;
		let mut text = self.text.clone();
		rebased.apply(&mut text);
		let anchors = self.anchors.rederive(&self.text, &text, &rebased);
		let mut log = self.log.clone();
		log.append(id, rebased);
		Ok(Self {
			text,
			mod_stamp,
			log,
			anchors,
		})
	}

	pub(crate) fn with_anchors(&self, anchors: AnchorStore) -> Self {
		Self {
			anchors,
			..self.clone()
		}
	}
}
