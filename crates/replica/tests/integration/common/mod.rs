//! Shared fixtures for replica integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use strand_replica::{
	DocumentListener, ListenerId, MemoryDocument, MutableDocument, PreparingIndicator, ReplicaConfig,
	ReplicaDirectory,
};
use strand_primitives::Rope;
use strand_store::{RecordId, Store};

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Directory over a fresh store with consistency checks on.
pub fn directory() -> ReplicaDirectory {
	init_tracing();
	let config = ReplicaConfig {
		consistency_checks: true,
		..ReplicaConfig::default()
	};
	ReplicaDirectory::new(Arc::new(Store::new()), config)
}

/// In-memory document, plus the same allocation as a trait object.
pub fn memory_doc(text: &str) -> (Arc<MemoryDocument>, Arc<dyn MutableDocument>) {
	let doc = Arc::new(MemoryDocument::new(text));
	let dyn_doc: Arc<dyn MutableDocument> = doc.clone();
	(doc, dyn_doc)
}

/// Spins until `cond` holds or a generous deadline passes.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
	let deadline = Instant::now() + Duration::from_secs(10);
	while Instant::now() < deadline {
		if cond() {
			return true;
		}
		std::thread::sleep(Duration::from_millis(2));
	}
	cond()
}

pub fn record_exists(directory: &ReplicaDirectory, id: RecordId) -> bool {
	directory.store().latest().contains(id)
}

/// Counts indicator callbacks.
#[derive(Default)]
pub struct CountingIndicator {
	pub preparing: AtomicUsize,
	pub prepared: AtomicUsize,
}

impl PreparingIndicator for CountingIndicator {
	fn preparing(&self, _record: RecordId) {
		self.preparing.fetch_add(1, Ordering::SeqCst);
	}

	fn prepared(&self, _record: RecordId) {
		self.prepared.fetch_add(1, Ordering::SeqCst);
	}
}

/// Document that misreports its text once `lie` is set.
pub struct LyingDocument {
	pub inner: MemoryDocument,
	pub lie: AtomicBool,
}

impl LyingDocument {
	pub fn new(text: &str) -> Self {
		Self {
			inner: MemoryDocument::new(text),
			lie: AtomicBool::new(false),
		}
	}

	fn distort(&self, text: Rope) -> Rope {
		if !self.lie.load(Ordering::SeqCst) {
			return text;
		}
		let mut text = text;
		text.insert(text.len_chars(), "?");
		text
	}
}

impl MutableDocument for LyingDocument {
	fn text(&self) -> Rope {
		self.distort(self.inner.text())
	}

	fn modification_stamp(&self) -> i64 {
		self.inner.modification_stamp()
	}

	fn text_and_stamp(&self) -> (Rope, i64) {
		let (text, stamp) = self.inner.text_and_stamp();
		(self.distort(text), stamp)
	}

	fn add_listener(&self, listener: DocumentListener) -> ListenerId {
		self.inner.add_listener(listener)
	}

	fn remove_listener(&self, id: ListenerId) -> bool {
		self.inner.remove_listener(id)
	}
}
