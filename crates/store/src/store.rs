use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::context::{self, FrameKind, SnapshotScope};
use crate::{RecordId, Snapshot, StoreError, Transaction};

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

enum Ambient<R> {
	Pinned(Arc<Snapshot<R>>),
	Change(Rc<RefCell<Transaction<R>>>),
}

/// Versioned, snapshot-isolated record store.
///
/// Any number of threads may read the latest committed snapshot concurrently.
/// Writers are serialized: one change scope commits at a time.
pub struct Store<R> {
	id: u64,
	latest: ArcSwap<Snapshot<R>>,
	writer: Mutex<()>,
}

impl<R: Send + Sync + 'static> Default for Store<R> {
	fn default() -> Self {
		Self::new()
	}
}

impl<R: Send + Sync + 'static> Store<R> {
	/// Creates an empty store at version 0.
	pub fn new() -> Self {
		Self {
			id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
			latest: ArcSwap::from_pointee(Snapshot::default()),
			writer: Mutex::new(()),
		}
	}

	/// Returns the latest committed snapshot. Never blocks on writers.
	pub fn latest(&self) -> Arc<Snapshot<R>> {
		self.latest.load_full()
	}

	/// Version of the latest committed snapshot.
	pub fn version(&self) -> u64 {
		self.latest.load().version()
	}

	/// Pins the latest snapshot for every read on this thread until the guard drops.
	pub fn pin(&self) -> SnapshotScope {
		if context::innermost(self.id).is_some() {
			return SnapshotScope::new(None);
		}
		let snapshot: Rc<dyn Any> = Rc::new(self.latest.load_full());
		SnapshotScope::new(Some(context::push(self.id, FrameKind::Pinned, snapshot)))
	}

	/// Reads a record through the ambient context.
	///
	/// Inside a change scope this sees the transaction's own writes; inside a
	/// pinned scope it sees the pinned snapshot; otherwise the latest commit.
	pub fn read(&self, id: RecordId) -> Option<Arc<R>> {
		match self.ambient() {
			Some(Ambient::Change(tx)) => tx.borrow().read(id),
			Some(Ambient::Pinned(snapshot)) => snapshot.get(id).cloned(),
			None => self.latest.load().get(id).cloned(),
		}
	}

	/// Returns true if the current thread is inside a change scope of this store.
	pub fn in_change(&self) -> bool {
		matches!(self.ambient(), Some(Ambient::Change(_)))
	}

	/// Runs `f` as one atomic write transaction.
	///
	/// Writes made through [`Self::with_tx`] inside `f` commit together when `f`
	/// returns `Ok`, and are discarded when it returns `Err` or panics. A nested
	/// call on the same thread joins the enclosing transaction.
	pub fn change<T, E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
		if self.in_change() {
			return f();
		}

		let _writer = self.writer.lock();
		let tx = Rc::new(RefCell::new(Transaction::new(self.latest.load_full())));
		let result = {
			let frame: Rc<dyn Any> = tx.clone();
			let _frame = context::push(self.id, FrameKind::Change, frame);
			f()
		};

		match result {
			Ok(value) => {
				self.commit(&tx);
				Ok(value)
			}
			Err(err) => {
				tracing::debug!(store = self.id, "store.change.discarded");
				Err(err)
			}
		}
	}

	/// Runs `f` against the ambient transaction of this store.
	pub fn with_tx<T>(&self, f: impl FnOnce(&mut Transaction<R>) -> T) -> Result<T, StoreError> {
		let Some(Ambient::Change(tx)) = self.ambient() else {
			return Err(StoreError::NotInTransaction);
		};
		let mut tx = tx.borrow_mut();
		Ok(f(&mut tx))
	}

	fn commit(&self, tx: &RefCell<Transaction<R>>) {
		let writes = tx.borrow_mut().take_writes();
		if writes.is_empty() {
			return;
		}
		let count = writes.len();
		let next = self.latest.load().successor(writes);
		let version = next.version();
		self.latest.store(Arc::new(next));
		tracing::trace!(store = self.id, version, writes = count, "store.commit");
	}

	fn ambient(&self) -> Option<Ambient<R>> {
		let (kind, value) = context::innermost(self.id)?;
		match kind {
			FrameKind::Change => value.downcast::<RefCell<Transaction<R>>>().ok().map(Ambient::Change),
			FrameKind::Pinned => value
				.downcast::<Arc<Snapshot<R>>>()
				.ok()
				.map(|snapshot| Ambient::Pinned(Arc::clone(&snapshot))),
		}
	}
}
