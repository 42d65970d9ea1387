//! Keeps a replica in step with its mutable document.
//!
//! Every edit of the document becomes one job on a per-document serial lane.
//! A job waits for the record to exist, replays the edit in a change scope,
//! optionally compares both texts, and then calls the repaint hook.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use strand_store::RecordId;
use strand_worker::{GenerationToken, SerialLane, TaskClass};

use crate::document::ReplicaDocument;
use crate::error::ReplicaError;
use crate::external::{DocumentEvent, ListenerId, MutableDocument};
use crate::materialize::Materialization;

/// Callback run after each successful sync, with the synced record.
pub type RepaintHook = Arc<dyn Fn(RecordId) + Send + Sync>;

/// Lifecycle phase of a [`DocumentSynchronizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
	/// Listening, nothing queued.
	Attached,
	/// Listening, edits queued or in flight.
	Syncing,
	/// A sync failed; later edits are ignored.
	Diverged,
	/// The listener was removed.
	Detached,
}

struct SyncState {
	diverged: bool,
	listener: Option<ListenerId>,
	last_error: Option<ReplicaError>,
}

struct SyncInner {
	record: RecordId,
	document: Arc<dyn MutableDocument>,
	materialization: Arc<Materialization>,
	lane: SerialLane,
	token: GenerationToken,
	consistency_checks: bool,
	repaint: Option<RepaintHook>,
	state: Mutex<SyncState>,
}

/// Listener that replays every edit of a [`MutableDocument`] into its replica.
///
/// Clones share one synchronizer.
#[derive(Clone)]
pub struct DocumentSynchronizer {
	inner: Arc<SyncInner>,
}

impl fmt::Debug for DocumentSynchronizer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DocumentSynchronizer")
			.field("record", &self.inner.record)
			.field("phase", &self.phase())
			.finish_non_exhaustive()
	}
}

impl DocumentSynchronizer {
	pub(crate) fn attach(
		record: RecordId,
		document: Arc<dyn MutableDocument>,
		materialization: Arc<Materialization>,
		token: GenerationToken,
		consistency_checks: bool,
		repaint: Option<RepaintHook>,
	) -> Self {
		let lane = SerialLane::new(TaskClass::Interactive, format!("replica-sync-{record}"));
		let inner = Arc::new(SyncInner {
			record,
			document: Arc::clone(&document),
			materialization,
			lane,
			token,
			consistency_checks,
			repaint,
			state: Mutex::new(SyncState {
				diverged: false,
				listener: None,
				last_error: None,
			}),
		});

		let weak: Weak<SyncInner> = Arc::downgrade(&inner);
		let listener = document.add_listener(Arc::new(move |event: &DocumentEvent| {
			if let Some(inner) = weak.upgrade() {
				SyncInner::schedule(&inner, event.clone());
			}
		}));
		inner.state.lock().listener = Some(listener);
		tracing::debug!(record = %record, generation = inner.token.generation(), "replica.sync.attached");
		Self { inner }
	}

	/// Record this synchronizer writes to.
	pub fn record(&self) -> RecordId {
		self.inner.record
	}

	/// Current phase.
	pub fn phase(&self) -> SyncPhase {
		let state = self.inner.state.lock();
		if state.listener.is_none() {
			SyncPhase::Detached
		} else if state.diverged {
			SyncPhase::Diverged
		} else if self.inner.lane.pending() > 0 {
			SyncPhase::Syncing
		} else {
			SyncPhase::Attached
		}
	}

	/// Error that moved the synchronizer to [`SyncPhase::Diverged`].
	pub fn last_error(&self) -> Option<ReplicaError> {
		self.inner.state.lock().last_error.clone()
	}

	/// Blocks until every edit observed so far has been processed.
	///
	/// Must not be called from inside an async runtime thread.
	pub fn flush_blocking(&self) {
		self.inner.lane.flush_blocking();
	}

	/// Removes the listener. Queued edits are dropped unprocessed.
	pub fn detach(&self) {
		let listener = self.inner.state.lock().listener.take();
		if let Some(listener) = listener {
			self.inner.document.remove_listener(listener);
			tracing::debug!(record = %self.inner.record, "replica.sync.detached");
		}
	}
}

impl SyncInner {
	fn schedule(this: &Arc<Self>, event: DocumentEvent) {
		{
			let state = this.state.lock();
			if state.listener.is_none() || state.diverged {
				return;
			}
		}
		let inner = Arc::clone(this);
		this.lane.submit(move || inner.sync(event));
	}

	fn is_live(&self) -> bool {
		let state = self.state.lock();
		state.listener.is_some() && !state.diverged && !self.token.is_cancelled()
	}

	fn sync(&self, event: DocumentEvent) {
		if !self.is_live() {
			return;
		}
		let Some(replica) = self.materialization.wait() else {
			tracing::debug!(record = %self.record, "replica.sync.unmaterialized");
			return;
		};
		if !self.is_live() {
			return;
		}

		let applied = replica.change(|| {
			if event.mod_stamp <= replica.mod_stamp()? {
				return Ok(false);
			}
			replica.replace(event.offset, event.offset + event.old_len, &event.fragment, event.mod_stamp)?;
			Ok(true)
		});

		match applied {
			Ok(false) => {
				tracing::trace!(record = %self.record, stamp = event.mod_stamp, "replica.sync.already_applied");
			}
			Ok(true) => {
				tracing::trace!(record = %self.record, stamp = event.mod_stamp, "replica.sync.applied");
				if self.consistency_checks
					&& let Err(err) = self.check_consistency(&replica, event.mod_stamp)
				{
					self.diverge(err);
					return;
				}
				self.repaint();
			}
			Err(err) => self.diverge(err),
		}
	}

	fn check_consistency(&self, replica: &ReplicaDocument, stamp: i64) -> Result<(), ReplicaError> {
		let (expected, current) = self.document.text_and_stamp();
		if current != stamp {
			return Ok(());
		}
		let actual = replica.text()?;
		if expected != actual {
			return Err(ReplicaError::ConsistencyViolation {
				expected: expected.to_string(),
				actual: actual.to_string(),
			});
		}
		Ok(())
	}

	fn repaint(&self) {
		let Some(hook) = &self.repaint else {
			return;
		};
		if catch_unwind(AssertUnwindSafe(|| hook(self.record))).is_err() {
			tracing::warn!(record = %self.record, "replica.sync.repaint_panicked");
		}
	}

	fn diverge(&self, err: ReplicaError) {
		tracing::error!(record = %self.record, error = %err, "replica.sync.diverged");
		let mut state = self.state.lock();
		state.diverged = true;
		state.last_error = Some(err);
	}
}
