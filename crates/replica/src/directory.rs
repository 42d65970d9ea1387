//! Reference-counted bindings from mutable documents to replicas.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use strand_primitives::Rope;
use strand_store::{RecordId, Store};
use strand_worker::{GenerationClock, GenerationToken, SerialLane, TaskClass};

use crate::config::ReplicaConfig;
use crate::document::ReplicaDocument;
use crate::external::MutableDocument;
use crate::materialize::{Materialization, MaterializationState};
use crate::record::DocumentRecord;
use crate::sync::{DocumentSynchronizer, RepaintHook};

/// How a document is bound to its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindType {
	/// Ad hoc binding with a random record id.
	Local,
	/// This process defines the record and deletes it on last release.
	Owner,
	/// The record is defined elsewhere; it is never deleted from here and no
	/// edits are pushed into it.
	Follower,
}

impl BindType {
	const fn as_str(self) -> &'static str {
		match self {
			Self::Local => "local",
			Self::Owner => "owner",
			Self::Follower => "follower",
		}
	}

	const fn deletes_on_release(self) -> bool {
		!matches!(self, Self::Follower)
	}
}

/// Visible feedback while a caller blocks on an unmaterialized record.
pub trait PreparingIndicator: Send + Sync {
	/// A caller started waiting for `record`.
	fn preparing(&self, record: RecordId);
	/// The wait for `record` ended.
	fn prepared(&self, record: RecordId);
}

/// Reports preparation through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingIndicator;

impl PreparingIndicator for TracingIndicator {
	fn preparing(&self, record: RecordId) {
		tracing::info!(record = %record, "replica.directory.preparing");
	}

	fn prepared(&self, record: RecordId) {
		tracing::info!(record = %record, "replica.directory.prepared");
	}
}

struct HandleShared {
	document: Arc<dyn MutableDocument>,
	materialization: Arc<Materialization>,
	token: GenerationToken,
	synchronizer: Option<DocumentSynchronizer>,
}

/// Snapshot of one binding.
///
/// Handles are values: reference counting produces a new handle that replaces
/// the old one in the directory. Copies share the materialization and the
/// synchronizer.
#[derive(Clone)]
pub struct DocumentHandle {
	external_id: Option<Arc<str>>,
	record: RecordId,
	bind: BindType,
	ref_count: u32,
	shared: Arc<HandleShared>,
}

impl fmt::Debug for DocumentHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DocumentHandle")
			.field("external_id", &self.external_id)
			.field("record", &self.record)
			.field("bind", &self.bind)
			.field("ref_count", &self.ref_count)
			.field("state", &self.materialization_state())
			.finish()
	}
}

impl DocumentHandle {
	/// External id the record id was derived from. `None` for local bindings.
	pub fn external_id(&self) -> Option<&str> {
		self.external_id.as_deref()
	}

	/// Id of the bound record.
	pub fn record_id(&self) -> RecordId {
		self.record
	}

	/// Binding kind.
	pub fn bind_type(&self) -> BindType {
		self.bind
	}

	/// Number of outstanding binds.
	pub fn ref_count(&self) -> u32 {
		self.ref_count
	}

	/// Generation of the handle's background work.
	pub fn generation(&self) -> u64 {
		self.shared.token.generation()
	}

	/// The bound document.
	pub fn document(&self) -> &Arc<dyn MutableDocument> {
		&self.shared.document
	}

	/// Whether the record has been created.
	pub fn materialization_state(&self) -> MaterializationState {
		self.shared.materialization.state()
	}

	/// Synchronizer pushing document edits into the record, if any.
	pub fn synchronizer(&self) -> Option<&DocumentSynchronizer> {
		self.shared.synchronizer.as_ref()
	}

	fn inc_ref(&self) -> Self {
		Self {
			ref_count: self.ref_count + 1,
			..self.clone()
		}
	}

	/// Returns the decremented handle, or `None` for the last reference.
	fn dec_ref(&self) -> Option<Self> {
		(self.ref_count > 1).then(|| Self {
			ref_count: self.ref_count - 1,
			..self.clone()
		})
	}
}

/// Document identity: the address of its shared allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DocKey(usize);

impl DocKey {
	fn of(document: &Arc<dyn MutableDocument>) -> Self {
		Self(Arc::as_ptr(document) as *const () as usize)
	}
}

/// Maps mutable documents to reference-counted replica handles.
///
/// Bind and release are serialized by one directory lock. Records are
/// created and deleted on a single materialization lane shared by every
/// document of the directory, and by other directories given the same lane
/// through [`Self::with_lane`].
pub struct ReplicaDirectory {
	store: Arc<Store<DocumentRecord>>,
	config: ReplicaConfig,
	entries: Mutex<FxHashMap<DocKey, DocumentHandle>>,
	lane: SerialLane,
	clock: GenerationClock,
	indicator: Arc<dyn PreparingIndicator>,
	repaint: Option<RepaintHook>,
}

impl fmt::Debug for ReplicaDirectory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ReplicaDirectory")
			.field("lane", &self.lane.name())
			.field("len", &self.len())
			.finish_non_exhaustive()
	}
}

impl ReplicaDirectory {
	/// Creates a directory writing records into `store`.
	pub fn new(store: Arc<Store<DocumentRecord>>, config: ReplicaConfig) -> Self {
		let lane = SerialLane::new(TaskClass::Background, config.materialize_lane.as_str());
		Self {
			store,
			config,
			entries: Mutex::new(FxHashMap::default()),
			lane,
			clock: GenerationClock::new(),
			indicator: Arc::new(TracingIndicator),
			repaint: None,
		}
	}

	/// Replaces the preparing indicator.
	pub fn with_indicator(mut self, indicator: Arc<dyn PreparingIndicator>) -> Self {
		self.indicator = indicator;
		self
	}

	/// Materializes on `lane` instead of a lane of its own.
	///
	/// Directories built with clones of one lane create and delete their
	/// records one at a time, in submission order.
	pub fn with_lane(mut self, lane: SerialLane) -> Self {
		tracing::debug!(lane = lane.name(), "replica.directory.shared_lane");
		self.lane = lane;
		self
	}

	/// Installs a hook run after every successful sync.
	pub fn with_repaint(mut self, repaint: RepaintHook) -> Self {
		self.repaint = Some(repaint);
		self
	}

	/// Store holding the records.
	pub fn store(&self) -> &Arc<Store<DocumentRecord>> {
		&self.store
	}

	/// Active configuration.
	pub fn config(&self) -> &ReplicaConfig {
		&self.config
	}

	/// Binds `document` with a random record id.
	pub fn bind_local(&self, document: &Arc<dyn MutableDocument>) -> DocumentHandle {
		self.bind(document, BindType::Local, |_| String::new())
	}

	/// Binds `document`, or adds a reference to its existing binding.
	///
	/// `id_supplier` is only called when a new handle is created for an
	/// owner or follower binding. A local binding and an owner or follower
	/// binding of one document are mutually exclusive: switching kinds tears
	/// the old handle down first, whatever its count.
	pub fn bind(
		&self,
		document: &Arc<dyn MutableDocument>,
		bind: BindType,
		id_supplier: impl FnOnce(&dyn MutableDocument) -> String,
	) -> DocumentHandle {
		let key = DocKey::of(document);
		let mut entries = self.entries.lock();

		if let Some(existing) = entries.get(&key) {
			let existing_local = existing.bind == BindType::Local;
			if existing_local == (bind == BindType::Local) {
				if existing.bind != bind {
					tracing::warn!(
						record = %existing.record,
						bound = existing.bind.as_str(),
						requested = bind.as_str(),
						"replica.directory.bind_kind_mismatch"
					);
				}
				let next = existing.inc_ref();
				tracing::debug!(record = %next.record, ref_count = next.ref_count, "replica.directory.inc_ref");
				entries.insert(key, next.clone());
				return next;
			}
			if let Some(stale) = entries.remove(&key) {
				tracing::debug!(record = %stale.record, from = stale.bind.as_str(), to = bind.as_str(), "replica.directory.rebind");
				self.dispose(&stale);
			}
		}

		let (external_id, record) = match bind {
			BindType::Local => (None, RecordId::random()),
			BindType::Owner | BindType::Follower => {
				let external: Arc<str> = id_supplier(document.as_ref()).into();
				let record = RecordId::derive(&external);
				(Some(external), record)
			}
		};
		let handle = self.create(document, bind, external_id, record);
		entries.insert(key, handle.clone());
		handle
	}

	/// Drops one reference to the binding of `document`.
	///
	/// The last release cancels pending materialization, detaches the
	/// synchronizer, and, unless the binding is a follower, deletes the record.
	///
	/// # Panics
	/// Panics if `document` is not bound.
	pub fn release(&self, document: &Arc<dyn MutableDocument>) {
		let key = DocKey::of(document);
		let mut entries = self.entries.lock();
		let Some(handle) = entries.remove(&key) else {
			panic!("release of a document that has no bound handle");
		};
		match handle.dec_ref() {
			Some(next) => {
				tracing::debug!(record = %next.record, ref_count = next.ref_count, "replica.directory.dec_ref");
				entries.insert(key, next);
			}
			None => self.dispose(&handle),
		}
	}

	/// Returns the replica of `document`, blocking until its record exists.
	///
	/// Returns `None` when the document is not bound, or when the binding is
	/// released or fails before its record is created. Must not be called from
	/// an async runtime thread or from the materialization lane.
	pub fn resolve(&self, document: &Arc<dyn MutableDocument>) -> Option<ReplicaDocument> {
		let handle = self.handle(document)?;
		let materialization = &handle.shared.materialization;
		if let Some(replica) = materialization.try_get() {
			return Some(replica);
		}
		self.indicator.preparing(handle.record);
		let replica = materialization.wait();
		self.indicator.prepared(handle.record);
		if replica.is_none()
			&& let Some(err) = materialization.error()
		{
			tracing::warn!(record = %handle.record, error = %err, "replica.directory.resolve_failed");
		}
		replica
	}

	/// Returns the replica of `document` if its record already exists.
	pub fn try_resolve(&self, document: &Arc<dyn MutableDocument>) -> Option<ReplicaDocument> {
		self.handle(document)?.shared.materialization.try_get()
	}

	/// Returns a copy of the current handle of `document`.
	pub fn handle(&self, document: &Arc<dyn MutableDocument>) -> Option<DocumentHandle> {
		self.entries.lock().get(&DocKey::of(document)).cloned()
	}

	/// Number of bound documents.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	/// Returns true if no document is bound.
	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	/// Blocks until every queued creation and deletion has run.
	pub fn flush(&self) {
		self.lane.flush_blocking();
	}

	fn create(
		&self,
		document: &Arc<dyn MutableDocument>,
		bind: BindType,
		external_id: Option<Arc<str>>,
		record: RecordId,
	) -> DocumentHandle {
		let token = self.clock.token();
		let materialization = Arc::new(Materialization::new());

		let synchronizer = (bind != BindType::Follower).then(|| {
			DocumentSynchronizer::attach(
				record,
				Arc::clone(document),
				Arc::clone(&materialization),
				token.child(),
				self.config.consistency_checks,
				self.repaint.clone(),
			)
		});
		let (text, mod_stamp) = document.text_and_stamp();
		self.queue_materialize(record, text, mod_stamp, &token, &materialization);

		tracing::debug!(
			record = %record,
			bind = bind.as_str(),
			generation = token.generation(),
			"replica.directory.bind"
		);
		DocumentHandle {
			external_id,
			record,
			bind,
			ref_count: 1,
			shared: Arc::new(HandleShared {
				document: Arc::clone(document),
				materialization,
				token,
				synchronizer,
			}),
		}
	}

	fn queue_materialize(
		&self,
		record: RecordId,
		text: Rope,
		mod_stamp: i64,
		token: &GenerationToken,
		materialization: &Arc<Materialization>,
	) {
		let store = Arc::clone(&self.store);
		let retention = self.config.log_retention;
		let token = token.clone();
		let cell = Arc::clone(materialization);
		let queued = self.lane.submit(move || {
			if token.is_cancelled() {
				cell.cancel();
				tracing::debug!(record = %record, "replica.directory.materialize_skipped");
				return;
			}
			let outcome = ReplicaDocument::materialize(store, record, text, mod_stamp, retention);
			if let Err(err) = &outcome {
				tracing::error!(record = %record, error = %err, "replica.directory.materialize_failed");
			}
			cell.resolve(outcome);
		});
		if !queued {
			materialization.cancel();
		}
	}

	fn dispose(&self, handle: &DocumentHandle) {
		let shared = &handle.shared;
		shared.token.cancel();
		shared.materialization.cancel();
		if let Some(synchronizer) = &shared.synchronizer {
			synchronizer.detach();
		}
		tracing::debug!(
			record = %handle.record,
			bind = handle.bind.as_str(),
			generation = shared.token.generation(),
			"replica.directory.disposed"
		);
		if !handle.bind.deletes_on_release() {
			return;
		}
		let replica = ReplicaDocument::new(Arc::clone(&self.store), handle.record);
		self.lane.submit(move || {
			if let Err(err) = replica.delete() {
				tracing::error!(record = %replica.id(), error = %err, "replica.directory.delete_failed");
			}
		});
	}
}
