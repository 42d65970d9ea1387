use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::RecordId;

/// Immutable, point-in-time view of every record in a store.
#[derive(Debug)]
pub struct Snapshot<R> {
	version: u64,
	records: FxHashMap<RecordId, Arc<R>>,
}

impl<R> Default for Snapshot<R> {
	fn default() -> Self {
		Self {
			version: 0,
			records: FxHashMap::default(),
		}
	}
}

impl<R> Snapshot<R> {
	/// Commit version that produced this snapshot; the empty store is version 0.
	pub fn version(&self) -> u64 {
		self.version
	}

	/// Returns the record stored under `id`.
	pub fn get(&self, id: RecordId) -> Option<&Arc<R>> {
		self.records.get(&id)
	}

	/// Returns true if a record is stored under `id`.
	pub fn contains(&self, id: RecordId) -> bool {
		self.records.contains_key(&id)
	}

	/// Number of records.
	pub fn len(&self) -> usize {
		self.records.len()
	}

	/// Returns true if the snapshot holds no records.
	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// Ids of every record, in no particular order.
	pub fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
		self.records.keys().copied()
	}

	/// Builds the successor snapshot from buffered writes.
	pub(crate) fn successor(&self, writes: FxHashMap<RecordId, Option<Arc<R>>>) -> Self {
		let mut records = self.records.clone();
		for (id, write) in writes {
			match write {
				Some(record) => {
					records.insert(id, record);
				}
				None => {
					records.remove(&id);
				}
			}
		}
		Self {
			version: self.version + 1,
			records,
		}
	}
}

/// Buffered read-modify-write over one base snapshot.
///
/// Reads observe the transaction's own writes. Nothing becomes visible to
/// other readers until the enclosing change scope commits.
#[derive(Debug)]
pub struct Transaction<R> {
	base: Arc<Snapshot<R>>,
	writes: FxHashMap<RecordId, Option<Arc<R>>>,
}

impl<R> Transaction<R> {
	pub(crate) fn new(base: Arc<Snapshot<R>>) -> Self {
		Self {
			base,
			writes: FxHashMap::default(),
		}
	}

	/// Version of the snapshot this transaction started from.
	pub fn base_version(&self) -> u64 {
		self.base.version()
	}

	/// Reads a record, including uncommitted writes of this transaction.
	pub fn read(&self, id: RecordId) -> Option<Arc<R>> {
		match self.writes.get(&id) {
			Some(write) => write.clone(),
			None => self.base.get(id).cloned(),
		}
	}

	/// Returns true if the record exists as seen by this transaction.
	pub fn contains(&self, id: RecordId) -> bool {
		match self.writes.get(&id) {
			Some(write) => write.is_some(),
			None => self.base.contains(id),
		}
	}

	/// Replaces the record stored under `id`.
	pub fn write(&mut self, id: RecordId, record: R) {
		self.writes.insert(id, Some(Arc::new(record)));
	}

	/// Deletes the record stored under `id`. Returns whether it existed.
	pub fn delete(&mut self, id: RecordId) -> bool {
		let existed = self.contains(id);
		self.writes.insert(id, None);
		existed
	}

	/// Returns true if the transaction buffered any write.
	pub fn is_dirty(&self) -> bool {
		!self.writes.is_empty()
	}

	pub(crate) fn take_writes(&mut self) -> FxHashMap<RecordId, Option<Arc<R>>> {
		std::mem::take(&mut self.writes)
	}
}
