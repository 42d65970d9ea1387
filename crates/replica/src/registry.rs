//! Bidirectional map between anchors and overlay objects.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rustc_hash::FxBuildHasher;
use strand_store::RecordId;

use crate::anchor::AnchorId;

/// Document-qualified anchor id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorRef {
	/// Record holding the anchor.
	pub record: RecordId,
	/// Anchor within that record.
	pub anchor: AnchorId,
}

impl AnchorRef {
	/// Creates a reference to `anchor` in `record`.
	pub const fn new(record: RecordId, anchor: AnchorId) -> Self {
		Self { record, anchor }
	}
}

impl fmt::Display for AnchorRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}{}", self.record, self.anchor)
	}
}

/// Address of a registered object. Stable while the registry holds the `Arc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ObjectKey(usize);

impl ObjectKey {
	fn of<T>(obj: &Arc<T>) -> Self {
		Self(Arc::as_ptr(obj) as *const () as usize)
	}
}

/// Concurrent one-to-one pairing of anchors with externally owned objects.
///
/// Objects are compared by identity (`Arc` pointer), never by value. Each
/// direction lives in its own sharded map, so there is no registry-wide lock.
/// Registrations of one anchor are serialized by its shard. Callers must not
/// race a register and an unregister of the same object.
pub struct AnchorRegistry<T> {
	by_anchor: DashMap<AnchorRef, Arc<T>, FxBuildHasher>,
	by_object: DashMap<ObjectKey, AnchorRef, FxBuildHasher>,
}

impl<T> Default for AnchorRegistry<T> {
	fn default() -> Self {
		Self {
			by_anchor: DashMap::with_hasher(FxBuildHasher),
			by_object: DashMap::with_hasher(FxBuildHasher),
		}
	}
}

impl<T> fmt::Debug for AnchorRegistry<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AnchorRegistry").field("len", &self.by_anchor.len()).finish()
	}
}

impl<T> AnchorRegistry<T> {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Pairs `anchor` with `obj`, replacing any pairing either side had.
	pub fn register(&self, anchor: AnchorRef, obj: Arc<T>) {
		let key = ObjectKey::of(&obj);

		let previous = self.by_object.get(&key).map(|entry| *entry);
		if let Some(previous) = previous
			&& previous != anchor
		{
			self.by_anchor
				.remove_if(&previous, |_, current| ObjectKey::of(current) == key);
		}

		// The anchor's shard stays locked until the reverse map agrees.
		match self.by_anchor.entry(anchor) {
			Entry::Occupied(mut slot) => {
				let displaced = ObjectKey::of(&slot.insert(obj));
				if displaced != key {
					self.by_object.remove_if(&displaced, |_, current| *current == anchor);
				}
				self.by_object.insert(key, anchor);
			}
			Entry::Vacant(slot) => {
				let _held = slot.insert(obj);
				self.by_object.insert(key, anchor);
			}
		}
		tracing::trace!(anchor = %anchor, "replica.registry.register");
	}

	/// Returns the object paired with `anchor`.
	pub fn resolve(&self, anchor: AnchorRef) -> Option<Arc<T>> {
		self.by_anchor.get(&anchor).map(|entry| Arc::clone(entry.value()))
	}

	/// Returns the anchor paired with `obj`.
	pub fn anchor_of(&self, obj: &Arc<T>) -> Option<AnchorRef> {
		self.by_object.get(&ObjectKey::of(obj)).map(|entry| *entry)
	}

	/// Removes the pairing of `obj` and returns the anchor it was paired with.
	pub fn unregister(&self, obj: &Arc<T>) -> Option<AnchorRef> {
		let key = ObjectKey::of(obj);
		let (_, anchor) = self.by_object.remove(&key)?;
		self.by_anchor
			.remove_if(&anchor, |_, current| ObjectKey::of(current) == key);
		tracing::trace!(anchor = %anchor, "replica.registry.unregister");
		Some(anchor)
	}

	/// Removes the pairing of `anchor` and returns the object it was paired with.
	pub fn unregister_anchor(&self, anchor: AnchorRef) -> Option<Arc<T>> {
		let (_, obj) = self.by_anchor.remove(&anchor)?;
		self.by_object
			.remove_if(&ObjectKey::of(&obj), |_, current| *current == anchor);
		Some(obj)
	}

	/// Removes every pairing whose anchor belongs to `record`.
	pub fn clear_record(&self, record: RecordId) -> usize {
		let anchors: Vec<AnchorRef> = self
			.by_anchor
			.iter()
			.filter(|entry| entry.key().record == record)
			.map(|entry| *entry.key())
			.collect();
		anchors
			.into_iter()
			.filter(|anchor| self.unregister_anchor(*anchor).is_some())
			.count()
	}

	/// Number of pairings.
	pub fn len(&self) -> usize {
		self.by_anchor.len()
	}

	/// Returns true if nothing is registered.
	pub fn is_empty(&self) -> bool {
		self.by_anchor.is_empty()
	}
}
