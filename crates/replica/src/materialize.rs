//! Single-resolution cell for a lazily created record.

use parking_lot::{Condvar, Mutex};

use crate::document::ReplicaDocument;
use crate::error::ReplicaError;

/// Observable state of a handle's materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializationState {
	/// The record has not been created yet.
	Pending,
	/// The record exists and the document can be resolved.
	Ready,
	/// The handle was released before the record was created.
	Cancelled,
	/// Creating the record failed.
	Failed,
}

enum Slot {
	Pending,
	Ready(ReplicaDocument),
	Cancelled,
	Failed(ReplicaError),
}

/// Resolves at most once; any number of threads may wait for it.
pub(crate) struct Materialization {
	slot: Mutex<Slot>,
	resolved: Condvar,
}

impl Materialization {
	pub(crate) fn new() -> Self {
		Self {
			slot: Mutex::new(Slot::Pending),
			resolved: Condvar::new(),
		}
	}

	pub(crate) fn state(&self) -> MaterializationState {
		match &*self.slot.lock() {
			Slot::Pending => MaterializationState::Pending,
			Slot::Ready(_) => MaterializationState::Ready,
			Slot::Cancelled => MaterializationState::Cancelled,
			Slot::Failed(_) => MaterializationState::Failed,
		}
	}

	/// Stores the outcome. Returns `false` if already resolved.
	pub(crate) fn resolve(&self, outcome: Result<ReplicaDocument, ReplicaError>) -> bool {
		self.settle(match outcome {
			Ok(document) => Slot::Ready(document),
			Err(err) => Slot::Failed(err),
		})
	}

	/// Resolves as cancelled unless already resolved.
	pub(crate) fn cancel(&self) -> bool {
		self.settle(Slot::Cancelled)
	}

	/// Returns the document if it is ready, without waiting.
	pub(crate) fn try_get(&self) -> Option<ReplicaDocument> {
		match &*self.slot.lock() {
			Slot::Ready(document) => Some(document.clone()),
			_ => None,
		}
	}

	/// Returns the failure, if creating the record failed.
	pub(crate) fn error(&self) -> Option<ReplicaError> {
		match &*self.slot.lock() {
			Slot::Failed(err) => Some(err.clone()),
			_ => None,
		}
	}

	/// Blocks until resolved. Returns the document unless cancelled or failed.
	pub(crate) fn wait(&self) -> Option<ReplicaDocument> {
		let mut slot = self.slot.lock();
		while matches!(*slot, Slot::Pending) {
			self.resolved.wait(&mut slot);
		}
		match &*slot {
			Slot::Ready(document) => Some(document.clone()),
			_ => None,
		}
	}

	fn settle(&self, outcome: Slot) -> bool {
		let mut slot = self.slot.lock();
		if !matches!(*slot, Slot::Pending) {
			return false;
		}
		*slot = outcome;
		self.resolved.notify_all();
		true
	}
}
