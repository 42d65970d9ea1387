//! Thread-local ambient snapshot and transaction frames.
//!
//! Frames are pushed by scope guards and popped when the guard drops, so an
//! ambient snapshot never outlives the scope that installed it. Guards are
//! `!Send`, which keeps a frame on the thread that owns it.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
	Pinned,
	Change,
}

struct Frame {
	store: u64,
	serial: u64,
	kind: FrameKind,
	value: Rc<dyn Any>,
}

thread_local! {
	static FRAMES: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
	static NEXT_SERIAL: Cell<u64> = const { Cell::new(0) };
}

/// Pops its frame when dropped.
pub(crate) struct FrameGuard {
	serial: u64,
	_not_send: PhantomData<Rc<()>>,
}

impl Drop for FrameGuard {
	fn drop(&mut self) {
		FRAMES.with_borrow_mut(|frames| {
			if let Some(pos) = frames.iter().rposition(|frame| frame.serial == self.serial) {
				let store = frames[pos].store;
				debug_assert!(
					frames[pos + 1..].iter().all(|frame| frame.store != store),
					"store frames released out of order"
				);
				frames.remove(pos);
			}
		});
	}
}

/// Installs a frame for `store` on the current thread.
pub(crate) fn push(store: u64, kind: FrameKind, value: Rc<dyn Any>) -> FrameGuard {
	let serial = NEXT_SERIAL.with(|next| {
		let serial = next.get();
		next.set(serial.wrapping_add(1));
		serial
	});
	FRAMES.with_borrow_mut(|frames| {
		frames.push(Frame {
			store,
			serial,
			kind,
			value,
		})
	});
	FrameGuard {
		serial,
		_not_send: PhantomData,
	}
}

/// Returns the innermost frame installed for `store` on the current thread.
pub(crate) fn innermost(store: u64) -> Option<(FrameKind, Rc<dyn Any>)> {
	FRAMES.with_borrow(|frames| {
		frames
			.iter()
			.rev()
			.find(|frame| frame.store == store)
			.map(|frame| (frame.kind, Rc::clone(&frame.value)))
	})
}

/// RAII guard pinning one snapshot for every read on the current thread.
///
/// Returned by [`Store::pin`](crate::Store::pin). When a snapshot or change
/// scope for the same store is already active, the guard reuses it and does
/// nothing on drop.
pub struct SnapshotScope {
	frame: Option<FrameGuard>,
}

impl SnapshotScope {
	pub(crate) fn new(frame: Option<FrameGuard>) -> Self {
		Self { frame }
	}

	/// Returns true if this guard installed the snapshot (rather than reusing one).
	pub fn is_outermost(&self) -> bool {
		self.frame.is_some()
	}
}
