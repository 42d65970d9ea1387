//! Stable anchors and their re-derivation through edits.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use strand_primitives::{Bias, ChangeSet, Rope, TextRange};

/// Identity of an anchor within one record. Never reused after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(u64);

impl AnchorId {
	/// Returns the raw id.
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for AnchorId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Whether text inserted exactly at an anchor boundary joins the anchor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Stickiness {
	/// Text inserted at the start boundary becomes part of the anchor.
	pub greedy_left: bool,
	/// Text inserted at the end boundary becomes part of the anchor.
	pub greedy_right: bool,
}

impl Stickiness {
	/// Neither boundary absorbs insertions.
	pub const NONE: Self = Self::new(false, false);
	/// Both boundaries absorb insertions.
	pub const BOTH: Self = Self::new(true, true);

	/// Creates stickiness flags.
	pub const fn new(greedy_left: bool, greedy_right: bool) -> Self {
		Self {
			greedy_left,
			greedy_right,
		}
	}
}

/// A tracked point or range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
	/// Current position in the record's text.
	pub range: TextRange,
	/// Boundary behavior under insertions.
	pub stickiness: Stickiness,
}

impl Anchor {
	/// Creates a non-greedy anchor over `range`.
	pub fn new(range: TextRange) -> Self {
		Self {
			range,
			stickiness: Stickiness::NONE,
		}
	}

	/// Returns this anchor with different stickiness.
	pub fn with_stickiness(self, stickiness: Stickiness) -> Self {
		Self { stickiness, ..self }
	}

	/// Maps the anchor through `changes`.
	///
	/// A range whose every character was deleted collapses to the point after
	/// the replacement text. Otherwise each boundary keeps insertions outside
	/// unless that side is greedy.
	pub fn remap(self, changes: &ChangeSet) -> Self {
		let TextRange { start, end } = self.range;
		let Stickiness {
			greedy_left,
			greedy_right,
		} = self.stickiness;

		let range = if start == end {
			let bias = if greedy_right { Bias::Right } else { Bias::Left };
			TextRange::point(changes.map_pos(start, bias))
		} else {
			let inner_start = changes.map_pos(start, Bias::Right);
			let inner_end = changes.map_pos(end, Bias::Left);
			if inner_start >= inner_end {
				TextRange::point(inner_start)
			} else {
				let new_start = if greedy_left {
					changes.map_pos(start, Bias::Left)
				} else {
					inner_start
				};
				let new_end = if greedy_right {
					changes.map_pos(end, Bias::Right)
				} else {
					inner_end
				};
				TextRange::new(new_start, new_end)
			}
		};

		let limit = changes.len_after();
		let range = range.clamp(limit);
		Self {
			range: TextRange::new(range.start.min(range.end), range.end),
			..self
		}
	}
}

/// Anchors of one record, keyed by id.
///
/// Cloning is cheap: the map is shared until the next write.
#[derive(Debug, Clone, Default)]
pub struct AnchorStore {
	next_id: u64,
	anchors: Arc<BTreeMap<AnchorId, Anchor>>,
}

impl AnchorStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of live anchors.
	pub fn len(&self) -> usize {
		self.anchors.len()
	}

	/// Returns true if no anchor is live.
	pub fn is_empty(&self) -> bool {
		self.anchors.is_empty()
	}

	/// Returns the anchor registered under `id`.
	pub fn get(&self, id: AnchorId) -> Option<Anchor> {
		self.anchors.get(&id).copied()
	}

	/// Iterates over live anchors in id order.
	pub fn iter(&self) -> impl Iterator<Item = (AnchorId, Anchor)> + '_ {
		self.anchors.iter().map(|(id, anchor)| (*id, *anchor))
	}

	/// Inserts one anchor and returns its fresh id.
	pub fn insert(&mut self, anchor: Anchor) -> AnchorId {
		let id = self.allocate();
		Arc::make_mut(&mut self.anchors).insert(id, anchor);
		id
	}

	/// Inserts anchors in order, returning their ids in the same order.
	pub fn insert_batch(&mut self, anchors: impl IntoIterator<Item = Anchor>) -> Vec<AnchorId> {
		let anchors = anchors.into_iter();
		let mut ids = Vec::with_capacity(anchors.size_hint().0);
		for anchor in anchors {
			let id = self.allocate();
			Arc::make_mut(&mut self.anchors).insert(id, anchor);
			ids.push(id);
		}
		ids
	}

	/// Removes an anchor. Its id is retired for good.
	pub fn remove(&mut self, id: AnchorId) -> Option<Anchor> {
		if !self.anchors.contains_key(&id) {
			return None;
		}
		Arc::make_mut(&mut self.anchors).remove(&id)
	}

	/// Re-derives every anchor for the text produced by `changes`.
	pub fn rederive(&self, before: &Rope, after: &Rope, changes: &ChangeSet) -> Self {
		debug_assert_eq!(before.len_chars(), changes.len());
		debug_assert_eq!(after.len_chars(), changes.len_after());
		if changes.is_identity() || self.anchors.is_empty() {
			return self.clone();
		}
		let anchors = self
			.anchors
			.iter()
			.map(|(id, anchor)| (*id, anchor.remap(changes)))
			.collect();
		Self {
			next_id: self.next_id,
			anchors: Arc::new(anchors),
		}
	}

	/// Lazily yields anchors intersecting `range`, in id order.
	///
	/// The query holds the map it was created from, so later writes never
	/// change what it yields.
	pub fn query(&self, range: TextRange) -> AnchorQuery {
		AnchorQuery {
			anchors: Arc::clone(&self.anchors),
			range,
			cursor: None,
		}
	}

	fn allocate(&mut self) -> AnchorId {
		self.next_id += 1;
		AnchorId(self.next_id)
	}
}

/// Single-pass iterator over the anchors matching a range.
#[derive(Debug)]
pub struct AnchorQuery {
	anchors: Arc<BTreeMap<AnchorId, Anchor>>,
	range: TextRange,
	cursor: Option<AnchorId>,
}

impl Iterator for AnchorQuery {
	type Item = (AnchorId, TextRange);

	fn next(&mut self) -> Option<Self::Item> {
		let lower = match self.cursor {
			Some(last) => Bound::Excluded(last),
			None => Bound::Unbounded,
		};
		let (id, anchor) = self
			.anchors
			.range((lower, Bound::Unbounded))
			.find(|(_, anchor)| anchor.range.intersects(&self.range))?;
		self.cursor = Some(*id);
		Some((*id, anchor.range))
	}
}
