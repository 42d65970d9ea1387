use std::fmt;

/// A position in the text, measured in characters (not bytes).
///
/// This is the canonical coordinate space for replicas and anchors.
pub type CharIdx = usize;

/// A length or count in the text, measured in characters (not bytes).
///
/// This is distinct from CharIdx to avoid accidentally passing an index
/// where a length is expected or vice versa.
pub type CharLen = usize;

/// A half-open character range `[start, end)`.
///
/// An empty range (`start == end`) is a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextRange {
	/// First character covered by the range.
	pub start: CharIdx,
	/// One past the last character covered by the range.
	pub end: CharIdx,
}

impl TextRange {
	/// Creates a range from `start` to `end`.
	pub fn new(start: CharIdx, end: CharIdx) -> Self {
		debug_assert!(start <= end, "inverted range {start}..{end}");
		Self { start, end }
	}

	/// Creates a zero-width range at the given position.
	pub fn point(pos: CharIdx) -> Self {
		Self { start: pos, end: pos }
	}

	/// Returns the length of the range in characters.
	#[inline]
	pub fn len(&self) -> CharLen {
		self.end - self.start
	}

	/// Returns true if the range is a point.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.start == self.end
	}

	/// Returns true if `pos` lies within the range (exclusive of `end`).
	pub fn contains(&self, pos: CharIdx) -> bool {
		pos >= self.start && pos < self.end
	}

	/// Returns true if this range intersects `other`.
	///
	/// Two non-empty ranges intersect only when they share at least one
	/// character. When either side is a point, touching counts.
	pub fn intersects(&self, other: &TextRange) -> bool {
		if self.is_empty() || other.is_empty() {
			self.start <= other.end && other.start <= self.end
		} else {
			self.start < other.end && other.start < self.end
		}
	}

	/// Clamps both ends to `[0, max]`.
	pub fn clamp(self, max: CharIdx) -> Self {
		Self {
			start: self.start.min(max),
			end: self.end.min(max),
		}
	}

	/// Returns the range as a std range for slicing.
	pub fn as_range(&self) -> std::ops::Range<CharIdx> {
		self.start..self.end
	}
}

impl From<std::ops::Range<CharIdx>> for TextRange {
	fn from(range: std::ops::Range<CharIdx>) -> Self {
		Self::new(range.start, range.end)
	}
}

impl fmt::Display for TextRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}, {})", self.start, self.end)
	}
}
