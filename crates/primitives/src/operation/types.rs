use crate::range::CharLen;

/// Bias determines how positions at change boundaries are mapped.
///
/// When mapping a position through a change, bias determines whether the position
/// moves with insertions or stays before them. When rebasing, it decides which of
/// two insertions at the same position lands first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
	/// Position stays before insertions at the same location.
	Left,
	/// Position moves after insertions at the same location.
	Right,
}

impl Bias {
	/// Returns the opposite bias.
	pub fn flip(self) -> Self {
		match self {
			Self::Left => Self::Right,
			Self::Right => Self::Left,
		}
	}
}

/// A text insertion with cached character length.
///
/// Storing the character count avoids repeated O(n) `.chars().count()` calls
/// in hot paths like `apply()`, `map_pos()`, and `transform()`.
///
/// The `char_len` field always equals `text.chars().count()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
	pub(super) text: String,
	pub(super) char_len: CharLen,
}

impl Insertion {
	/// Creates a new insertion, computing the character length once.
	#[inline]
	pub fn new(text: String) -> Self {
		let char_len = text.chars().count();
		Self { text, char_len }
	}

	/// Returns true if this insertion is empty.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.char_len == 0
	}

	/// Returns the inserted text.
	#[inline]
	pub fn text(&self) -> &str {
		&self.text
	}

	/// Returns the cached character length.
	#[inline]
	pub fn char_len(&self) -> CharLen {
		self.char_len
	}
}

/// A single operation in a changeset.
///
/// Operations are the atomic units that make up a `ChangeSet`: retaining
/// existing text, deleting text, or inserting new text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
	/// Retain the next N characters from the source document.
	Retain(CharLen),
	/// Delete the next N characters from the source document.
	Delete(CharLen),
	/// Insert new text at the current position.
	Insert(Insertion),
}
