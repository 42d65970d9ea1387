use super::types::Operation;
use crate::range::CharLen;

/// The unconsumed remainder of the operation under a cursor.
#[derive(Debug, Clone, Copy)]
pub(super) enum Head<'a> {
	Retain(CharLen),
	Delete(CharLen),
	Insert(&'a str, CharLen),
}

impl<'a> Head<'a> {
	pub(super) fn len(self) -> CharLen {
		match self {
			Self::Retain(n) | Self::Delete(n) | Self::Insert(_, n) => n,
		}
	}

	/// Splits after `n` characters; `n` must be less than `len()`.
	fn split(self, n: CharLen) -> (Self, Self) {
		match self {
			Self::Retain(len) => (Self::Retain(n), Self::Retain(len - n)),
			Self::Delete(len) => (Self::Delete(n), Self::Delete(len - n)),
			Self::Insert(text, len) => {
				let at = text.char_indices().nth(n).map_or(text.len(), |(i, _)| i);
				(Self::Insert(&text[..at], n), Self::Insert(&text[at..], len - n))
			}
		}
	}
}

/// Walks a changeset's operations, allowing partial consumption of the head.
pub(super) struct OpCursor<'a> {
	ops: std::slice::Iter<'a, Operation>,
	head: Option<Head<'a>>,
}

impl<'a> OpCursor<'a> {
	pub(super) fn new(ops: &'a [Operation]) -> Self {
		let mut cursor = Self { ops: ops.iter(), head: None };
		cursor.advance();
		cursor
	}

	fn advance(&mut self) {
		self.head = self.ops.next().map(|op| match op {
			Operation::Retain(n) => Head::Retain(*n),
			Operation::Delete(n) => Head::Delete(*n),
			Operation::Insert(ins) => Head::Insert(ins.text(), ins.char_len()),
		});
	}

	pub(super) fn peek(&self) -> Option<Head<'a>> {
		self.head
	}

	/// Consumes the whole head.
	pub(super) fn next(&mut self) -> Option<Head<'a>> {
		let head = self.head?;
		self.advance();
		Some(head)
	}

	/// Consumes up to `n` characters of the head.
	pub(super) fn take(&mut self, n: CharLen) -> Option<Head<'a>> {
		let head = self.head?;
		if n >= head.len() {
			self.advance();
			return Some(head);
		}
		let (taken, rest) = head.split(n);
		self.head = Some(rest);
		Some(taken)
	}
}
