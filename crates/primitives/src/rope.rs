//! Rope utilities and line arithmetic.

use ropey::RopeSlice;

use crate::range::{CharIdx, CharLen, TextRange};

/// Returns the number of lines, including the empty line after a trailing newline.
#[inline]
pub fn line_count(text: RopeSlice) -> usize {
	text.len_lines()
}

/// Returns the character offset where `line` starts, or `None` past the last line.
pub fn line_start(text: RopeSlice, line: usize) -> Option<CharIdx> {
	(line < text.len_lines()).then(|| text.line_to_char(line))
}

/// Returns the character offset where `line` ends, excluding its line break.
pub fn line_end(text: RopeSlice, line: usize) -> Option<CharIdx> {
	let start = line_start(text, line)?;
	let slice = text.line(line);
	Some(start + slice.len_chars() - line_break_len(slice))
}

/// Returns the text covered by `range`, or `None` when it exceeds the text.
pub fn substring(text: RopeSlice, range: TextRange) -> Option<String> {
	if range.start > range.end || range.end > text.len_chars() {
		return None;
	}
	Some(text.slice(range.as_range()).to_string())
}

fn line_break_len(line: RopeSlice) -> CharLen {
	let len = line.len_chars();
	if len == 0 {
		return 0;
	}
	match line.char(len - 1) {
		'\n' if len >= 2 && line.char(len - 2) == '\r' => 2,
		'\n' | '\r' | '\u{000B}' | '\u{000C}' | '\u{0085}' | '\u{2028}' | '\u{2029}' => 1,
		_ => 0,
	}
}
