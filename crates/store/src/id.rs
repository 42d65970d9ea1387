use std::fmt;

use uuid::Uuid;

/// Opaque 128-bit identifier of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(Uuid);

impl RecordId {
	const NAMESPACE: Uuid = Uuid::from_u128(0x6d1f_4b0e_93a2_4c55_8e0b_2f7a_51c3_d9e4);

	/// Derives a stable id from an external key.
	///
	/// The same key always yields the same id, in every process.
	pub fn derive(key: &str) -> Self {
		Self(Uuid::new_v5(&Self::NAMESPACE, key.as_bytes()))
	}

	/// Generates a fresh random id.
	pub fn random() -> Self {
		Self(Uuid::new_v4())
	}

	/// Returns the raw 128-bit value.
	pub fn as_u128(&self) -> u128 {
		self.0.as_u128()
	}
}

impl fmt::Display for RecordId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}
