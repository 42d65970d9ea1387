use thiserror::Error;

/// Errors raised by the store's change context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
	/// A transactional operation ran outside any change scope for this store.
	#[error("mutation attempted outside a change scope")]
	NotInTransaction,
}
