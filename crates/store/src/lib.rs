//! Versioned record store.
//!
//! A [`Store`] holds immutable [`Snapshot`]s of its records. Readers load the
//! latest committed snapshot without blocking; writers run inside a
//! [`Store::change`] scope that is installed as the thread's ambient
//! transaction and commits atomically. [`Store::pin`] fixes one snapshot for
//! every read on the current thread until its guard drops.

mod context;
mod error;
mod id;
mod snapshot;
mod store;

pub use context::SnapshotScope;
pub use error::StoreError;
pub use id::RecordId;
pub use snapshot::{Snapshot, Transaction};
pub use store::Store;
