//! Transactional document replicas with stable anchors.
//!
//! A [`ReplicaDirectory`] binds UI-facing [`MutableDocument`]s to versioned
//! [`DocumentRecord`]s in a [`Store`](strand_store::Store). Each record holds
//! the text, the caller's modification stamp, an [`OperationLog`], and an
//! [`AnchorStore`], and is rewritten as a whole by every accepted edit.
//! [`DocumentSynchronizer`]s replay document edits into their records in
//! order, and [`ReplicaDocument`] exposes document-like reads over the latest
//! committed record.
//!
//! Overlay consumers pair their objects with anchors through an
//! [`AnchorRegistry`] and find them again with
//! [`ReplicaDocument::query_anchors`].

mod anchor;
mod config;
mod directory;
mod document;
mod error;
mod external;
mod log;
mod materialize;
mod record;
mod registry;
mod sync;

pub use anchor::{Anchor, AnchorId, AnchorQuery, AnchorStore, Stickiness};
pub use config::{ConfigError, ReplicaConfig};
pub use directory::{BindType, DocumentHandle, PreparingIndicator, ReplicaDirectory, TracingIndicator};
pub use document::ReplicaDocument;
pub use error::{ReplicaError, Result};
pub use external::{DocumentEvent, DocumentListener, ListenerId, MemoryDocument, MutableDocument};
pub use log::{LogEntry, OperationId, OperationLog, Revision};
pub use materialize::MaterializationState;
pub use record::DocumentRecord;
pub use registry::{AnchorRef, AnchorRegistry};
pub use sync::{DocumentSynchronizer, RepaintHook, SyncPhase};
