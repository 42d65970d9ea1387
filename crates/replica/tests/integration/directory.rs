//! Binding lifecycle: reference counts, binding kinds, and materialization.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::thread;

use strand_primitives::Rope;
use strand_replica::{BindType, MaterializationState, MutableDocument, ReplicaDirectory, ReplicaDocument, ReplicaError};
use strand_store::{RecordId, Store, StoreError};
use strand_worker::{SerialLane, TaskClass};

use crate::common::{CountingIndicator, directory, init_tracing, memory_doc, record_exists, wait_until};

/// Holds the store's writer until dropped, stalling the materialization lane.
struct WriterHold {
	release: mpsc::Sender<()>,
	holder: Option<thread::JoinHandle<()>>,
}

impl WriterHold {
	fn new(directory: &ReplicaDirectory) -> Self {
		let store = Arc::clone(directory.store());
		let (release, wait) = mpsc::channel::<()>();
		let (ready_tx, ready_rx) = mpsc::channel::<()>();
		let holder = thread::spawn(move || {
			store
				.change(|| {
					ready_tx.send(()).unwrap();
					let _ = wait.recv();
					Ok::<_, StoreError>(())
				})
				.unwrap();
		});
		ready_rx.recv().unwrap();
		Self {
			release,
			holder: Some(holder),
		}
	}
}

impl Drop for WriterHold {
	fn drop(&mut self) {
		let _ = self.release.send(());
		if let Some(holder) = self.holder.take() {
			holder.join().unwrap();
		}
	}
}

#[test]
fn local_binding_gets_random_record() {
	let directory = directory();
	let (_mem, doc) = memory_doc("scratch");
	let handle = directory.bind_local(&doc);
	assert_eq!(handle.bind_type(), BindType::Local);
	assert_eq!(handle.external_id(), None);

	let replica = directory.resolve(&doc).unwrap();
	assert_eq!(replica.id(), handle.record_id());
	assert_eq!(replica.text().unwrap().to_string(), "scratch");

	directory.release(&doc);
	directory.flush();
	assert!(!record_exists(&directory, handle.record_id()));
}

#[test]
fn id_supplier_sees_the_document() {
	let directory = directory();
	let (_mem, doc) = memory_doc("named");
	let handle = directory.bind(&doc, BindType::Owner, |doc| format!("doc:{}", doc.text()));
	assert_eq!(handle.external_id(), Some("doc:named"));
	assert_eq!(handle.record_id(), RecordId::derive("doc:named"));
	directory.release(&doc);
}

#[test]
fn follower_never_deletes_and_never_writes() {
	let directory = directory();
	let id = RecordId::derive("remote");
	ReplicaDocument::materialize(Arc::clone(directory.store()), id, Rope::from("remote text"), 5, 16).unwrap();

	let (mem, doc) = memory_doc("local text");
	let handle = directory.bind(&doc, BindType::Follower, |_| "remote".to_string());
	assert!(handle.synchronizer().is_none());

	let replica = directory.resolve(&doc).unwrap();
	assert_eq!(replica.text().unwrap().to_string(), "remote text");

	mem.insert(0, "edited ").unwrap();
	directory.flush();
	assert_eq!(replica.text().unwrap().to_string(), "remote text");

	directory.release(&doc);
	directory.flush();
	assert!(record_exists(&directory, id));
}

#[test]
fn mismatched_kind_keeps_original_binding() {
	let directory = directory();
	let (_mem, doc) = memory_doc("x");
	directory.bind(&doc, BindType::Owner, |_| "owned".to_string());
	let handle = directory.bind(&doc, BindType::Follower, |_| "ignored".to_string());
	assert_eq!(handle.bind_type(), BindType::Owner);
	assert_eq!(handle.ref_count(), 2);
	assert_eq!(handle.external_id(), Some("owned"));

	directory.release(&doc);
	directory.release(&doc);
	directory.flush();
	assert!(!record_exists(&directory, RecordId::derive("owned")));
}

#[test]
fn switching_between_local_and_owner_tears_down_first() {
	let directory = directory();
	let (_mem, doc) = memory_doc("draft");
	let local = directory.bind_local(&doc);
	directory.bind_local(&doc);
	directory.flush();
	assert!(record_exists(&directory, local.record_id()));

	let owner = directory.bind(&doc, BindType::Owner, |_| "file:///draft.txt".to_string());
	assert_eq!(owner.ref_count(), 1);
	assert_eq!(directory.len(), 1);
	assert!(local.synchronizer().is_some_and(|sync| sync.phase() == strand_replica::SyncPhase::Detached));

	directory.flush();
	assert!(!record_exists(&directory, local.record_id()));
	assert!(record_exists(&directory, owner.record_id()));

	let back = directory.bind_local(&doc);
	assert_ne!(back.record_id(), local.record_id());
	directory.flush();
	assert!(!record_exists(&directory, owner.record_id()));
	directory.release(&doc);
}

#[test]
#[should_panic(expected = "no bound handle")]
fn release_without_bind_panics() {
	let directory = directory();
	let (_mem, doc) = memory_doc("");
	directory.release(&doc);
}

#[test]
fn resolve_blocks_with_indicator_until_materialized() {
	let indicator = Arc::new(CountingIndicator::default());
	let directory = Arc::new(directory().with_indicator(indicator.clone()));
	let (_mem, doc) = memory_doc("slow");

	let hold = WriterHold::new(&directory);
	let handle = directory.bind(&doc, BindType::Owner, |_| "slow".to_string());
	assert_eq!(handle.materialization_state(), MaterializationState::Pending);
	assert!(directory.try_resolve(&doc).is_none());

	let resolver = {
		let directory = Arc::clone(&directory);
		let doc = Arc::clone(&doc);
		thread::spawn(move || directory.resolve(&doc).map(|replica| replica.text().unwrap().to_string()))
	};
	assert!(wait_until(|| indicator.preparing.load(Ordering::SeqCst) == 1));
	assert_eq!(indicator.prepared.load(Ordering::SeqCst), 0);

	drop(hold);
	assert_eq!(resolver.join().unwrap().as_deref(), Some("slow"));
	assert_eq!(indicator.prepared.load(Ordering::SeqCst), 1);
	assert_eq!(handle.materialization_state(), MaterializationState::Ready);
	assert!(directory.try_resolve(&doc).is_some());
}

#[test]
fn release_before_materialization_cancels_creation() {
	let directory = directory();
	let (_first_mem, first) = memory_doc("first");
	let (_second_mem, second) = memory_doc("second");

	let hold = WriterHold::new(&directory);
	directory.bind(&first, BindType::Owner, |_| "first".to_string());
	let second_handle = directory.bind(&second, BindType::Owner, |_| "second".to_string());
	directory.release(&second);
	assert_eq!(second_handle.materialization_state(), MaterializationState::Cancelled);
	assert!(directory.resolve(&second).is_none());
	drop(hold);

	directory.flush();
	assert!(record_exists(&directory, RecordId::derive("first")));
	assert!(!record_exists(&directory, RecordId::derive("second")));
	directory.release(&first);
}

#[test]
fn concurrent_binds_share_one_handle() {
	let directory = Arc::new(directory());
	let (_mem, doc) = memory_doc("busy");
	let threads: Vec<_> = (0..8)
		.map(|_| {
			let directory = Arc::clone(&directory);
			let doc = Arc::clone(&doc);
			thread::spawn(move || {
				directory.bind(&doc, BindType::Owner, |_| "busy".to_string());
			})
		})
		.collect();
	for thread in threads {
		thread.join().unwrap();
	}
	let handle = directory.handle(&doc).unwrap();
	assert_eq!(handle.ref_count(), 8);
	let generation = handle.generation();

	for _ in 0..7 {
		directory.release(&doc);
	}
	assert_eq!(directory.handle(&doc).map(|h| h.generation()), Some(generation));
	assert!(directory.resolve(&doc).is_some());
	directory.release(&doc);
	assert!(directory.handle(&doc).is_none());
}

#[test]
fn replace_through_resolved_replica_requires_change_scope() {
	let directory = directory();
	let (_mem, doc) = memory_doc("abc");
	directory.bind(&doc, BindType::Owner, |_| "scoped".to_string());
	let replica = directory.resolve(&doc).unwrap();
	assert_eq!(replica.replace(0, 1, "z", 99), Err(ReplicaError::NotInTransaction));
	let doc_text = doc.text().to_string();
	assert_eq!(replica.text().unwrap().to_string(), doc_text);
	directory.release(&doc);
}

#[test]
fn directories_share_one_materialization_lane() {
	init_tracing();
	let lane = SerialLane::new(TaskClass::Background, "shared-materialize");
	let first = ReplicaDirectory::new(Arc::new(Store::new()), Default::default()).with_lane(lane.clone());
	let second = ReplicaDirectory::new(Arc::new(Store::new()), Default::default()).with_lane(lane.clone());

	let (gate, wait) = mpsc::channel::<()>();
	lane.submit(move || {
		let _ = wait.recv();
	});

	let (_a, doc_a) = memory_doc("alpha");
	let (_b, doc_b) = memory_doc("beta");
	let handle_a = first.bind(&doc_a, BindType::Owner, |_| "shared-a".into());
	let handle_b = second.bind(&doc_b, BindType::Owner, |_| "shared-b".into());
	assert_eq!(handle_a.materialization_state(), MaterializationState::Pending);
	assert_eq!(handle_b.materialization_state(), MaterializationState::Pending);
	assert_eq!(lane.pending(), 3);

	gate.send(()).unwrap();
	first.flush();
	assert_eq!(lane.pending(), 0);
	assert_eq!(second.try_resolve(&doc_b).unwrap().text().unwrap().to_string(), "beta");
	assert_eq!(first.try_resolve(&doc_a).unwrap().text().unwrap().to_string(), "alpha");
}
