//! End-to-end walkthroughs of the core contracts.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use strand_primitives::{Rope, TextRange};
use strand_replica::{BindType, ReplicaDocument, ReplicaError, Stickiness};
use strand_store::{RecordId, Store};

use crate::common::{directory, memory_doc, record_exists};

fn replica(text: &str) -> ReplicaDocument {
	ReplicaDocument::materialize(Arc::new(Store::new()), RecordId::random(), Rope::from(text), 0, 64)
		.unwrap()
}

#[test]
fn shifted_anchor_keeps_its_word() {
	let doc = replica("hello world");
	let anchor = doc
		.change(|| doc.add_anchor(TextRange::new(6, 11), Stickiness::NONE))
		.unwrap();

	doc.change(|| doc.replace(0, 5, "HI", 1)).unwrap();

	assert_eq!(doc.text().unwrap().to_string(), "HI world");
	let range = doc.anchor(anchor).unwrap().unwrap().range;
	assert_eq!(range, TextRange::new(3, 8));
	assert_eq!(doc.substring(range).unwrap(), "world");
}

#[test]
fn covered_anchor_collapses_to_insertion_point() {
	let doc = replica("abcdef");
	let anchor = doc
		.change(|| doc.add_anchor(TextRange::new(2, 4), Stickiness::NONE))
		.unwrap();

	doc.change(|| doc.replace(1, 5, "X", 1)).unwrap();

	assert_eq!(doc.text().unwrap().to_string(), "aXf");
	let hits: Vec<_> = doc.query_anchors(TextRange::new(0, 3)).unwrap().collect();
	assert_eq!(hits, vec![(anchor, TextRange::point(2))]);
}

#[test]
fn owner_record_lives_until_last_release() {
	let directory = directory();
	let (_mem, doc) = memory_doc("shared text");
	let id = RecordId::derive("file:///shared.rs");

	directory.bind(&doc, BindType::Owner, |_| "file:///shared.rs".to_string());
	let handle = directory.bind(&doc, BindType::Owner, |_| unreachable!());
	assert_eq!(handle.ref_count(), 2);
	assert_eq!(handle.record_id(), id);

	directory.release(&doc);
	let replica = directory.resolve(&doc).expect("still bound");
	assert_eq!(replica.text().unwrap().to_string(), "shared text");
	directory.flush();
	assert!(record_exists(&directory, id));

	directory.release(&doc);
	assert!(directory.resolve(&doc).is_none());
	directory.flush();
	assert!(!record_exists(&directory, id));
	assert!(matches!(replica.text(), Err(ReplicaError::RecordMissing(_))));
	assert!(directory.is_empty());
}

#[test]
fn queries_see_one_snapshot() {
	let doc = replica("one two three");
	doc.change(|| {
		doc.add_anchors([
			(TextRange::new(0, 3), Stickiness::NONE),
			(TextRange::new(4, 7), Stickiness::NONE),
			(TextRange::new(8, 13), Stickiness::NONE),
		])
	})
	.unwrap();

	let query = doc.query_anchors(TextRange::new(0, 13)).unwrap();
	doc.change(|| doc.replace(0, 13, "", 1)).unwrap();

	let ranges: Vec<_> = query.map(|(_, range)| range).collect();
	assert_eq!(
		ranges,
		vec![TextRange::new(0, 3), TextRange::new(4, 7), TextRange::new(8, 13)]
	);
	assert_eq!(doc.query_anchors(TextRange::point(0)).unwrap().count(), 3);
}

#[test]
fn pinned_reads_ignore_concurrent_commits() {
	let doc = replica("before");
	let scope = doc.store().pin();
	let writer = doc.clone();
	std::thread::spawn(move || writer.change(|| writer.replace(0, 6, "after", 1)).unwrap())
		.join()
		.unwrap();

	assert_eq!(doc.text().unwrap().to_string(), "before");
	drop(scope);
	assert_eq!(doc.text().unwrap().to_string(), "after");
}
