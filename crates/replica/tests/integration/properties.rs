//! Randomized checks of replay, anchor tracking, and registry pairing.

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use strand_primitives::{ChangeSet, Rope, TextRange};
use strand_replica::{AnchorRef, AnchorRegistry, OperationId, ReplicaDocument, Stickiness};
use strand_store::{RecordId, Store};

fn replica(text: &str, retention: usize) -> ReplicaDocument {
	ReplicaDocument::materialize(Arc::new(Store::new()), RecordId::random(), Rope::from(text), 0, retention)
		.unwrap()
}

/// Clamps a raw `(start, end)` pair to a valid span of `len` chars.
fn span(len: usize, a: usize, b: usize) -> (usize, usize) {
	let a = a % (len + 1);
	let b = b % (len + 1);
	(a.min(b), a.max(b))
}

fn arb_edits() -> impl Strategy<Value = Vec<(usize, usize, String)>> {
	prop::collection::vec((any::<usize>(), any::<usize>(), "[a-zé\n]{0,4}"), 1..24)
}

#[derive(Debug, Clone)]
enum RegistryOp {
	Register { anchor: usize, object: usize },
	Unregister { object: usize },
	UnregisterAnchor { anchor: usize },
}

fn arb_registry_ops() -> impl Strategy<Value = Vec<RegistryOp>> {
	let op = prop_oneof![
		3 => (0..6usize, 0..6usize).prop_map(|(anchor, object)| RegistryOp::Register { anchor, object }),
		1 => (0..6usize).prop_map(|object| RegistryOp::Unregister { object }),
		1 => (0..6usize).prop_map(|anchor| RegistryOp::UnregisterAnchor { anchor }),
	];
	prop::collection::vec(op, 0..48)
}

proptest! {
	/// The log replays to the current text whatever its retention.
	#[test]
	fn prop_log_replays_to_text(
		initial in "[a-z ]{0,16}",
		edits in arb_edits(),
		retention in prop_oneof![Just(1usize), Just(3), Just(256)],
	) {
		let doc = replica(&initial, retention);
		let mut model = initial.chars().collect::<Vec<_>>();

		for (stamp, (a, b, text)) in edits.iter().enumerate() {
			let (start, end) = span(model.len(), *a, *b);
			doc.change(|| doc.replace(start, end, text, stamp as i64 + 1)).unwrap();
			let tail = model.split_off(end);
			model.truncate(start);
			model.extend(text.chars());
			model.extend(tail);
		}

		let expected: String = model.into_iter().collect();
		let (text, replayed, held) = doc
			.read(|record| (record.text().to_string(), record.log().replay().to_string(), record.log().len()))
			.unwrap();
		prop_assert_eq!(&text, &expected);
		prop_assert_eq!(&replayed, &expected);
		prop_assert!(held <= retention);
		prop_assert_eq!(doc.revision().unwrap(), edits.len() as u64);
	}

	/// An edit that does not touch an anchor leaves its text intact.
	#[test]
	fn prop_disjoint_edit_preserves_anchor(
		initial in "[a-z]{2,24}",
		anchor in (any::<usize>(), any::<usize>()),
		edit in (any::<usize>(), any::<usize>(), "[A-Z]{0,3}"),
		before in any::<bool>(),
	) {
		let len = initial.chars().count();
		let (a, b) = span(len, anchor.0, anchor.1);
		prop_assume!(a < b);
		// The edit lands entirely at or before `a`, or entirely at or after `b`.
		let (s, e) = if before {
			span(a, edit.0, edit.1)
		} else {
			let (s, e) = span(len - b, edit.0, edit.1);
			(s + b, e + b)
		};

		let doc = replica(&initial, 64);
		let id = doc.change(|| doc.add_anchor(TextRange::new(a, b), Stickiness::NONE)).unwrap();
		let word = doc.substring(TextRange::new(a, b)).unwrap();

		doc.change(|| doc.replace(s, e, &edit.2, 1)).unwrap();

		let range = doc.anchor(id).unwrap().unwrap().range;
		prop_assert_eq!(doc.substring(range).unwrap(), word);
	}

	/// Anchors always stay inside the text and keep `start <= end`.
	#[test]
	fn prop_anchors_stay_in_bounds(
		initial in "[a-z]{0,16}",
		anchors in prop::collection::vec((any::<usize>(), any::<usize>(), any::<bool>(), any::<bool>()), 1..8),
		edits in arb_edits(),
	) {
		let doc = replica(&initial, 16);
		let len = initial.chars().count();
		let specs: Vec<_> = anchors
			.iter()
			.map(|(a, b, left, right)| {
				let (a, b) = span(len, *a, *b);
				(TextRange::new(a, b), Stickiness::new(*left, *right))
			})
			.collect();
		let ids = doc.change(|| doc.add_anchors(specs.clone())).unwrap();

		for (stamp, (a, b, text)) in edits.iter().enumerate() {
			let len = doc.text().unwrap().len_chars();
			let (start, end) = span(len, *a, *b);
			doc.change(|| doc.replace(start, end, text, stamp as i64 + 1)).unwrap();
		}

		let len = doc.text().unwrap().len_chars();
		for id in ids {
			let range = doc.anchor(id).unwrap().unwrap().range;
			prop_assert!(range.start <= range.end);
			prop_assert!(range.end <= len);
		}
	}

	/// Re-applying a logged operation changes nothing.
	#[test]
	fn prop_apply_operation_is_idempotent(
		initial in "[a-z]{0,16}",
		edit in (any::<usize>(), any::<usize>(), "[a-z]{0,4}"),
	) {
		let doc = replica(&initial, 8);
		let len = initial.chars().count();
		let (start, end) = span(len, edit.0, edit.1);
		let changes = ChangeSet::replace(len, start, end, &edit.2);
		let op = OperationId::new();

		let first = doc.change(|| doc.apply_operation(op, 0, &changes, 1)).unwrap();
		let text = doc.text().unwrap();
		let second = doc.change(|| doc.apply_operation(op, 0, &changes, 2)).unwrap();

		prop_assert_eq!(first, second);
		prop_assert_eq!(doc.text().unwrap(), text);
		prop_assert_eq!(doc.mod_stamp().unwrap(), 1);
	}

	/// The registry stays a bijection under any sequence of pairings.
	#[test]
	fn prop_registry_is_bijective(ops in arb_registry_ops()) {
		let doc = replica("abcdef", 8);
		let anchors: Vec<AnchorRef> = doc
			.change(|| doc.add_anchors((0..6).map(|i| (TextRange::point(i), Stickiness::NONE))))
			.unwrap()
			.into_iter()
			.map(|anchor| AnchorRef::new(doc.id(), anchor))
			.collect();
		let objects: Vec<Arc<usize>> = (0..6).map(Arc::new).collect();

		let registry = AnchorRegistry::new();
		let mut model: HashMap<usize, usize> = HashMap::new();

		for op in ops {
			match op {
				RegistryOp::Register { anchor, object } => {
					registry.register(anchors[anchor], Arc::clone(&objects[object]));
					model.retain(|a, o| *a != anchor && *o != object);
					model.insert(anchor, object);
				}
				RegistryOp::Unregister { object } => {
					let expected = model.iter().find(|(_, o)| **o == object).map(|(a, _)| *a);
					prop_assert_eq!(registry.unregister(&objects[object]), expected.map(|a| anchors[a]));
					model.retain(|_, o| *o != object);
				}
				RegistryOp::UnregisterAnchor { anchor } => {
					let removed = registry.unregister_anchor(anchors[anchor]).map(|obj| *obj);
					prop_assert_eq!(removed, model.remove(&anchor));
				}
			}
		}

		prop_assert_eq!(registry.len(), model.len());
		for (i, anchor) in anchors.iter().enumerate() {
			let resolved = registry.resolve(*anchor).map(|obj| *obj);
			prop_assert_eq!(resolved, model.get(&i).copied());
		}
		for (i, object) in objects.iter().enumerate() {
			let expected = model.iter().find(|(_, o)| **o == i).map(|(a, _)| anchors[*a]);
			prop_assert_eq!(registry.anchor_of(object), expected);
		}
	}
}
