use proptest::{prelude::*, sample::subsequence};
use sapling_dom::{apply_patches, diff, host::memory::MemoryHost, render, Fact, HostNode, Node, PatchKind};
use std::collections::HashMap;

use harness_::{ignore, init_tracing, round_trip};

fn item(text: &str) -> Node<()> {
	Node::element("li", [], [Node::text(text)])
}

fn list<K: ToString>(items: impl IntoIterator<Item = (K, String)>) -> Node<()> {
	Node::keyed("ul", [Fact::class("list")], items.into_iter().map(|(key, text)| (key.to_string(), item(&text))))
}

/// Renders `old`, patches it into `new` and returns the host, the old children and the new children.
fn patch_list(old: &Node<()>, new: &Node<()>) -> (MemoryHost<()>, Vec<HostNode>, Vec<HostNode>) {
	let context = ignore();
	let mut host = MemoryHost::new();
	let root = render(&mut host, old, &context);
	let before = host.children(root).to_vec();
	let mut patches = diff(old, new);
	let root = apply_patches(&mut host, root, old, &mut patches, &context);
	let after = host.children(root).to_vec();
	(host, before, after)
}

fn texts(host: &MemoryHost<()>, children: &[HostNode]) -> Vec<String> {
	children.iter().map(|&child| host.text(host.children(child)[0]).unwrap().to_owned()).collect()
}

#[test]
fn swapped_pair_keeps_host_nodes() {
	init_tracing();

	let old = list([("k1", "A".to_owned()), ("k2", "B".to_owned()), ("k3", "C".to_owned())]);
	let new = list([("k2", "B'".to_owned()), ("k1", "A".to_owned()), ("k3", "C".to_owned())]);

	let patches = diff(&old, &new);
	let [patch] = patches.as_slice() else {
		panic!("Expected exactly one patch, got {:?}", patches)
	};
	let PatchKind::Reorder(reorder) = &patch.kind else {
		panic!("Expected a reorder, got {:?}", patch)
	};
	assert_eq!(reorder.move_count(), 1);
	assert_eq!(reorder.inserts.len(), 1);
	assert_eq!(reorder.inserts[0].index, 0);
	// Only the moved item is patched, in place. `k3` isn't touched at all.
	assert_eq!(reorder.patches.len(), 1);
	let PatchKind::Remove(Some(moved)) = &reorder.patches[0].kind else {
		panic!("Expected a move, got {:?}", reorder.patches[0])
	};
	assert!(matches!(moved.patches.as_slice(), [inner] if matches!(&inner.kind, PatchKind::Text(text) if text == "B'")));

	let (host, before, after) = patch_list(&old, &new);
	assert_eq!(after, [before[1], before[0], before[2]]);
	assert_eq!(texts(&host, &after), ["B'", "A", "C"]);
	assert_eq!(host.len(), 7);
}

#[test]
fn rotation_moves_instead_of_recreating() {
	init_tracing();

	let keys = |keys: &[&str]| list(keys.iter().map(|&key| (key, key.to_owned())));
	let (host, before, after) = patch_list(&keys(&["a", "b", "c"]), &keys(&["c", "a", "b"]));
	assert_eq!(after, [before[2], before[0], before[1]]);
	assert_eq!(texts(&host, &after), ["c", "a", "b"]);

	let (host, before, after) = patch_list(&keys(&["a", "b", "c"]), &keys(&["b", "c", "a"]));
	assert_eq!(after, [before[1], before[2], before[0]]);
	assert_eq!(texts(&host, &after), ["b", "c", "a"]);
}

#[test]
fn single_insertions_and_removals() {
	init_tracing();

	let keys = |keys: &[&str]| list(keys.iter().map(|&key| (key, key.to_owned())));

	let (host, before, after) = patch_list(&keys(&["a", "c"]), &keys(&["a", "b", "c"]));
	assert_eq!(texts(&host, &after), ["a", "b", "c"]);
	assert_eq!((after[0], after[2]), (before[0], before[1]));

	let (host, before, after) = patch_list(&keys(&["a", "b", "c"]), &keys(&["a", "c"]));
	assert_eq!(texts(&host, &after), ["a", "c"]);
	assert_eq!(after, [before[0], before[2]]);
	assert!(!host.contains(before[1]));

	let (host, before, after) = patch_list(&keys(&["a", "b", "c"]), &keys(&["a", "x", "c"]));
	assert_eq!(texts(&host, &after), ["a", "x", "c"]);
	assert_eq!((after[0], after[2]), (before[0], before[2]));
	assert!(!host.contains(before[1]));
}

#[test]
fn shuffles_degrade_but_end_up_in_order() {
	init_tracing();

	let keys = |keys: &[&str]| list(keys.iter().map(|&key| (key, key.to_owned())));
	let (host, before, after) = patch_list(&keys(&["a", "b", "c", "d"]), &keys(&["d", "c", "b", "a"]));
	assert_eq!(texts(&host, &after), ["d", "c", "b", "a"]);
	// Every key is removed and reinserted at the end, which still reuses its host node.
	assert_eq!(after, [before[3], before[2], before[1], before[0]]);

	round_trip(&keys(&["a", "b", "c", "d", "e"]), &keys(&["c", "e", "a", "d", "b"]));
	round_trip(&keys(&["a", "b", "c"]), &keys(&[]));
	round_trip(&keys(&[]), &keys(&["a", "b", "c"]));
}

#[test]
fn duplicate_keys_still_render_in_order() {
	init_tracing();

	let entries = |entries: &[(&str, &str)]| list(entries.iter().map(|&(key, text)| (key, text.to_owned())));
	round_trip(&entries(&[("a", "1"), ("a", "2"), ("b", "3")]), &entries(&[("b", "3"), ("a", "2"), ("a", "1")]));
	round_trip(&entries(&[("a", "1"), ("b", "2"), ("a", "3")]), &entries(&[("b", "2")]));
	round_trip(&entries(&[("x", "1")]), &entries(&[("x", "1"), ("x", "2"), ("x", "3")]));
}

#[test]
fn moved_subtrees_can_be_redrawn() {
	init_tracing();

	let old = Node::<()>::keyed("div", [], [("a", item("a")), ("b", item("b")), ("c", item("c"))]);
	let new = Node::<()>::keyed("div", [], [("c", Node::element("p", [], [Node::text("c")])), ("a", item("a")), ("b", item("b"))]);
	round_trip(&old, &new);

	let new = Node::<()>::keyed("div", [], [("b", item("b")), ("c", item("c")), ("a", Node::text("a"))]);
	round_trip(&old, &new);
}

#[test]
fn nested_keyed_lists() {
	init_tracing();

	let group = |name: &str, items: &[&str]| Node::<()>::keyed("ol", [Fact::attribute("title", name)], items.iter().map(|&key| (key, item(key))));
	let old = Node::keyed("div", [], [("x", group("x", &["1", "2", "3"])), ("y", group("y", &["4", "5"]))]);
	let new = Node::keyed("div", [], [("y", group("y", &["5", "4"])), ("x", group("x", &["1", "3"]))]);
	round_trip(&old, &new);
}

fn keys() -> impl Strategy<Value = Vec<u8>> {
	subsequence((0..12).collect::<Vec<u8>>(), 0..=12).prop_shuffle()
}

proptest! {
	#[test]
	fn reconciliation_preserves_order_and_identity(old_keys in keys(), new_keys in keys(), edited in any::<u8>()) {
		init_tracing();

		let old = list(old_keys.iter().map(|&key| (key, key.to_string())));
		// Some items change content too, which must follow them when they move.
		let new = list(new_keys.iter().map(|&key| (key, if key % 4 == edited % 4 { format!("{}*", key) } else { key.to_string() })));

		let (host, before, after) = patch_list(&old, &new);
		let expected: Vec<String> = new_keys.iter().map(|&key| if key % 4 == edited % 4 { format!("{}*", key) } else { key.to_string() }).collect();
		prop_assert_eq!(texts(&host, &after), expected);

		let old_nodes: HashMap<u8, HostNode> = old_keys.iter().copied().zip(before).collect();
		for (key, node) in new_keys.iter().zip(&after) {
			if let Some(old_node) = old_nodes.get(key) {
				prop_assert_eq!(old_node, node, "Key {} lost its host node", key);
			}
		}
		prop_assert_eq!(host.len(), 1 + 2 * new_keys.len());
	}
}
