use sapling_dom::{
	apply_patches, bind_host_nodes, diff, host::memory::MemoryHost, render, Fact, Host, HostNode, Mount, Node, PatchKind, Value, Widget,
};
use std::{any::Any, cell::Cell, rc::Rc};

use harness_::{ignore, init_tracing, round_trip};

#[test]
fn identical_reference_is_a_no_op() {
	init_tracing();

	let tree = Node::<()>::element("div", [Fact::class("a")], [Node::text("x"), Node::keyed("ul", [], [("k", Node::text("y"))])]);
	let mut patches = diff(&tree, &tree);
	assert!(patches.is_empty());

	let context = ignore();
	let mut host = MemoryHost::new();
	let root = render(&mut host, &tree, &context);
	let before = host.to_html(root);
	assert_eq!(apply_patches(&mut host, root, &tree, &mut patches, &context), root);
	assert_eq!(host.to_html(root), before);
}

#[test]
fn text_and_children() {
	init_tracing();

	round_trip::<()>(&Node::text("a"), &Node::text("b"));
	round_trip::<()>(
		&Node::element("ul", [], [Node::text("a"), Node::text("b")]),
		&Node::element("ul", [], [Node::text("a"), Node::text("b"), Node::text("c"), Node::text("d")]),
	);
	round_trip::<()>(
		&Node::element("ul", [], [Node::text("a"), Node::text("b"), Node::text("c")]),
		&Node::element("ul", [], [Node::text("A")]),
	);
	round_trip::<()>(
		&Node::element("div", [], [Node::element("p", [], [Node::text("a")]), Node::text("b")]),
		&Node::element("div", [], [Node::text("b"), Node::element("p", [], [Node::text("a")])]),
	);
}

#[test]
fn redrawn_root_is_returned() {
	init_tracing();

	let (host, root) = round_trip::<()>(&Node::element("div", [], [Node::text("a")]), &Node::element("section", [], [Node::text("a")]));
	assert_eq!(host.tag(root), Some("section"));
	assert_eq!(host.len(), 2);
}

#[test]
fn element_to_keyed_element_is_diffed_positionally() {
	init_tracing();

	let old = Node::<()>::element("ul", [], [Node::text("a"), Node::text("b")]);
	let new = Node::<()>::keyed("ul", [], [("a", Node::text("a")), ("c", Node::text("c"))]);
	let patches = diff(&old, &new);
	assert!(matches!(patches.as_slice(), [patch] if matches!(&patch.kind, PatchKind::Text(text) if text == "c")));
	round_trip(&old, &new);
}

#[test]
fn fact_deltas() {
	init_tracing();

	let red = || Node::<()>::element("p", [Fact::style("color", "red")], []);
	let plain = || Node::<()>::element("p", [], []);

	let clear = diff(&red(), &plain());
	match clear.as_slice() {
		[patch] => match &patch.kind {
			PatchKind::Facts(facts) => assert_eq!(facts.styles.get("color"), Some(&None)),
			other => panic!("Expected a facts patch, got {:?}", other),
		},
		other => panic!("Expected one patch, got {:?}", other),
	}

	let set = diff(&plain(), &red());
	match set.as_slice() {
		[patch] => match &patch.kind {
			PatchKind::Facts(facts) => assert_eq!(facts.styles.get("color"), Some(&Some("red".to_owned()))),
			other => panic!("Expected a facts patch, got {:?}", other),
		},
		other => panic!("Expected one patch, got {:?}", other),
	}

	assert!(diff(&red(), &red()).is_empty());

	round_trip(&red(), &plain());
	round_trip(&plain(), &red());
	round_trip::<()>(
		&Node::element(
			"input",
			[
				Fact::attribute("type", "text"),
				Fact::property("title", "old"),
				Fact::bool_property("disabled", true),
				Fact::attribute_ns("http://www.w3.org/1999/xlink", "href", "#a"),
			],
			[],
		),
		&Node::element("input", [Fact::attribute("type", "checkbox"), Fact::bool_property("checked", true)], []),
	);
}

#[test]
fn volatile_property_is_only_written_when_it_drifted() {
	init_tracing();

	let view = || Node::<()>::element("input", [Fact::property("value", "typed")], []);
	let mut mount = Mount::new(MemoryHost::new(), view(), |_, _| ());
	let root = mount.root();

	// Same value: diffed but not written, so the patch count reflects the diff only.
	assert_eq!(mount.update(view()), 1);
	assert_eq!(mount.host().property(root, "value"), Some(Value::from("typed")));

	// The user edits the field, then the application re-asserts its value.
	mount.host_mut().set_property(root, "value", &Value::from("edited"));
	mount.update(view());
	assert_eq!(mount.host().property(root, "value"), Some(Value::from("typed")));
}

#[test]
fn addresses_land_on_the_changed_nodes() {
	init_tracing();

	let old = Node::<()>::element(
		"div",
		[],
		[
			Node::element("p", [], [Node::text("a"), Node::text("b")]),
			Node::element("ul", [], [Node::text("c"), Node::text("d")]),
			Node::text("e"),
		],
	);
	let new = Node::<()>::element(
		"div",
		[],
		[
			Node::element("p", [], [Node::text("a"), Node::text("B")]),
			Node::element("ul", [], [Node::text("c"), Node::text("D")]),
			Node::text("E"),
		],
	);

	let context = ignore();
	let mut host = MemoryHost::new();
	let root = render(&mut host, &old, &context);
	let mut patches = diff(&old, &new);
	// div = 0, p = 1, a = 2, b = 3, ul = 4, c = 5, d = 6, e = 7
	assert_eq!(patches.iter().map(|patch| patch.index).collect::<Vec<_>>(), [3, 6, 7]);

	bind_host_nodes(&host, root, &old, &mut patches, &context);
	let children = host.children(root).to_vec();
	let expected: [HostNode; 3] = [host.children(children[0])[1], host.children(children[1])[1], children[2]];
	for (patch, expected) in patches.iter().zip(expected) {
		assert_eq!(patch.host_node(), Some(expected));
	}
	assert_eq!(host.text(expected[0]), Some("b"));
}

struct Calls {
	count: Cell<usize>,
	label: &'static str,
}

fn lazy_view(calls: &Calls) -> Node<()> {
	calls.count.set(calls.count.get() + 1);
	Node::element("span", [], [Node::text(calls.label)])
}

#[test]
fn lazy_nodes_are_memoized() {
	init_tracing();

	let calls = Rc::new(Calls {
		count: Cell::new(0),
		label: "same",
	});
	let old = Node::element("div", [], [Node::lazy(lazy_view, Rc::clone(&calls))]);
	let mut mount = Mount::new(MemoryHost::new(), old, |_, _| ());
	assert_eq!(calls.count.get(), 1);

	let new = Node::element("div", [], [Node::lazy(lazy_view, Rc::clone(&calls))]);
	assert!(diff(mount.tree(), &new).is_empty());
	assert_eq!(mount.update(new), 0);
	assert_eq!(calls.count.get(), 1);

	// The adopted subtree is what the next comparison starts from.
	let newer = Node::element("div", [], [Node::lazy(lazy_view, Rc::clone(&calls))]);
	assert_eq!(mount.update(newer), 0);
	assert_eq!(calls.count.get(), 1);
}

#[test]
fn lazy_nodes_with_new_inputs_are_diffed_relative_to_themselves() {
	init_tracing();

	let first = Rc::new(Calls {
		count: Cell::new(0),
		label: "first",
	});
	let second = Rc::new(Calls {
		count: Cell::new(0),
		label: "second",
	});
	let old = Node::element("div", [], [Node::text("before"), Node::lazy(lazy_view, Rc::clone(&first))]);
	let new = Node::element("div", [], [Node::text("before"), Node::lazy(lazy_view, Rc::clone(&second))]);

	let patches = diff(&old, &new);
	match patches.as_slice() {
		[patch] => {
			assert_eq!(patch.index, 2);
			match &patch.kind {
				// span = 0, text = 1
				PatchKind::Thunk(sub_patches) => assert_eq!(sub_patches.iter().map(|patch| patch.index).collect::<Vec<_>>(), [1]),
				other => panic!("Expected a lazy patch, got {:?}", other),
			}
		}
		other => panic!("Expected one patch, got {:?}", other),
	}
	round_trip(&old, &new);
	assert_eq!(second.count.get(), 1);
}

#[test]
fn removed_subtrees_are_disposed() {
	init_tracing();

	let item = |text: &str| Node::<()>::element("li", [], [Node::text(text)]);
	let mut mount = Mount::new(MemoryHost::new(), Node::element("ul", [], [item("a"), item("b"), item("c")]), |_, _| ());
	assert_eq!(mount.host().len(), 7);

	mount.update(Node::element("ul", [], [item("a")]));
	assert_eq!(mount.host().len(), 3);

	mount.update(Node::element("ol", [], []));
	assert_eq!(mount.host().len(), 1);
	assert_eq!(mount.host().tag(mount.root()), Some("ol"));
}

struct Meter;

fn meter_value(model: &dyn Any) -> f64 {
	*model.downcast_ref::<f64>().expect("Meter models are `f64`s")
}

impl<Msg> Widget<Msg> for Meter {
	fn render(&self, model: &dyn Any, host: &mut dyn Host<Msg>) -> HostNode {
		let node = host.create_element("meter", None);
		host.set_property(node, "value", &Value::Number(meter_value(model)));
		node
	}

	fn diff(&self, old: &dyn Any, new: &dyn Any) -> Option<Rc<dyn Any>> {
		let new = meter_value(new);
		#[allow(clippy::float_cmp)]
		let changed = meter_value(old) != new;
		changed.then(|| Rc::new(new) as Rc<dyn Any>)
	}

	fn apply_patch(&self, host: &mut dyn Host<Msg>, node: HostNode, patch: &dyn Any) -> HostNode {
		host.set_property(node, "value", &Value::Number(meter_value(patch)));
		node
	}
}

#[test]
fn custom_widgets() {
	init_tracing();

	let widget: Rc<dyn Widget<()>> = Rc::new(Meter);
	let meter = |value: f64| Node::custom([Fact::attribute("max", "10")], Rc::new(value), Rc::clone(&widget));

	let (host, root) = round_trip(&meter(1.), &meter(3.));
	assert_eq!(host.to_html(root), r#"<meter max="10" .value="3"></meter>"#);

	let patches = diff(&meter(2.), &meter(2.));
	assert!(patches.is_empty());

	// Equal widgets by value, but not by reference.
	let other = Node::custom([], Rc::new(1.), Rc::new(Meter) as Rc<dyn Widget<()>>);
	let patches = diff(&meter(1.), &other);
	assert!(matches!(patches.as_slice(), [patch] if matches!(patch.kind, PatchKind::Redraw(_))));
}

#[test]
fn tagged_boundaries() {
	init_tracing();

	let tagger = Rc::new(|message: u32| message + 1) as Rc<dyn Fn(u32) -> u32>;
	let inner = || Node::element("b", [], [Node::text("x")]);
	round_trip(&inner().map_with(Rc::clone(&tagger)), &inner());
	round_trip(&inner(), &inner().map_with(Rc::clone(&tagger)));
	round_trip(&inner().map_with(Rc::clone(&tagger)), &Node::element("i", [], []).map_with(Rc::clone(&tagger)));

	// Nesting depth changes force a redraw.
	let patches = diff(&inner().map_with(Rc::clone(&tagger)), &inner().map_with(Rc::clone(&tagger)).map_with(Rc::clone(&tagger)));
	assert!(matches!(patches.as_slice(), [patch] if matches!(patch.kind, PatchKind::Redraw(_))));
}
