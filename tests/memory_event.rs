use sapling_dom::{
	apply_patches, diff,
	event::{Handled, HandlerKind},
	host::memory::MemoryHost,
	render, DecodeError, Fact, Handler, Host, Mount, Node, Propagation, Tagger,
};
use std::{any::Any, cell::RefCell, rc::Rc};

use harness_::{init_tracing, recorder};

struct Click {
	x: i32,
}

fn clicks() -> Handler<i32> {
	Handler::typed(|click: &Click| Ok(click.x))
}

#[test]
fn listeners_decode_and_bubble() {
	init_tracing();

	let (context, log) = recorder();
	let mut host = MemoryHost::new();
	let tree = Node::element("div", [Fact::on("click", Handler::message(-1))], [Node::element("button", [Fact::on("click", clicks())], [])]);
	let root = render(&mut host, &tree, &context);
	let button = host.children(root)[0];

	assert_eq!(host.dispatch(button, "click", &Click { x: 7 }), Propagation::default());
	assert_eq!(*log.borrow(), [(7, false), (-1, false)]);
	assert_eq!(host.listener_count(button), 1);
}

#[test]
fn decode_failures_dispatch_nothing() {
	init_tracing();

	let (context, log) = recorder();
	let mut host = MemoryHost::new();
	let button = render(&mut host, &Node::element("button", [Fact::on("click", clicks())], []), &context);

	assert_eq!(host.dispatch(button, "click", &"not a click"), Propagation::default());
	assert!(log.borrow().is_empty());

	let failing = Handler::<i32>::normal(|_| Err(DecodeError::Failure("nope".to_owned())));
	let button = render(&mut host, &Node::element("button", [Fact::on("click", failing)], []), &context);
	host.dispatch(button, "click", &Click { x: 1 });
	assert!(log.borrow().is_empty());
}

#[test]
fn stopped_propagation_is_synchronous() {
	init_tracing();

	let (context, log) = recorder();
	let mut host = MemoryHost::new();
	let stopping = Handler::MayStopPropagation(Rc::new(|_: &dyn Any| Ok((1, true))));
	let preventing = Handler::Custom(Rc::new(|_: &dyn Any| {
		Ok(Handled {
			message: 2,
			stop_propagation: false,
			prevent_default: true,
		})
	}));
	let tree = Node::element(
		"form",
		[Fact::on("submit", Handler::message(0))],
		[Node::element("button", [Fact::on("submit", stopping)], []), Node::element("input", [Fact::on("submit", preventing)], [])],
	);
	let root = render(&mut host, &tree, &context);
	let children = host.children(root).to_vec();

	let outcome = host.dispatch(children[0], "submit", &());
	assert!(outcome.stop_propagation);
	assert_eq!(*log.borrow(), [(1, true)]);

	log.borrow_mut().clear();
	let outcome = host.dispatch(children[1], "submit", &());
	assert_eq!(
		outcome,
		Propagation {
			stop_propagation: false,
			prevent_default: true,
		}
	);
	assert_eq!(*log.borrow(), [(2, false), (0, false)]);
}

#[test]
fn passivity_follows_handler_kind() {
	assert!(HandlerKind::Normal.is_passive());
	assert!(HandlerKind::MayStopPropagation.is_passive());
	assert!(!HandlerKind::MayPreventDefault.is_passive());
	assert!(!HandlerKind::Custom.is_passive());
}

#[test]
fn same_kind_handlers_are_swapped_in_place() {
	init_tracing();

	let (context, log) = recorder();
	let button = |handler: Handler<i32>| Node::element("button", [Fact::on("click", handler)], []);

	let old = button(Handler::message(1));
	let mut host = MemoryHost::new();
	let root = render(&mut host, &old, &context);
	let listener = host.listener(root, "click").unwrap();

	let new = button(Handler::message(2));
	let mut patches = diff(&old, &new);
	assert_eq!(patches.len(), 1);
	let root = apply_patches(&mut host, root, &old, &mut patches, &context);
	assert!(Rc::ptr_eq(&listener, &host.listener(root, "click").unwrap()));

	host.dispatch(root, "click", &());
	assert_eq!(*log.borrow(), [(2, false)]);

	let newer = button(Handler::MayPreventDefault(Rc::new(|_: &dyn Any| Ok((3, true)))));
	let mut patches = diff(&new, &newer);
	let root = apply_patches(&mut host, root, &new, &mut patches, &context);
	let replacement = host.listener(root, "click").unwrap();
	assert!(!Rc::ptr_eq(&listener, &replacement));
	assert!(!replacement.is_passive());

	let mut patches = diff(&newer, &Node::element("button", [], []));
	let root = apply_patches(&mut host, root, &newer, &mut patches, &context);
	assert_eq!(host.listener_count(root), 0);
}

#[test]
fn taggers_apply_innermost_first() {
	init_tracing();

	let (context, log) = recorder();
	let mut host = MemoryHost::new();
	let tree = Node::element(
		"div",
		[],
		[Node::element("button", [Fact::on("click", Handler::message(1))], [])
			.map(|message| message + 1)
			.map(|message| message * 10)],
	);
	let root = render(&mut host, &tree, &context);
	let button = host.children(root)[0];
	host.dispatch(button, "click", &());
	assert_eq!(*log.borrow(), [(20, false)]);
}

#[test]
fn retagging_reroutes_without_touching_the_host_tree() {
	init_tracing();

	let add: Tagger<i32> = Rc::new(|message| message + 10);
	let multiply: Tagger<i32> = Rc::new(|message| message * 100);
	let button = Node::element("button", [Fact::on("click", Handler::message(1))], []);

	let messages = Rc::new(RefCell::new(Vec::new()));
	let mut mount = Mount::new(MemoryHost::new(), Node::element("div", [], [button.clone().map_with(Rc::clone(&add))]), {
		let messages = Rc::clone(&messages);
		move |message, _| messages.borrow_mut().push(message)
	});
	let root = mount.root();
	let target = mount.host().children(root)[0];
	mount.host().dispatch(target, "click", &());

	let live_nodes = mount.host().len();
	assert_eq!(mount.update(Node::element("div", [], [button.map_with(Rc::clone(&multiply))])), 1);
	assert_eq!(mount.root(), root);
	assert_eq!(mount.host().children(root), [target]);
	assert_eq!(mount.host().len(), live_nodes);

	mount.host().dispatch(target, "click", &());
	assert_eq!(*messages.borrow(), [11, 100]);
}

#[test]
fn listeners_keep_their_context_across_redraws_below_a_boundary() {
	init_tracing();

	let (context, log) = recorder();
	let tagger: Tagger<i32> = Rc::new(|message| -message);
	let old = Node::element("p", [], []).map_with(Rc::clone(&tagger));
	let new = Node::element("button", [Fact::on("click", Handler::message(5))], []).map_with(Rc::clone(&tagger));

	let mut host = MemoryHost::new();
	let root = render(&mut host, &old, &context);
	let mut patches = diff(&old, &new);
	let root = apply_patches(&mut host, root, &old, &mut patches, &context);
	assert_eq!(host.tag(root), Some("button"));
	assert!(host.event_context(root).is_some());

	host.dispatch(root, "click", &());
	assert_eq!(*log.borrow(), [(-5, false)]);
}

struct Body {
	tagger: Tagger<i32>,
	listens: bool,
}

fn lazy_body(body: &Body) -> Node<i32> {
	let facts = if body.listens { vec![Fact::on("click", Handler::message(2))] } else { Vec::new() };
	Node::element("button", facts, []).map_with(Rc::clone(&body.tagger))
}

/// A lazy view whose body is tagged, itself tagged from the outside. Both boundaries share the button's host node.
fn mount_lazy_body(outer: &Tagger<i32>, body: Body) -> (Mount<MemoryHost<i32>, i32>, Rc<RefCell<Vec<i32>>>) {
	let messages = Rc::new(RefCell::new(Vec::new()));
	let mount = Mount::new(MemoryHost::new(), Node::lazy(lazy_body, Rc::new(body)).map_with(Rc::clone(outer)), {
		let messages = Rc::clone(&messages);
		move |message, _| messages.borrow_mut().push(message)
	});
	(mount, messages)
}

#[test]
fn retagging_inside_a_lazy_node_keeps_the_outer_tagger() {
	init_tracing();

	let outer: Tagger<i32> = Rc::new(|message| message + 1000);
	let (mut mount, messages) = mount_lazy_body(
		&outer,
		Body {
			tagger: Rc::new(|message| message * 10),
			listens: true,
		},
	);
	let root = mount.root();
	mount.host().dispatch(root, "click", &());

	let body = Body {
		tagger: Rc::new(|message| message * 100),
		listens: true,
	};
	mount.update(Node::lazy(lazy_body, Rc::new(body)).map_with(Rc::clone(&outer)));
	assert_eq!(mount.root(), root);

	mount.host().dispatch(root, "click", &());
	assert_eq!(*messages.borrow(), [1020, 1200]);
}

#[test]
fn listeners_added_inside_a_lazy_node_see_both_taggers() {
	init_tracing();

	let outer: Tagger<i32> = Rc::new(|message| message + 1000);
	let inner: Tagger<i32> = Rc::new(|message| message * 10);
	let (mut mount, messages) = mount_lazy_body(
		&outer,
		Body {
			tagger: Rc::clone(&inner),
			listens: false,
		},
	);
	let root = mount.root();
	assert_eq!(mount.host().listener_count(root), 0);

	let body = Body {
		tagger: Rc::clone(&inner),
		listens: true,
	};
	mount.update(Node::lazy(lazy_body, Rc::new(body)).map_with(Rc::clone(&outer)));
	assert_eq!(mount.host().listener_count(root), 1);

	mount.host().dispatch(root, "click", &());
	assert_eq!(*messages.borrow(), [1020]);

	// Retagging the outer boundary leaves the inner one alone.
	let doubled: Tagger<i32> = Rc::new(|message| message * 2);
	let body = Body { tagger: inner, listens: true };
	mount.update(Node::lazy(lazy_body, Rc::new(body)).map_with(doubled));
	mount.host().dispatch(root, "click", &());
	assert_eq!(*messages.borrow(), [1020, 40]);
}
