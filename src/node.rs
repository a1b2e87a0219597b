//! The immutable node tree.

use crate::{
	event::Tagger,
	facts::{Fact, Facts},
	host::{Host, HostNode},
};
use core::{any::Any, cell::OnceCell, fmt};
use std::rc::Rc;

/// An immutable, cheaply clonable node tree.
///
/// Clones share their allocation and compare [reference-equal](`Node::ptr_eq`),
/// which lets the differ skip them without looking inside.
pub struct Node<Msg>(Rc<NodeKind<Msg>>);

pub enum NodeKind<Msg> {
	Text(String),
	Element(Element<Msg>),
	KeyedElement(KeyedElement<Msg>),
	Custom(Custom<Msg>),
	Tagged(Tagged<Msg>),
	Thunk(Thunk<Msg>),
}

pub struct Element<Msg> {
	pub tag: String,
	pub facts: Facts<Msg>,
	pub children: Vec<Node<Msg>>,
	pub namespace: Option<String>,
	descendants: usize,
}

/// Like [`Element`], but each child carries a key that identifies it across updates.
pub struct KeyedElement<Msg> {
	pub tag: String,
	pub facts: Facts<Msg>,
	pub children: Vec<(String, Node<Msg>)>,
	pub namespace: Option<String>,
	descendants: usize,
}

/// A node that renders, diffs and patches itself through a [`Widget`].
pub struct Custom<Msg> {
	pub facts: Facts<Msg>,
	pub model: Rc<dyn Any>,
	pub widget: Rc<dyn Widget<Msg>>,
}

/// A subtree whose messages pass through `tagger` on their way to the application.
pub struct Tagged<Msg> {
	pub tagger: Tagger<Msg>,
	pub inner: Node<Msg>,
	descendants: usize,
}

/// A lazily built subtree that is reused as long as its function and arguments are reference-equal.
pub struct Thunk<Msg> {
	function: usize,
	arguments: Vec<Rc<dyn Any>>,
	force: Box<dyn Fn() -> Node<Msg>>,
	forced: OnceCell<Node<Msg>>,
}

/// Externally defined rendering, diffing and patching for [`Custom`] nodes.
///
/// Custom nodes are only diffed against each other if their widgets are the same [`Rc`] allocation.
/// The core never inspects `model`.
pub trait Widget<Msg> {
	fn render(&self, model: &dyn Any, host: &mut dyn Host<Msg>) -> HostNode;

	/// Returns a patch payload for [`Widget::apply_patch`], or [`None`] if nothing changed.
	fn diff(&self, old: &dyn Any, new: &dyn Any) -> Option<Rc<dyn Any>>;

	/// Returns the host node that now stands in for `node`, which may be `node` itself.
	fn apply_patch(&self, host: &mut dyn Host<Msg>, node: HostNode, patch: &dyn Any) -> HostNode;
}

impl<Msg> Clone for Node<Msg> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}

impl<Msg> Node<Msg> {
	fn new(kind: NodeKind<Msg>) -> Self {
		Self(Rc::new(kind))
	}

	pub fn text(content: impl Into<String>) -> Self {
		Self::new(NodeKind::Text(content.into()))
	}

	pub fn element(tag: impl Into<String>, facts: impl IntoIterator<Item = Fact<Msg>>, children: impl IntoIterator<Item = Self>) -> Self {
		Self::new(NodeKind::Element(Element::new(tag.into(), None, facts, children.into_iter().collect())))
	}

	/// An element with an explicit namespace, which takes precedence over a `namespace` fact.
	pub fn element_ns(
		namespace: impl Into<String>,
		tag: impl Into<String>,
		facts: impl IntoIterator<Item = Fact<Msg>>,
		children: impl IntoIterator<Item = Self>,
	) -> Self {
		Self::new(NodeKind::Element(Element::new(tag.into(), Some(namespace.into()), facts, children.into_iter().collect())))
	}

	pub fn keyed<K: Into<String>>(tag: impl Into<String>, facts: impl IntoIterator<Item = Fact<Msg>>, children: impl IntoIterator<Item = (K, Self)>) -> Self {
		let children = children.into_iter().map(|(key, child)| (key.into(), child)).collect();
		Self::new(NodeKind::KeyedElement(KeyedElement::new(tag.into(), None, facts, children)))
	}

	pub fn keyed_ns<K: Into<String>>(
		namespace: impl Into<String>,
		tag: impl Into<String>,
		facts: impl IntoIterator<Item = Fact<Msg>>,
		children: impl IntoIterator<Item = (K, Self)>,
	) -> Self {
		let children = children.into_iter().map(|(key, child)| (key.into(), child)).collect();
		Self::new(NodeKind::KeyedElement(KeyedElement::new(tag.into(), Some(namespace.into()), facts, children)))
	}

	pub fn custom(facts: impl IntoIterator<Item = Fact<Msg>>, model: Rc<dyn Any>, widget: Rc<dyn Widget<Msg>>) -> Self {
		let (facts, _) = Facts::organize(facts);
		Self::new(NodeKind::Custom(Custom { facts, model, widget }))
	}

	/// Wraps this subtree so that its messages pass through `tagger`.
	///
	/// Each call allocates a new tagger, which differs by reference from all earlier ones.
	/// Use [`Node::map_with`] to reuse a tagger across updates.
	#[must_use]
	pub fn map(self, tagger: impl Fn(Msg) -> Msg + 'static) -> Self {
		self.map_with(Rc::new(tagger))
	}

	#[must_use]
	pub fn map_with(self, tagger: Tagger<Msg>) -> Self {
		let descendants = 1 + self.descendants();
		Self::new(NodeKind::Tagged(Tagged {
			tagger,
			inner: self,
			descendants,
		}))
	}

	#[must_use]
	pub fn kind(&self) -> &NodeKind<Msg> {
		&self.0
	}

	/// The number of nodes transitively contained in this one, as used for addressing.
	///
	/// Text, custom and lazy nodes count as leaves here. Patches inside a lazy node are addressed relative to it.
	#[must_use]
	pub fn descendants(&self) -> usize {
		match self.kind() {
			NodeKind::Text(_) | NodeKind::Custom(_) | NodeKind::Thunk(_) => 0,
			NodeKind::Element(element) => element.descendants,
			NodeKind::KeyedElement(keyed) => keyed.descendants,
			NodeKind::Tagged(tagged) => tagged.descendants,
		}
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	/// The number of tagged boundaries at or below this node that render onto the same host node,
	/// looking through lazy nodes. Directly nested tagged nodes count once.
	pub(crate) fn shared_boundaries(&self) -> usize {
		let mut count = 0;
		let mut node = self;
		loop {
			match node.kind() {
				NodeKind::Thunk(thunk) => node = thunk.node(),
				NodeKind::Tagged(tagged) => {
					count += 1;
					node = tagged.innermost();
				}
				NodeKind::Text(_) | NodeKind::Element(_) | NodeKind::KeyedElement(_) | NodeKind::Custom(_) => return count,
			}
		}
	}
}

impl<Msg: 'static> Node<Msg> {
	/// A lazy node that calls `function(&argument)` only when `function` or `argument` changed by reference.
	pub fn lazy<A: 'static>(function: fn(&A) -> Self, argument: Rc<A>) -> Self {
		let arguments: Vec<Rc<dyn Any>> = vec![argument.clone() as Rc<dyn Any>];
		Self::new(NodeKind::Thunk(Thunk {
			function: function as usize,
			arguments,
			force: Box::new(move || function(&argument)),
			forced: OnceCell::new(),
		}))
	}

	pub fn lazy2<A: 'static, B: 'static>(function: fn(&A, &B) -> Self, a: Rc<A>, b: Rc<B>) -> Self {
		let arguments: Vec<Rc<dyn Any>> = vec![a.clone() as Rc<dyn Any>, b.clone()];
		Self::new(NodeKind::Thunk(Thunk {
			function: function as usize,
			arguments,
			force: Box::new(move || function(&a, &b)),
			forced: OnceCell::new(),
		}))
	}

	pub fn lazy3<A: 'static, B: 'static, C: 'static>(function: fn(&A, &B, &C) -> Self, a: Rc<A>, b: Rc<B>, c: Rc<C>) -> Self {
		let arguments: Vec<Rc<dyn Any>> = vec![a.clone() as Rc<dyn Any>, b.clone(), c.clone()];
		Self::new(NodeKind::Thunk(Thunk {
			function: function as usize,
			arguments,
			force: Box::new(move || function(&a, &b, &c)),
			forced: OnceCell::new(),
		}))
	}
}

fn count_descendants<'a, Msg: 'a>(children: impl ExactSizeIterator<Item = &'a Node<Msg>>) -> usize {
	let len = children.len();
	len + children.map(Node::descendants).sum::<usize>()
}

impl<Msg> Element<Msg> {
	fn new(tag: String, namespace: Option<String>, facts: impl IntoIterator<Item = Fact<Msg>>, children: Vec<Node<Msg>>) -> Self {
		let (facts, fact_namespace) = Facts::organize(facts);
		let descendants = count_descendants(children.iter());
		Self {
			tag,
			facts,
			children,
			namespace: namespace.or(fact_namespace),
			descendants,
		}
	}
}

impl<Msg> KeyedElement<Msg> {
	fn new(tag: String, namespace: Option<String>, facts: impl IntoIterator<Item = Fact<Msg>>, children: Vec<(String, Node<Msg>)>) -> Self {
		let (facts, fact_namespace) = Facts::organize(facts);
		let descendants = count_descendants(children.iter().map(|(_, child)| child));
		Self {
			tag,
			facts,
			children,
			namespace: namespace.or(fact_namespace),
			descendants,
		}
	}
}

impl<Msg> Tagged<Msg> {
	/// Collapses directly nested tagged nodes.
	///
	/// Returns their taggers outermost first, and the first node below them that isn't tagged.
	#[must_use]
	pub fn chain(&self) -> (Vec<Tagger<Msg>>, &Node<Msg>) {
		let mut taggers = vec![Rc::clone(&self.tagger)];
		let mut inner = &self.inner;
		while let NodeKind::Tagged(tagged) = inner.kind() {
			taggers.push(Rc::clone(&tagged.tagger));
			inner = &tagged.inner;
		}
		(taggers, inner)
	}

	/// The first node below this one that isn't tagged.
	#[must_use]
	pub fn innermost(&self) -> &Node<Msg> {
		let mut inner = &self.inner;
		while let NodeKind::Tagged(tagged) = inner.kind() {
			inner = &tagged.inner;
		}
		inner
	}
}

impl<Msg> Thunk<Msg> {
	/// The subtree, which is built on first access.
	pub fn node(&self) -> &Node<Msg> {
		self.forced.get_or_init(|| (self.force)())
	}

	#[must_use]
	pub fn is_forced(&self) -> bool {
		self.forced.get().is_some()
	}

	/// Whether `other` was created from the same function and reference-equal arguments.
	#[must_use]
	pub fn same_inputs(&self, other: &Self) -> bool {
		self.function == other.function
			&& self.arguments.len() == other.arguments.len()
			&& self.arguments.iter().zip(&other.arguments).all(|(a, b)| Rc::ptr_eq(a, b))
	}

	/// Takes over a subtree built by an earlier thunk with the same inputs, so this one is never forced.
	pub(crate) fn adopt(&self, forced: Node<Msg>) {
		// Already forced means the subtree was built from the same inputs anyway.
		let _ = self.forced.set(forced);
	}
}

impl<Msg> fmt::Debug for Node<Msg> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.kind() {
			NodeKind::Text(text) => f.debug_tuple("Text").field(text).finish(),
			NodeKind::Element(element) => f
				.debug_struct("Element")
				.field("tag", &element.tag)
				.field("namespace", &element.namespace)
				.field("facts", &element.facts)
				.field("children", &element.children)
				.finish(),
			NodeKind::KeyedElement(keyed) => f
				.debug_struct("KeyedElement")
				.field("tag", &keyed.tag)
				.field("namespace", &keyed.namespace)
				.field("facts", &keyed.facts)
				.field("children", &keyed.children)
				.finish(),
			NodeKind::Custom(custom) => f.debug_struct("Custom").field("facts", &custom.facts).finish_non_exhaustive(),
			NodeKind::Tagged(tagged) => f.debug_tuple("Tagged").field(&tagged.inner).finish(),
			NodeKind::Thunk(thunk) => match thunk.forced.get() {
				Some(forced) => f.debug_tuple("Thunk").field(forced).finish(),
				None => f.write_str("Thunk(<unforced>)"),
			},
		}
	}
}
