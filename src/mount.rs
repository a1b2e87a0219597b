//! Keeping a host tree in sync with successive node trees.

use crate::{
	diff::diff,
	event::EventContext,
	host::{Host, HostNode},
	node::Node,
	patch::apply_patches,
	render::render,
};
use core::fmt;
use std::rc::Rc;
use tracing::{info, instrument};

/// A rendered node tree together with the host tree it lives in.
///
/// The root host node is created detached. Attach it wherever it should appear,
/// and keep using [`Mount::root`] afterwards since a redraw of the root replaces it.
pub struct Mount<H, Msg> {
	host: H,
	root: HostNode,
	tree: Node<Msg>,
	context: Rc<EventContext<Msg>>,
}

impl<H: Host<Msg>, Msg> Mount<H, Msg> {
	/// Renders `tree` into `host`.
	///
	/// Messages from its event handlers are passed to `sink`,
	/// together with whether they must be processed synchronously.
	pub fn new(mut host: H, tree: Node<Msg>, sink: impl Fn(Msg, bool) + 'static) -> Self {
		let context = EventContext::root(sink);
		let root = render(&mut host, &tree, &context);
		Self { host, root, tree, context }
	}

	/// Diffs `next` against the current tree, patches the host tree and keeps `next` as the current tree.
	///
	/// Returns the number of top-level patches that were applied.
	#[instrument(skip(self, next))]
	pub fn update(&mut self, next: Node<Msg>) -> usize {
		let mut patches = diff(&self.tree, &next);
		let count = patches.len();
		self.root = apply_patches(&mut self.host, self.root, &self.tree, &mut patches, &self.context);
		self.tree = next;
		info!("Applied {} patch(es).", count);
		count
	}

	#[must_use]
	pub fn host(&self) -> &H {
		&self.host
	}

	/// Direct access to the host tree.
	///
	/// Changing anything inside [`Mount::root`] breaks the next [`Mount::update`].
	pub fn host_mut(&mut self) -> &mut H {
		&mut self.host
	}

	#[must_use]
	pub fn root(&self) -> HostNode {
		self.root
	}

	#[must_use]
	pub fn tree(&self) -> &Node<Msg> {
		&self.tree
	}

	#[must_use]
	pub fn into_host(self) -> H {
		self.host
	}
}

impl<H: fmt::Debug, Msg> fmt::Debug for Mount<H, Msg> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Mount")
			.field("host", &self.host)
			.field("root", &self.root)
			.field("tree", &self.tree)
			.finish_non_exhaustive()
	}
}
