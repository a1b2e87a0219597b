//! Patches and their two-pass application.
//!
//! [`diff`](`crate::diff()`) addresses patches by pre-order index into the *old* node tree.
//! [`bind_host_nodes`] resolves those addresses against the live host tree in a single walk
//! that skips unpatched subtrees by their [descendant count](`Node::descendants`).
//! Only then does [`apply_patches`] start mutating, so no binding is ever computed against a half-patched tree.

use crate::{
	event::{EventContext, Tagger},
	facts::FactsDiff,
	host::{Host, HostNode},
	node::{Node, NodeKind, Tagged, Widget},
	render::{apply_facts_diff, render},
};
use core::{any::Any, fmt};
use std::rc::Rc;
use tracing::{instrument, trace, trace_span};

pub struct Patch<Msg> {
	/// Pre-order address of the patched node in the old tree.
	pub index: usize,
	pub kind: PatchKind<Msg>,
	node: Option<HostNode>,
	context: Option<Rc<EventContext<Msg>>>,
}

pub enum PatchKind<Msg> {
	/// Render the new node and swap it in wholesale.
	Redraw(Node<Msg>),
	Facts(FactsDiff<Msg>),
	Text(String),
	/// Patches for the forced subtree of a lazy node, addressed relative to that subtree.
	Thunk(Vec<Patch<Msg>>),
	/// The new tagger chain of a tagged boundary, outermost first.
	Tagger(Vec<Tagger<Msg>>),
	RemoveLast {
		from: usize,
		count: usize,
	},
	/// `children` are only the new children beyond the old child count.
	Append {
		from: usize,
		children: Vec<Node<Msg>>,
	},
	/// Removes a keyed child, or detaches it for reinsertion elsewhere if it moved.
	Remove(Option<Moved<Msg>>),
	Reorder(Reorder<Msg>),
	Custom {
		widget: Rc<dyn Widget<Msg>>,
		payload: Rc<dyn Any>,
	},
}

/// A keyed child that is reinserted at a new position.
pub struct Moved<Msg> {
	/// Patches for the moved subtree, addressed like the [`Remove`](`PatchKind::Remove`) patch that carries them.
	pub patches: Vec<Patch<Msg>>,
	/// Index into the owning [`Reorder::entries`].
	pub entry: usize,
}

/// The outcome of reconciling a keyed child list.
pub struct Reorder<Msg> {
	/// Removals and in-place patches of kept children, in old-tree address order.
	pub patches: Vec<Patch<Msg>>,
	/// Insertions in ascending order of their new index.
	pub inserts: Vec<Insert>,
	/// Indices into `entries` that are appended, in order, after all other changes.
	pub end_inserts: Vec<usize>,
	pub entries: Vec<Entry<Msg>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insert {
	pub index: usize,
	pub entry: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
	Insert,
	Remove,
	Move,
}

/// Bookkeeping for one key of a keyed child list.
pub struct Entry<Msg> {
	pub kind: EntryKind,
	/// The node this key was first seen with: the new one if it was inserted first, otherwise the old one.
	pub node: Node<Msg>,
	/// Old-tree address of the removed child, or `0` for plain inserts.
	pub address: usize,
	/// New index, unless the child is appended at the end.
	pub index: Option<usize>,
	/// The position of this key's [`Remove`](`PatchKind::Remove`) patch in [`Reorder::patches`], once pushed.
	pub(crate) slot: Option<usize>,
	host: Option<HostNode>,
}

impl<Msg> Patch<Msg> {
	pub(crate) fn new(index: usize, kind: PatchKind<Msg>) -> Self {
		Self {
			index,
			kind,
			node: None,
			context: None,
		}
	}

	/// The live host node this patch was bound to, if [`bind_host_nodes`] ran already.
	#[must_use]
	pub fn host_node(&self) -> Option<HostNode> {
		self.node
	}

	fn node(&self) -> HostNode {
		self.node.unwrap_or_else(|| panic!("Unbound patch at address {}", self.index))
	}

	fn context(&self) -> &Rc<EventContext<Msg>> {
		self.context.as_ref().unwrap_or_else(|| panic!("Unbound patch at address {}", self.index))
	}

	fn bind(&mut self, node: HostNode, context: &Rc<EventContext<Msg>>) {
		self.node = Some(node);
		self.context = Some(Rc::clone(context));
	}
}

impl<Msg> Entry<Msg> {
	pub(crate) fn new(kind: EntryKind, node: Node<Msg>, address: usize, index: Option<usize>) -> Self {
		Self {
			kind,
			node,
			address,
			index,
			slot: None,
			host: None,
		}
	}
}

impl<Msg> Reorder<Msg> {
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.patches.is_empty() && self.inserts.is_empty() && self.end_inserts.is_empty()
	}

	/// The number of keyed children that keep their host node but change position.
	#[must_use]
	pub fn move_count(&self) -> usize {
		self.entries.iter().filter(|entry| entry.kind == EntryKind::Move).count()
	}
}

impl<Msg> fmt::Debug for Patch<Msg> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Patch")
			.field("index", &self.index)
			.field("kind", &self.kind)
			.field("node", &self.node)
			.finish_non_exhaustive()
	}
}

impl<Msg> fmt::Debug for PatchKind<Msg> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Redraw(node) => f.debug_tuple("Redraw").field(node).finish(),
			Self::Facts(diff) => f.debug_tuple("Facts").field(diff).finish(),
			Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
			Self::Thunk(patches) => f.debug_tuple("Thunk").field(patches).finish(),
			Self::Tagger(taggers) => f.debug_tuple("Tagger").field(&taggers.len()).finish(),
			Self::RemoveLast { from, count } => f.debug_struct("RemoveLast").field("from", from).field("count", count).finish(),
			Self::Append { from, children } => f.debug_struct("Append").field("from", from).field("children", children).finish(),
			Self::Remove(None) => f.write_str("Remove"),
			Self::Remove(Some(moved)) => f.debug_struct("Remove").field("moved.patches", &moved.patches).field("moved.entry", &moved.entry).finish(),
			Self::Reorder(reorder) => f
				.debug_struct("Reorder")
				.field("patches", &reorder.patches)
				.field("inserts", &reorder.inserts)
				.field("end_inserts", &reorder.end_inserts)
				.field("moves", &reorder.move_count())
				.finish(),
			Self::Custom { .. } => f.write_str("Custom"),
		}
	}
}

/// Pass one: binds every patch in `patches` (and nested patch lists) to its live host node
/// and to the event context that was active there when the old tree was rendered.
///
/// `root` must be the host node that `old` was rendered (and patched) into.
///
/// # Panics
///
/// Iff the host tree doesn't structurally match `old` where patches need to be bound.
#[instrument(skip(host, root, old, patches, context), fields(patches = patches.len()))]
pub fn bind_host_nodes<Msg>(host: &dyn Host<Msg>, root: HostNode, old: &Node<Msg>, patches: &mut [Patch<Msg>], context: &Rc<EventContext<Msg>>) {
	if !patches.is_empty() {
		bind(host, root, old, patches, 0, 0, old.descendants(), context);
	}
}

#[allow(clippy::too_many_arguments)]
fn bind<Msg>(
	host: &dyn Host<Msg>,
	node: HostNode,
	vnode: &Node<Msg>,
	patches: &mut [Patch<Msg>],
	mut i: usize,
	low: usize,
	high: usize,
	context: &Rc<EventContext<Msg>>,
) -> usize {
	let mut index = patches[i].index;
	while index == low {
		let patch = &mut patches[i];
		match vnode.kind() {
			NodeKind::Tagged(tagged) if matches!(patch.kind, PatchKind::Tagger(_)) => patch.bind(node, &boundary_context(host, node, tagged, index)),
			_ => patch.bind(node, context),
		}
		match &mut patch.kind {
			PatchKind::Thunk(sub_patches) => {
				let NodeKind::Thunk(thunk) = vnode.kind() else {
					panic!("Lazy patch at address {} doesn't target a lazy node", index)
				};
				let forced = thunk.node();
				if !sub_patches.is_empty() {
					bind(host, node, forced, sub_patches, 0, 0, forced.descendants(), context);
				}
			}
			PatchKind::Reorder(Reorder { patches: local, .. }) if !local.is_empty() => {
				bind(host, node, vnode, local, 0, low, high, context);
			}
			PatchKind::Remove(Some(Moved { patches: moved, .. })) if !moved.is_empty() => {
				bind(host, node, vnode, moved, 0, low, high, context);
			}
			_ => (),
		}

		i += 1;
		match patches.get(i) {
			Some(patch) if patch.index <= high => index = patch.index,
			_ => return i,
		}
	}

	match vnode.kind() {
		NodeKind::Tagged(tagged) => {
			let inner_context = boundary_context(host, node, tagged, low);
			bind(host, node, tagged.innermost(), patches, i, low + 1, high, &inner_context)
		}
		NodeKind::Element(element) => bind_children(host, node, element.children.iter(), patches, i, low, high, context),
		NodeKind::KeyedElement(keyed) => bind_children(host, node, keyed.children.iter().map(|(_, child)| child), patches, i, low, high, context),
		NodeKind::Text(_) | NodeKind::Custom(_) | NodeKind::Thunk(_) => {
			assert!(index > high, "Patch address {} lands inside the leaf at {}", index, low);
			i
		}
	}
}

/// The context that `tagged` (rendered at `address` onto `node`) created.
///
/// `node` stores the innermost context, so this walks up past every boundary nested below `tagged` on the same host node.
fn boundary_context<Msg>(host: &dyn Host<Msg>, node: HostNode, tagged: &Tagged<Msg>, address: usize) -> Rc<EventContext<Msg>> {
	let mut context = host
		.event_context(node)
		.unwrap_or_else(|| panic!("Tagged node at address {} has no event context on {:?}", address, node));
	for _ in 0..tagged.innermost().shared_boundaries() {
		let parent = context
			.parent()
			.map(Rc::clone)
			.unwrap_or_else(|| panic!("Event context chain on {:?} is shorter than the tagged nodes at address {}", node, address));
		context = parent;
	}
	context
}

#[allow(clippy::too_many_arguments)]
fn bind_children<'a, Msg: 'a>(
	host: &dyn Host<Msg>,
	node: HostNode,
	children: impl Iterator<Item = &'a Node<Msg>>,
	patches: &mut [Patch<Msg>],
	mut i: usize,
	mut low: usize,
	high: usize,
	context: &Rc<EventContext<Msg>>,
) -> usize {
	let mut index = patches[i].index;
	for (j, child) in children.enumerate() {
		low += 1;
		let next_low = low + child.descendants();
		if low <= index && index <= next_low {
			let host_child = host
				.child(node, j)
				.unwrap_or_else(|| panic!("Missing host child {} of {:?} for patch address {}", j, node, index));
			i = bind(host, host_child, child, patches, i, low, next_low, context);
			match patches.get(i) {
				Some(patch) if patch.index <= high => index = patch.index,
				_ => return i,
			}
		}
		low = next_low;
	}
	i
}

/// Pass two: binds `patches` against the host tree rendered from `old`, then applies them in order.
///
/// Returns the new root host node, which differs from `root` iff the root was redrawn.
/// An empty patch list is a no-op.
///
/// # Panics
///
/// Iff the host tree doesn't structurally match `old`.
#[instrument(skip(host, root, old, patches, context), fields(patches = patches.len()))]
pub fn apply_patches<Msg>(host: &mut dyn Host<Msg>, root: HostNode, old: &Node<Msg>, patches: &mut [Patch<Msg>], context: &Rc<EventContext<Msg>>) -> HostNode {
	if patches.is_empty() {
		trace!("Nothing to do.");
		return root;
	}
	bind_host_nodes(&*host, root, old, patches, context);
	apply_patches_help(host, root, patches, &mut [])
}

fn apply_patches_help<Msg>(host: &mut dyn Host<Msg>, mut root: HostNode, patches: &mut [Patch<Msg>], entries: &mut [Entry<Msg>]) -> HostNode {
	for patch in patches {
		let node = patch.node();
		let new_node = apply_patch(host, patch, entries);
		if node == root {
			root = new_node;
		}
	}
	root
}

fn apply_patch<Msg>(host: &mut dyn Host<Msg>, patch: &mut Patch<Msg>, entries: &mut [Entry<Msg>]) -> HostNode {
	let node = patch.node();
	let context = Rc::clone(patch.context());
	match &mut patch.kind {
		PatchKind::Redraw(vnode) => {
			let span = trace_span!("Redrawing", address = patch.index);
			let _enter = span.enter();

			// The patch context is that of the innermost enclosing boundary, which may share `node`.
			let had_context = host.event_context(node).is_some();
			let new_node = render(host, vnode, &context);
			if had_context && host.event_context(new_node).is_none() {
				host.set_event_context(new_node, context);
			}
			host.replace(node, new_node);
			new_node
		}

		PatchKind::Facts(diff) => {
			apply_facts_diff(host, node, diff, &context);
			node
		}

		PatchKind::Text(text) => {
			host.set_text(node, text);
			node
		}

		PatchKind::Thunk(sub_patches) => apply_patches_help(host, node, sub_patches, &mut []),

		PatchKind::Tagger(taggers) => {
			// Bound to the boundary's own context.
			context.set_taggers(taggers.clone());
			node
		}

		PatchKind::RemoveLast { from, count } => {
			let span = trace_span!("Removing trailing children", from = *from, count = *count);
			let _enter = span.enter();
			for _ in 0..*count {
				let child = host.child(node, *from).unwrap_or_else(|| panic!("Missing host child {} of {:?}", from, node));
				host.remove(child);
			}
			node
		}

		PatchKind::Append { from, children } => {
			let span = trace_span!("Appending children", from = *from, count = children.len());
			let _enter = span.enter();
			let end = host.child(node, *from);
			for child in children.iter() {
				let child = render(host, child, &context);
				host.insert_before(node, child, end);
			}
			node
		}

		PatchKind::Remove(None) => {
			host.remove(node);
			node
		}

		PatchKind::Remove(Some(moved)) => {
			let entry = &entries[moved.entry];
			if entry.index.is_some() {
				host.detach(node);
			}
			let new_node = apply_patches_help(host, node, &mut moved.patches, &mut []);
			entries[moved.entry].host = Some(new_node);
			new_node
		}

		PatchKind::Reorder(reorder) => {
			apply_reorder(host, node, reorder, &context);
			node
		}

		PatchKind::Custom { widget, payload } => {
			let old_context = host.event_context(node);
			let new_node = widget.apply_patch(host, node, &**payload);
			if new_node != node && host.event_context(new_node).is_none() {
				if let Some(old_context) = old_context {
					host.set_event_context(new_node, old_context);
				}
			}
			new_node
		}
	}
}

fn apply_reorder<Msg>(host: &mut dyn Host<Msg>, node: HostNode, reorder: &mut Reorder<Msg>, context: &Rc<EventContext<Msg>>) {
	let span = trace_span!(
		"Reordering keyed children",
		patches = reorder.patches.len(),
		inserts = reorder.inserts.len(),
		end_inserts = reorder.end_inserts.len(),
	);
	let _enter = span.enter();

	let Reorder {
		patches,
		inserts,
		end_inserts,
		entries,
	} = reorder;

	for patch in patches.iter() {
		if let PatchKind::Remove(Some(moved)) = &patch.kind {
			entries[moved.entry].host = Some(patch.node());
		}
	}

	let fragment = if end_inserts.is_empty() {
		None
	} else {
		let fragment = host.create_fragment();
		for &entry in end_inserts.iter() {
			let child = entry_host_node(host, &entries[entry], context);
			host.append_child(fragment, child);
		}
		Some(fragment)
	};

	apply_patches_help(host, node, patches, entries);

	for insert in inserts.iter() {
		let child = entry_host_node(host, &entries[insert.entry], context);
		let reference = host.child(node, insert.index);
		host.insert_before(node, child, reference);
	}

	if let Some(fragment) = fragment {
		host.append_child(node, fragment);
	}
}

fn entry_host_node<Msg>(host: &mut dyn Host<Msg>, entry: &Entry<Msg>, context: &Rc<EventContext<Msg>>) -> HostNode {
	match entry.kind {
		EntryKind::Move => entry.host.unwrap_or_else(|| panic!("Moved keyed child at address {} was never bound", entry.address)),
		EntryKind::Insert | EntryKind::Remove => render(host, &entry.node, context),
	}
}
