//! An arena-backed host tree that lives entirely in memory.
//!
//! Useful for headless rendering, server-side output and tests:
//! [`MemoryHost::dispatch`] simulates bubbling events and [`MemoryHost::to_html`] serialises a subtree deterministically.

use super::{Host, HostNode};
use crate::{
	event::{EventContext, Listener, Propagation},
	facts::Value,
};
use core::{
	any::Any,
	fmt::{self, Write as _},
};
use hashbrown::HashMap;
use slotmap::SlotMap;
use std::{collections::BTreeMap, rc::Rc};
use tracing::{instrument, trace, trace_span};

pub struct MemoryHost<Msg> {
	nodes: SlotMap<HostNode, MemoryNode<Msg>>,
}

struct MemoryNode<Msg> {
	data: NodeData,
	parent: Option<HostNode>,
	children: Vec<HostNode>,
	listeners: HashMap<String, Rc<Listener<Msg>>>,
	context: Option<Rc<EventContext<Msg>>>,
}

enum NodeData {
	Text(String),
	Element {
		tag: String,
		namespace: Option<String>,
		properties: BTreeMap<String, Value>,
		styles: BTreeMap<String, String>,
		attributes: BTreeMap<String, String>,
		attributes_ns: BTreeMap<(String, String), String>,
	},
	Fragment,
}

impl<Msg> fmt::Debug for MemoryHost<Msg> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MemoryHost").field("len()", &self.nodes.len()).finish_non_exhaustive()
	}
}

impl<Msg> Default for MemoryHost<Msg> {
	fn default() -> Self {
		Self::new()
	}
}

impl<Msg> MemoryHost<Msg> {
	#[must_use]
	pub fn new() -> Self {
		Self { nodes: SlotMap::with_key() }
	}

	/// The number of live (not disposed) nodes, attached or not.
	#[must_use]
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	#[must_use]
	pub fn contains(&self, node: HostNode) -> bool {
		self.nodes.contains_key(node)
	}

	fn node(&self, node: HostNode) -> &MemoryNode<Msg> {
		self.nodes.get(node).unwrap_or_else(|| panic!("Stale or foreign host node {:?}", node))
	}

	fn node_mut(&mut self, node: HostNode) -> &mut MemoryNode<Msg> {
		self.nodes.get_mut(node).unwrap_or_else(|| panic!("Stale or foreign host node {:?}", node))
	}

	fn insert(&mut self, data: NodeData) -> HostNode {
		self.nodes.insert(MemoryNode {
			data,
			parent: None,
			children: Vec::new(),
			listeners: HashMap::new(),
			context: None,
		})
	}

	fn element_data_mut(&mut self, node: HostNode) -> &mut NodeData {
		let data = &mut self.node_mut(node).data;
		assert!(matches!(data, NodeData::Element { .. }), "Expected an element host node");
		data
	}

	/// Text content of a text node.
	#[must_use]
	pub fn text(&self, node: HostNode) -> Option<&str> {
		match &self.node(node).data {
			NodeData::Text(text) => Some(text),
			_ => None,
		}
	}

	#[must_use]
	pub fn tag(&self, node: HostNode) -> Option<&str> {
		match &self.node(node).data {
			NodeData::Element { tag, .. } => Some(tag),
			_ => None,
		}
	}

	#[must_use]
	pub fn namespace(&self, node: HostNode) -> Option<&str> {
		match &self.node(node).data {
			NodeData::Element { namespace, .. } => namespace.as_deref(),
			_ => None,
		}
	}

	#[must_use]
	pub fn children(&self, node: HostNode) -> &[HostNode] {
		&self.node(node).children
	}

	#[must_use]
	pub fn attribute(&self, node: HostNode, key: &str) -> Option<&str> {
		match &self.node(node).data {
			NodeData::Element { attributes, .. } => attributes.get(key).map(String::as_str),
			_ => None,
		}
	}

	#[must_use]
	pub fn style(&self, node: HostNode, key: &str) -> Option<&str> {
		match &self.node(node).data {
			NodeData::Element { styles, .. } => styles.get(key).map(String::as_str),
			_ => None,
		}
	}

	#[must_use]
	pub fn listener_count(&self, node: HostNode) -> usize {
		self.node(node).listeners.len()
	}

	fn unlink(&mut self, node: HostNode) {
		if let Some(parent) = self.node_mut(node).parent.take() {
			let siblings = &mut self.node_mut(parent).children;
			let position = siblings
				.iter()
				.position(|&sibling| sibling == node)
				.unwrap_or_else(|| panic!("Host node {:?} is missing from its parent's children", node));
			siblings.remove(position);
		}
	}

	fn dispose(&mut self, node: HostNode) {
		let mut pending = vec![node];
		while let Some(node) = pending.pop() {
			if let Some(removed) = self.nodes.remove(node) {
				pending.extend(removed.children);
			}
		}
	}

	/// Inserts `child` (or a fragment's children) at `position` in `parent`'s children.
	fn adopt(&mut self, parent: HostNode, child: HostNode, position: Option<usize>) {
		let moved = if matches!(self.node(child).data, NodeData::Fragment) {
			let moved = core::mem::take(&mut self.node_mut(child).children);
			self.nodes.remove(child);
			moved
		} else {
			assert!(parent != child, "Tried to insert host node {:?} into itself", child);
			self.unlink(child);
			vec![child]
		};

		for &moved_child in &moved {
			self.node_mut(moved_child).parent = Some(parent);
		}
		let children = &mut self.node_mut(parent).children;
		match position {
			Some(position) => drop(children.splice(position..position, moved)),
			None => children.extend(moved),
		}
	}

	/// Fires an event named `name` at `target` and bubbles it up through its ancestors
	/// until a listener stops propagation.
	#[instrument(skip(self, event))]
	pub fn dispatch(&self, target: HostNode, name: &str, event: &dyn Any) -> Propagation {
		let mut outcome = Propagation::default();
		let mut current = Some(target);
		while let Some(node) = current {
			let node = self.node(node);
			if let Some(listener) = node.listeners.get(name) {
				let Propagation {
					stop_propagation,
					prevent_default,
				} = Rc::clone(listener).handle(event);
				outcome.prevent_default |= prevent_default;
				if stop_propagation {
					trace!("Propagation stopped.");
					outcome.stop_propagation = true;
					break;
				}
			}
			current = node.parent;
		}
		outcome
	}

	/// Serialises the subtree at `node`.
	///
	/// Attributes, properties (prefixed with `.`) and styles are sorted by name.
	/// Unset properties ([`Value::Null`] or empty strings) are omitted. Listeners aren't shown.
	#[must_use]
	pub fn to_html(&self, node: HostNode) -> String {
		let mut html = String::new();
		self.write_html(node, &mut html);
		html
	}

	fn write_html(&self, node: HostNode, html: &mut String) {
		let memory_node = self.node(node);
		match &memory_node.data {
			NodeData::Text(text) => html.push_str(text),
			NodeData::Fragment => {
				for &child in &memory_node.children {
					self.write_html(child, html);
				}
			}
			NodeData::Element {
				tag,
				namespace,
				properties,
				styles,
				attributes,
				attributes_ns,
			} => {
				html.push('<');
				html.push_str(tag);
				if let Some(namespace) = namespace {
					let _ = write!(html, " xmlns=\"{}\"", namespace);
				}
				for (key, value) in attributes {
					let _ = write!(html, " {}=\"{}\"", key, value);
				}
				for ((namespace, key), value) in attributes_ns {
					let _ = write!(html, " {}|{}=\"{}\"", namespace, key, value);
				}
				for (key, value) in properties {
					match value {
						Value::Null => (),
						Value::String(string) if string.is_empty() => (),
						value => {
							let _ = write!(html, " .{}=\"{}\"", key, value);
						}
					}
				}
				if !styles.is_empty() {
					html.push_str(" style=\"");
					for (key, value) in styles {
						let _ = write!(html, "{}: {};", key, value);
					}
					html.push('"');
				}
				html.push('>');
				for &child in &memory_node.children {
					self.write_html(child, html);
				}
				let _ = write!(html, "</{}>", tag);
			}
		}
	}
}

impl<Msg> Host<Msg> for MemoryHost<Msg> {
	fn create_text(&mut self, text: &str) -> HostNode {
		self.insert(NodeData::Text(text.to_owned()))
	}

	fn create_element(&mut self, tag: &str, namespace: Option<&str>) -> HostNode {
		self.insert(NodeData::Element {
			tag: tag.to_owned(),
			namespace: namespace.map(ToOwned::to_owned),
			properties: BTreeMap::new(),
			styles: BTreeMap::new(),
			attributes: BTreeMap::new(),
			attributes_ns: BTreeMap::new(),
		})
	}

	fn create_fragment(&mut self) -> HostNode {
		self.insert(NodeData::Fragment)
	}

	fn set_text(&mut self, node: HostNode, new_text: &str) {
		match &mut self.node_mut(node).data {
			NodeData::Text(text) => new_text.clone_into(text),
			_ => panic!("Expected a text host node at {:?}", node),
		}
	}

	fn property(&self, node: HostNode, key: &str) -> Option<Value> {
		match &self.node(node).data {
			NodeData::Element { properties, .. } => properties.get(key).cloned(),
			_ => None,
		}
	}

	fn set_property(&mut self, node: HostNode, key: &str, value: &Value) {
		if let NodeData::Element { properties, .. } = self.element_data_mut(node) {
			match value {
				Value::Null => drop(properties.remove(key)),
				value => drop(properties.insert(key.to_owned(), value.clone())),
			}
		}
	}

	fn set_style(&mut self, node: HostNode, key: &str, value: Option<&str>) {
		if let NodeData::Element { styles, .. } = self.element_data_mut(node) {
			match value {
				None | Some("") => drop(styles.remove(key)),
				Some(value) => drop(styles.insert(key.to_owned(), value.to_owned())),
			}
		}
	}

	fn set_attribute(&mut self, node: HostNode, key: &str, value: Option<&str>) {
		if let NodeData::Element { attributes, .. } = self.element_data_mut(node) {
			match value {
				None => drop(attributes.remove(key)),
				Some(value) => drop(attributes.insert(key.to_owned(), value.to_owned())),
			}
		}
	}

	fn set_attribute_ns(&mut self, node: HostNode, namespace: &str, key: &str, value: Option<&str>) {
		if let NodeData::Element { attributes_ns, .. } = self.element_data_mut(node) {
			let entry_key = (namespace.to_owned(), key.to_owned());
			match value {
				None => drop(attributes_ns.remove(&entry_key)),
				Some(value) => drop(attributes_ns.insert(entry_key, value.to_owned())),
			}
		}
	}

	fn child(&self, node: HostNode, index: usize) -> Option<HostNode> {
		self.node(node).children.get(index).copied()
	}

	fn child_count(&self, node: HostNode) -> usize {
		self.node(node).children.len()
	}

	fn parent(&self, node: HostNode) -> Option<HostNode> {
		self.node(node).parent
	}

	fn append_child(&mut self, parent: HostNode, child: HostNode) {
		self.adopt(parent, child, None);
	}

	fn insert_before(&mut self, parent: HostNode, child: HostNode, reference: Option<HostNode>) {
		if reference == Some(child) {
			return;
		}
		// Detach first, since that may shift the reference's position.
		if !matches!(self.node(child).data, NodeData::Fragment) {
			self.unlink(child);
		}
		let position = reference.map(|reference| {
			self.node(parent)
				.children
				.iter()
				.position(|&sibling| sibling == reference)
				.unwrap_or_else(|| panic!("Reference host node {:?} is not a child of {:?}", reference, parent))
		});
		self.adopt(parent, child, position);
	}

	fn detach(&mut self, node: HostNode) {
		let span = trace_span!("Detaching host node", ?node);
		let _enter = span.enter();
		self.unlink(node);
	}

	fn remove(&mut self, node: HostNode) {
		let span = trace_span!("Removing host node", ?node);
		let _enter = span.enter();
		self.unlink(node);
		self.dispose(node);
	}

	fn replace(&mut self, old: HostNode, new: HostNode) {
		if old == new {
			return;
		}
		self.unlink(new);
		if let Some(parent) = self.node_mut(old).parent.take() {
			let siblings = &mut self.node_mut(parent).children;
			let position = siblings
				.iter()
				.position(|&sibling| sibling == old)
				.unwrap_or_else(|| panic!("Host node {:?} is missing from its parent's children", old));
			siblings[position] = new;
			self.node_mut(new).parent = Some(parent);
		}
		self.dispose(old);
	}

	fn event_context(&self, node: HostNode) -> Option<Rc<EventContext<Msg>>> {
		self.node(node).context.clone()
	}

	fn set_event_context(&mut self, node: HostNode, context: Rc<EventContext<Msg>>) {
		self.node_mut(node).context = Some(context);
	}

	fn listener(&self, node: HostNode, name: &str) -> Option<Rc<Listener<Msg>>> {
		self.node(node).listeners.get(name).cloned()
	}

	fn add_listener(&mut self, node: HostNode, name: &str, listener: Rc<Listener<Msg>>) {
		self.node_mut(node).listeners.insert(name.to_owned(), listener);
	}

	fn remove_listener(&mut self, node: HostNode, name: &str) {
		self.node_mut(node).listeners.remove(name);
	}
}
