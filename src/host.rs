//! The live, mutable tree that node trees are rendered into.
//!
//! [`Host`] is object safe, so the renderer, the patch applier and [`Widget`](`crate::Widget`)s
//! all work on `&mut dyn Host<Msg>`.
//! Implementations panic on stale or foreign [`HostNode`]s: those are bugs, not runtime conditions.

use crate::{
	event::{EventContext, Listener},
	facts::Value,
};
use std::rc::Rc;

pub mod memory;
#[cfg(feature = "web")]
pub mod web;

slotmap::new_key_type! {
	/// A handle to a node in a live host tree.
	pub struct HostNode;
}

pub trait Host<Msg> {
	fn create_text(&mut self, text: &str) -> HostNode;
	fn create_element(&mut self, tag: &str, namespace: Option<&str>) -> HostNode;

	/// A detached container whose children are moved (and which is consumed) when it is appended or inserted.
	fn create_fragment(&mut self) -> HostNode;

	fn set_text(&mut self, node: HostNode, text: &str);

	fn property(&self, node: HostNode, key: &str) -> Option<Value>;
	/// [`Value::Null`] unsets the property.
	fn set_property(&mut self, node: HostNode, key: &str, value: &Value);
	/// [`None`] clears the style entry.
	fn set_style(&mut self, node: HostNode, key: &str, value: Option<&str>);
	/// [`None`] removes the attribute.
	fn set_attribute(&mut self, node: HostNode, key: &str, value: Option<&str>);
	/// [`None`] removes the attribute.
	fn set_attribute_ns(&mut self, node: HostNode, namespace: &str, key: &str, value: Option<&str>);

	fn child(&self, node: HostNode, index: usize) -> Option<HostNode>;
	fn child_count(&self, node: HostNode) -> usize;
	fn parent(&self, node: HostNode) -> Option<HostNode>;

	/// Moves `child` to the end of `parent`'s children, detaching it first if necessary.
	fn append_child(&mut self, parent: HostNode, child: HostNode);
	/// Moves `child` in front of `reference`, or to the end if `reference` is [`None`].
	fn insert_before(&mut self, parent: HostNode, child: HostNode, reference: Option<HostNode>);
	/// Unlinks `node` from its parent but keeps it (and its subtree) alive for reinsertion.
	fn detach(&mut self, node: HostNode);
	/// Unlinks and disposes of `node` and its subtree.
	fn remove(&mut self, node: HostNode);
	/// Puts `new` where `old` was and disposes of `old`.
	fn replace(&mut self, old: HostNode, new: HostNode);

	/// The event context of the innermost tagged boundary that produced `node`, if any.
	///
	/// Enclosing boundaries that produced the same node (through lazy nodes) are its [parents](`EventContext::parent`).
	fn event_context(&self, node: HostNode) -> Option<Rc<EventContext<Msg>>>;
	fn set_event_context(&mut self, node: HostNode, context: Rc<EventContext<Msg>>);

	fn listener(&self, node: HostNode, name: &str) -> Option<Rc<Listener<Msg>>>;
	/// Registers `listener` for `name` on `node`. There is at most one listener per name and node.
	fn add_listener(&mut self, node: HostNode, name: &str, listener: Rc<Listener<Msg>>);
	fn remove_listener(&mut self, node: HostNode, name: &str);
}
