//! A [`Host`] backed by the browser DOM.
//!
//! The parent/child structure of managed nodes is mirrored in a slot map, so [`Host::child`] and friends never
//! have to round-trip into JavaScript. Only nodes created through (or [adopted](`WebHost::adopt_element`) by)
//! the host are tracked: Foreign DOM children of an adopted element are invisible to it.
//!
//! Failing DOM calls are logged as errors and otherwise skipped.

use super::{Host, HostNode};
use crate::{
	event::{EventContext, Listener},
	facts::Value,
};
use core::fmt;
use hashbrown::HashMap;
use slotmap::SlotMap;
use std::rc::Rc;
use tracing::{error, instrument, trace_span};
use wasm_bindgen::{closure::Closure, JsCast, JsValue, UnwrapThrowExt};

pub struct WebHost<Msg> {
	document: web_sys::Document,
	nodes: SlotMap<HostNode, WebNode<Msg>>,
	/// Indexed by `passive as usize`.
	listener_options_cache: [Option<web_sys::AddEventListenerOptions>; 2],
}

struct WebNode<Msg> {
	dom: web_sys::Node,
	is_fragment: bool,
	parent: Option<HostNode>,
	children: Vec<HostNode>,
	listeners: HashMap<String, WebListener<Msg>>,
	context: Option<Rc<EventContext<Msg>>>,
}

struct WebListener<Msg> {
	listener: Rc<Listener<Msg>>,
	closure: Closure<dyn Fn(web_sys::Event)>,
}

impl<Msg> fmt::Debug for WebHost<Msg> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WebHost").field("len()", &self.nodes.len()).finish_non_exhaustive()
	}
}

impl<Msg: 'static> WebHost<Msg> {
	#[must_use]
	pub fn new(document: web_sys::Document) -> Self {
		Self {
			document,
			nodes: SlotMap::with_key(),
			listener_options_cache: [None, None],
		}
	}

	/// A host for the current window's document.
	///
	/// # Panics
	///
	/// Iff there is no window or document, i.e. outside the browser main thread.
	#[must_use]
	pub fn for_window() -> Self {
		let document = web_sys::window()
			.expect_throw("sapling-dom: No `window` found.")
			.document()
			.expect_throw("sapling-dom: No `document` found.");
		Self::new(document)
	}

	/// Starts tracking an existing element, typically a mount point like `<body>`.
	///
	/// Its existing children stay in place but aren't tracked.
	pub fn adopt_element(&mut self, element: web_sys::Element) -> HostNode {
		self.insert(element.into(), false)
	}

	/// The DOM node behind `node`, if it is still alive.
	#[must_use]
	pub fn dom_node(&self, node: HostNode) -> Option<&web_sys::Node> {
		self.nodes.get(node).map(|web_node| &web_node.dom)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	fn insert(&mut self, dom: web_sys::Node, is_fragment: bool) -> HostNode {
		self.nodes.insert(WebNode {
			dom,
			is_fragment,
			parent: None,
			children: Vec::new(),
			listeners: HashMap::new(),
			context: None,
		})
	}

	fn node(&self, node: HostNode) -> &WebNode<Msg> {
		self.nodes.get(node).unwrap_or_else(|| panic!("Stale or foreign host node {:?}", node))
	}

	fn node_mut(&mut self, node: HostNode) -> &mut WebNode<Msg> {
		self.nodes.get_mut(node).unwrap_or_else(|| panic!("Stale or foreign host node {:?}", node))
	}

	fn element(&self, node: HostNode) -> &web_sys::Element {
		self.node(node).dom.dyn_ref::<web_sys::Element>().unwrap_or_else(|| panic!("Expected an element at {:?}", node))
	}

	fn listener_options(&mut self, passive: bool) -> &web_sys::AddEventListenerOptions {
		self.listener_options_cache[usize::from(passive)].get_or_insert_with(|| {
			let mut options = web_sys::AddEventListenerOptions::new();
			options.passive(passive);
			options
		})
	}

	/// Removes `node` from its mirrored parent's children. The DOM is left alone.
	fn unlink(&mut self, node: HostNode) {
		if let Some(parent) = self.node_mut(node).parent.take() {
			let siblings = &mut self.node_mut(parent).children;
			if let Some(position) = siblings.iter().position(|&sibling| sibling == node) {
				siblings.remove(position);
			}
		}
	}

	fn dispose(&mut self, node: HostNode) {
		let mut pending = vec![node];
		while let Some(node) = pending.pop() {
			if let Some(removed) = self.nodes.remove(node) {
				for (name, WebListener { closure, .. }) in removed.listeners {
					if let Err(error) = removed.dom.remove_event_listener_with_callback(&name, closure.as_ref().unchecked_ref()) {
						error!("Failed to remove event listener {:?}: {:?}", name, error);
					}
				}
				pending.extend(removed.children);
			}
		}
	}

	/// Mirrors a DOM insertion of `child` at `position` among `parent`'s tracked children.
	fn adopt(&mut self, parent: HostNode, child: HostNode, position: Option<usize>) {
		let moved = if self.node(child).is_fragment {
			let moved = core::mem::take(&mut self.node_mut(child).children);
			self.nodes.remove(child);
			moved
		} else {
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
}

fn to_js(value: &Value) -> JsValue {
	match value {
		Value::Null => JsValue::NULL,
		Value::Bool(value) => JsValue::from_bool(*value),
		Value::Number(value) => JsValue::from_f64(*value),
		Value::String(value) => JsValue::from_str(value),
	}
}

fn from_js(value: &JsValue) -> Value {
	if let Some(value) = value.as_bool() {
		Value::Bool(value)
	} else if let Some(value) = value.as_f64() {
		Value::Number(value)
	} else if let Some(value) = value.as_string() {
		Value::String(value)
	} else {
		Value::Null
	}
}

impl<Msg: 'static> Host<Msg> for WebHost<Msg> {
	fn create_text(&mut self, text: &str) -> HostNode {
		let text = self.document.create_text_node(text);
		self.insert(text.into(), false)
	}

	fn create_element(&mut self, tag: &str, namespace: Option<&str>) -> HostNode {
		let element = match namespace {
			Some(namespace) => self.document.create_element_ns(Some(namespace), tag),
			None => self.document.create_element(tag),
		};
		match element {
			Ok(element) => self.insert(element.into(), false),
			Err(error) => {
				error!("Failed to create element <{}>: {:?}. Substituting an empty text node.", tag, error);
				self.create_text("")
			}
		}
	}

	fn create_fragment(&mut self) -> HostNode {
		let fragment = self.document.create_document_fragment();
		self.insert(fragment.into(), true)
	}

	fn set_text(&mut self, node: HostNode, text: &str) {
		match self.node(node).dom.dyn_ref::<web_sys::Text>() {
			Some(dom_text) => dom_text.set_data(text),
			None => error!("Expected a text node at {:?}.", node),
		}
	}

	fn property(&self, node: HostNode, key: &str) -> Option<Value> {
		match js_sys::Reflect::get(&self.node(node).dom, &JsValue::from_str(key)) {
			Ok(value) if value.is_undefined() => None,
			Ok(value) => Some(from_js(&value)),
			Err(error) => {
				error!("Failed to read property {:?}: {:?}", key, error);
				None
			}
		}
	}

	fn set_property(&mut self, node: HostNode, key: &str, value: &Value) {
		if let Err(error) = js_sys::Reflect::set(&self.node(node).dom, &JsValue::from_str(key), &to_js(value)) {
			error!("Failed to set property {:?}: {:?}", key, error);
		}
	}

	fn set_style(&mut self, node: HostNode, key: &str, value: Option<&str>) {
		let dom = &self.node(node).dom;
		let style = if let Some(html_element) = dom.dyn_ref::<web_sys::HtmlElement>() {
			html_element.style()
		} else if let Some(svg_element) = dom.dyn_ref::<web_sys::SvgElement>() {
			svg_element.style()
		} else {
			return error!("Can't style {:?}, which is neither an HTML nor an SVG element.", node);
		};
		let result = match value {
			Some(value) => style.set_property(key, value),
			None => style.remove_property(key).map(drop),
		};
		if let Err(error) = result {
			error!("Failed to update style {:?}: {:?}", key, error);
		}
	}

	fn set_attribute(&mut self, node: HostNode, key: &str, value: Option<&str>) {
		let element = self.element(node);
		let result = match value {
			Some(value) => element.set_attribute(key, value),
			None => element.remove_attribute(key),
		};
		if let Err(error) = result {
			error!("Failed to update attribute {:?}: {:?}", key, error);
		}
	}

	fn set_attribute_ns(&mut self, node: HostNode, namespace: &str, key: &str, value: Option<&str>) {
		let element = self.element(node);
		let result = match value {
			Some(value) => element.set_attribute_ns(Some(namespace), key, value),
			None => element.remove_attribute_ns(Some(namespace), key),
		};
		if let Err(error) = result {
			error!("Failed to update attribute {:?} in namespace {:?}: {:?}", key, namespace, error);
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
		if let Err(error) = self.node(parent).dom.append_child(&self.node(child).dom) {
			return error!("Failed to append child: {:?}", error);
		}
		self.adopt(parent, child, None);
	}

	fn insert_before(&mut self, parent: HostNode, child: HostNode, reference: Option<HostNode>) {
		if reference == Some(child) {
			return;
		}
		let reference_dom = reference.map(|reference| self.node(reference).dom.clone());
		if let Err(error) = self.node(parent).dom.insert_before(&self.node(child).dom, reference_dom.as_ref()) {
			return error!("Failed to insert child: {:?}", error);
		}
		if !self.node(child).is_fragment {
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

		let dom = &self.node(node).dom;
		if let Some(dom_parent) = dom.parent_node() {
			if let Err(error) = dom_parent.remove_child(dom) {
				error!("Failed to detach node: {:?}", error);
			}
		}
		self.unlink(node);
	}

	fn remove(&mut self, node: HostNode) {
		self.detach(node);
		self.dispose(node);
	}

	#[instrument(skip(self))]
	fn replace(&mut self, old: HostNode, new: HostNode) {
		if old == new {
			return;
		}
		if let Some(dom_parent) = self.node(old).dom.parent_node() {
			if let Err(error) = dom_parent.replace_child(&self.node(new).dom, &self.node(old).dom) {
				return error!("Failed to replace node: {:?}", error);
			}
		}
		self.unlink(new);
		if let Some(parent) = self.node_mut(old).parent.take() {
			let siblings = &mut self.node_mut(parent).children;
			if let Some(position) = siblings.iter().position(|&sibling| sibling == old) {
				siblings[position] = new;
			}
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
		self.node(node).listeners.get(name).map(|web_listener| Rc::clone(&web_listener.listener))
	}

	#[instrument(skip(self, listener))]
	fn add_listener(&mut self, node: HostNode, name: &str, listener: Rc<Listener<Msg>>) {
		self.remove_listener(node, name);

		let closure = {
			let listener = Rc::clone(&listener);
			Closure::wrap(Box::new(move |event: web_sys::Event| {
				let propagation = listener.handle(&event);
				if propagation.stop_propagation {
					event.stop_propagation();
				}
				if propagation.prevent_default {
					event.prevent_default();
				}
			}) as Box<dyn Fn(web_sys::Event)>)
		};

		let options = self.listener_options(listener.is_passive()).clone();
		if let Err(error) = self
			.node(node)
			.dom
			.add_event_listener_with_callback_and_add_event_listener_options(name, closure.as_ref().unchecked_ref(), &options)
		{
			return error!("Failed to add event listener {:?}: {:?}", name, error);
		}
		self.node_mut(node).listeners.insert(name.to_owned(), WebListener { listener, closure });
	}

	fn remove_listener(&mut self, node: HostNode, name: &str) {
		let web_node = self.node_mut(node);
		if let Some(WebListener { closure, .. }) = web_node.listeners.remove(name) {
			if let Err(error) = web_node.dom.remove_event_listener_with_callback(name, closure.as_ref().unchecked_ref()) {
				error!("Failed to remove event listener {:?}: {:?}", name, error);
			}
		}
	}
}
