//! Initial construction of host trees, and fact application shared with the patch applier.

use crate::{
	event::{EventContext, Handler, Listener},
	facts::{Facts, FactsDiff, Value, VOLATILE_PROPERTIES},
	host::{Host, HostNode},
	loggable,
	node::{Node, NodeKind},
};
use std::rc::Rc;
use tracing::{instrument, trace, trace_span};

/// Builds a fresh host subtree for `node`.
///
/// Listeners attached inside it route their messages through `context`,
/// or through the contexts of any [`Tagged`](`NodeKind::Tagged`) boundaries in between.
/// The returned node is detached.
#[instrument(skip(host, node, context), fields(descendants = node.descendants()))]
pub fn render<Msg>(host: &mut dyn Host<Msg>, node: &Node<Msg>, context: &Rc<EventContext<Msg>>) -> HostNode {
	render_help(host, node, context)
}

fn render_help<Msg>(host: &mut dyn Host<Msg>, node: &Node<Msg>, context: &Rc<EventContext<Msg>>) -> HostNode {
	match node.kind() {
		NodeKind::Thunk(thunk) => {
			let span = trace_span!("Rendering lazy node", forced = thunk.is_forced());
			let _enter = span.enter();
			render_help(host, thunk.node(), context)
		}

		NodeKind::Tagged(tagged) => {
			let (taggers, inner) = tagged.chain();
			let span = trace_span!("Rendering tagged node", taggers = taggers.len());
			let _enter = span.enter();

			let inner_context = EventContext::tagged(taggers, Rc::clone(context));
			let host_node = render_help(host, inner, &inner_context);
			// Boundaries nested through lazy nodes share the host node, which keeps the innermost context.
			// Outer ones are found through its parents.
			if host.event_context(host_node).is_none() {
				host.set_event_context(host_node, inner_context);
			}
			host_node
		}

		NodeKind::Text(text) => {
			let span = trace_span!("Rendering text", text = loggable(text));
			let _enter = span.enter();
			host.create_text(text)
		}

		NodeKind::Element(element) => {
			let span = trace_span!("Rendering element", tag = %element.tag, children = element.children.len());
			let _enter = span.enter();

			let host_node = host.create_element(&element.tag, element.namespace.as_deref());
			apply_facts(host, host_node, &element.facts, context);
			for child in &element.children {
				let child = render_help(host, child, context);
				host.append_child(host_node, child);
			}
			host_node
		}

		NodeKind::KeyedElement(keyed) => {
			let span = trace_span!("Rendering keyed element", tag = %keyed.tag, children = keyed.children.len());
			let _enter = span.enter();

			let host_node = host.create_element(&keyed.tag, keyed.namespace.as_deref());
			apply_facts(host, host_node, &keyed.facts, context);
			for (_, child) in &keyed.children {
				let child = render_help(host, child, context);
				host.append_child(host_node, child);
			}
			host_node
		}

		NodeKind::Custom(custom) => {
			let span = trace_span!("Rendering custom node");
			let _enter = span.enter();

			let host_node = custom.widget.render(&*custom.model, host);
			apply_facts(host, host_node, &custom.facts, context);
			host_node
		}
	}
}

pub(crate) fn apply_facts<Msg>(host: &mut dyn Host<Msg>, node: HostNode, facts: &Facts<Msg>, context: &Rc<EventContext<Msg>>) {
	for (key, value) in &facts.properties {
		host.set_property(node, key, value);
	}
	for (key, value) in &facts.styles {
		host.set_style(node, key, Some(value));
	}
	for (key, value) in &facts.attributes {
		host.set_attribute(node, key, Some(value));
	}
	for (key, (namespace, value)) in &facts.attributes_ns {
		host.set_attribute_ns(node, namespace, key, Some(value));
	}
	for (name, handler) in &facts.events {
		host.add_listener(node, name, Rc::new(Listener::new(handler.clone(), Rc::clone(context))));
	}
}

pub(crate) fn apply_facts_diff<Msg>(host: &mut dyn Host<Msg>, node: HostNode, diff: &FactsDiff<Msg>, context: &Rc<EventContext<Msg>>) {
	let span = trace_span!("Applying facts diff", changes = diff.len());
	let _enter = span.enter();

	for (key, value) in &diff.properties {
		apply_property(host, node, key, value);
	}
	for (key, value) in &diff.styles {
		host.set_style(node, key, value.as_deref());
	}
	for (key, value) in &diff.attributes {
		host.set_attribute(node, key, value.as_deref());
	}
	for (key, (namespace, value)) in &diff.attributes_ns {
		host.set_attribute_ns(node, namespace, key, value.as_deref());
	}
	for (name, handler) in &diff.events {
		apply_event(host, node, name, handler.as_ref(), context);
	}
}

fn apply_property<Msg>(host: &mut dyn Host<Msg>, node: HostNode, key: &str, value: &Value) {
	if VOLATILE_PROPERTIES.contains(&key) && host.property(node, key).as_ref() == Some(value) {
		trace!("Live `{}` is already up to date.", key);
		return;
	}
	host.set_property(node, key, value);
}

fn apply_event<Msg>(host: &mut dyn Host<Msg>, node: HostNode, name: &str, handler: Option<&Handler<Msg>>, context: &Rc<EventContext<Msg>>) {
	let existing = host.listener(node, name);
	match (existing, handler) {
		(Some(_), None) => host.remove_listener(node, name),
		(None, None) => (),
		(Some(listener), Some(handler)) if listener.kind() == handler.kind() => {
			trace!("Replacing `{}` handler in place.", name);
			listener.replace_handler(handler.clone());
		}
		(existing, Some(handler)) => {
			if existing.is_some() {
				host.remove_listener(node, name);
			}
			host.add_listener(node, name, Rc::new(Listener::new(handler.clone(), Rc::clone(context))));
		}
	}
}
