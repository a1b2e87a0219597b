//! Computes the [`Patch`]es that turn one node tree into another.

use crate::{
	facts::{diff_facts, Facts},
	loggable,
	node::{Node, NodeKind},
	patch::{Patch, PatchKind},
};
use std::rc::Rc;
use tracing::{instrument, level_filters::STATIC_MAX_LEVEL, trace, trace_span, warn, Level};

mod keyed;

/// Diffs `old` against `new`.
///
/// Patches are addressed by pre-order index into `old` and sorted by that address.
/// Lazy nodes in `new` whose inputs match those in `old` take over the old forced subtree without being forced themselves.
#[must_use]
#[instrument(skip(old, new))]
pub fn diff<Msg>(old: &Node<Msg>, new: &Node<Msg>) -> Vec<Patch<Msg>> {
	let mut patches = Vec::new();
	diff_help(old, new, &mut patches, 0);
	trace!("Produced {} top-level patch(es).", patches.len());
	patches
}

pub(crate) fn diff_help<Msg>(x: &Node<Msg>, y: &Node<Msg>, patches: &mut Vec<Patch<Msg>>, index: usize) {
	if x.ptr_eq(y) {
		return;
	}

	match (x.kind(), y.kind()) {
		(NodeKind::Thunk(x_thunk), NodeKind::Thunk(y_thunk)) => {
			let span = trace_span!("Diffing lazy node", index);
			let _enter = span.enter();

			let x_node = x_thunk.node();
			if x_thunk.same_inputs(y_thunk) {
				trace!("Inputs match. Reusing the forced subtree.");
				y_thunk.adopt(x_node.clone());
				return;
			}

			let mut sub_patches = Vec::new();
			diff_help(x_node, y_thunk.node(), &mut sub_patches, 0);
			if !sub_patches.is_empty() {
				patches.push(Patch::new(index, PatchKind::Thunk(sub_patches)));
			}
		}

		(NodeKind::Tagged(x_tagged), NodeKind::Tagged(y_tagged)) => {
			let span = trace_span!("Diffing tagged node", index);
			let _enter = span.enter();

			let (x_taggers, x_inner) = x_tagged.chain();
			let (y_taggers, y_inner) = y_tagged.chain();
			if x_taggers.len() != y_taggers.len() {
				trace!("Tagger chain lengths differ ({} vs. {}).", x_taggers.len(), y_taggers.len());
				return redraw(patches, index, y);
			}
			if !x_taggers.iter().zip(&y_taggers).all(|(x, y)| Rc::ptr_eq(x, y)) {
				patches.push(Patch::new(index, PatchKind::Tagger(y_taggers)));
			}
			diff_help(x_inner, y_inner, patches, index + 1);
		}

		(NodeKind::Text(x_text), NodeKind::Text(y_text)) => {
			if x_text != y_text {
				let span = trace_span!("Diffing text", index, x_text = loggable(x_text), y_text = loggable(y_text));
				let _enter = span.enter();
				patches.push(Patch::new(index, PatchKind::Text(y_text.clone())));
			}
		}

		(NodeKind::Element(x_element), NodeKind::Element(y_element)) => {
			if !same_element(&x_element.tag, x_element.namespace.as_deref(), &y_element.tag, y_element.namespace.as_deref()) {
				return redraw(patches, index, y);
			}
			let span = trace_span!("Diffing element", index, tag = %x_element.tag);
			let _enter = span.enter();

			push_facts(&x_element.facts, &y_element.facts, patches, index);
			diff_children(&x_element.children, &y_element.children, patches, index);
		}

		(NodeKind::Element(x_element), NodeKind::KeyedElement(y_keyed)) => {
			if !same_element(&x_element.tag, x_element.namespace.as_deref(), &y_keyed.tag, y_keyed.namespace.as_deref()) {
				return redraw(patches, index, y);
			}
			let span = trace_span!("Diffing element against keyed element", index, tag = %x_element.tag);
			let _enter = span.enter();

			push_facts(&x_element.facts, &y_keyed.facts, patches, index);
			let y_children: Vec<_> = y_keyed.children.iter().map(|(_, child)| child.clone()).collect();
			diff_children(&x_element.children, &y_children, patches, index);
		}

		(NodeKind::KeyedElement(x_keyed), NodeKind::KeyedElement(y_keyed)) => {
			if !same_element(&x_keyed.tag, x_keyed.namespace.as_deref(), &y_keyed.tag, y_keyed.namespace.as_deref()) {
				return redraw(patches, index, y);
			}
			let span = trace_span!("Diffing keyed element", index, tag = %x_keyed.tag);
			let _enter = span.enter();

			push_facts(&x_keyed.facts, &y_keyed.facts, patches, index);
			keyed::diff_keyed_children(&x_keyed.children, &y_keyed.children, patches, index);
		}

		(NodeKind::Custom(x_custom), NodeKind::Custom(y_custom)) => {
			if !Rc::ptr_eq(&x_custom.widget, &y_custom.widget) {
				trace!("Different widgets.");
				return redraw(patches, index, y);
			}
			let span = trace_span!("Diffing custom node", index);
			let _enter = span.enter();

			push_facts(&x_custom.facts, &y_custom.facts, patches, index);
			if let Some(payload) = y_custom.widget.diff(&*x_custom.model, &*y_custom.model) {
				patches.push(Patch::new(
					index,
					PatchKind::Custom {
						widget: Rc::clone(&y_custom.widget),
						payload,
					},
				));
			}
		}

		_ => {
			trace!("Node kinds differ.");
			redraw(patches, index, y);
		}
	}
}

fn redraw<Msg>(patches: &mut Vec<Patch<Msg>>, index: usize, y: &Node<Msg>) {
	patches.push(Patch::new(index, PatchKind::Redraw(y.clone())));
}

fn same_element(x_tag: &str, x_namespace: Option<&str>, y_tag: &str, y_namespace: Option<&str>) -> bool {
	if x_tag == y_tag && x_namespace == y_namespace {
		return true;
	}
	if STATIC_MAX_LEVEL >= Level::WARN && x_tag != y_tag && x_tag.eq_ignore_ascii_case(y_tag) {
		warn!("Redrawing <{}> as <{}>, which differs only in case. Is this intentional?", x_tag, y_tag);
	} else {
		trace!("Element identity changed from <{}> ({:?}) to <{}> ({:?}).", x_tag, x_namespace, y_tag, y_namespace);
	}
	false
}

fn push_facts<Msg>(x: &Facts<Msg>, y: &Facts<Msg>, patches: &mut Vec<Patch<Msg>>, index: usize) {
	if let Some(facts_diff) = diff_facts(x, y) {
		patches.push(Patch::new(index, PatchKind::Facts(facts_diff)));
	}
}

/// Positional child diff: trims or extends the tail first, then diffs common children pairwise.
fn diff_children<Msg>(x_children: &[Node<Msg>], y_children: &[Node<Msg>], patches: &mut Vec<Patch<Msg>>, root_index: usize) {
	let x_len = x_children.len();
	let y_len = y_children.len();

	if x_len > y_len {
		patches.push(Patch::new(
			root_index,
			PatchKind::RemoveLast {
				from: y_len,
				count: x_len - y_len,
			},
		));
	} else if x_len < y_len {
		patches.push(Patch::new(
			root_index,
			PatchKind::Append {
				from: x_len,
				children: y_children[x_len..].to_vec(),
			},
		));
	}

	let mut index = root_index;
	for (x_child, y_child) in x_children.iter().zip(y_children) {
		index += 1;
		diff_help(x_child, y_child, patches, index);
		index += x_child.descendants();
	}
}
