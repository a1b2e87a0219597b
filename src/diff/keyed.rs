//! Keyed child list reconciliation.
//!
//! A single forward pass with one step of lookahead on either side detects insertions, removals and swapped pairs.
//! Anything more scrambled falls through to removing the remaining old children and appending the remaining new ones.
//! A key that is both removed and inserted becomes a move: its host node is kept, patched in place and relocated.

use super::diff_help;
use crate::{
	loggable,
	node::Node,
	patch::{Entry, EntryKind, Insert, Moved, Patch, PatchKind, Reorder},
};
use hashbrown::HashMap;
use tracing::{debug, trace};

/// Appended to duplicate keys until they are unique. Can't collide with reasonable user keys.
const DUPLICATE_SUFFIX: &str = "\u{0}dup";

struct Reconciler<Msg> {
	patches: Vec<Patch<Msg>>,
	inserts: Vec<Insert>,
	end_inserts: Vec<usize>,
	entries: Vec<Entry<Msg>>,
	changes: HashMap<String, usize>,
}

pub(super) fn diff_keyed_children<Msg>(x_children: &[(String, Node<Msg>)], y_children: &[(String, Node<Msg>)], patches: &mut Vec<Patch<Msg>>, root_index: usize) {
	let mut reconciler = Reconciler {
		patches: Vec::new(),
		inserts: Vec::new(),
		end_inserts: Vec::new(),
		entries: Vec::new(),
		changes: HashMap::new(),
	};

	let mut index = root_index;
	let (mut x_index, mut y_index) = (0, 0);
	while let (Some((x_key, x_node)), Some((y_key, y_node))) = (x_children.get(x_index), y_children.get(y_index)) {
		if x_key == y_key {
			index += 1;
			diff_help(x_node, y_node, &mut reconciler.patches, index);
			index += x_node.descendants();
			x_index += 1;
			y_index += 1;
			continue;
		}

		let x_next = x_children.get(x_index + 1);
		let y_next = y_children.get(y_index + 1);
		// `y` used to be right after `x`, so `x` was probably removed.
		let old_match = x_next.is_some_and(|(key, _)| key == y_key);
		// `x` is now right after `y`, so `y` was probably inserted.
		let new_match = y_next.is_some_and(|(key, _)| key == x_key);

		match (x_next, y_next) {
			(Some((_, x_next_node)), Some((_, y_next_node))) if old_match && new_match => {
				trace!("Swapped pair at {}.", y_index);
				index += 1;
				diff_help(x_node, y_next_node, &mut reconciler.patches, index);
				reconciler.insert(y_key, y_node, Some(y_index));
				index += x_node.descendants();

				index += 1;
				reconciler.remove(y_key, x_next_node, index);
				index += x_next_node.descendants();

				x_index += 2;
				y_index += 2;
			}
			(_, Some((_, y_next_node))) if new_match => {
				index += 1;
				reconciler.insert(y_key, y_node, Some(y_index));
				diff_help(x_node, y_next_node, &mut reconciler.patches, index);
				index += x_node.descendants();

				x_index += 1;
				y_index += 2;
			}
			(Some((_, x_next_node)), _) if old_match => {
				index += 1;
				reconciler.remove(x_key, x_node, index);
				index += x_node.descendants();

				index += 1;
				diff_help(x_next_node, y_node, &mut reconciler.patches, index);
				index += x_next_node.descendants();

				x_index += 2;
				y_index += 1;
			}
			(Some((x_next_key, x_next_node)), Some((y_next_key, y_next_node))) if x_next_key == y_next_key => {
				index += 1;
				reconciler.remove(x_key, x_node, index);
				reconciler.insert(y_key, y_node, Some(y_index));
				index += x_node.descendants();

				index += 1;
				diff_help(x_next_node, y_next_node, &mut reconciler.patches, index);
				index += x_next_node.descendants();

				x_index += 2;
				y_index += 2;
			}
			_ => {
				trace!("Lookahead exhausted at old {} / new {}.", x_index, y_index);
				break;
			}
		}
	}

	for (x_key, x_node) in &x_children[x_index..] {
		index += 1;
		reconciler.remove(x_key, x_node, index);
		index += x_node.descendants();
	}

	for (y_key, y_node) in &y_children[y_index..] {
		reconciler.insert(y_key, y_node, None);
	}

	let Reconciler {
		patches: local_patches,
		inserts,
		end_inserts,
		entries,
		..
	} = reconciler;
	let reorder = Reorder {
		patches: local_patches,
		inserts,
		end_inserts,
		entries,
	};
	if !reorder.is_empty() {
		patches.push(Patch::new(root_index, PatchKind::Reorder(reorder)));
	}
}

impl<Msg> Reconciler<Msg> {
	/// Records that `node` appears under `key` at new position `index` ([`None`] to append it).
	fn insert(&mut self, key: &str, node: &Node<Msg>, index: Option<usize>) {
		match self.changes.get(key).copied() {
			None => {
				let entry = self.push_entry(key, Entry::new(EntryKind::Insert, node.clone(), 0, index));
				self.queue_insert(entry, index);
			}

			Some(entry) if self.entries[entry].kind == EntryKind::Remove => {
				self.queue_insert(entry, index);

				let mut sub_patches = Vec::new();
				let removed = &self.entries[entry];
				diff_help(&removed.node, node, &mut sub_patches, removed.address);
				let slot = removed.slot.unwrap_or_else(|| panic!("Removed keyed child {:?} has no patch slot", key));

				let moved = &mut self.entries[entry];
				moved.kind = EntryKind::Move;
				moved.index = index;
				self.patches[slot].kind = PatchKind::Remove(Some(Moved { patches: sub_patches, entry }));
			}

			Some(_) => {
				debug!("Duplicate key {:?} in keyed children.", loggable(key));
				self.insert(&[key, DUPLICATE_SUFFIX].concat(), node, index);
			}
		}
	}

	/// Records that `node` under `key` at old-tree address `index` is gone from its position.
	fn remove(&mut self, key: &str, node: &Node<Msg>, index: usize) {
		match self.changes.get(key).copied() {
			None => {
				let slot = self.patches.len();
				self.patches.push(Patch::new(index, PatchKind::Remove(None)));
				let entry = self.push_entry(key, Entry::new(EntryKind::Remove, node.clone(), index, None));
				self.entries[entry].slot = Some(slot);
			}

			Some(entry) if self.entries[entry].kind == EntryKind::Insert => {
				let mut sub_patches = Vec::new();
				diff_help(node, &self.entries[entry].node, &mut sub_patches, index);

				let slot = self.patches.len();
				self.patches.push(Patch::new(index, PatchKind::Remove(Some(Moved { patches: sub_patches, entry }))));
				let moved = &mut self.entries[entry];
				moved.kind = EntryKind::Move;
				moved.address = index;
				moved.slot = Some(slot);
			}

			Some(_) => {
				debug!("Duplicate key {:?} in keyed children.", loggable(key));
				self.remove(&[key, DUPLICATE_SUFFIX].concat(), node, index);
			}
		}
	}

	fn push_entry(&mut self, key: &str, entry: Entry<Msg>) -> usize {
		let position = self.entries.len();
		self.entries.push(entry);
		self.changes.insert(key.to_owned(), position);
		position
	}

	fn queue_insert(&mut self, entry: usize, index: Option<usize>) {
		match index {
			Some(index) => self.inserts.push(Insert { index, entry }),
			None => self.end_inserts.push(entry),
		}
	}
}
