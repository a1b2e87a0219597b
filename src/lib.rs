#![doc(html_root_url = "https://docs.rs/sapling-dom/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! A virtual DOM differ.
//!
//! Immutable [`Node`] trees are [rendered](`render()`) into a live [`Host`] tree once,
//! then every update [`diff`]s the previous and next tree into a flat, address-ordered list of [`Patch`]es,
//! which [`apply_patches`] binds to their live host nodes in one walk and then executes.
//!
//! [`Mount`] wraps that cycle for the common case.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod diff;
pub mod event;
pub mod facts;
pub mod host;
pub mod mount;
pub mod node;
pub mod patch;
pub mod render;

pub use crate::{
	diff::diff,
	event::{DecodeError, EventContext, Handler, Listener, Propagation, Tagger},
	facts::{Fact, Facts, FactsDiff, Value},
	host::{Host, HostNode},
	mount::Mount,
	node::{Node, NodeKind, Widget},
	patch::{apply_patches, bind_host_nodes, Patch, PatchKind},
	render::render,
};

/// User content is only recorded in spans with the `dangerous-logging` feature enabled.
pub(crate) fn loggable(content: &str) -> &str {
	if cfg!(feature = "dangerous-logging") {
		content
	} else {
		"<redacted>"
	}
}
