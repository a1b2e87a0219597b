//! Properties, attributes, styles and event bindings attached to element-like nodes.

use crate::event::Handler;
use core::fmt;
use hashbrown::HashMap;

/// The property key that is lifted out of the fact table to become an element's namespace.
pub const NAMESPACE_KEY: &str = "namespace";

/// Properties that are always re-applied, since the user may have changed them on the live host node.
pub(crate) const VOLATILE_PROPERTIES: [&str; 2] = ["value", "checked"];

/// A host-neutral property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Null,
	Bool(bool),
	Number(f64),
	String(String),
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Self::Number(value)
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self::String(value.to_owned())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Self::String(value)
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Null => f.write_str("null"),
			Self::Bool(value) => write!(f, "{}", value),
			Self::Number(value) => write!(f, "{}", value),
			Self::String(value) => f.write_str(value),
		}
	}
}

/// One entry of an element's fact list, before organisation.
pub enum Fact<Msg> {
	Property(String, Value),
	Attribute(String, String),
	NamespacedAttribute {
		namespace: String,
		key: String,
		value: String,
	},
	Style(Vec<(String, String)>),
	Event(String, Handler<Msg>),
}

impl<Msg> Fact<Msg> {
	pub fn property(key: impl Into<String>, value: impl Into<Value>) -> Self {
		Self::Property(key.into(), value.into())
	}

	pub fn string_property(key: impl Into<String>, value: impl Into<String>) -> Self {
		Self::Property(key.into(), Value::String(value.into()))
	}

	pub fn bool_property(key: impl Into<String>, value: bool) -> Self {
		Self::Property(key.into(), Value::Bool(value))
	}

	pub fn attribute(key: impl Into<String>, value: impl Into<String>) -> Self {
		Self::Attribute(key.into(), value.into())
	}

	pub fn attribute_ns(namespace: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
		Self::NamespacedAttribute {
			namespace: namespace.into(),
			key: key.into(),
			value: value.into(),
		}
	}

	pub fn style(key: impl Into<String>, value: impl Into<String>) -> Self {
		Self::Style(vec![(key.into(), value.into())])
	}

	/// A `className` property. Several of these on one element are joined with spaces.
	pub fn class(class: impl Into<String>) -> Self {
		Self::Property("className".to_owned(), Value::String(class.into()))
	}

	pub fn namespace(namespace: impl Into<String>) -> Self {
		Self::Property(NAMESPACE_KEY.to_owned(), Value::String(namespace.into()))
	}

	pub fn on(name: impl Into<String>, handler: Handler<Msg>) -> Self {
		Self::Event(name.into(), handler)
	}
}

impl<Msg> fmt::Debug for Fact<Msg> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Property(key, value) => f.debug_tuple("Property").field(key).field(value).finish(),
			Self::Attribute(key, value) => f.debug_tuple("Attribute").field(key).field(value).finish(),
			Self::NamespacedAttribute { namespace, key, value } => f
				.debug_struct("NamespacedAttribute")
				.field("namespace", namespace)
				.field("key", key)
				.field("value", value)
				.finish(),
			Self::Style(styles) => f.debug_tuple("Style").field(styles).finish(),
			Self::Event(name, handler) => f.debug_tuple("Event").field(name).field(handler).finish(),
		}
	}
}

/// An organised fact table: at most one entry per key and kind.
pub struct Facts<Msg> {
	pub(crate) properties: HashMap<String, Value>,
	pub(crate) styles: HashMap<String, String>,
	pub(crate) attributes: HashMap<String, String>,
	pub(crate) attributes_ns: HashMap<String, (String, String)>,
	pub(crate) events: HashMap<String, Handler<Msg>>,
}

impl<Msg> Default for Facts<Msg> {
	fn default() -> Self {
		Self {
			properties: HashMap::new(),
			styles: HashMap::new(),
			attributes: HashMap::new(),
			attributes_ns: HashMap::new(),
			events: HashMap::new(),
		}
	}
}

impl<Msg> Facts<Msg> {
	/// Merges `facts` into a table and lifts out the namespace, if any.
	///
	/// Later scalar facts overwrite earlier ones with the same key. `className` properties and `class` attributes
	/// are joined with a space instead, and style facts are merged entry by entry.
	/// Keys are never validated.
	pub fn organize(facts: impl IntoIterator<Item = Fact<Msg>>) -> (Self, Option<String>) {
		let mut table = Self::default();
		let mut namespace = None;
		for fact in facts {
			match fact {
				Fact::Property(key, Value::String(ns)) if key == NAMESPACE_KEY => namespace = Some(ns),
				Fact::Property(key, value) => {
					if key == "className" {
						if let (Some(Value::String(existing)), Value::String(added)) = (table.properties.get_mut(&key), &value) {
							add_class(existing, added);
							continue;
						}
					}
					table.properties.insert(key, value);
				}
				Fact::Attribute(key, value) => {
					if key == "class" {
						if let Some(existing) = table.attributes.get_mut(&key) {
							add_class(existing, &value);
							continue;
						}
					}
					table.attributes.insert(key, value);
				}
				Fact::NamespacedAttribute { namespace, key, value } => {
					table.attributes_ns.insert(key, (namespace, value));
				}
				Fact::Style(styles) => table.styles.extend(styles),
				Fact::Event(name, handler) => {
					table.events.insert(name, handler);
				}
			}
		}
		(table, namespace)
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.properties.is_empty() && self.styles.is_empty() && self.attributes.is_empty() && self.attributes_ns.is_empty() && self.events.is_empty()
	}

	#[must_use]
	pub fn property(&self, key: &str) -> Option<&Value> {
		self.properties.get(key)
	}

	#[must_use]
	pub fn style(&self, key: &str) -> Option<&str> {
		self.styles.get(key).map(String::as_str)
	}

	#[must_use]
	pub fn attribute(&self, key: &str) -> Option<&str> {
		self.attributes.get(key).map(String::as_str)
	}

	/// Returns `(namespace, value)`.
	#[must_use]
	pub fn attribute_ns(&self, key: &str) -> Option<(&str, &str)> {
		self.attributes_ns.get(key).map(|(namespace, value)| (namespace.as_str(), value.as_str()))
	}

	#[must_use]
	pub fn event(&self, name: &str) -> Option<&Handler<Msg>> {
		self.events.get(name)
	}
}

impl<Msg> fmt::Debug for Facts<Msg> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Facts")
			.field("properties", &self.properties)
			.field("styles", &self.styles)
			.field("attributes", &self.attributes)
			.field("attributes_ns", &self.attributes_ns)
			.field("events", &self.events)
			.finish()
	}
}

fn add_class(existing: &mut String, added: &str) {
	if !added.is_empty() {
		if !existing.is_empty() {
			existing.push(' ');
		}
		existing.push_str(added);
	}
}

/// The changes between two [`Facts`] tables.
///
/// `None` entries clear a style or attribute, or detach an event listener.
/// Removed properties are reverted to an empty string (if they were strings before) or [`Value::Null`].
pub struct FactsDiff<Msg> {
	pub properties: HashMap<String, Value>,
	pub styles: HashMap<String, Option<String>>,
	pub attributes: HashMap<String, Option<String>>,
	pub attributes_ns: HashMap<String, (String, Option<String>)>,
	pub events: HashMap<String, Option<Handler<Msg>>>,
}

impl<Msg> Default for FactsDiff<Msg> {
	fn default() -> Self {
		Self {
			properties: HashMap::new(),
			styles: HashMap::new(),
			attributes: HashMap::new(),
			attributes_ns: HashMap::new(),
			events: HashMap::new(),
		}
	}
}

impl<Msg> FactsDiff<Msg> {
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.properties.is_empty() && self.styles.is_empty() && self.attributes.is_empty() && self.attributes_ns.is_empty() && self.events.is_empty()
	}

	/// Total number of changed entries.
	#[must_use]
	pub fn len(&self) -> usize {
		self.properties.len() + self.styles.len() + self.attributes.len() + self.attributes_ns.len() + self.events.len()
	}
}

impl<Msg> fmt::Debug for FactsDiff<Msg> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FactsDiff")
			.field("properties", &self.properties)
			.field("styles", &self.styles)
			.field("attributes", &self.attributes)
			.field("attributes_ns", &self.attributes_ns)
			.field("events", &self.events)
			.finish()
	}
}

/// Computes the delta that turns `old` into `new`, or [`None`] if there is nothing to do.
#[must_use]
pub fn diff_facts<Msg>(old: &Facts<Msg>, new: &Facts<Msg>) -> Option<FactsDiff<Msg>> {
	let mut diff = FactsDiff::default();

	for (key, old_value) in &old.properties {
		match new.properties.get(key) {
			None => {
				let reverted = match old_value {
					Value::String(_) => Value::String(String::new()),
					_ => Value::Null,
				};
				diff.properties.insert(key.clone(), reverted);
			}
			Some(new_value) if new_value == old_value && !VOLATILE_PROPERTIES.contains(&key.as_str()) => (),
			Some(new_value) => {
				diff.properties.insert(key.clone(), new_value.clone());
			}
		}
	}
	for (key, new_value) in &new.properties {
		if !old.properties.contains_key(key) {
			diff.properties.insert(key.clone(), new_value.clone());
		}
	}

	diff_scalars(&old.styles, &new.styles, &mut diff.styles);
	diff_scalars(&old.attributes, &new.attributes, &mut diff.attributes);

	for (key, (old_namespace, old_value)) in &old.attributes_ns {
		match new.attributes_ns.get(key) {
			None => {
				diff.attributes_ns.insert(key.clone(), (old_namespace.clone(), None));
			}
			Some((new_namespace, new_value)) if new_namespace == old_namespace && new_value == old_value => (),
			Some((new_namespace, new_value)) => {
				diff.attributes_ns.insert(key.clone(), (new_namespace.clone(), Some(new_value.clone())));
			}
		}
	}
	for (key, (namespace, value)) in &new.attributes_ns {
		if !old.attributes_ns.contains_key(key) {
			diff.attributes_ns.insert(key.clone(), (namespace.clone(), Some(value.clone())));
		}
	}

	for (name, old_handler) in &old.events {
		match new.events.get(name) {
			None => {
				diff.events.insert(name.clone(), None);
			}
			Some(new_handler) if new_handler.same_as(old_handler) => (),
			Some(new_handler) => {
				diff.events.insert(name.clone(), Some(new_handler.clone()));
			}
		}
	}
	for (name, handler) in &new.events {
		if !old.events.contains_key(name) {
			diff.events.insert(name.clone(), Some(handler.clone()));
		}
	}

	if diff.is_empty() {
		None
	} else {
		Some(diff)
	}
}

fn diff_scalars(old: &HashMap<String, String>, new: &HashMap<String, String>, diff: &mut HashMap<String, Option<String>>) {
	for (key, old_value) in old {
		match new.get(key) {
			None => {
				diff.insert(key.clone(), None);
			}
			Some(new_value) if new_value == old_value => (),
			Some(new_value) => {
				diff.insert(key.clone(), Some(new_value.clone()));
			}
		}
	}
	for (key, new_value) in new {
		if !old.contains_key(key) {
			diff.insert(key.clone(), Some(new_value.clone()));
		}
	}
}
