//! Event routing from host listeners to the application's message sink.
//!
//! Every [`Tagged`](`crate::NodeKind::Tagged`) boundary rendered into a host tree gets its own [`EventContext`],
//! linked to the context it was rendered under. Listeners keep the context they were attached under,
//! so a decoded message is passed through all taggers between the listener and the root, innermost first.

use core::{any::Any, cell::RefCell, fmt};
use std::rc::Rc;
use thiserror::Error;
use tracing::{trace, trace_span};

/// A message transform applied at a [`Tagged`](`crate::NodeKind::Tagged`) boundary.
///
/// Taggers are compared by reference ([`Rc::ptr_eq`]) only.
pub type Tagger<Msg> = Rc<dyn Fn(Msg) -> Msg>;

/// Turns a host event into a value, or rejects it.
pub type Decoder<T> = Rc<dyn Fn(&dyn Any) -> Result<T, DecodeError>>;

/// The root of an event context chain.
///
/// The `bool` is `true` iff the message must be handled synchronously,
/// which is the case whenever its event's propagation was stopped.
pub type Sink<Msg> = Box<dyn Fn(Msg, bool)>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
	#[error("expected an event of type `{expected}`")]
	UnexpectedEvent { expected: &'static str },
	#[error("{0}")]
	Failure(String),
}

pub enum EventContext<Msg> {
	Root(Sink<Msg>),
	Tagged {
		taggers: RefCell<Vec<Tagger<Msg>>>,
		parent: Rc<EventContext<Msg>>,
	},
}

impl<Msg> EventContext<Msg> {
	#[must_use]
	pub fn root(sink: impl Fn(Msg, bool) + 'static) -> Rc<Self> {
		Rc::new(Self::Root(Box::new(sink)))
	}

	#[must_use]
	pub fn tagged(taggers: Vec<Tagger<Msg>>, parent: Rc<Self>) -> Rc<Self> {
		Rc::new(Self::Tagged {
			taggers: RefCell::new(taggers),
			parent,
		})
	}

	/// Replaces this context's taggers in place.
	///
	/// All listeners attached under this context observe the change immediately.
	///
	/// # Panics
	///
	/// Iff this is the root context, which has no taggers.
	pub fn set_taggers(&self, new_taggers: Vec<Tagger<Msg>>) {
		match self {
			Self::Root(_) => panic!("Tried to retag the root event context"),
			Self::Tagged { taggers, .. } => *taggers.borrow_mut() = new_taggers,
		}
	}

	/// The number of taggers on this context alone, not counting its parents.
	#[must_use]
	pub fn tagger_count(&self) -> usize {
		match self {
			Self::Root(_) => 0,
			Self::Tagged { taggers, .. } => taggers.borrow().len(),
		}
	}

	#[must_use]
	pub fn parent(&self) -> Option<&Rc<Self>> {
		match self {
			Self::Root(_) => None,
			Self::Tagged { parent, .. } => Some(parent),
		}
	}

	/// Transforms `message` through every tagger from this context up to the root, then hands it to the root sink.
	pub fn send(&self, mut message: Msg, sync: bool) {
		let mut context = self;
		loop {
			match context {
				Self::Root(sink) => return sink(message, sync),
				Self::Tagged { taggers, parent } => {
					// Cloned so that no borrow is held while user code runs.
					let taggers = taggers.borrow().clone();
					for tagger in taggers.iter().rev() {
						message = tagger(message);
					}
					context = parent;
				}
			}
		}
	}
}

impl<Msg> fmt::Debug for EventContext<Msg> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Root(_) => f.write_str("EventContext::Root"),
			Self::Tagged { taggers, parent } => f
				.debug_struct("EventContext::Tagged")
				.field("taggers.len()", &taggers.borrow().len())
				.field("parent", parent)
				.finish(),
		}
	}
}

/// What a [`Handler::Custom`] decoder produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Handled<Msg> {
	pub message: Msg,
	pub stop_propagation: bool,
	pub prevent_default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
	Normal,
	MayStopPropagation,
	MayPreventDefault,
	Custom,
}

impl HandlerKind {
	/// Whether listeners for this kind can be registered as passive, since they never prevent the default action.
	#[must_use]
	pub fn is_passive(self) -> bool {
		matches!(self, Self::Normal | Self::MayStopPropagation)
	}
}

/// The decoding half of an event binding.
pub enum Handler<Msg> {
	Normal(Decoder<Msg>),
	/// The `bool` requests that propagation be stopped.
	MayStopPropagation(Decoder<(Msg, bool)>),
	/// The `bool` requests that the default action be prevented.
	MayPreventDefault(Decoder<(Msg, bool)>),
	Custom(Decoder<Handled<Msg>>),
}

impl<Msg> Clone for Handler<Msg> {
	fn clone(&self) -> Self {
		match self {
			Self::Normal(decoder) => Self::Normal(Rc::clone(decoder)),
			Self::MayStopPropagation(decoder) => Self::MayStopPropagation(Rc::clone(decoder)),
			Self::MayPreventDefault(decoder) => Self::MayPreventDefault(Rc::clone(decoder)),
			Self::Custom(decoder) => Self::Custom(Rc::clone(decoder)),
		}
	}
}

impl<Msg> fmt::Debug for Handler<Msg> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Handler::{:?}", self.kind())
	}
}

impl<Msg: 'static> Handler<Msg> {
	pub fn normal(decoder: impl Fn(&dyn Any) -> Result<Msg, DecodeError> + 'static) -> Self {
		Self::Normal(Rc::new(decoder))
	}

	/// A [`Handler::Normal`] that only accepts events of type `E`.
	pub fn typed<E: Any>(decoder: impl Fn(&E) -> Result<Msg, DecodeError> + 'static) -> Self {
		Self::normal(move |event| {
			event.downcast_ref::<E>().map_or_else(
				|| {
					Err(DecodeError::UnexpectedEvent {
						expected: core::any::type_name::<E>(),
					})
				},
				&decoder,
			)
		})
	}

	/// A [`Handler::Normal`] that ignores the event's payload.
	pub fn message(message: Msg) -> Self
	where
		Msg: Clone,
	{
		Self::normal(move |_| Ok(message.clone()))
	}
}

impl<Msg> Handler<Msg> {
	#[must_use]
	pub fn kind(&self) -> HandlerKind {
		match self {
			Self::Normal(_) => HandlerKind::Normal,
			Self::MayStopPropagation(_) => HandlerKind::MayStopPropagation,
			Self::MayPreventDefault(_) => HandlerKind::MayPreventDefault,
			Self::Custom(_) => HandlerKind::Custom,
		}
	}

	/// Reference equality of the decoders, plus equal kinds.
	#[must_use]
	pub fn same_as(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Normal(a), Self::Normal(b)) => Rc::ptr_eq(a, b),
			(Self::MayStopPropagation(a), Self::MayStopPropagation(b)) | (Self::MayPreventDefault(a), Self::MayPreventDefault(b)) => Rc::ptr_eq(a, b),
			(Self::Custom(a), Self::Custom(b)) => Rc::ptr_eq(a, b),
			_ => false,
		}
	}

	/// Runs the decoder and normalises its output.
	///
	/// # Errors
	///
	/// Iff the decoder rejects `event`.
	pub fn decode(&self, event: &dyn Any) -> Result<Handled<Msg>, DecodeError> {
		Ok(match self {
			Self::Normal(decoder) => Handled {
				message: decoder(event)?,
				stop_propagation: false,
				prevent_default: false,
			},
			Self::MayStopPropagation(decoder) => {
				let (message, stop_propagation) = decoder(event)?;
				Handled {
					message,
					stop_propagation,
					prevent_default: false,
				}
			}
			Self::MayPreventDefault(decoder) => {
				let (message, prevent_default) = decoder(event)?;
				Handled {
					message,
					stop_propagation: false,
					prevent_default,
				}
			}
			Self::Custom(decoder) => decoder(event)?,
		})
	}
}

/// What the host should do with the native event after a listener ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Propagation {
	pub stop_propagation: bool,
	pub prevent_default: bool,
}

/// The callback state attached to a host node for one event name.
///
/// The handler is swapped in place when a facts update keeps the handler kind,
/// so the host-side registration survives.
pub struct Listener<Msg> {
	handler: RefCell<Handler<Msg>>,
	context: Rc<EventContext<Msg>>,
}

impl<Msg> Listener<Msg> {
	#[must_use]
	pub fn new(handler: Handler<Msg>, context: Rc<EventContext<Msg>>) -> Self {
		Self {
			handler: RefCell::new(handler),
			context,
		}
	}

	#[must_use]
	pub fn kind(&self) -> HandlerKind {
		self.handler.borrow().kind()
	}

	#[must_use]
	pub fn is_passive(&self) -> bool {
		self.kind().is_passive()
	}

	#[must_use]
	pub fn context(&self) -> &Rc<EventContext<Msg>> {
		&self.context
	}

	pub(crate) fn replace_handler(&self, handler: Handler<Msg>) {
		*self.handler.borrow_mut() = handler;
	}

	/// Decodes `event` and routes the resulting message to the application.
	///
	/// Events the decoder rejects are dropped silently.
	pub fn handle(&self, event: &dyn Any) -> Propagation {
		let span = trace_span!("Handling event", kind = ?self.kind());
		let _enter = span.enter();

		let handler = self.handler.borrow().clone();
		match handler.decode(event) {
			Err(error) => {
				trace!("Dropped undecodable event: {}", error);
				Propagation::default()
			}
			Ok(Handled {
				message,
				stop_propagation,
				prevent_default,
			}) => {
				self.context.send(message, stop_propagation);
				Propagation {
					stop_propagation,
					prevent_default,
				}
			}
		}
	}
}

impl<Msg> fmt::Debug for Listener<Msg> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Listener")
			.field("handler", &*self.handler.borrow())
			.field("context", &self.context)
			.finish()
	}
}
