mod arc_portable;
mod event_receiver;
mod portable_message;

use std::{
	sync::Arc,
	collections::HashMap,
	any::{
		type_name,
		TypeId,
	},
};

use tokio::sync::mpsc::{
	self,
	UnboundedReceiver,
	UnboundedSender,
};

use uuid::Uuid;

use procdmx_plugin_macros::portable;

pub use portable_message::{
	PortableMessage,
	BidirectionalPortable,
};

pub use event_receiver::{EventReceiver, Event};
pub use arc_portable::ArcPortable;

pub type PortableEvent = PortableEventGeneric<dyn PortableMessage>;
pub type PortableJSONEvent = PortableEventGeneric<serde_json::Value>;
pub enum PortableEventGeneric<T: Sync + Send + ?Sized> {
	Msg(Arc<T>),
	Shutdown,
}

impl<T: Sync + Send + ?Sized> Clone for PortableEventGeneric<T> {
	fn clone(&self) -> Self {
		return match self {
			&PortableEventGeneric::Msg(ref message_arc) => PortableEventGeneric::Msg(Arc::clone(message_arc)),
			&PortableEventGeneric::Shutdown => PortableEventGeneric::Shutdown,
		};
	}
}


/// # Semi-statically-typed event bus.
///
/// The `EventEmitter` distributes data by event name. Each message is type-erased into an
/// `Arc<dyn PortableMessage>` and shared between all listeners of that event, which get it back
/// as an `ArcPortable<T>` of the type they asked for.
///
/// ## Type semantics
///
/// Events can be declared with a type, after which listeners of any other type are refused.
/// Undeclared events are still delivered, but are not included in self-documentation.
///
/// Listeners registered with `on_json` receive every message pre-serialized as JSON, which is
/// what external UIs consume.
pub struct EventEmitter {
	listeners: HashMap<String, ListenerInfo>,
}

impl EventEmitter {

	/// Creates a new EventEmitter.
	pub fn new() -> EventEmitter {
		return EventEmitter {
			listeners: HashMap::new(),
		};
	}

	/// Drops senders whose receivers have gone away, along with any undeclared event that no
	/// longer has listeners.
	fn gc(&mut self) {
		self.listeners.retain(|_, listener_info| {
			listener_info.listeners.retain(|(_, sender)| !sender.is_closed());
			listener_info.json_listeners.retain(|(_, sender)| !sender.is_closed());
			return listener_info.persistent
				|| listener_info.listeners.len() > 0
				|| listener_info.json_listeners.len() > 0;
		});
	}

	/// Declares an event on the bus so its type can be enforced and it can be included in
	/// self-documentation.
	///
	/// Declaring an event twice with the same type is a no-op.
	pub fn declare_event<T: BidirectionalPortable>(&mut self, event_name: String, description: Option<String>) -> Result<(), DeclareEventError> {
		let listener_info = self.listeners.entry(event_name).or_insert_with(ListenerInfo::new);
		if let Some(ref evt_info) = listener_info.evt_info {
			if evt_info.type_id != TypeId::of::<T>() {
				return Err(DeclareEventError::AlreadyDeclared);
			}
			return Ok(());
		}
		listener_info.persistent = true;
		listener_info.evt_info = Some(EventInfo {
			type_id: TypeId::of::<T>(),
			type_name: type_name::<T>(),
			description,
		});
		return Ok(());
	}

	/// Registers an event listener on the bus of the given type. Returns
	/// an instance of `EventReceiver<T>` which filters for the desired type
	/// and wraps resulting values in `ArcPortable<T>`.
	pub fn on<T: BidirectionalPortable>(&mut self, event_name: String, filter: FilterCriteria) -> Result<EventReceiver<T>, RegisterListenerError> {
		self.gc();

		let listener_info = self.listeners.entry(String::clone(&event_name)).or_insert_with(ListenerInfo::new);

		if let Some(ref evt_info) = listener_info.evt_info {
			if evt_info.type_id != TypeId::of::<T>() {
				return Err(RegisterListenerError::EventClaimedAsType(String::from(evt_info.type_name)));
			}
		}

		let (sender, receiver) = mpsc::unbounded_channel();
		listener_info.listeners.push((filter, sender));
		return Ok(EventReceiver::new(event_name, receiver));
	}

	/// Registers a listener on the event bus that receives pre-encoded JSON events
	pub fn on_json(&mut self, event_name: String, filter: FilterCriteria) -> UnboundedReceiver<PortableJSONEvent> {
		self.gc();

		let listener_info = self.listeners.entry(event_name).or_insert_with(ListenerInfo::new);

		let (sender, receiver) = mpsc::unbounded_channel();
		listener_info.json_listeners.push((filter, sender));
		return receiver;
	}

	/// Sends an event on the bus to every listener whose filter matches.
	///
	/// This never blocks, so it is safe to call from inside a frame.
	pub fn emit<T: BidirectionalPortable>(&mut self, event_name: &str, filter: FilterCriteria, message: T) {
		self.gc();

		if let Some(listeners) = self.listeners.get(event_name) {
			// Re-broadcast JSON
			if relevant_listener(&filter, &listeners.json_listeners) {
				if let Ok(translated) = message.serialize_json() {
					send_filtered(&filter, PortableJSONEvent::Msg(Arc::new(translated)), &listeners.json_listeners);
				}
			}

			let message: Arc<dyn PortableMessage> = Arc::new(message);
			send_filtered(&filter, PortableEvent::Msg(message), &listeners.listeners);
		}
	}

	/// Lists all declared events
	pub fn describe_events(&self) -> Vec<EventDescription> {
		let mut events: Vec<EventDescription> = self.listeners.iter()
			.filter_map(|(event_name, listener_info)| {
				let evt_info = listener_info.evt_info.as_ref()?;
				return Some(EventDescription {
					name: String::clone(event_name),
					type_name: String::from(evt_info.type_name),
					description: evt_info.description.clone(),
				});
			})
			.collect();
		events.sort_by(|a, b| a.name.cmp(&b.name));
		return events;
	}

	/// Tells every listener that the application is shutting down
	pub fn send_shutdown(&mut self) {
		self.gc();

		for listener_group in self.listeners.values() {
			for (_, listener) in listener_group.listeners.iter() {
				listener.send(PortableEvent::Shutdown).ok();
			}
			for (_, listener) in listener_group.json_listeners.iter() {
				listener.send(PortableJSONEvent::Shutdown).ok();
			}
		}
	}
}

/// Listeners and type information for a single event name
struct ListenerInfo {
	evt_info: Option<EventInfo>,
	persistent: bool,
	listeners: Vec<(FilterCriteria, UnboundedSender<PortableEvent>)>,
	json_listeners: Vec<(FilterCriteria, UnboundedSender<PortableJSONEvent>)>,
}

struct EventInfo {
	type_id: TypeId,
	type_name: &'static str,
	description: Option<String>,
}

impl ListenerInfo {
	fn new() -> Self {
		return ListenerInfo {
			evt_info: None,
			persistent: false,
			listeners: Vec::new(),
			json_listeners: Vec::new(),
		};
	}
}

fn relevant_listener<T: Sync + Send + ?Sized>(filter: &FilterCriteria, listeners: &[(FilterCriteria, UnboundedSender<PortableEventGeneric<T>>)]) -> bool {
	return listeners.iter().any(|listener| listener.0 == FilterCriteria::None || listener.0 == *filter);
}

fn send_filtered<T: Sync + Send + ?Sized>(filter: &FilterCriteria, message: PortableEventGeneric<T>, listeners: &[(FilterCriteria, UnboundedSender<PortableEventGeneric<T>>)]) {
	for listener in listeners {
		if listener.0 == FilterCriteria::None || listener.0 == *filter {
			listener.1.send(message.clone()).ok();
		}
	}
}

/// Criteria used to narrow down which emissions of an event a listener receives.
///
/// A listener registered with `FilterCriteria::None` receives everything.
#[portable(Eq, PartialEq, Hash)]
#[serde(tag = "type", content = "value")]
pub enum FilterCriteria {
	None,
	String(String),
	Uuid(Uuid),
	Integer(i64),
}

/// Describes a declared event for self-documentation
#[portable]
pub struct EventDescription {
	pub name: String,
	pub type_name: String,
	pub description: Option<String>,
}

#[portable(PartialEq, Eq)]
pub enum DeclareEventError {
	AlreadyDeclared,
}

#[portable(PartialEq, Eq)]
pub enum RegisterListenerError {
	/// The event was declared with a different type, whose name is included
	EventClaimedAsType(String),
}
