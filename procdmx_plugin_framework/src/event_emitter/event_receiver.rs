use std::marker::PhantomData;

use tokio::sync::mpsc::{
	error::TryRecvError,
	UnboundedReceiver,
};

use super::{
	PortableEvent,
	BidirectionalPortable,
	arc_portable::ArcPortable,
};

/// Wrapped receiver that filters a type-erased event stream and returns `ArcPortable<T>` for the
/// desired type.
pub struct EventReceiver<T: BidirectionalPortable> {
	event_name: String,
	receiver: UnboundedReceiver<PortableEvent>,
	_phantom: PhantomData<T>,
}

pub enum Event<T: 'static> {
	Msg(ArcPortable<T>),
	Shutdown,
}

impl<T: BidirectionalPortable> EventReceiver<T> {

	pub fn new(event_name: String, receiver: UnboundedReceiver<PortableEvent>) -> EventReceiver<T> {
		return EventReceiver::<T> {
			event_name,
			receiver,
			_phantom: PhantomData,
		};
	}

	pub fn get_name<'a>(&'a self) -> &'a String {
		return &self.event_name;
	}

	/// Receives a single message of the desired type, skipping messages of any other type.
	///
	/// A closed bus is reported the same way as a shutdown.
	pub async fn receive(&mut self) -> Event<T> {
		loop {
			match self.receiver.recv().await {
				Some(PortableEvent::Msg(msg)) => {
					if let Some(msg) = ArcPortable::new(msg) {
						return Event::Msg(msg);
					}
				},
				Some(PortableEvent::Shutdown) | None => return Event::Shutdown,
			}
		}
	}

	/// Non-blocking variant of `receive`. Returns `None` if nothing of the desired type is queued.
	pub fn try_receive(&mut self) -> Option<Event<T>> {
		loop {
			match self.receiver.try_recv() {
				Ok(PortableEvent::Msg(msg)) => {
					if let Some(msg) = ArcPortable::new(msg) {
						return Some(Event::Msg(msg));
					}
				},
				Ok(PortableEvent::Shutdown) | Err(TryRecvError::Disconnected) => return Some(Event::Shutdown),
				Err(TryRecvError::Empty) => return None,
			}
		}
	}
}
