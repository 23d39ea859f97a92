use std::{
	ops::Deref,
	sync::Arc,
};

use super::portable_message::PortableMessage;

/// Holds a typed reference to a message received from the bus. The message itself is shared
/// between every listener, so it is never cloned on delivery.
pub struct ArcPortable<T: 'static>(Arc<T>);

impl<T: Sync + Send + 'static> ArcPortable<T> {

	/// Creates a new `ArcPortable` from a type-erased bus message, returning `None` if the
	/// message is not a `T`.
	pub fn new(message: Arc<dyn PortableMessage>) -> Option<ArcPortable<T>> {
		return message.into_any_arc().downcast::<T>().ok().map(ArcPortable);
	}

	/// Gets the inner `Arc` so the message can outlive the wrapper
	pub fn into_inner(self) -> Arc<T> {
		return self.0;
	}

}

impl<T: 'static> Deref for ArcPortable<T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		return &self.0;
	}
}

impl<T: 'static> Clone for ArcPortable<T> {
	fn clone(&self) -> Self {
		return ArcPortable(Arc::clone(&self.0));
	}
}
