use std::{
	fmt,
	any::Any,
	sync::Arc,
};

use serde::Serialize;
use serde_json::Value;

/// Marker trait that enables a message to be sent on the event bus.
///
/// This trait is automatically implemented when a type implements `Serialize` and `Deserialize`
/// from serde. Use `#[portable]` to get all the required derives at once.
pub trait BidirectionalPortable: PortableMessage + serde::de::DeserializeOwned { }
impl<T: PortableMessage + serde::de::DeserializeOwned> BidirectionalPortable for T { }

/// Common API for all events sent on the bus, regardless of type.
pub trait PortableMessage: Any + Sync + Send {
	fn serialize_json(&self) -> Result<Value, serde_json::Error>;
	fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Sync + Send>;
	fn fmt_portable_message(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

// Blanket message serializer implementation for all serializable data types
impl<T: Serialize + Clone + fmt::Debug + Sync + Send + 'static> PortableMessage for T {
	fn serialize_json(&self) -> Result<Value, serde_json::Error> {
		return serde_json::to_value(&self);
	}
	fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Sync + Send> {
		return self;
	}
	fn fmt_portable_message(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		return fmt::Debug::fmt(&self, f);
	}
}

impl fmt::Debug for dyn PortableMessage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		return self.fmt_portable_message(f);
	}
}
