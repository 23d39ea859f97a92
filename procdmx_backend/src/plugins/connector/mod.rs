use std::sync::{
	Arc,
	PoisonError,
	RwLock,
};
use rustc_hash::FxHashMap;
use procdmx_plugin_framework::*;

/// A keyed store of exogenous control values, such as sliders and MIDI knobs.
///
/// Stores are read from inside frames, so neither call may block on I/O.
pub trait ConnectorStore: Send + Sync + 'static {
	/// Gets the current value of a key. Unknown keys read as 0.
	fn get(&self, key: &str) -> u8;

	fn set(&self, key: &str, value: u8);

	/// Lists every key that has been set, sorted
	fn keys(&self) -> Vec<String>;
}

/// In-memory connector store
#[derive(Default)]
pub struct LocalConnector {
	values: RwLock<FxHashMap<String, u8>>,
}
impl LocalConnector {
	pub fn new() -> LocalConnector {
		return LocalConnector::default();
	}
}
impl ConnectorStore for LocalConnector {
	fn get(&self, key: &str) -> u8 {
		let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
		return values.get(key).copied().unwrap_or(0);
	}
	fn set(&self, key: &str, value: u8) {
		let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
		values.insert(String::from(key), value);
	}
	fn keys(&self) -> Vec<String> {
		let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
		let mut keys: Vec<String> = values.keys().cloned().collect();
		keys.sort();
		return keys;
	}
}

/// Emitted on `connector.updated` whenever a value is set
#[portable(PartialEq, Eq)]
pub struct ConnectorUpdate {
	pub key: String,
	pub value: u8,
}

#[derive(Clone)]
pub struct ConnectorInterface(PluginContext, Arc<dyn ConnectorStore>);
impl ConnectorInterface {
	pub fn get(&self, key: &str) -> u8 {
		return self.1.get(key);
	}

	/// Sets a value, notifying listeners filtered by the key
	pub fn set(&self, key: &str, value: u8) {
		self.1.set(key, value);
		self.0.emit("connector.updated", FilterCriteria::String(String::from(key)), ConnectorUpdate {
			key: String::from(key),
			value,
		});
	}

	pub fn keys(&self) -> Vec<String> {
		return self.1.keys();
	}
}

/// Initializes the connector with an in-memory store
pub async fn initialize(plugin_context: PluginContext) -> Result<ConnectorInterface, DeclareEventError> {
	return initialize_with_store(plugin_context, Arc::new(LocalConnector::new())).await;
}

/// Initializes the connector on top of an externally-provided store
pub async fn initialize_with_store(plugin_context: PluginContext, store: Arc<dyn ConnectorStore>) -> Result<ConnectorInterface, DeclareEventError> {
	plugin_context.declare_event::<ConnectorUpdate>(
		"connector.updated",
		Some("Emitted when a connector value is set. Filtered by key.".into()),
	)?;
	return Ok(ConnectorInterface(plugin_context, store));
}
