use std::{
	collections::HashMap,
	future::Future,
	sync::{
		Arc,
		PoisonError,
		RwLock,
		RwLockReadGuard,
		RwLockWriteGuard,
	},
};
use tokio::sync::{
	mpsc::UnboundedReceiver,
	watch,
};
use uuid::Uuid;
use procdmx_plugin_macros::portable;
use crate::{
	event_emitter::{
		BidirectionalPortable,
		DeclareEventError,
		EventDescription,
		EventEmitter,
		EventReceiver,
		FilterCriteria,
		PortableJSONEvent,
		RegisterListenerError,
	},
	keep_alive::{
		KeepAlive,
		KeepAliveRegistrationError,
	},
};

/// Identifying information for a registered plugin
pub struct Plugin {
	id: String,
	name: String,
}

/// Shared state behind every plugin context
pub struct PluginRegistry {
	evt_bus: RwLock<EventEmitter>,
	keep_alive: KeepAlive,
	plugins: RwLock<HashMap<String, Arc<Plugin>>>,
}

impl PluginRegistry {
	// The bus is only ever held for non-blocking operations, so a poisoned lock still holds
	// consistent data.
	fn bus(&self) -> RwLockWriteGuard<'_, EventEmitter> {
		return self.evt_bus.write().unwrap_or_else(PoisonError::into_inner);
	}
	fn bus_read(&self) -> RwLockReadGuard<'_, EventEmitter> {
		return self.evt_bus.read().unwrap_or_else(PoisonError::into_inner);
	}
}

#[portable(PartialEq, Eq)]
pub enum RegisterPluginError {
	IDConflict,
}

/// Describes a registered plugin
#[portable]
pub struct PluginDescription {
	pub id: String,
	pub name: String,
}

/// A message emitted on the `log` and `log_error` events
#[portable(PartialEq, Eq)]
pub struct LogEntry {
	pub plugin_id: String,
	pub message: String,
}

/// Owns the plugin registry. Each plugin gets its own `PluginContext` from here.
#[derive(Clone)]
pub struct PluginManager(Arc<PluginRegistry>);
impl PluginManager {
	pub fn new() -> PluginManager {
		return PluginManager(Arc::new(PluginRegistry {
			evt_bus: RwLock::new(EventEmitter::new()),
			keep_alive: KeepAlive::new(),
			plugins: RwLock::new(HashMap::new()),
		}));
	}

	/// Registers a new plugin, returning the context it should use to talk to the rest of the
	/// application.
	pub async fn register_plugin(&self, id: impl Into<String>, name: impl Into<String>) -> Result<PluginContext, RegisterPluginError> {
		return PluginContext::new(&self.0, id.into(), name.into());
	}

	pub fn list_plugins(&self) -> Vec<PluginDescription> {
		let plugins = self.0.plugins.read().unwrap_or_else(PoisonError::into_inner);
		let mut descriptions: Vec<PluginDescription> = plugins.values()
			.map(|plugin| PluginDescription {
				id: plugin.id.clone(),
				name: plugin.name.clone(),
			})
			.collect();
		descriptions.sort_by(|a, b| a.id.cmp(&b.id));
		return descriptions;
	}

	/// Lists every declared event on the bus
	pub fn list_events(&self) -> Vec<EventDescription> {
		return self.0.bus_read().describe_events();
	}

	/// Registers a listener on the bus that receives pre-encoded JSON events
	pub fn listen_json(&self, event_name: impl Into<String>, filter: FilterCriteria) -> UnboundedReceiver<PortableJSONEvent> {
		return self.0.bus().on_json(event_name.into(), filter);
	}

	/// Signals shutdown to all listeners and long-running tasks, then waits for blockers and
	/// finishers.
	pub async fn shutdown(&self) {
		self.0.bus().send_shutdown();
		self.0.keep_alive.shut_down().await;
	}
}

/// A plugin's handle into the application. Cloning is cheap.
#[derive(Clone)]
pub struct PluginContext (Arc<PluginRegistry>, Arc<Plugin>);
impl PluginContext {
	fn new(registry: &Arc<PluginRegistry>, id: String, name: String) -> Result<PluginContext, RegisterPluginError> {
		let mut plugins = registry.plugins.write().unwrap_or_else(PoisonError::into_inner);

		if plugins.contains_key(&id) {
			return Err(RegisterPluginError::IDConflict);
		}

		let plugin = Arc::new(Plugin {
			id: String::clone(&id),
			name,
		});
		plugins.insert(id, Arc::clone(&plugin));

		return Ok(PluginContext (Arc::clone(registry), plugin));
	}

	pub fn id<'a>(&'a self) -> &'a str {
		return &self.1.id;
	}

	pub fn name<'a>(&'a self) -> &'a str {
		return &self.1.name;
	}

	/// Declares an event and its type on the bus
	pub fn declare_event<T: BidirectionalPortable>(&self, event_name: impl Into<String>, description: Option<String>) -> Result<(), DeclareEventError> {
		return self.0.bus().declare_event::<T>(event_name.into(), description);
	}

	/// Sends an event on the bus
	pub fn emit<T: BidirectionalPortable>(&self, event_name: &str, filter: FilterCriteria, message: T) {
		self.0.bus().emit(event_name, filter, message);
	}

	/// Listens for an event of a specific type
	pub fn listen<T: BidirectionalPortable>(&self, event_name: impl Into<String>, filter: FilterCriteria) -> Result<EventReceiver<T>, RegisterListenerError> {
		return self.0.bus().on::<T>(event_name.into(), filter);
	}

	/// Listens for an event, receiving it as JSON
	pub fn listen_json(&self, event_name: impl Into<String>, filter: FilterCriteria) -> UnboundedReceiver<PortableJSONEvent> {
		return self.0.bus().on_json(event_name.into(), filter);
	}

	/// Logs a message. Usually called through `log!`.
	pub fn log(&self, message: String) {
		self.emit("log", FilterCriteria::None, LogEntry {
			plugin_id: self.1.id.clone(),
			message,
		});
	}

	/// Logs an error that needs to be addressed. Usually called through `log_error!`.
	pub fn log_error(&self, message: String) {
		self.emit("log_error", FilterCriteria::None, LogEntry {
			plugin_id: self.1.id.clone(),
			message,
		});
	}

	/// Spawns a task that must finish before the application exits
	pub async fn spawn_blocker<F>(&self, name: impl Into<String>, blocker: F) -> Result<(), KeepAliveRegistrationError>
	where
		F: Future<Output = ()> + Send + 'static,
	{
		return self.0.keep_alive.register_blocker(name, blocker).await;
	}

	/// Spawns a task that is aborted when the application exits
	pub async fn spawn_volatile<F>(&self, name: impl Into<String>, volatile: F) -> Result<(), KeepAliveRegistrationError>
	where
		F: Future<Output = ()> + Send + 'static,
	{
		return self.0.keep_alive.register_volatile(name, volatile).await;
	}

	/// Registers a routine to run once all blockers have finished during shutdown
	pub async fn register_finisher<F>(&self, name: impl Into<String>, finisher: F) -> Result<Uuid, KeepAliveRegistrationError>
	where
		F: Future<Output = ()> + Send + 'static,
	{
		return self.0.keep_alive.register_finisher(name, finisher).await;
	}

	pub fn is_shutting_down(&self) -> bool {
		return self.0.keep_alive.is_shutting_down();
	}

	/// Gets a receiver that flips to `true` when shutdown starts
	pub fn watch_shutdown(&self) -> watch::Receiver<bool> {
		return self.0.keep_alive.watch_shutdown();
	}
}
