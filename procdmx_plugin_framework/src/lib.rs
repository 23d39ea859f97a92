// Mods
mod keep_alive;
mod event_emitter;
mod plugin;


// Re-exports
pub use event_emitter::{
	EventEmitter,
	EventReceiver,
	EventDescription,
	FilterCriteria,
	ArcPortable,
	Event,
	PortableEvent,
	PortableJSONEvent,
	PortableEventGeneric,
	DeclareEventError,
	RegisterListenerError,
	BidirectionalPortable,
	PortableMessage,
};
pub use keep_alive::{
	KeepAlive,
	KeepAliveRegistrationError,
	KeepAliveDeregistrationError,
};
pub use plugin::{
	LogEntry,
	Plugin,
	PluginContext,
	PluginDescription,
	PluginManager,
	PluginRegistry,
	RegisterPluginError,
};

// Macros and macro re-exports
pub use procdmx_plugin_macros::*;

#[macro_export]
macro_rules! log_error {
	($context:expr, $($args:tt)*) => {
		$context.log_error(format!($($args)*))
	};
}

#[macro_export]
macro_rules! log {
	($context:expr, $($args:tt)*) => {
		$context.log(format!($($args)*))
	};
}
