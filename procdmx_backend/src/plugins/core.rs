use procdmx_plugin_framework::*;

/// Declares the logging events. With `stderr-logging`, every entry is also printed to stderr.
pub async fn initialize(plugin_context: PluginContext) -> Result<(), CoreInitializationError> {
	plugin_context.declare_event::<LogEntry>("log", Some("A message logged by a plugin".into()))?;
	plugin_context.declare_event::<LogEntry>("log_error", Some("An error logged by a plugin that needs to be addressed".into()))?;

	#[cfg(feature = "stderr-logging")]
	for event_name in ["log", "log_error"] {
		let mut receiver = plugin_context.listen::<LogEntry>(event_name, FilterCriteria::None)?;
		plugin_context.spawn_volatile(format!("stderr {event_name}"), async move {
			while let Event::Msg(entry) = receiver.receive().await {
				eprintln!("[{}] {}", entry.plugin_id, entry.message);
			}
		}).await?;
	}

	return Ok(());
}

#[portable]
#[derive(thiserror::Error)]
/// An error that could occur while initializing the core plugin
pub enum CoreInitializationError {
	#[error("The logging events were already declared with a different type")]
	EventConflict,
	#[error("Could not listen for log entries: {0:?}")]
	ListenerConflict(RegisterListenerError),
	#[error("The application is shutting down")]
	ShuttingDown,
}
impl From<DeclareEventError> for CoreInitializationError {
	fn from(_: DeclareEventError) -> Self {
		return CoreInitializationError::EventConflict;
	}
}
impl From<RegisterListenerError> for CoreInitializationError {
	fn from(error: RegisterListenerError) -> Self {
		return CoreInitializationError::ListenerConflict(error);
	}
}
impl From<KeepAliveRegistrationError> for CoreInitializationError {
	fn from(_: KeepAliveRegistrationError) -> Self {
		return CoreInitializationError::ShuttingDown;
	}
}
