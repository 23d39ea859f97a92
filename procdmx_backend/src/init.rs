use thiserror::Error;
use procdmx_plugin_framework::*;

use crate::{
	plugins::{
		self,
		connector::ConnectorInterface,
		core::CoreInitializationError,
		input_router::InputRouterInterface,
		output_dmx::{
			interface::DMXInterface,
			DMXInitializationError,
		},
		scheduler::SchedulerInterface,
	},
	utilities::config::EngineConfig,
};

/// Handles to every plugin the engine registered
#[derive(Clone)]
pub struct EngineInterfaces {
	pub dmx: DMXInterface,
	pub connector: ConnectorInterface,
	pub inputs: InputRouterInterface,
	pub scheduler: SchedulerInterface,
}

/// Registers the engine's plugins and creates the configured universes.
///
/// The frame loop is not started; call `scheduler.start()` once drivers and processes are in place.
pub async fn async_main(plugin_manager: &PluginManager, config: EngineConfig) -> Result<EngineInterfaces, InitializationError> {
	// Register core plugin
	plugins::core::initialize(
		plugin_manager
			.register_plugin("core", "ProcDMX Core")
			.await?,
	)
	.await?;

	let dmx = plugins::output_dmx::initialize(
		plugin_manager
			.register_plugin("output_dmx", "DMX Universe Registry")
			.await?,
		config.universes,
	)
	.await?;

	let connector = plugins::connector::initialize(
		plugin_manager
			.register_plugin("connector", "Local Connector Store")
			.await?,
	)
	.await
	.map_err(|_| InitializationError::EventConflict("connector"))?;

	let inputs = plugins::input_router::initialize(
		plugin_manager
			.register_plugin("input_router", "Input Router")
			.await?,
	)
	.await;

	let scheduler = plugins::scheduler::initialize(
		plugin_manager
			.register_plugin("scheduler", "Process Scheduler")
			.await?,
		config.scheduler,
		dmx.clone(),
		inputs.clone(),
		connector.clone(),
	)
	.await
	.map_err(|_| InitializationError::EventConflict("scheduler"))?;

	return Ok(EngineInterfaces {
		dmx,
		connector,
		inputs,
		scheduler,
	});
}

#[derive(Debug, Error)]
pub enum InitializationError {
	#[error("A plugin with the same ID is already registered")]
	PluginConflict,
	#[error("Events of the {0} plugin were already declared with a different type")]
	EventConflict(&'static str),
	#[error("Could not initialize the core plugin: {0}")]
	Core(#[from] CoreInitializationError),
	#[error("Could not initialize the DMX plugin: {0}")]
	DMX(#[from] DMXInitializationError),
}
impl From<RegisterPluginError> for InitializationError {
	fn from(_: RegisterPluginError) -> Self {
		return InitializationError::PluginConflict;
	}
}
