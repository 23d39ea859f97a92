pub mod driver_types;
pub mod interface;
pub mod state;

use procdmx_plugin_framework::*;

use self::{
	driver_types::UniverseError,
	interface::DMXInterface,
	state::UniverseInstance,
};
use crate::utilities::config::UniverseConfig;

pub async fn initialize(
	plugin_context: PluginContext,
	universes: Vec<UniverseConfig>,
) -> Result<DMXInterface, DMXInitializationError> {
	plugin_context.declare_event::<Vec<u8>>(
		"dmx.output",
		Some("The output of the DMX plugin, for display by the UI. This should not be used by DMX drivers.".into()),
	)?;
	plugin_context.declare_event::<UniverseInstance>(
		"dmx.universe_created",
		Some("Emitted whenever a universe is created.".into()),
	)?;
	plugin_context.declare_event::<UniverseInstance>(
		"dmx.universe_removed",
		Some("Emitted whenever a universe is deleted.".into()),
	)?;

	let output_context = DMXInterface::new(plugin_context.clone());

	for universe in universes {
		output_context.create_universe(universe.id, universe.output_device).await?;
		if universe.default {
			output_context.set_default_universe(Some(universe.id)).await?;
		}
	}

	return Ok(output_context);
}

#[portable]
#[derive(thiserror::Error)]
/// An error that could occur while initializing the DMX plugin
pub enum DMXInitializationError {
	#[error("A DMX event was already declared with a different type")]
	EventConflict,
	#[error("Could not create a configured universe: {0}")]
	Universe(#[from] UniverseError),
}
impl From<DeclareEventError> for DMXInitializationError {
	fn from(_: DeclareEventError) -> Self {
		return DMXInitializationError::EventConflict;
	}
}
