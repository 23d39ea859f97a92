use procdmx_plugin_framework::*;

use crate::{
	impl_deserialize_err,
	plugins::output_dmx::driver_types::OutputDevice,
	utilities::serialized_data::SerializedData,
};

/// Top-level engine configuration
#[portable]
#[derive(Default)]
#[serde(default)]
pub struct EngineConfig {
	#[serde(flatten)]
	pub scheduler: SchedulerConfig,

	/// Universes to create on startup
	pub universes: Vec<UniverseConfig>,
}

impl EngineConfig {
	pub fn from_serialized(data: SerializedData) -> Result<EngineConfig, ConfigError> {
		return Ok(data.deserialize()?);
	}
}

/// Timing and housekeeping knobs for the frame loop
#[portable(PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
	/// Minimum time between frame starts. 0 runs frames back to back, yielding in between.
	pub frame_interval_ms: u64,

	/// How many frames a finished task's return value stays queryable
	pub gc_frames: u32,

	/// Consecutive failed frames tolerated before the loop starts cooling down
	pub failure_threshold: u32,

	/// Sleep inserted after each failed frame once the threshold is exceeded
	pub failure_cooldown_ms: u64,
}
impl Default for SchedulerConfig {
	fn default() -> Self {
		return SchedulerConfig {
			frame_interval_ms: 0,
			gc_frames: 44,
			failure_threshold: 50,
			failure_cooldown_ms: 1000,
		};
	}
}

/// A universe registered at startup
#[portable(PartialEq, Eq)]
pub struct UniverseConfig {
	pub id: u32,
	pub output_device: OutputDevice,
	#[serde(default)]
	pub default: bool,
}

#[portable]
#[derive(thiserror::Error)]
pub enum ConfigError {
	#[error("Could not read engine configuration: {0}")]
	InvalidData(String),
}
impl_deserialize_err!(ConfigError, ConfigError::InvalidData);
