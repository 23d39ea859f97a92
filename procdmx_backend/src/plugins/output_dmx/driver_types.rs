use async_trait::async_trait;
use thiserror::Error;
use procdmx_plugin_framework::*;

pub use crate::mixer_utils::state::DMXFrame;

use super::state::UniverseInstance;

/// Trait indicating parameters for communicating with a DMX driver
#[async_trait]
pub trait DMXDriver: Send + Sync + 'static {
	/// The unique ID of the DMX driver
	fn get_id<'a>(&'a self) -> &'a str;

	/// The human-readable name of the DMX driver
	fn get_name<'a>(&'a self) -> &'a str;

	/// A human-readable description of the driver, such as what devices and protocols it uses
	fn get_description<'a>(&'a self) -> &'a str;

	/// Writes one frame to the device a universe is bound to. Failures are reported, not retried.
	async fn send_frame(&self, universe: &UniverseInstance, frame: DMXFrame) -> anyhow::Result<()>;
}

/// Gets notified whenever universes come and go
#[async_trait]
pub trait UniverseObserver: Send + Sync + 'static {
	async fn on_universe_created(&self, universe: &UniverseInstance);
	async fn on_universe_removed(&self, universe: &UniverseInstance);
}

/// Minified representation of a DMX driver for display
#[portable(PartialEq, Eq)]
pub struct DisplayableDMXDriver {
	pub id: String,
	pub name: String,
	pub description: String,
}

/// The physical or virtual device a universe writes to, as understood by its driver
#[portable(PartialEq, Eq, Hash)]
pub struct OutputDevice {
	pub driver: String,
	pub device: String,
}

/// An error that occurs while managing universes
#[portable(PartialEq, Eq)]
#[derive(Error)]
pub enum UniverseError {
	#[error("Universe {0} already exists")]
	DuplicateId(u32),
	#[error("Output device {device} on driver {driver} is already bound to universe {universe}")]
	DuplicateOutputDevice {
		driver: String,
		device: String,
		universe: u32,
	},
	#[error("Universe {0} does not exist")]
	UnknownUniverse(u32),
}
