use std::{
	collections::BTreeMap,
	sync::Arc,
};
use rustc_hash::FxHashMap;
use procdmx_plugin_framework::*;

use super::driver_types::{
	DMXDriver,
	OutputDevice,
	UniverseError,
	UniverseObserver,
};

/// This represents a DMX universe instance
#[portable(PartialEq, Eq)]
pub struct UniverseInstance {
	pub id: u32,
	pub output_device: OutputDevice,
}

pub struct DMXState {
	pub drivers: FxHashMap<String, Arc<dyn DMXDriver>>,
	pub universes: BTreeMap<u32, UniverseInstance>,
	pub default_universe: Option<u32>,
	pub observers: Vec<Arc<dyn UniverseObserver>>,
}
impl DMXState {
	pub fn new() -> Self {
		return DMXState {
			drivers: FxHashMap::default(),
			universes: BTreeMap::new(),
			default_universe: None,
			observers: Vec::new(),
		};
	}

	/// Checks that a universe can be added without clashing with an existing one
	pub fn check_new_universe(&self, universe: &UniverseInstance) -> Result<(), UniverseError> {
		if self.universes.contains_key(&universe.id) {
			return Err(UniverseError::DuplicateId(universe.id));
		}
		if let Some(existing) = self.universes.values().find(|existing| existing.output_device == universe.output_device) {
			return Err(UniverseError::DuplicateOutputDevice {
				driver: universe.output_device.driver.clone(),
				device: universe.output_device.device.clone(),
				universe: existing.id,
			});
		}
		return Ok(());
	}
}
