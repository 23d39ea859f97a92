use std::sync::Arc;
use tokio::sync::RwLock;
use futures::future::join_all;
use anyhow::anyhow;
use procdmx_plugin_framework::*;

use super::{
	state::{
		DMXState,
		UniverseInstance,
	},
	driver_types::{
		DMXDriver,
		DMXFrame,
		DisplayableDMXDriver,
		OutputDevice,
		UniverseError,
		UniverseObserver,
	},
};


#[derive(Clone)]
pub struct DMXInterface(PluginContext, Arc::<RwLock::<DMXState>>);
impl DMXInterface {
	pub fn new(plugin_context: PluginContext) -> Self {
		return DMXInterface(plugin_context, Arc::new(RwLock::new(DMXState::new())));
	}

	/// Registers a DMX driver for sending universe frames. A driver with the same ID is replaced.
	pub async fn register_dmx_driver<T: DMXDriver>(&self, driver: T) {
		let mut ctx = self.1.write().await;
		ctx.drivers.insert(String::from(driver.get_id()), Arc::new(driver));
	}

	/// Lists the registered drivers, sorted by ID
	pub async fn list_drivers(&self) -> Vec<DisplayableDMXDriver> {
		let ctx = self.1.read().await;
		let mut drivers: Vec<DisplayableDMXDriver> = ctx.drivers.values()
			.map(|driver| DisplayableDMXDriver {
				id: String::from(driver.get_id()),
				name: String::from(driver.get_name()),
				description: String::from(driver.get_description()),
			})
			.collect();
		drivers.sort_by(|a, b| a.id.cmp(&b.id));
		return drivers;
	}

	/// Registers a hook that is notified of universe changes. Existing universes are replayed to it.
	pub async fn register_universe_observer(&self, observer: Arc<dyn UniverseObserver>) {
		let existing: Vec<UniverseInstance> = {
			let mut ctx = self.1.write().await;
			ctx.observers.push(Arc::clone(&observer));
			ctx.universes.values().cloned().collect()
		};
		for universe in existing.iter() {
			observer.on_universe_created(universe).await;
		}
	}

	/// Creates a new universe bound to an output device
	pub async fn create_universe(&self, id: u32, output_device: OutputDevice) -> Result<(), UniverseError> {
		let universe = UniverseInstance {
			id,
			output_device,
		};
		let observers = {
			let mut ctx = self.1.write().await;
			ctx.check_new_universe(&universe)?;
			ctx.universes.insert(id, universe.clone());
			ctx.observers.clone()
		};

		for observer in observers.iter() {
			observer.on_universe_created(&universe).await;
		}
		self.0.emit("dmx.universe_created", FilterCriteria::Integer(id as i64), universe);
		return Ok(());
	}

	/// Delete a universe from the registry. Deleting the default universe clears the default.
	pub async fn delete_universe(&self, id: u32) -> Result<UniverseInstance, UniverseError> {
		let (universe, observers) = {
			let mut ctx = self.1.write().await;
			let universe = ctx.universes.remove(&id).ok_or(UniverseError::UnknownUniverse(id))?;
			if ctx.default_universe == Some(id) {
				ctx.default_universe = None;
			}
			(universe, ctx.observers.clone())
		};

		for observer in observers.iter() {
			observer.on_universe_removed(&universe).await;
		}
		self.0.emit("dmx.universe_removed", FilterCriteria::Integer(id as i64), universe.clone());
		return Ok(universe);
	}

	/// Marks a universe as the default, or clears the default with `None`
	pub async fn set_default_universe(&self, id: Option<u32>) -> Result<(), UniverseError> {
		let mut ctx = self.1.write().await;
		if let Some(id) = id {
			if !ctx.universes.contains_key(&id) {
				return Err(UniverseError::UnknownUniverse(id));
			}
		}
		ctx.default_universe = id;
		return Ok(());
	}

	pub async fn get_default_universe(&self) -> Option<u32> {
		return self.1.read().await.default_universe;
	}

	pub async fn get_universe(&self, id: u32) -> Option<UniverseInstance> {
		return self.1.read().await.universes.get(&id).cloned();
	}

	/// Lists all universes, sorted by ID
	pub async fn list_universes(&self) -> Vec<UniverseInstance> {
		return self.1.read().await.universes.values().cloned().collect();
	}

	/// Writes frames to their universes concurrently, waiting for every write to settle.
	///
	/// One write failing never affects the others. Results are returned in the order given.
	pub async fn send_frames(&self, frames: Vec<(u32, DMXFrame)>) -> Vec<(u32, anyhow::Result<()>)> {
		let ctx = self.1.read().await;

		let mut futures = Vec::with_capacity(frames.len());
		for (universe_id, frame) in frames {
			// Send an event for the UI with the dmx output data, useful for inspectors
			self.0.emit("dmx.output", FilterCriteria::Integer(universe_id as i64), frame.to_vec());

			let target = match ctx.universes.get(&universe_id) {
				Some(universe) => match ctx.drivers.get(&universe.output_device.driver) {
					Some(driver) => Ok((Arc::clone(driver), universe.clone())),
					None => Err(anyhow!("Driver {} is not registered", universe.output_device.driver)),
				},
				None => Err(anyhow!("Universe {universe_id} does not exist")),
			};
			futures.push(async move {
				return match target {
					Ok((driver, universe)) => (universe_id, driver.send_frame(&universe, frame).await),
					Err(error) => (universe_id, Err(error)),
				};
			});
		}
		drop(ctx);

		return join_all(futures).await;
	}
}
