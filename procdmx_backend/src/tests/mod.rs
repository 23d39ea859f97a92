mod addressing;
mod scheduler;

use std::sync::{
	Arc,
	Mutex,
};
use async_trait::async_trait;
use anyhow::anyhow;
use procdmx_plugin_framework::*;

use crate::{
	mixer_utils::state::DMXFrame,
	plugins::{
		connector,
		input_router,
		output_dmx::{
			driver_types::{
				DMXDriver,
				OutputDevice,
			},
			state::UniverseInstance,
		},
		scheduler::controls::FrameEnv,
	},
};

/// Records every frame it is asked to write, optionally failing instead
#[derive(Clone, Default)]
pub struct RecordingDriver {
	pub frames: Arc<Mutex<Vec<(u32, Vec<u8>)>>>,
	pub fail: bool,
}

impl RecordingDriver {
	pub fn failing() -> RecordingDriver {
		return RecordingDriver {
			frames: Arc::default(),
			fail: true,
		};
	}

	pub fn recorded(&self) -> Vec<(u32, Vec<u8>)> {
		return self.frames.lock().unwrap().clone();
	}
}

#[async_trait]
impl DMXDriver for RecordingDriver {
	fn get_id<'a>(&'a self) -> &'a str {
		return "recording";
	}

	fn get_name<'a>(&'a self) -> &'a str {
		return "Recording";
	}

	fn get_description<'a>(&'a self) -> &'a str {
		return "Keeps every frame in memory";
	}

	async fn send_frame(&self, universe: &UniverseInstance, frame: DMXFrame) -> anyhow::Result<()> {
		if self.fail {
			return Err(anyhow!("Device unplugged"));
		}
		self.frames.lock().unwrap().push((universe.id, frame.to_vec()));
		return Ok(());
	}
}

pub fn recording_device(device: &str) -> OutputDevice {
	return OutputDevice {
		driver: String::from("recording"),
		device: String::from(device),
	};
}

/// Builds the outside world a frame needs, backed by a fresh plugin manager
pub async fn frame_env(default_universe: Option<u32>) -> FrameEnv {
	let manager = PluginManager::new();
	let plugin = manager.register_plugin("test", "Test").await.unwrap();
	let connector = connector::initialize(manager.register_plugin("connector", "Connector").await.unwrap()).await.unwrap();
	let inputs = input_router::initialize(manager.register_plugin("input_router", "Input Router").await.unwrap()).await;
	return FrameEnv {
		plugin,
		default_universe,
		inputs,
		connector,
	};
}
