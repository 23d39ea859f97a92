pub mod controls;
pub mod effects;
pub mod frame_loop;
pub mod interpreter;
pub mod mailbox;
pub mod priority;
pub mod state;

use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::Mutex;
use procdmx_plugin_framework::*;

use crate::{
	mixer_utils::bit_assignment::{
		BitAssignmentError,
		ChannelBitAssignment,
	},
	plugins::{
		connector::ConnectorInterface,
		input_router::InputRouterInterface,
		output_dmx::{
			driver_types::UniverseObserver,
			interface::DMXInterface,
			state::UniverseInstance,
		},
	},
	utilities::config::SchedulerConfig,
};

use self::{
	effects::{
		Payload,
		Process,
		Token,
	},
	state::{
		SchedulerError,
		SchedulerState,
		TaskInfo,
	},
};

pub async fn initialize(
	plugin_context: PluginContext,
	config: SchedulerConfig,
	dmx: DMXInterface,
	inputs: InputRouterInterface,
	connector: ConnectorInterface,
) -> Result<SchedulerInterface, DeclareEventError> {
	plugin_context.declare_event::<bool>(
		"scheduler.processing",
		Some("Emitted when the frame loop starts or stops".into()),
	)?;

	let interface = SchedulerInterface {
		plugin: plugin_context,
		state: Arc::new(Mutex::new(SchedulerState::new(config))),
		dmx: dmx.clone(),
		inputs,
		connector,
	};

	// Universes drive which frames get rendered
	dmx.register_universe_observer(Arc::new(interface.clone())).await;

	return Ok(interface);
}

/// Handle to the process scheduler. Cloning is cheap.
#[derive(Clone)]
pub struct SchedulerInterface {
	plugin: PluginContext,
	state: Arc<Mutex<SchedulerState>>,
	dmx: DMXInterface,
	inputs: InputRouterInterface,
	connector: ConnectorInterface,
}

impl SchedulerInterface {
	/// Registers a process at the given priority path. It first runs on the next frame.
	pub async fn add_process(&self, priority: Vec<i64>, process: impl Process) -> TaskInfo {
		return self.state.lock().await.add_process(priority, Box::new(process));
	}

	/// One more than the highest top-level priority in use, or 0
	pub async fn get_next_priority(&self) -> i64 {
		return self.state.lock().await.next_priority();
	}

	pub async fn cancel(&self, token: Token) -> bool {
		return self.state.lock().await.cancel(token);
	}

	pub async fn stop(&self, token: Token) -> bool {
		return self.state.lock().await.stop(token);
	}

	pub async fn pause(&self, token: Token) -> bool {
		return self.state.lock().await.pause(token);
	}

	pub async fn resume(&self, token: Token) -> bool {
		return self.state.lock().await.resume(token);
	}

	pub async fn is_paused(&self, token: Token) -> bool {
		return self.state.lock().await.is_paused(token);
	}

	pub async fn is_stopped(&self, token: Token) -> bool {
		return self.state.lock().await.is_stopped(token);
	}

	pub async fn is_done(&self, token: Token) -> bool {
		return self.state.lock().await.is_done(token);
	}

	pub async fn get_return(&self, token: Token) -> Result<Option<Payload>, SchedulerError> {
		return self.state.lock().await.get_return(token);
	}

	pub async fn get_task(&self, token: Token) -> Option<TaskInfo> {
		return self.state.lock().await.task_info(token);
	}

	pub async fn list_tasks(&self) -> Vec<TaskInfo> {
		return self.state.lock().await.list_tasks();
	}

	pub async fn create_channel_bit_assignment(&self, universe: u32, channel_msb: i64, channel_lsb: i64) -> Result<(), BitAssignmentError> {
		return self.state.lock().await.bit_assignments.create(universe, channel_msb, channel_lsb);
	}

	pub async fn delete_channel_bit_assignment(&self, universe: u32, channel_msb: u16) -> Option<u16> {
		return self.state.lock().await.bit_assignments.delete(universe, channel_msb);
	}

	pub async fn get_channel_lsb(&self, universe: u32, channel_msb: u16) -> Option<u16> {
		return self.state.lock().await.bit_assignments.get_lsb(universe, channel_msb);
	}

	pub async fn get_channel_msb(&self, universe: u32, channel_lsb: u16) -> Option<u16> {
		return self.state.lock().await.bit_assignments.get_msb(universe, channel_lsb);
	}

	pub async fn list_channel_bit_assignments(&self) -> Vec<ChannelBitAssignment> {
		return self.state.lock().await.bit_assignments.list();
	}

	/// Universes currently rendered every frame
	pub async fn list_active_universes(&self) -> Vec<u32> {
		return self.state.lock().await.universes.iter().copied().collect();
	}

	/// The number of frames folded so far
	pub async fn get_frame(&self) -> u64 {
		return self.state.lock().await.frame;
	}
}

#[async_trait]
impl UniverseObserver for SchedulerInterface {
	async fn on_universe_created(&self, universe: &UniverseInstance) {
		self.state.lock().await.universes.insert(universe.id);
	}

	async fn on_universe_removed(&self, universe: &UniverseInstance) {
		self.state.lock().await.universes.remove(&universe.id);
		log!(self.plugin, "Universe {} is no longer being processed", universe.id);
	}
}
