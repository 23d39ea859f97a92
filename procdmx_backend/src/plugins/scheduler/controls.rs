use procdmx_plugin_framework::*;

use crate::{
	mixer_utils::{
		bit_assignment::BitAssignmentError,
		channel_group::ChannelGroup,
		state::{
			validate_mix_value,
			ChannelMap,
			ChannelValue,
			MixMode,
			MixValue,
			Output,
			UniverseRef,
			ValidationError,
		},
	},
	plugins::{
		connector::ConnectorInterface,
		input_router::{
			InputMessage,
			InputRouterInterface,
		},
	},
};

use super::{
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

/// Everything a frame needs from outside the scheduler
pub struct FrameEnv {
	pub plugin: PluginContext,
	pub default_universe: Option<u32>,
	pub inputs: InputRouterInterface,
	pub connector: ConnectorInterface,
}

/// The scheduler as seen by a process while it is being resumed.
///
/// Values pushed here make up the process's output for the current frame.
pub struct Controls<'a> {
	pub(super) state: &'a mut SchedulerState,
	pub(super) env: &'a FrameEnv,
	pub(super) token: Token,
	pub(super) priority: &'a [i64],
	pub(super) snapshot: &'a ChannelMap,
	pub(super) output: &'a mut Vec<MixValue>,
}

impl<'a> Controls<'a> {

	/// The token of the task being resumed
	pub fn token(&self) -> Token {
		return self.token;
	}

	pub fn priority(&self) -> &[i64] {
		return self.priority;
	}

	pub fn add_process(&mut self, priority: Vec<i64>, process: impl Process) -> TaskInfo {
		return self.state.add_process(priority, Box::new(process));
	}

	pub fn next_priority(&self) -> i64 {
		return self.state.next_priority();
	}

	pub fn cancel(&mut self, token: Token) -> bool {
		return self.state.cancel(token);
	}

	pub fn stop(&mut self, token: Token) -> bool {
		return self.state.stop(token);
	}

	pub fn pause(&mut self, token: Token) -> bool {
		return self.state.pause(token);
	}

	pub fn resume(&mut self, token: Token) -> bool {
		return self.state.resume(token);
	}

	pub fn is_paused(&self, token: Token) -> bool {
		return self.state.is_paused(token);
	}

	pub fn is_stopped(&self, token: Token) -> bool {
		return self.state.is_stopped(token);
	}

	pub fn is_done(&self, token: Token) -> bool {
		return self.state.is_done(token);
	}

	pub fn get_return(&self, token: Token) -> Result<Option<Payload>, SchedulerError> {
		return self.state.get_return(token);
	}

	/// The values accumulated ahead of this task when it last waited for a frame
	pub fn get_values(&self) -> &ChannelMap {
		return self.snapshot;
	}

	/// Reads a single value from the snapshot, resolving the default universe
	pub fn get_value(&self, output: Output) -> Option<&ChannelValue> {
		let universe = match output.universe {
			UniverseRef::Id(universe) => universe,
			UniverseRef::Default => self.env.default_universe?,
		};
		return self.snapshot.get(&(universe, output.channel)).map(|value| &value.value);
	}

	/// Replaces everything pushed so far this step
	pub fn set_values(&mut self, values: Vec<MixValue>) -> Result<(), ValidationError> {
		for value in values.iter() {
			validate_mix_value(value)?;
		}
		*self.output = values;
		return Ok(());
	}

	/// Appends values to this step's output. Nothing is pushed if any value is invalid.
	pub fn push_values(&mut self, values: impl IntoIterator<Item = MixValue>) -> Result<(), ValidationError> {
		let values: Vec<MixValue> = values.into_iter().collect();
		for value in values.iter() {
			validate_mix_value(value)?;
		}
		self.output.extend(values);
		return Ok(());
	}

	/// Pushes one value to every output of a channel group
	pub fn push_group(&mut self, group: &ChannelGroup, value: ChannelValue, mix_mode: MixMode, weight: Option<f64>) -> Result<(), ValidationError> {
		return self.push_values(group.get_channel_map_with_value(value, mix_mode, weight));
	}

	pub fn create_channel_bit_assignment(&mut self, universe: u32, channel_msb: i64, channel_lsb: i64) -> Result<(), BitAssignmentError> {
		return self.state.bit_assignments.create(universe, channel_msb, channel_lsb);
	}

	pub fn delete_channel_bit_assignment(&mut self, universe: u32, channel_msb: u16) -> Option<u16> {
		return self.state.bit_assignments.delete(universe, channel_msb);
	}

	pub fn get_channel_lsb(&self, universe: u32, channel_msb: u16) -> Option<u16> {
		return self.state.bit_assignments.get_lsb(universe, channel_msb);
	}

	pub fn get_channel_msb(&self, universe: u32, channel_lsb: u16) -> Option<u16> {
		return self.state.bit_assignments.get_msb(universe, channel_lsb);
	}

	/// Drains whatever an input device has queued since the last read
	pub fn read_input(&self, input_id: &str) -> Vec<InputMessage> {
		return self.env.inputs.read_input(input_id);
	}

	pub fn connector(&self) -> &ConnectorInterface {
		return &self.env.connector;
	}

	pub fn default_universe(&self) -> Option<u32> {
		return self.env.default_universe;
	}

}
