use uuid::Uuid;

use procdmx_plugin_framework::*;

use super::state::{
	validate_channel,
	ChannelValue,
	MixMode,
	MixValue,
	Output,
	UniverseRef,
	ValidationError,
};

/// An output belonging to a channel group, optionally paired with an independent LSB channel
#[portable(Copy, PartialEq)]
pub struct GroupOutput {
	pub output: Output,
	pub channel_lsb: Option<u16>,
}

/// Describes a channel to add to a group. Offsets are relative to `start`.
///
/// An `offset_lsb` of 0 means the channel has no LSB companion.
#[portable(PartialEq)]
pub struct ChannelSpec {
	pub universe: UniverseRef,
	pub start: i64,
	#[serde(default)]
	pub offset: Option<i64>,
	#[serde(default)]
	pub offset_lsb: Option<i64>,
}

/// A set of outputs controlled as one logical unit, such as "the red channel of every LED bar".
#[portable(PartialEq)]
pub struct ChannelGroup {
	id: Uuid,
	outputs: Vec<GroupOutput>,
}

impl ChannelGroup {
	pub fn new() -> ChannelGroup {
		return ChannelGroup {
			id: Uuid::new_v4(),
			outputs: Vec::new(),
		};
	}

	pub fn id(&self) -> &Uuid {
		return &self.id;
	}

	pub fn outputs(&self) -> &[GroupOutput] {
		return &self.outputs;
	}

	/// Adds a channel to the group. Adding an output that is already present replaces its LSB pairing.
	pub fn add_channel(&mut self, entry: ChannelSpec) -> Result<(), ValidationError> {
		let channel_msb = validate_channel(entry.start + entry.offset.unwrap_or(0))?;
		let channel_lsb = match entry.offset_lsb {
			Some(offset_lsb) if offset_lsb != 0 => Some(validate_channel(entry.start + offset_lsb)?),
			_ => None,
		};

		let output = Output {
			universe: entry.universe,
			channel: channel_msb,
		};
		if let Some(existing) = self.outputs.iter_mut().find(|existing| existing.output == output) {
			existing.channel_lsb = channel_lsb;
		} else {
			self.outputs.push(GroupOutput {
				output,
				channel_lsb,
			});
		}
		return Ok(());
	}

	/// Removes an output by its universe and MSB channel. Returns `false` if it wasn't part of the group.
	pub fn remove_channel(&mut self, universe: UniverseRef, channel_msb: u16) -> bool {
		let before = self.outputs.len();
		self.outputs.retain(|existing| existing.output.universe != universe || existing.output.channel != channel_msb);
		return self.outputs.len() != before;
	}

	/// Expands a value into one mix entry per output. Outputs with an LSB companion get a second
	/// entry carrying the LSB byte, but only if the value has one.
	pub fn get_channel_map_with_value(&self, value: ChannelValue, mix_mode: MixMode, weight: Option<f64>) -> Vec<MixValue> {
		let mut entries = Vec::with_capacity(self.outputs.len());
		for group_output in self.outputs.iter() {
			entries.push(MixValue {
				output: group_output.output,
				value,
				weight,
				mix_mode,
			});
			if let (Some(channel_lsb), Some(value_lsb)) = (group_output.channel_lsb, value.value_lsb) {
				entries.push(MixValue {
					output: Output {
						universe: group_output.output.universe,
						channel: channel_lsb,
					},
					value: ChannelValue::new(value_lsb),
					weight,
					mix_mode,
				});
			}
		}
		return entries;
	}
}

impl Default for ChannelGroup {
	fn default() -> Self {
		return ChannelGroup::new();
	}
}
