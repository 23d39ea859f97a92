use super::{
	bit_assignment::ChannelBitAssignments,
	state::{
		quantize,
		ChannelKey,
		ChannelMap,
		DMXFrame,
		MixValue,
		Output,
		UniverseRef,
		UNIVERSE_SIZE,
	},
};

/// A process's output after addressing has been resolved
pub struct ResolvedInput {
	/// Entries that can be mixed, in the order they were pushed
	pub accepted: Vec<(ChannelKey, MixValue)>,

	/// Entries that addressed the LSB half of a 16-bit pair directly
	pub rejected: Vec<MixValue>,
}

/// Resolves the default universe and drops entries that can't be mixed.
///
/// Entries targeting the default universe are dropped when there is no default. Entries
/// addressing a channel that is bound as the LSB of a 16-bit pair are returned as `rejected` so
/// the caller can report them.
pub fn fix_ch_input(entries: Vec<MixValue>, default_universe: Option<u32>, bit_assignments: &ChannelBitAssignments) -> ResolvedInput {
	let mut resolved = ResolvedInput {
		accepted: Vec::with_capacity(entries.len()),
		rejected: Vec::new(),
	};

	for mut entry in entries {
		let universe = match entry.output.universe {
			UniverseRef::Id(universe) => universe,
			UniverseRef::Default => match default_universe {
				Some(universe) => universe,
				None => continue,
			},
		};
		entry.output = Output::new(universe, entry.output.channel);

		if bit_assignments.is_lsb(universe, entry.output.channel) {
			resolved.rejected.push(entry);
		} else {
			resolved.accepted.push(((universe, entry.output.channel), entry));
		}
	}

	return resolved;
}

/// Renders the accumulated values for one universe into a DMX frame.
///
/// Channel 1 lands at index 0. Bound LSB channels are written by their MSB, falling back to the
/// MSB byte when the value has no LSB. Channels without a value are 0.
pub fn render_universe(universe: u32, values: &ChannelMap, bit_assignments: &ChannelBitAssignments) -> DMXFrame {
	let mut frame: DMXFrame = [0; UNIVERSE_SIZE];

	for channel in 1..=(UNIVERSE_SIZE as u16) {
		if bit_assignments.is_lsb(universe, channel) {
			continue;
		}
		let value = values.get(&(universe, channel));
		frame[(channel - 1) as usize] = value.map_or(0, |value| quantize(value.value.value_msb));

		if let Some(channel_lsb) = bit_assignments.get_lsb(universe, channel) {
			frame[(channel_lsb - 1) as usize] = value.map_or(0, |value| quantize(value.value.lsb_or_msb()));
		}
	}

	return frame;
}
