use rustc_hash::FxHashMap;
use thiserror::Error;

use procdmx_plugin_framework::*;

use super::state::{
	validate_channel,
	ValidationError,
};

/// Raised when two channels cannot be combined into a 16-bit value
#[portable(PartialEq)]
#[derive(Error)]
pub enum BitAssignmentError {
	#[error("Channel {channel} in universe {universe} is already part of a 16-bit combination")]
	AlreadyCombined {
		universe: u32,
		channel: u16,
	},
	#[error("A channel cannot be combined with itself")]
	SameChannel,
	#[error(transparent)]
	Invalid(#[from] ValidationError),
}

/// A pair of channels carrying one 16-bit value
#[portable(Copy, PartialEq, Eq)]
pub struct ChannelBitAssignment {
	pub universe: u32,
	pub channel_msb: u16,
	pub channel_lsb: u16,
}

/// Lookup table of MSB/LSB channel pairs, indexed both ways by universe.
///
/// A channel takes part in at most one pair.
#[derive(Default)]
pub struct ChannelBitAssignments {
	msb_to_lsb: FxHashMap<u32, FxHashMap<u16, u16>>,
	lsb_to_msb: FxHashMap<u32, FxHashMap<u16, u16>>,
}

impl ChannelBitAssignments {
	pub fn new() -> ChannelBitAssignments {
		return ChannelBitAssignments::default();
	}

	/// Binds `channel_lsb` as the low byte of `channel_msb`. Re-binding an identical pair is a no-op.
	pub fn create(&mut self, universe: u32, channel_msb: i64, channel_lsb: i64) -> Result<(), BitAssignmentError> {
		let channel_msb = validate_channel(channel_msb)?;
		let channel_lsb = validate_channel(channel_lsb)?;
		if channel_msb == channel_lsb {
			return Err(BitAssignmentError::SameChannel);
		}
		if self.get_lsb(universe, channel_msb) == Some(channel_lsb) {
			return Ok(());
		}
		for channel in [channel_msb, channel_lsb] {
			if self.is_combined(universe, channel) {
				return Err(BitAssignmentError::AlreadyCombined { universe, channel });
			}
		}

		self.msb_to_lsb.entry(universe).or_default().insert(channel_msb, channel_lsb);
		self.lsb_to_msb.entry(universe).or_default().insert(channel_lsb, channel_msb);
		return Ok(());
	}

	/// Removes the pair whose MSB is `channel_msb`, returning the LSB it was bound to
	pub fn delete(&mut self, universe: u32, channel_msb: u16) -> Option<u16> {
		let channel_lsb = self.msb_to_lsb.get_mut(&universe)?.remove(&channel_msb)?;
		if let Some(lsb_to_msb) = self.lsb_to_msb.get_mut(&universe) {
			lsb_to_msb.remove(&channel_lsb);
		}
		return Some(channel_lsb);
	}

	pub fn get_lsb(&self, universe: u32, channel_msb: u16) -> Option<u16> {
		return self.msb_to_lsb.get(&universe)?.get(&channel_msb).copied();
	}

	pub fn get_msb(&self, universe: u32, channel_lsb: u16) -> Option<u16> {
		return self.lsb_to_msb.get(&universe)?.get(&channel_lsb).copied();
	}

	/// Whether the channel is the low byte of some pair
	pub fn is_lsb(&self, universe: u32, channel: u16) -> bool {
		return self.get_msb(universe, channel).is_some();
	}

	fn is_combined(&self, universe: u32, channel: u16) -> bool {
		return self.get_lsb(universe, channel).is_some() || self.get_msb(universe, channel).is_some();
	}

	/// Lists every pair, ordered by universe then MSB channel
	pub fn list(&self) -> Vec<ChannelBitAssignment> {
		let mut assignments: Vec<ChannelBitAssignment> = self.msb_to_lsb.iter()
			.flat_map(|(universe, pairs)| pairs.iter().map(move |(channel_msb, channel_lsb)| ChannelBitAssignment {
				universe: *universe,
				channel_msb: *channel_msb,
				channel_lsb: *channel_lsb,
			}))
			.collect();
		assignments.sort_by_key(|assignment| (assignment.universe, assignment.channel_msb));
		return assignments;
	}
}
