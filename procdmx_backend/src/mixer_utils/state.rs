use rustc_hash::FxHashMap;
use thiserror::Error;

use procdmx_plugin_framework::*;

/// The number of channels in a single DMX universe
pub const UNIVERSE_SIZE: usize = 512;

/// A single collection of values to send to a DMX universe
pub type DMXFrame = [u8; UNIVERSE_SIZE];

/// Resolved physical address of a channel: `(universe id, channel)`
pub type ChannelKey = (u32, u16);

/// The values accumulated while folding a frame, keyed by their resolved address
pub type ChannelMap = FxHashMap<ChannelKey, MixedValue>;

/// Identifies a universe. `Default` is resolved to whichever universe is currently marked as the default.
#[portable(Copy, PartialEq, Eq, Hash)]
#[serde(tag = "type", content = "id")]
pub enum UniverseRef {
	Default,
	Id(u32),
}

/// A single `(universe, channel)` address a value can target
#[portable(Copy, PartialEq, Eq, Hash)]
pub struct Output {
	pub universe: UniverseRef,
	pub channel: u16,
}
impl Output {
	pub fn new(universe: u32, channel: u16) -> Output {
		return Output {
			universe: UniverseRef::Id(universe),
			channel,
		};
	}
	pub fn on_default(channel: u16) -> Output {
		return Output {
			universe: UniverseRef::Default,
			channel,
		};
	}
}

/// The value of a channel. Values are kept unquantized until a frame is rendered.
///
/// When `value_lsb` is missing, the MSB is repeated into the LSB, so an 8-bit value behaves
/// like `value * 257` on a 16-bit channel.
#[portable(Copy, PartialEq)]
pub struct ChannelValue {
	pub value_msb: f64,
	pub value_lsb: Option<f64>,
}
impl ChannelValue {
	pub fn new(value_msb: f64) -> ChannelValue {
		return ChannelValue {
			value_msb,
			value_lsb: None,
		};
	}
	pub fn with_lsb(value_msb: f64, value_lsb: f64) -> ChannelValue {
		return ChannelValue {
			value_msb,
			value_lsb: Some(value_lsb),
		};
	}
	pub fn lsb_or_msb(&self) -> f64 {
		return self.value_lsb.unwrap_or(self.value_msb);
	}
}
impl Default for ChannelValue {
	fn default() -> Self {
		return ChannelValue::new(0.0);
	}
}

/// Policy for combining a new value with the one already accumulated this frame
#[portable(Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MixMode {
	#[default]
	GreaterPriority,
	Min,
	Max,
	Average,
	/// Reserved. Mixing with this mode fails.
	Clear,
}

/// A value pushed by a process for a single frame
#[portable(Copy, PartialEq)]
pub struct MixValue {
	pub output: Output,
	#[serde(flatten)]
	pub value: ChannelValue,
	pub weight: Option<f64>,
	#[serde(default)]
	pub mix_mode: MixMode,
}
impl MixValue {
	pub fn new(output: Output, value: ChannelValue, mix_mode: MixMode) -> MixValue {
		return MixValue {
			output,
			value,
			weight: None,
			mix_mode,
		};
	}
	pub fn weighted(mut self, weight: f64) -> MixValue {
		self.weight = Some(weight);
		return self;
	}
}

/// The result of mixing. Identical in shape to a `MixValue`, but `weight` only survives an `Average`.
pub type MixedValue = MixValue;

/// Raised when a channel number or value falls outside of what DMX can represent
#[portable(PartialEq)]
#[derive(Error)]
pub enum ValidationError {
	#[error("Channel {0} is outside of the valid range 1-512")]
	ChannelOutOfRange(i64),
	#[error("Value {0} is outside of the valid range 0-255")]
	ValueOutOfRange(f64),
	#[error("Weight {0} is not a finite number")]
	InvalidWeight(f64),
}

/// Raised while mixing values
#[portable(PartialEq, Eq)]
#[derive(Error)]
pub enum MixError {
	#[error("Mix mode {0:?} is not implemented")]
	Unimplemented(MixMode),
}

/// Checks that `channel` is a DMX channel number, returning it in its narrow form
pub fn validate_channel(channel: i64) -> Result<u16, ValidationError> {
	if channel < 1 || channel > UNIVERSE_SIZE as i64 {
		return Err(ValidationError::ChannelOutOfRange(channel));
	}
	return Ok(channel as u16);
}

/// Checks that a single byte's worth of value is within `0..=255`
pub fn validate_value(value: f64) -> Result<f64, ValidationError> {
	if !value.is_finite() || value < 0.0 || value > 255.0 {
		return Err(ValidationError::ValueOutOfRange(value));
	}
	return Ok(value);
}

/// Validates every part of a pushed value that can be checked without knowing the default universe
pub fn validate_mix_value(value: &MixValue) -> Result<(), ValidationError> {
	validate_channel(value.output.channel as i64)?;
	validate_value(value.value.value_msb)?;
	if let Some(value_lsb) = value.value.value_lsb {
		validate_value(value_lsb)?;
	}
	if let Some(weight) = value.weight {
		if !weight.is_finite() {
			return Err(ValidationError::InvalidWeight(weight));
		}
	}
	return Ok(());
}

/// Rounds and clamps an accumulated value into a DMX byte
pub fn quantize(value: f64) -> u8 {
	return value.clamp(0.0, 255.0).round() as u8;
}
