use super::state::{
	ChannelValue,
	MixError,
	MixMode,
	MixValue,
	MixedValue,
};

/// Mixes `current` on top of `previous` according to `current`'s mix mode.
///
/// An absent `current` leaves `previous` untouched. An absent `previous` is treated as a dark
/// channel, except for `Average`, which starts its running average at the first contributor.
pub fn mix(previous: Option<&MixedValue>, current: Option<&MixValue>) -> Result<Option<MixedValue>, MixError> {
	let current = match current {
		Some(current) => current,
		None => return Ok(previous.cloned()),
	};
	let weight = current.weight.unwrap_or(1.0);
	let previous_value = previous.map_or_else(ChannelValue::default, |previous| previous.value);

	return match current.mix_mode {
		MixMode::GreaterPriority => Ok(Some(MixedValue {
			output: current.output,
			value: blend_value(&current.value, &previous_value, weight),
			weight: None,
			mix_mode: current.mix_mode,
		})),
		MixMode::Min | MixMode::Max => {
			let current_numeric = numeric_value(&current.value);
			let previous_numeric = numeric_value(&previous_value);
			let take_current = if current.mix_mode == MixMode::Min {
				current_numeric <= previous_numeric
			} else {
				current_numeric >= previous_numeric
			};
			let winner = if take_current { current.value } else { previous_value };
			Ok(Some(MixedValue {
				output: current.output,
				value: blend_value(&winner, &previous_value, weight),
				weight: None,
				mix_mode: current.mix_mode,
			}))
		},
		MixMode::Average => {
			let previous = match previous {
				Some(previous) => previous,
				None => return Ok(Some(MixedValue {
					weight: Some(weight),
					..*current
				})),
			};
			let previous_weight = previous.weight.unwrap_or(1.0);
			let total_weight = previous_weight + weight;
			if total_weight == 0.0 {
				return Ok(Some(*previous));
			}
			let average = |previous: f64, current: f64| (previous * previous_weight + current * weight) / total_weight;
			Ok(Some(MixedValue {
				output: current.output,
				value: ChannelValue {
					value_msb: average(previous.value.value_msb, current.value.value_msb),
					value_lsb: combine_lsb(&previous.value, &current.value, average),
				},
				weight: Some(total_weight),
				mix_mode: current.mix_mode,
			}))
		},
		MixMode::Clear => Err(MixError::Unimplemented(MixMode::Clear)),
	};
}

/// Weighted blend of a single component: `current * weight + previous * (1 - weight)`
pub fn blend(current: f64, previous: f64, weight: f64) -> f64 {
	return current * weight + previous * (1.0 - weight);
}

/// Blends each byte of a channel value independently
fn blend_value(current: &ChannelValue, previous: &ChannelValue, weight: f64) -> ChannelValue {
	return ChannelValue {
		value_msb: blend(current.value_msb, previous.value_msb, weight),
		value_lsb: combine_lsb(previous, current, |previous, current| blend(current, previous, weight)),
	};
}

/// LSB stays absent unless one of the sides carries one; the other side then falls back to its MSB.
fn combine_lsb(previous: &ChannelValue, current: &ChannelValue, combine: impl Fn(f64, f64) -> f64) -> Option<f64> {
	if previous.value_lsb.is_none() && current.value_lsb.is_none() {
		return None;
	}
	return Some(combine(previous.lsb_or_msb(), current.lsb_or_msb()));
}

/// The 16-bit magnitude of a value, used for ordering in `Min` / `Max`
fn numeric_value(value: &ChannelValue) -> f64 {
	return value.value_msb * 256.0 + value.lsb_or_msb();
}

/// Splits a 16-bit value into its MSB and LSB bytes
pub fn value_to_channel_value(value: u16) -> ChannelValue {
	return ChannelValue {
		value_msb: (value >> 8) as f64,
		value_lsb: Some((value & 0xFF) as f64),
	};
}

/// Combines a channel value into a 16-bit value. The MSB stands in for a missing LSB.
pub fn channel_value_to_value(value: Option<&ChannelValue>) -> u16 {
	return match value {
		Some(value) => {
			let msb = super::state::quantize(value.value_msb) as u16;
			let lsb = super::state::quantize(value.lsb_or_msb()) as u16;
			(msb << 8) | (lsb & 0xFF)
		},
		None => 0,
	};
}
