use rustc_hash::FxHashMap;

use crate::{
	plugins::scheduler::{
		controls::Controls,
		effects::{
			Effect,
			Process,
			Resume,
			Step,
		},
	},
};

/// Forwards an input device into the engine.
///
/// MIDI control-change messages are mapped onto connector keys, scaled from 7 to 8 bits. Every
/// batch of raw messages read in a frame is put on `input.<input_id>`.
pub struct InputForwarder {
	input_id: String,
	channel: String,

	/// `(midi channel, controller number) -> connector key`
	controls: FxHashMap<(u8, u8), String>,
	announced: bool,
}

impl InputForwarder {
	pub fn new(input_id: impl Into<String>) -> InputForwarder {
		let input_id = input_id.into();
		return InputForwarder {
			channel: format!("input.{input_id}"),
			input_id,
			controls: FxHashMap::default(),
			announced: false,
		};
	}

	/// Maps a control-change controller on a MIDI channel (0-15) to a connector key
	pub fn map_control(mut self, midi_channel: u8, controller: u8, key: impl Into<String>) -> InputForwarder {
		self.controls.insert((midi_channel & 0x0F, controller & 0x7F), key.into());
		return self;
	}

	pub fn channel(&self) -> &str {
		return &self.channel;
	}
}

/// Scales a 7-bit MIDI value onto the full byte range, so 127 maps to 255
pub fn scale_7_to_8(value: u8) -> u8 {
	let value = value & 0x7F;
	return (value << 1) | (value >> 6);
}

impl Process for InputForwarder {
	fn resume(&mut self, controls: &mut Controls<'_>, _input: Resume) -> Step {
		// Resumed right after the put below
		if self.announced {
			self.announced = false;
			return Step::Yield(Effect::WaitNextFrame);
		}

		let messages = controls.read_input(&self.input_id);
		if messages.is_empty() {
			return Step::Yield(Effect::WaitNextFrame);
		}

		for message in messages.iter() {
			if let [status @ 0xB0..=0xBF, controller, value, ..] = message.message[..] {
				if let Some(key) = self.controls.get(&(status & 0x0F, controller & 0x7F)) {
					controls.connector().set(key, scale_7_to_8(value));
				}
			}
		}

		self.announced = true;
		return match serde_json::to_value(&messages) {
			Ok(payload) => Step::Yield(Effect::Put(self.channel.clone(), payload)),
			Err(_) => Step::Yield(Effect::WaitNextFrame),
		};
	}
}
