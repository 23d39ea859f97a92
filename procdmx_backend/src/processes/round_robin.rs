use serde_json::json;

use crate::{
	mixer_utils::state::{
		validate_mix_value,
		MixValue,
		ValidationError,
	},
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

enum Phase {
	Announce,
	Hold(u32),
}

/// Cycles through scenes, holding each one for a number of frames.
///
/// The index of each scene is put on `channel` as it becomes active. Without `repeat`, the
/// process completes after the last scene, returning how many scenes it showed.
pub struct RoundRobin {
	scenes: Vec<Vec<MixValue>>,
	hold_frames: u32,
	repeat: bool,
	channel: String,
	index: usize,
	shown: u64,
	phase: Phase,
}

impl RoundRobin {
	pub fn new(scenes: Vec<Vec<MixValue>>, hold_frames: u32, repeat: bool, channel: impl Into<String>) -> Result<RoundRobin, ValidationError> {
		for value in scenes.iter().flatten() {
			validate_mix_value(value)?;
		}
		return Ok(RoundRobin {
			scenes,
			hold_frames: hold_frames.max(1),
			repeat,
			channel: channel.into(),
			index: 0,
			shown: 0,
			phase: Phase::Announce,
		});
	}
}

impl Process for RoundRobin {
	fn resume(&mut self, controls: &mut Controls<'_>, _input: Resume) -> Step {
		if self.index >= self.scenes.len() {
			if !self.repeat || self.scenes.is_empty() {
				return Step::Complete(Some(json!(self.shown)));
			}
			self.index = 0;
		}

		match self.phase {
			Phase::Announce => {
				self.phase = Phase::Hold(0);
				self.shown += 1;
				return Step::Yield(Effect::Put(self.channel.clone(), json!(self.index)));
			},
			Phase::Hold(held) => {
				if controls.push_values(self.scenes[self.index].iter().copied()).is_err() {
					return Step::Complete(None);
				}
				if held + 1 >= self.hold_frames {
					self.index += 1;
					self.phase = Phase::Announce;
				} else {
					self.phase = Phase::Hold(held + 1);
				}
				return Step::Yield(Effect::WaitNextFrame);
			},
		}
	}
}
