use serde_json::json;

use crate::{
	mixer_utils::{
		channel_group::ChannelGroup,
		state::{
			validate_value,
			ChannelValue,
			MixMode,
			ValidationError,
		},
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

/// Fades a channel group linearly between two levels, one step per frame.
///
/// The last step pushes `to` exactly and completes with it as the return value.
pub struct Fade {
	group: ChannelGroup,
	from: f64,
	to: f64,
	frames: u32,
	frame: u32,
	mix_mode: MixMode,
}

impl Fade {
	pub fn new(group: ChannelGroup, from: f64, to: f64, frames: u32) -> Result<Fade, ValidationError> {
		return Ok(Fade {
			group,
			from: validate_value(from)?,
			to: validate_value(to)?,
			frames,
			frame: 0,
			mix_mode: MixMode::GreaterPriority,
		});
	}

	pub fn with_mix_mode(mut self, mix_mode: MixMode) -> Fade {
		self.mix_mode = mix_mode;
		return self;
	}

	fn level(&self) -> f64 {
		if self.frame >= self.frames {
			return self.to;
		}
		let progress = (self.frame + 1) as f64 / self.frames as f64;
		return self.from + (self.to - self.from) * progress;
	}
}

impl Process for Fade {
	fn resume(&mut self, controls: &mut Controls<'_>, _input: Resume) -> Step {
		let level = self.level();
		if controls.push_group(&self.group, ChannelValue::new(level), self.mix_mode, None).is_err() {
			return Step::Complete(None);
		}

		self.frame += 1;
		if self.frame >= self.frames {
			return Step::Complete(Some(json!(self.to)));
		}
		return Step::Yield(Effect::WaitNextFrame);
	}
}
