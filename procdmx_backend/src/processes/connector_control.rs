use crate::{
	mixer_utils::{
		channel_group::ChannelGroup,
		state::{
			ChannelValue,
			MixMode,
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

/// Drives a channel group from a connector key every frame. Pushes nothing while paused.
pub struct ConnectorControl {
	key: String,
	group: ChannelGroup,
	mix_mode: MixMode,
}

impl ConnectorControl {
	pub fn new(key: impl Into<String>, group: ChannelGroup, mix_mode: MixMode) -> ConnectorControl {
		return ConnectorControl {
			key: key.into(),
			group,
			mix_mode,
		};
	}
}

impl Process for ConnectorControl {
	fn resume(&mut self, controls: &mut Controls<'_>, _input: Resume) -> Step {
		if !controls.is_paused(controls.token()) {
			let level = controls.connector().get(&self.key);
			// Connector values are always within range
			controls.push_group(&self.group, ChannelValue::new(level as f64), self.mix_mode, None).ok();
		}
		return Step::Yield(Effect::WaitNextFrame);
	}
}
