use std::collections::BTreeMap;
use uuid::Uuid;
use procdmx_plugin_framework::*;

use super::controls::Controls;

/// Identifies a task for its whole lifetime
pub type Token = Uuid;

/// Data passed between tasks through PUT/TAKE and return values
pub type Payload = serde_json::Value;

/// A cooperative routine driven one step per frame.
///
/// Each call runs until the routine yields an effect or completes. `input` carries the result of
/// the previously yielded effect.
pub trait Process: Send + 'static {
	fn resume(&mut self, controls: &mut Controls<'_>, input: Resume) -> Step;
}

impl Process for Box<dyn Process> {
	fn resume(&mut self, controls: &mut Controls<'_>, input: Resume) -> Step {
		return (**self).resume(controls, input);
	}
}

/// Adapts a closure into a `Process`
pub struct ProcessFn<F>(F);

impl<F> Process for ProcessFn<F>
where
	F: FnMut(&mut Controls<'_>, Resume) -> Step + Send + 'static,
{
	fn resume(&mut self, controls: &mut Controls<'_>, input: Resume) -> Step {
		return (self.0)(controls, input);
	}
}

/// Wraps a closure as a process. State lives in the closure's captures.
///
/// ```rust
/// # use procdmx_lib::plugins::scheduler::effects::*;
/// let mut remaining = 3;
/// let countdown = process_fn(move |_controls, _input| {
/// 	remaining -= 1;
/// 	if remaining == 0 {
/// 		return Step::Complete(None);
/// 	}
/// 	return Step::Yield(Effect::WaitNextFrame);
/// });
/// ```
pub fn process_fn<F>(function: F) -> ProcessFn<F>
where
	F: FnMut(&mut Controls<'_>, Resume) -> Step + Send + 'static,
{
	return ProcessFn(function);
}

/// What a process hands back after each resume
pub enum Step {
	Yield(Effect),
	Complete(Option<Payload>),
}

/// The value a process is resumed with
#[derive(Debug, Clone, PartialEq)]
pub enum Resume {
	/// First resume
	Start,
	/// The previous effect has no result
	Next,
	/// The child started by `Fork`
	Forked(Token),
	/// The payload received by `Take` or `TakeMaybe`. Only `TakeMaybe` can receive `None`.
	Taken(Option<Payload>),
	/// Return values of the tasks passed to `Join`, in order
	Joined(Vec<Option<Payload>>),
	/// Return values of the `Race` / `All` entries that satisfied the join mode
	Settled(BTreeMap<String, Option<Payload>>),
}

/// When a joined task counts as finished
#[portable(Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinMode {
	Stopped,
	Done,
}

/// Requests made of the scheduler by a process
pub enum Effect {
	/// Suspend until the next frame
	WaitNextFrame,
	/// Start a child at the next priority slot beneath this task. Suspends until the next frame.
	Fork(Box<dyn Process>),
	/// Remove a task entirely. `None` targets the current task.
	Cancel(Option<Token>),
	/// Mark a task stopped. `None` targets the current task.
	Stop(Option<Token>),
	/// Mark a task paused. `None` targets the current task.
	Pause(Option<Token>),
	/// Re-push the values read at the last frame boundary as this frame's output
	Freeze,
	/// Block until a value is put on the channel
	Take(String),
	/// Wait one frame, then take whatever is queued on the channel, if anything
	TakeMaybe(String),
	/// Publish a value, replacing any unconsumed one
	Put(String, Payload),
	/// Block until every task satisfies the join mode
	Join(Vec<Token>, JoinMode),
	/// Fork each entry, then block until any of them satisfies the join mode
	Race(Vec<(String, Box<dyn Process>)>, JoinMode),
	/// Fork each entry, then block until all of them satisfy the join mode
	All(Vec<(String, Box<dyn Process>)>, JoinMode),
}

impl Effect {
	pub fn fork(process: impl Process) -> Effect {
		return Effect::Fork(Box::new(process));
	}
}
