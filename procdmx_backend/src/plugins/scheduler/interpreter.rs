use std::{
	any::Any,
	collections::BTreeMap,
	mem,
	panic::{
		self,
		AssertUnwindSafe,
	},
};

use crate::mixer_utils::state::{
	ChannelMap,
	MixValue,
};

use super::{
	controls::{
		Controls,
		FrameEnv,
	},
	effects::{
		Effect,
		JoinMode,
		Payload,
		Process,
		Resume,
		Step,
		Token,
	},
	state::{
		FrameError,
		SchedulerState,
	},
};

/// Why a task is not currently runnable
enum Waiting {
	/// Runnable, and will be resumed with this value
	Ready(Resume),
	Take(String),
	TakeMaybe(String),
	Join(Vec<Token>, JoinMode),
	Settle {
		entries: Vec<(String, Token)>,
		mode: JoinMode,
		all: bool,
	},
}

pub enum StepOutcome {
	/// The process is waiting on an effect, or for the next frame
	Suspended,
	Completed(Option<Payload>),
	/// The task was cancelled while it was being stepped. Its output must be discarded.
	Cancelled,
}

/// Drives a single process, turning the effects it yields into scheduler operations
pub struct Interpreter {
	process: Box<dyn Process>,
	waiting: Waiting,
	fork_counter: i64,

	/// The accumulated values as of the last `WaitNextFrame`
	snapshot: ChannelMap,
}

impl Interpreter {
	pub fn new(process: Box<dyn Process>) -> Interpreter {
		return Interpreter {
			process,
			waiting: Waiting::Ready(Resume::Start),
			fork_counter: 0,
			snapshot: ChannelMap::default(),
		};
	}

	/// Runs the process until it suspends or completes.
	///
	/// Immediate effects are handled in place and the process is resumed again within the same
	/// step. A panic inside the process is returned as a frame error.
	pub fn step(
		&mut self,
		state: &mut SchedulerState,
		env: &FrameEnv,
		token: Token,
		priority: &[i64],
		accumulator: &ChannelMap,
		output: &mut Vec<MixValue>,
	) -> Result<StepOutcome, FrameError> {
		let mut input = match self.poll(state, token) {
			Some(input) => input,
			None => return Ok(StepOutcome::Suspended),
		};

		loop {
			let mut controls = Controls {
				state: &mut *state,
				env,
				token,
				priority,
				snapshot: &self.snapshot,
				output: &mut *output,
			};
			let process = &mut self.process;
			let step = panic::catch_unwind(AssertUnwindSafe(|| process.resume(&mut controls, input)))
				.map_err(|panic| FrameError::Panicked {
					token,
					message: panic_message(panic),
				})?;

			if !state.tasks.contains_key(&token) {
				return Ok(StepOutcome::Cancelled);
			}

			let effect = match step {
				Step::Complete(value) => return Ok(StepOutcome::Completed(value)),
				Step::Yield(effect) => effect,
			};

			input = match effect {
				Effect::WaitNextFrame => {
					self.snapshot = accumulator.clone();
					self.waiting = Waiting::Ready(Resume::Next);
					return Ok(StepOutcome::Suspended);
				},
				Effect::Fork(child) => {
					let child = self.fork(state, priority, child);
					self.waiting = Waiting::Ready(Resume::Forked(child));
					return Ok(StepOutcome::Suspended);
				},
				Effect::Cancel(target) => {
					state.cancel(target.unwrap_or(token));
					if !state.tasks.contains_key(&token) {
						return Ok(StepOutcome::Cancelled);
					}
					Resume::Next
				},
				Effect::Stop(target) => {
					state.stop(target.unwrap_or(token));
					Resume::Next
				},
				Effect::Pause(target) => {
					state.pause(target.unwrap_or(token));
					Resume::Next
				},
				Effect::Freeze => {
					output.extend(self.snapshot.values().copied());
					Resume::Next
				},
				Effect::Take(channel) => {
					state.mailbox.register_taker(&channel, token);
					match state.mailbox.try_take(&channel, token) {
						Some(payload) => Resume::Taken(Some(payload)),
						None => {
							self.waiting = Waiting::Take(channel);
							return Ok(StepOutcome::Suspended);
						},
					}
				},
				Effect::TakeMaybe(channel) => {
					self.waiting = Waiting::TakeMaybe(channel);
					return Ok(StepOutcome::Suspended);
				},
				Effect::Put(channel, payload) => {
					state.mailbox.put(&channel, payload);
					Resume::Next
				},
				Effect::Join(tokens, mode) => match joined(state, &tokens, mode) {
					Some(returns) => Resume::Joined(returns),
					None => {
						self.waiting = Waiting::Join(tokens, mode);
						return Ok(StepOutcome::Suspended);
					},
				},
				Effect::Race(entries, mode) => {
					self.waiting = self.fork_all(state, priority, entries, mode, false);
					return Ok(StepOutcome::Suspended);
				},
				Effect::All(entries, mode) => {
					self.waiting = self.fork_all(state, priority, entries, mode, true);
					return Ok(StepOutcome::Suspended);
				},
			};

			// A task that stopped itself ends its step here
			if state.tasks.get(&token).map_or(true, |task| task.status.stopped) {
				self.waiting = Waiting::Ready(input);
				return Ok(StepOutcome::Suspended);
			}
		}
	}

	/// Checks whether whatever the task is waiting on has resolved
	fn poll(&mut self, state: &mut SchedulerState, token: Token) -> Option<Resume> {
		return match mem::replace(&mut self.waiting, Waiting::Ready(Resume::Next)) {
			Waiting::Ready(input) => Some(input),
			Waiting::Take(channel) => match state.mailbox.try_take(&channel, token) {
				Some(payload) => Some(Resume::Taken(Some(payload))),
				None => {
					self.waiting = Waiting::Take(channel);
					None
				},
			},
			Waiting::TakeMaybe(channel) => Some(Resume::Taken(state.mailbox.take_now(&channel, token))),
			Waiting::Join(tokens, mode) => match joined(state, &tokens, mode) {
				Some(returns) => Some(Resume::Joined(returns)),
				None => {
					self.waiting = Waiting::Join(tokens, mode);
					None
				},
			},
			Waiting::Settle { entries, mode, all } => match settled(state, &entries, mode, all) {
				Some(returns) => Some(Resume::Settled(returns)),
				None => {
					self.waiting = Waiting::Settle { entries, mode, all };
					None
				},
			},
		};
	}

	/// Registers a child one level beneath `priority`, in the next free slot
	fn fork(&mut self, state: &mut SchedulerState, priority: &[i64], child: Box<dyn Process>) -> Token {
		let mut child_priority = priority.to_vec();
		child_priority.push(self.fork_counter);
		self.fork_counter += 1;
		return state.add_process(child_priority, child).token;
	}

	fn fork_all(
		&mut self,
		state: &mut SchedulerState,
		priority: &[i64],
		entries: Vec<(String, Box<dyn Process>)>,
		mode: JoinMode,
		all: bool,
	) -> Waiting {
		let entries = entries.into_iter()
			.map(|(name, child)| (name, self.fork(state, priority, child)))
			.collect();
		return Waiting::Settle { entries, mode, all };
	}
}

fn satisfies(state: &SchedulerState, token: Token, mode: JoinMode) -> bool {
	return match mode {
		JoinMode::Stopped => state.is_stopped(token),
		JoinMode::Done => state.is_done(token),
	};
}

fn return_value(state: &SchedulerState, token: Token) -> Option<Payload> {
	return state.get_return(token).ok().flatten();
}

fn joined(state: &SchedulerState, tokens: &[Token], mode: JoinMode) -> Option<Vec<Option<Payload>>> {
	if !tokens.iter().all(|token| satisfies(state, *token, mode)) {
		return None;
	}
	return Some(tokens.iter().map(|token| return_value(state, *token)).collect());
}

fn settled(state: &SchedulerState, entries: &[(String, Token)], mode: JoinMode, all: bool) -> Option<BTreeMap<String, Option<Payload>>> {
	let finished: BTreeMap<String, Option<Payload>> = entries.iter()
		.filter(|(_, token)| satisfies(state, *token, mode))
		.map(|(name, token)| (name.clone(), return_value(state, *token)))
		.collect();

	let resolved = if all {
		finished.len() == entries.len()
	} else {
		!finished.is_empty() || entries.is_empty()
	};
	return if resolved { Some(finished) } else { None };
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
	if let Some(message) = panic.downcast_ref::<&str>() {
		return String::from(*message);
	}
	if let Some(message) = panic.downcast_ref::<String>() {
		return message.clone();
	}
	return String::from("Unknown panic");
}
