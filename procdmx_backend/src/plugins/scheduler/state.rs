use std::collections::BTreeSet;
use rustc_hash::FxHashMap;
use thiserror::Error;
use procdmx_plugin_framework::*;

use crate::{
	mixer_utils::{
		bit_assignment::ChannelBitAssignments,
		state::MixError,
	},
	utilities::config::SchedulerConfig,
};

use super::{
	effects::{
		Payload,
		Process,
		Token,
	},
	interpreter::Interpreter,
	mailbox::Mailbox,
	priority::{
		hierarchical_sort,
		next_top_level,
	},
};

#[portable(Copy, PartialEq, Eq, Default)]
pub struct TaskStatus {
	pub paused: bool,
	pub stopped: bool,
}

/// Public description of a task
#[portable(PartialEq)]
pub struct TaskInfo {
	pub token: Token,
	pub status: TaskStatus,
	pub priority: Vec<i64>,
	pub done: bool,
}

pub struct TaskEntry {
	pub token: Token,
	pub priority: Vec<i64>,
	pub status: TaskStatus,
	pub done: bool,
	pub last_return: Option<Payload>,

	/// Frames elapsed since the task finished
	pub gc_count: u32,

	/// Insertion order, used to break priority ties
	pub sequence: u64,

	/// Taken out while the task is being stepped, and dropped once it finishes
	pub runtime: Option<Interpreter>,
}
impl TaskEntry {
	pub fn info(&self) -> TaskInfo {
		return TaskInfo {
			token: self.token,
			status: self.status,
			priority: self.priority.clone(),
			done: self.done,
		};
	}
}

#[portable(PartialEq, Eq)]
#[derive(Error)]
pub enum SchedulerError {
	#[error("Task {0} was not found")]
	TaskNotFound(Token),
}

/// An error that aborts a single frame. The loop counts these and keeps going.
#[portable(PartialEq)]
#[derive(Error)]
pub enum FrameError {
	#[error("Could not mix values: {0}")]
	Mix(#[from] MixError),
	#[error("Task {token} panicked: {message}")]
	Panicked {
		token: Token,
		message: String,
	},
}

/// An error that stops the frame loop
#[portable(PartialEq, Eq)]
#[derive(Error)]
pub enum FrameLoopError {
	#[error("There are no universes to process")]
	NoUniverses,
	#[error("The frame loop is already running")]
	AlreadyRunning,
	#[error("The application is shutting down")]
	ShuttingDown,
}

/// Everything the scheduler owns. Only the frame loop and explicit API calls touch this, one at a time.
pub struct SchedulerState {
	pub config: SchedulerConfig,
	pub tasks: FxHashMap<Token, TaskEntry>,
	pub mailbox: Mailbox,
	pub bit_assignments: ChannelBitAssignments,

	/// Universes that get rendered and written every frame
	pub universes: BTreeSet<u32>,

	/// Cleared to ask the loop to stop
	pub processing: bool,

	/// Set while a frame loop owns the scheduler
	pub running: bool,

	/// Frames that have failed in a row
	pub failures: u32,

	pub frame: u64,
	next_sequence: u64,
}

impl SchedulerState {
	pub fn new(config: SchedulerConfig) -> SchedulerState {
		return SchedulerState {
			config,
			tasks: FxHashMap::default(),
			mailbox: Mailbox::new(),
			bit_assignments: ChannelBitAssignments::new(),
			universes: BTreeSet::new(),
			processing: false,
			running: false,
			failures: 0,
			frame: 0,
			next_sequence: 0,
		};
	}

	/// Registers a process. It first runs on the next frame.
	pub fn add_process(&mut self, priority: Vec<i64>, process: Box<dyn Process>) -> TaskInfo {
		let token = Token::new_v4();
		let task = TaskEntry {
			token,
			priority,
			status: TaskStatus::default(),
			done: false,
			last_return: None,
			gc_count: 0,
			sequence: self.next_sequence,
			runtime: Some(Interpreter::new(process)),
		};
		self.next_sequence += 1;
		let info = task.info();
		self.tasks.insert(token, task);
		return info;
	}

	pub fn next_priority(&self) -> i64 {
		return next_top_level(self.tasks.values().map(|task| task.priority.as_slice()));
	}

	/// Removes a task immediately, return value included
	pub fn cancel(&mut self, token: Token) -> bool {
		let removed = self.tasks.remove(&token).is_some();
		self.mailbox.forget(token);
		return removed;
	}

	/// Marks a task stopped. It is retired on the next frame without being resumed again, so it
	/// stops counting as a taker right away.
	pub fn stop(&mut self, token: Token) -> bool {
		return match self.tasks.get_mut(&token) {
			Some(task) => {
				task.status.stopped = true;
				self.mailbox.forget(token);
				true
			},
			None => false,
		};
	}

	/// Marks a task done, dropping its process and anything it was waiting on
	pub fn retire(&mut self, token: Token, last_return: Option<Payload>) {
		if let Some(task) = self.tasks.get_mut(&token) {
			task.done = true;
			task.runtime = None;
			task.last_return = last_return;
		}
		self.mailbox.forget(token);
	}

	pub fn pause(&mut self, token: Token) -> bool {
		return match self.tasks.get_mut(&token) {
			Some(task) => {
				task.status.paused = true;
				true
			},
			None => false,
		};
	}

	pub fn resume(&mut self, token: Token) -> bool {
		return match self.tasks.get_mut(&token) {
			Some(task) => {
				task.status.paused = false;
				true
			},
			None => false,
		};
	}

	pub fn is_paused(&self, token: Token) -> bool {
		return self.tasks.get(&token).map_or(false, |task| task.status.paused);
	}

	/// Unknown tasks count as stopped
	pub fn is_stopped(&self, token: Token) -> bool {
		return self.tasks.get(&token).map_or(true, |task| task.status.stopped || task.done);
	}

	/// Unknown tasks count as done
	pub fn is_done(&self, token: Token) -> bool {
		return self.tasks.get(&token).map_or(true, |task| task.done);
	}

	pub fn get_return(&self, token: Token) -> Result<Option<Payload>, SchedulerError> {
		return match self.tasks.get(&token) {
			Some(task) => Ok(task.last_return.clone()),
			None => Err(SchedulerError::TaskNotFound(token)),
		};
	}

	pub fn task_info(&self, token: Token) -> Option<TaskInfo> {
		return self.tasks.get(&token).map(TaskEntry::info);
	}

	/// Lists every known task in priority order, finished ones included
	pub fn list_tasks(&self) -> Vec<TaskInfo> {
		return self.sorted(|_| true).into_iter().map(TaskEntry::info).collect();
	}

	/// Tokens of unfinished tasks in the order they are stepped
	pub fn run_order(&self) -> Vec<Token> {
		return self.sorted(|task| !task.done).into_iter().map(|task| task.token).collect();
	}

	fn sorted(&self, filter: impl Fn(&TaskEntry) -> bool) -> Vec<&TaskEntry> {
		let mut tasks: Vec<&TaskEntry> = self.tasks.values().filter(|task| filter(task)).collect();
		tasks.sort_by_key(|task| task.sequence);
		return hierarchical_sort(tasks, |task| task.priority.as_slice());
	}

	/// Ages finished tasks and drops the ones that have been finished for longer than `gc_frames`
	pub fn collect_garbage(&mut self) {
		let gc_frames = self.config.gc_frames;
		let mut collected = Vec::new();
		self.tasks.retain(|token, task| {
			if !task.done {
				return true;
			}
			task.gc_count += 1;
			if task.gc_count > gc_frames {
				collected.push(*token);
				return false;
			}
			return true;
		});
		for token in collected {
			self.mailbox.forget(token);
		}
	}
}
