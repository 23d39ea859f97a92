use std::time::{
	Duration,
	Instant,
};
use rayon::prelude::*;
use tokio::{
	task,
	time,
};
use procdmx_plugin_framework::*;

use crate::mixer_utils::{
	addressing::{
		fix_ch_input,
		render_universe,
	},
	default_blender::mix,
	state::{
		ChannelMap,
		DMXFrame,
		MixError,
		MixValue,
	},
};
use crate::utilities::config::SchedulerConfig;

use super::{
	controls::FrameEnv,
	interpreter::StepOutcome,
	state::{
		FrameError,
		FrameLoopError,
		SchedulerState,
	},
	SchedulerInterface,
};

impl SchedulerState {
	/// Steps every runnable task once, in priority order, folding their outputs into one map.
	///
	/// Each task's output is mixed on top of what the tasks before it produced this frame.
	pub fn fold_frame(&mut self, env: &FrameEnv) -> Result<ChannelMap, FrameError> {
		self.frame += 1;
		self.collect_garbage();

		let mut accumulator = ChannelMap::default();
		for token in self.run_order() {
			// Stopped tasks retire without being resumed
			if self.tasks.get(&token).map_or(false, |task| task.status.stopped) {
				self.retire(token, None);
				continue;
			}

			let (mut runtime, priority) = match self.tasks.get_mut(&token) {
				Some(task) => match task.runtime.take() {
					Some(runtime) => (runtime, task.priority.clone()),
					None => continue,
				},
				// Cancelled earlier in this frame
				None => continue,
			};

			let mut output = Vec::new();
			match runtime.step(self, env, token, &priority, &accumulator, &mut output) {
				Ok(StepOutcome::Suspended) => {
					if let Some(task) = self.tasks.get_mut(&token) {
						task.runtime = Some(runtime);
					}
				},
				Ok(StepOutcome::Completed(value)) => self.retire(token, value),
				Ok(StepOutcome::Cancelled) => continue,
				Err(error) => {
					// The process can't be resumed after unwinding
					self.retire(token, None);
					return Err(error);
				},
			}

			self.fold_output(&mut accumulator, output, env)?;
		}

		return Ok(accumulator);
	}

	fn fold_output(&self, accumulator: &mut ChannelMap, output: Vec<MixValue>, env: &FrameEnv) -> Result<(), MixError> {
		let resolved = fix_ch_input(output, env.default_universe, &self.bit_assignments);
		for rejected in resolved.rejected {
			log!(
				env.plugin,
				"Dropped a value for channel {} in universe {:?}: it is the LSB of a 16-bit channel. Address its MSB instead.",
				rejected.output.channel,
				rejected.output.universe,
			);
		}

		for (key, value) in resolved.accepted {
			if let Some(mixed) = mix(accumulator.get(&key), Some(&value))? {
				accumulator.insert(key, mixed);
			}
		}
		return Ok(());
	}

	/// Renders a frame for every active universe, in parallel
	pub fn render_frames(&self, values: &ChannelMap) -> Vec<(u32, DMXFrame)> {
		let bit_assignments = &self.bit_assignments;
		let universes: Vec<u32> = self.universes.iter().copied().collect();
		return universes.par_iter()
			.map(|universe| (*universe, render_universe(*universe, values, bit_assignments)))
			.collect();
	}
}

impl SchedulerInterface {
	/// Runs a single frame: steps every task, renders every active universe and writes the results.
	///
	/// Write failures are logged and do not fail the frame.
	pub async fn run_frame(&self) -> Result<(), FrameError> {
		let env = FrameEnv {
			plugin: self.plugin.clone(),
			default_universe: self.dmx.get_default_universe().await,
			inputs: self.inputs.clone(),
			connector: self.connector.clone(),
		};

		let frames = {
			let mut state = self.state.lock().await;

			#[cfg(feature = "frame-benchmark")]
			let start_bench = Instant::now();

			let values = state.fold_frame(&env)?;
			let frames = state.render_frames(&values);

			#[cfg(feature = "frame-benchmark")]
			println!("Frame {} took {:?}", state.frame, start_bench.elapsed());

			frames
		};

		for (universe, result) in self.dmx.send_frames(frames).await {
			if let Err(error) = result {
				log_error!(self.plugin, "Could not write universe {universe}: {error:?}");
			}
		}
		return Ok(());
	}

	/// Runs frames until processing is stopped, the application shuts down, or there is nothing
	/// left to render.
	///
	/// Frame errors are logged and counted. Once more than `failure_threshold` frames have failed
	/// in a row, each failure is followed by a cooldown. Only one loop runs at a time.
	pub async fn run_frame_loop(&self) -> Result<(), FrameLoopError> {
		let config = self.claim_loop().await?;
		return self.run_claimed_loop(config).await;
	}

	/// Marks the loop as running, failing if another one already is
	async fn claim_loop(&self) -> Result<SchedulerConfig, FrameLoopError> {
		let mut state = self.state.lock().await;
		if state.running {
			return Err(FrameLoopError::AlreadyRunning);
		}
		state.running = true;
		state.processing = true;
		state.failures = 0;
		return Ok(state.config.clone());
	}

	async fn run_claimed_loop(&self, config: SchedulerConfig) -> Result<(), FrameLoopError> {
		self.plugin.emit("scheduler.processing", FilterCriteria::None, true);

		let frame_interval = Duration::from_millis(config.frame_interval_ms);
		let cooldown = Duration::from_millis(config.failure_cooldown_ms);
		let mut shutdown = self.plugin.watch_shutdown();

		let result = loop {
			let start = Instant::now();
			{
				let state = self.state.lock().await;
				if !state.processing {
					break Ok(());
				}
				if state.universes.is_empty() {
					break Err(FrameLoopError::NoUniverses);
				}
			}
			if *shutdown.borrow() {
				break Ok(());
			}

			match self.run_frame().await {
				Ok(()) => self.state.lock().await.failures = 0,
				Err(error) => {
					let failures = {
						let mut state = self.state.lock().await;
						state.failures = state.failures.saturating_add(1);
						state.failures
					};
					log_error!(self.plugin, "Frame failed ({failures} in a row): {error}");
					if failures > config.failure_threshold {
						tokio::select! {
							_ = time::sleep(cooldown) => {},
							_ = shutdown.changed() => {},
						}
					}
				},
			}

			// Rate limiting
			if frame_interval.is_zero() {
				task::yield_now().await;
			} else {
				tokio::select! {
					_ = time::sleep(frame_interval.saturating_sub(start.elapsed())) => {},
					_ = shutdown.changed() => {},
				}
			}
		};

		{
			let mut state = self.state.lock().await;
			state.processing = false;
			state.running = false;
		}
		self.plugin.emit("scheduler.processing", FilterCriteria::None, false);
		if let Err(ref error) = result {
			log_error!(self.plugin, "[CRITICAL] The frame loop has stopped: {error}");
		}
		return result;
	}

	/// Spawns the frame loop in the background. Shutdown waits for the current frame to finish.
	pub async fn start(&self) -> Result<(), FrameLoopError> {
		let config = self.claim_loop().await?;
		let scheduler = self.clone();
		let spawned = self.plugin.spawn_blocker("Frame loop", async move {
			// Fatal stops are logged by the loop itself
			scheduler.run_claimed_loop(config).await.ok();
		}).await;

		if spawned.is_err() {
			let mut state = self.state.lock().await;
			state.processing = false;
			state.running = false;
			return Err(FrameLoopError::ShuttingDown);
		}
		return Ok(());
	}

	/// Asks the frame loop to stop after the current frame
	pub async fn stop_processing(&self) {
		self.state.lock().await.processing = false;
	}

	pub async fn is_processing(&self) -> bool {
		return self.state.lock().await.processing;
	}

	/// Whether a frame loop is still running, including one finishing its last frame after a stop
	pub async fn is_running(&self) -> bool {
		return self.state.lock().await.running;
	}

	/// Frames that have failed in a row, reset by the next good frame
	pub async fn consecutive_failures(&self) -> u32 {
		return self.state.lock().await.failures;
	}
}
