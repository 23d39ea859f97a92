use std::sync::{
	atomic::{
		AtomicU32,
		Ordering,
	},
	Arc,
	Mutex,
};
use serde_json::json;
use procdmx_plugin_framework::*;

use crate::{
	async_main,
	mixer_utils::state::{
		ChannelValue,
		MixError,
		MixMode,
		MixValue,
		Output,
	},
	plugins::scheduler::{
		effects::{
			process_fn,
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
			FrameLoopError,
			SchedulerError,
			SchedulerState,
		},
	},
	utilities::config::{
		EngineConfig,
		SchedulerConfig,
		UniverseConfig,
	},
};

use super::{
	frame_env,
	recording_device,
	RecordingDriver,
};

fn push(channel: u16, level: f64) -> MixValue {
	return MixValue::new(Output::new(1, channel), ChannelValue::new(level), MixMode::GreaterPriority);
}

/// Pushes the same value every frame, forever
fn constant(channel: u16, level: f64) -> impl Process {
	return process_fn(move |controls, _| {
		controls.push_values([push(channel, level)]).unwrap();
		return Step::Yield(Effect::WaitNextFrame);
	});
}

fn forever() -> impl Process {
	return process_fn(|_, _| Step::Yield(Effect::WaitNextFrame));
}

fn entry(name: &str, process: impl Process) -> (String, Box<dyn Process>) {
	return (String::from(name), Box::new(process));
}

#[tokio::test]
async fn later_priorities_win() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	state.add_process(vec![1], Box::new(constant(1, 200.0)));
	state.add_process(vec![0], Box::new(constant(1, 50.0)));
	state.add_process(vec![0], Box::new(process_fn(|controls, _| {
		controls.push_values([push(2, 100.0).weighted(0.5)]).unwrap();
		return Step::Yield(Effect::WaitNextFrame);
	})));

	let values = state.fold_frame(&env).unwrap();
	assert_eq!(values[&(1, 1)].value.value_msb, 200.0);
	assert_eq!(values[&(1, 2)].value.value_msb, 50.0);
	assert_eq!(state.frame, 1);
}

#[tokio::test]
async fn first_frame_renders_pushed_value() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	state.universes.insert(1);
	state.add_process(vec![0], Box::new(constant(1, 255.0)));

	let values = state.fold_frame(&env).unwrap();
	let frames = state.render_frames(&values);
	assert_eq!(frames.len(), 1);
	assert_eq!(frames[0].0, 1);
	assert_eq!(frames[0].1[0], 255);
	assert!(frames[0].1[1..].iter().all(|byte| *byte == 0));
}

#[tokio::test]
async fn default_universe_and_lsb_addressing() {
	let env = frame_env(Some(3)).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	state.bit_assignments.create(3, 1, 2).unwrap();
	state.add_process(vec![0], Box::new(process_fn(|controls, _| {
		controls.push_values([
			MixValue::new(Output::on_default(1), ChannelValue::new(10.0), MixMode::GreaterPriority),
			MixValue::new(Output::on_default(2), ChannelValue::new(20.0), MixMode::GreaterPriority),
		]).unwrap();
		return Step::Yield(Effect::WaitNextFrame);
	})));

	let values = state.fold_frame(&env).unwrap();
	assert_eq!(values.len(), 1);
	assert_eq!(values[&(3, 1)].output, Output::new(3, 1));
}

#[tokio::test]
async fn invalid_pushes_are_refused_whole() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	state.add_process(vec![0], Box::new(process_fn(|controls, _| {
		assert!(controls.push_values([push(1, 10.0), push(2, 300.0)]).is_err());
		assert!(controls.push_values([push(0, 10.0)]).is_err());
		controls.push_values([push(3, 30.0)]).unwrap();
		return Step::Yield(Effect::WaitNextFrame);
	})));

	let values = state.fold_frame(&env).unwrap();
	assert_eq!(values.keys().copied().collect::<Vec<_>>(), vec![(1, 3)]);
}

#[tokio::test]
async fn snapshot_holds_values_from_lower_priorities() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	let seen = Arc::new(Mutex::new(Vec::new()));

	state.add_process(vec![0], Box::new(constant(1, 100.0)));
	let reader_seen = Arc::clone(&seen);
	state.add_process(vec![1], Box::new(process_fn(move |controls, _| {
		reader_seen.lock().unwrap().push(controls.get_value(Output::new(1, 1)).map(|value| value.value_msb));
		return Step::Yield(Effect::WaitNextFrame);
	})));

	state.fold_frame(&env).unwrap();
	state.fold_frame(&env).unwrap();
	assert_eq!(*seen.lock().unwrap(), vec![None, Some(100.0)]);
}

#[tokio::test]
async fn freeze_repeats_the_snapshot() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	let source = state.add_process(vec![0], Box::new(constant(1, 80.0)));

	let mut frozen = false;
	state.add_process(vec![2], Box::new(process_fn(move |_, input| {
		if !frozen && input == Resume::Next {
			frozen = true;
			return Step::Yield(Effect::Freeze);
		}
		frozen = false;
		return Step::Yield(Effect::WaitNextFrame);
	})));

	state.fold_frame(&env).unwrap();
	assert!(state.cancel(source.token));
	let values = state.fold_frame(&env).unwrap();
	assert_eq!(values[&(1, 1)].value.value_msb, 80.0);
}

#[tokio::test]
async fn fork_then_cancel() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	let child: Arc<Mutex<Option<Token>>> = Arc::default();

	let parent_child = Arc::clone(&child);
	let parent = state.add_process(vec![0], Box::new(process_fn(move |_, input| {
		return match input {
			Resume::Start => Step::Yield(Effect::fork(forever())),
			Resume::Forked(token) => {
				*parent_child.lock().unwrap() = Some(token);
				Step::Yield(Effect::Cancel(Some(token)))
			},
			_ => Step::Complete(Some(json!("cancelled"))),
		};
	})));

	state.fold_frame(&env).unwrap();
	let forked = state.list_tasks();
	assert_eq!(forked.len(), 2);
	assert_eq!(forked[1].priority, vec![0, 0]);

	state.fold_frame(&env).unwrap();
	let child = (*child.lock().unwrap()).unwrap();
	assert_eq!(state.get_return(child), Err(SchedulerError::TaskNotFound(child)));
	assert!(state.task_info(child).is_none());
	assert!(state.is_done(parent.token));
	assert_eq!(state.get_return(parent.token), Ok(Some(json!("cancelled"))));
}

#[tokio::test]
async fn forked_children_take_successive_slots() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	let mut forks = 0;
	state.add_process(vec![4, 2], Box::new(process_fn(move |_, _| {
		forks += 1;
		if forks > 3 {
			return Step::Complete(None);
		}
		return Step::Yield(Effect::fork(forever()));
	})));

	for _ in 0..4 {
		state.fold_frame(&env).unwrap();
	}
	let priorities: Vec<Vec<i64>> = state.list_tasks().into_iter().map(|task| task.priority).collect();
	assert_eq!(priorities, vec![vec![4, 2], vec![4, 2, 0], vec![4, 2, 1], vec![4, 2, 2]]);
	assert_eq!(state.next_priority(), 5);
}

#[tokio::test]
async fn take_waits_for_put() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());

	let consumer = state.add_process(vec![0], Box::new(process_fn(|_, input| {
		return match input {
			Resume::Start => Step::Yield(Effect::Take(String::from("cue"))),
			Resume::Taken(payload) => Step::Complete(payload),
			_ => Step::Complete(None),
		};
	})));
	state.add_process(vec![1], Box::new(process_fn(|_, input| {
		return match input {
			Resume::Start => Step::Yield(Effect::Put(String::from("cue"), json!(5))),
			_ => Step::Complete(None),
		};
	})));

	state.fold_frame(&env).unwrap();
	assert!(!state.is_done(consumer.token));
	assert!(state.mailbox.is_queued("cue"));

	state.fold_frame(&env).unwrap();
	assert_eq!(state.get_return(consumer.token), Ok(Some(json!(5))));
	assert!(!state.mailbox.is_queued("cue"));
}

#[tokio::test]
async fn take_after_put_resolves_immediately() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());

	state.add_process(vec![0], Box::new(process_fn(|_, input| {
		return match input {
			Resume::Start => Step::Yield(Effect::Put(String::from("cue"), json!({ "scene": 2 }))),
			_ => Step::Complete(None),
		};
	})));
	let consumer = state.add_process(vec![1], Box::new(process_fn(|_, input| {
		return match input {
			Resume::Start => Step::Yield(Effect::Take(String::from("cue"))),
			Resume::Taken(payload) => Step::Complete(payload),
			_ => Step::Complete(None),
		};
	})));

	state.fold_frame(&env).unwrap();
	assert_eq!(state.get_return(consumer.token), Ok(Some(json!({ "scene": 2 }))));
}

#[tokio::test]
async fn take_maybe_resolves_empty() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	let task = state.add_process(vec![0], Box::new(process_fn(|_, input| {
		return match input {
			Resume::Start => Step::Yield(Effect::TakeMaybe(String::from("nothing"))),
			Resume::Taken(None) => Step::Complete(Some(json!("empty"))),
			_ => Step::Complete(None),
		};
	})));

	state.fold_frame(&env).unwrap();
	assert!(!state.is_done(task.token));
	state.fold_frame(&env).unwrap();
	assert_eq!(state.get_return(task.token), Ok(Some(json!("empty"))));
}

/// Takes from `channel` forever, recording every payload it gets
fn recording_taker(channel: &'static str, received: Arc<Mutex<Vec<Payload>>>) -> impl Process {
	return process_fn(move |_, input| {
		if let Resume::Taken(Some(payload)) = input {
			received.lock().unwrap().push(payload);
		}
		return Step::Yield(Effect::Take(String::from(channel)));
	});
}

fn put_once(channel: &'static str, payload: Payload) -> impl Process {
	return process_fn(move |_, input| {
		return match input {
			Resume::Start => Step::Yield(Effect::Put(String::from(channel), payload.clone())),
			_ => Step::Complete(None),
		};
	});
}

fn take_once(channel: &'static str) -> impl Process {
	return process_fn(move |_, input| {
		return match input {
			Resume::Start => Step::Yield(Effect::Take(String::from(channel))),
			Resume::Taken(payload) => Step::Complete(payload),
			_ => Step::Complete(None),
		};
	});
}

#[tokio::test]
async fn stopped_taker_does_not_hold_payload() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	let received = Arc::new(Mutex::new(Vec::new()));

	let stopped = state.add_process(vec![0], Box::new(take_once("x")));
	state.add_process(vec![1], Box::new(recording_taker("x", Arc::clone(&received))));
	state.fold_frame(&env).unwrap();
	assert!(state.mailbox.is_registered("x", stopped.token));

	assert!(state.stop(stopped.token));
	assert!(!state.mailbox.is_registered("x", stopped.token));
	state.add_process(vec![2], Box::new(put_once("x", json!("once"))));
	state.fold_frame(&env).unwrap();
	state.fold_frame(&env).unwrap();

	assert_eq!(*received.lock().unwrap(), vec![json!("once")]);
	assert!(!state.mailbox.is_queued("x"));

	// A late taker finds nothing
	let late = state.add_process(vec![3], Box::new(process_fn(|_, input| {
		return match input {
			Resume::Start => Step::Yield(Effect::TakeMaybe(String::from("x"))),
			Resume::Taken(payload) => Step::Complete(payload),
			_ => Step::Complete(Some(json!("unexpected"))),
		};
	})));
	state.fold_frame(&env).unwrap();
	state.fold_frame(&env).unwrap();
	assert!(state.is_done(late.token));
	assert_eq!(state.get_return(late.token), Ok(None));
	assert_eq!(received.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn finished_taker_is_forgotten() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	let task = state.add_process(vec![0], Box::new(process_fn(|_, input| {
		return match input {
			Resume::Start => Step::Yield(Effect::Take(String::from("x"))),
			_ => Step::Complete(None),
		};
	})));
	state.fold_frame(&env).unwrap();
	assert!(state.mailbox.is_registered("x", task.token));

	state.retire(task.token, Some(json!("early")));
	assert!(!state.mailbox.is_registered("x", task.token));
	assert_eq!(state.get_return(task.token), Ok(Some(json!("early"))));
}

#[tokio::test]
async fn blocked_takers_share_one_payload() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	let first = state.add_process(vec![0], Box::new(take_once("cue")));
	let second = state.add_process(vec![1], Box::new(take_once("cue")));
	state.add_process(vec![2], Box::new(put_once("cue", json!(7))));

	state.fold_frame(&env).unwrap();
	assert!(!state.is_done(first.token));
	assert!(!state.is_done(second.token));
	assert!(state.mailbox.is_queued("cue"));

	state.fold_frame(&env).unwrap();
	assert_eq!(state.get_return(first.token), Ok(Some(json!(7))));
	assert_eq!(state.get_return(second.token), Ok(Some(json!(7))));
	assert!(!state.mailbox.is_queued("cue"));
}

#[tokio::test]
async fn last_put_wins_before_any_take() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	let mut puts = 0;
	state.add_process(vec![0], Box::new(process_fn(move |_, _| {
		puts += 1;
		if puts > 2 {
			return Step::Complete(None);
		}
		return Step::Yield(Effect::Put(String::from("cue"), json!(puts)));
	})));
	let consumer = state.add_process(vec![1], Box::new(take_once("cue")));

	state.fold_frame(&env).unwrap();
	assert_eq!(state.get_return(consumer.token), Ok(Some(json!(2))));
	assert!(!state.mailbox.is_queued("cue"));
}

#[tokio::test]
async fn join_waits_for_every_task() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	let first = state.add_process(vec![0], Box::new(process_fn(|_, _| Step::Complete(Some(json!(1))))));
	let mut frames = 0;
	let second = state.add_process(vec![1], Box::new(process_fn(move |_, _| {
		frames += 1;
		if frames == 3 {
			return Step::Complete(Some(json!(2)));
		}
		return Step::Yield(Effect::WaitNextFrame);
	})));

	let tokens = vec![first.token, second.token];
	let joiner = state.add_process(vec![2], Box::new(process_fn(move |_, input| {
		return match input {
			Resume::Start => Step::Yield(Effect::Join(tokens.clone(), JoinMode::Done)),
			Resume::Joined(returns) => Step::Complete(Some(json!(returns))),
			_ => Step::Complete(None),
		};
	})));

	state.fold_frame(&env).unwrap();
	state.fold_frame(&env).unwrap();
	assert!(!state.is_done(joiner.token));
	state.fold_frame(&env).unwrap();
	assert_eq!(state.get_return(joiner.token), Ok(Some(json!([1, 2]))));
}

#[tokio::test]
async fn race_settles_on_first_finisher() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	let parent = state.add_process(vec![0], Box::new(process_fn(|_, input| {
		return match input {
			Resume::Start => Step::Yield(Effect::Race(vec![
				entry("fast", process_fn(|_, _| Step::Complete(Some(json!(1))))),
				entry("slow", forever()),
			], JoinMode::Done)),
			Resume::Settled(returns) => Step::Complete(Some(json!(returns))),
			_ => Step::Complete(None),
		};
	})));

	for _ in 0..3 {
		state.fold_frame(&env).unwrap();
	}
	assert_eq!(state.get_return(parent.token), Ok(Some(json!({ "fast": 1 }))));

	// The loser keeps running
	let slow = state.list_tasks().into_iter().find(|task| task.priority == vec![0, 1]).unwrap();
	assert!(!slow.done);
}

#[tokio::test]
async fn all_settles_on_stopped() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	let parent = state.add_process(vec![0], Box::new(process_fn(|_, input| {
		return match input {
			Resume::Start => Step::Yield(Effect::All(vec![
				entry("a", process_fn(|_, _| Step::Yield(Effect::Stop(None)))),
				entry("b", process_fn(|_, _| Step::Complete(Some(json!("b"))))),
			], JoinMode::Stopped)),
			Resume::Settled(returns) => Step::Complete(Some(json!(returns))),
			_ => Step::Complete(None),
		};
	})));

	for _ in 0..3 {
		state.fold_frame(&env).unwrap();
	}
	assert_eq!(state.get_return(parent.token), Ok(Some(json!({ "a": null, "b": "b" }))));
}

#[tokio::test]
async fn stopped_tasks_are_not_resumed() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	let resumes = Arc::new(AtomicU32::new(0));
	let counter = Arc::clone(&resumes);
	let task = state.add_process(vec![0], Box::new(process_fn(move |_, _| {
		counter.fetch_add(1, Ordering::SeqCst);
		return Step::Yield(Effect::WaitNextFrame);
	})));

	state.fold_frame(&env).unwrap();
	assert!(state.stop(task.token));
	assert!(state.is_stopped(task.token));
	assert!(!state.is_done(task.token));

	state.fold_frame(&env).unwrap();
	state.fold_frame(&env).unwrap();
	assert_eq!(resumes.load(Ordering::SeqCst), 1);
	assert!(state.is_done(task.token));
	assert_eq!(state.get_return(task.token), Ok(None));
}

#[tokio::test]
async fn pause_is_only_a_flag() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	let task = state.add_process(vec![0], Box::new(constant(1, 10.0)));
	assert!(state.pause(task.token));
	assert!(state.is_paused(task.token));
	assert!(state.fold_frame(&env).unwrap().contains_key(&(1, 1)));

	assert!(state.resume(task.token));
	assert!(!state.is_paused(task.token));

	let unknown = Token::new_v4();
	assert!(!state.pause(unknown));
	assert!(state.is_stopped(unknown));
	assert!(state.is_done(unknown));
}

#[tokio::test]
async fn finished_tasks_are_collected() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	let task = state.add_process(vec![0], Box::new(process_fn(|_, _| Step::Complete(Some(json!("bye"))))));

	state.fold_frame(&env).unwrap();
	for _ in 0..44 {
		state.fold_frame(&env).unwrap();
	}
	assert_eq!(state.get_return(task.token), Ok(Some(json!("bye"))));

	state.fold_frame(&env).unwrap();
	assert_eq!(state.get_return(task.token), Err(SchedulerError::TaskNotFound(task.token)));
}

#[tokio::test]
async fn clear_fails_the_frame() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	state.add_process(vec![0], Box::new(process_fn(|controls, _| {
		controls.push_values([MixValue::new(Output::new(1, 1), ChannelValue::new(1.0), MixMode::Clear)]).unwrap();
		return Step::Yield(Effect::WaitNextFrame);
	})));

	assert_eq!(state.fold_frame(&env), Err(FrameError::Mix(MixError::Unimplemented(MixMode::Clear))));
}

#[tokio::test]
async fn panicking_process_fails_the_frame() {
	let env = frame_env(None).await;
	let mut state = SchedulerState::new(SchedulerConfig::default());
	let task = state.add_process(vec![0], Box::new(process_fn(|_, _| -> Step {
		panic!("lamp exploded");
	})));

	assert_eq!(state.fold_frame(&env), Err(FrameError::Panicked {
		token: task.token,
		message: String::from("lamp exploded"),
	}));
	assert!(state.is_done(task.token));

	// The next frame carries on without it
	assert!(state.fold_frame(&env).is_ok());
}

fn engine_config(universes: &[u32]) -> EngineConfig {
	return EngineConfig {
		scheduler: SchedulerConfig::default(),
		universes: universes.iter()
			.map(|id| UniverseConfig {
				id: *id,
				output_device: recording_device(&format!("port{id}")),
				default: *id == 1,
			})
			.collect(),
	};
}

#[tokio::test]
async fn frames_reach_the_driver() {
	let manager = PluginManager::new();
	let engine = async_main(&manager, engine_config(&[1, 2])).await.unwrap();
	let driver = RecordingDriver::default();
	engine.dmx.register_dmx_driver(driver.clone()).await;
	assert_eq!(engine.scheduler.list_active_universes().await, vec![1, 2]);

	engine.scheduler.add_process(vec![0], process_fn(|controls, _| {
		controls.push_values([MixValue::new(Output::on_default(1), ChannelValue::new(255.0), MixMode::GreaterPriority)]).unwrap();
		return Step::Yield(Effect::WaitNextFrame);
	})).await;

	engine.scheduler.run_frame().await.unwrap();
	let recorded = driver.recorded();
	assert_eq!(recorded.len(), 2);
	let universe_1 = recorded.iter().find(|(universe, _)| *universe == 1).unwrap();
	assert_eq!(universe_1.1[0], 255);
	let universe_2 = recorded.iter().find(|(universe, _)| *universe == 2).unwrap();
	assert!(universe_2.1.iter().all(|byte| *byte == 0));
	assert_eq!(engine.scheduler.get_frame().await, 1);
}

#[tokio::test]
async fn write_failures_do_not_fail_the_frame() {
	let manager = PluginManager::new();
	let engine = async_main(&manager, engine_config(&[1])).await.unwrap();
	engine.dmx.register_dmx_driver(RecordingDriver::failing()).await;
	let mut errors = manager.listen_json("log_error", FilterCriteria::None);

	assert_eq!(engine.scheduler.run_frame().await, Ok(()));
	assert!(matches!(errors.try_recv(), Ok(PortableJSONEvent::Msg(_))));
}

#[tokio::test]
async fn deleted_universes_stop_rendering() {
	let manager = PluginManager::new();
	let engine = async_main(&manager, engine_config(&[1, 2])).await.unwrap();
	engine.dmx.delete_universe(2).await.unwrap();
	assert_eq!(engine.scheduler.list_active_universes().await, vec![1]);
}

#[tokio::test]
async fn loop_refuses_to_run_without_universes() {
	let manager = PluginManager::new();
	let engine = async_main(&manager, EngineConfig::default()).await.unwrap();
	let mut processing = manager.listen_json("scheduler.processing", FilterCriteria::None);

	assert_eq!(engine.scheduler.run_frame_loop().await, Err(FrameLoopError::NoUniverses));
	assert!(!engine.scheduler.is_processing().await);
	assert_eq!(engine.scheduler.get_frame().await, 0);

	let mut states = Vec::new();
	while let Ok(PortableJSONEvent::Msg(value)) = processing.try_recv() {
		states.push((*value).clone());
	}
	assert_eq!(states, vec![json!(true), json!(false)]);
}

#[tokio::test]
async fn loop_stops_when_asked() {
	let manager = PluginManager::new();
	let engine = async_main(&manager, engine_config(&[1])).await.unwrap();
	let driver = RecordingDriver::default();
	engine.dmx.register_dmx_driver(driver.clone()).await;

	let scheduler = engine.scheduler.clone();
	let mut frames = 0;
	engine.scheduler.add_process(vec![0], process_fn(move |_, _| {
		frames += 1;
		if frames == 3 {
			return Step::Complete(None);
		}
		return Step::Yield(Effect::WaitNextFrame);
	})).await;

	let handle = tokio::spawn(async move { scheduler.run_frame_loop().await });
	while driver.recorded().len() < 5 {
		tokio::task::yield_now().await;
	}
	engine.scheduler.stop_processing().await;
	assert_eq!(handle.await.unwrap(), Ok(()));
	assert!(engine.scheduler.get_frame().await >= 5);
}

#[tokio::test]
async fn only_one_loop_runs() {
	let manager = PluginManager::new();
	let engine = async_main(&manager, engine_config(&[1])).await.unwrap();
	let driver = RecordingDriver::default();
	engine.dmx.register_dmx_driver(driver.clone()).await;

	let resumes = Arc::new(AtomicU32::new(0));
	let counter = Arc::clone(&resumes);
	engine.scheduler.add_process(vec![0], process_fn(move |_, _| {
		counter.fetch_add(1, Ordering::SeqCst);
		return Step::Yield(Effect::WaitNextFrame);
	})).await;

	assert_eq!(engine.scheduler.start().await, Ok(()));
	assert_eq!(engine.scheduler.start().await, Err(FrameLoopError::AlreadyRunning));
	assert_eq!(engine.scheduler.run_frame_loop().await, Err(FrameLoopError::AlreadyRunning));
	assert!(engine.scheduler.is_running().await);

	while driver.recorded().len() < 5 {
		tokio::task::yield_now().await;
	}
	engine.scheduler.stop_processing().await;
	while engine.scheduler.is_running().await {
		tokio::task::yield_now().await;
	}

	// One resume and one write per frame
	let frames = engine.scheduler.get_frame().await;
	assert_eq!(resumes.load(Ordering::SeqCst) as u64, frames);
	assert_eq!(driver.recorded().len() as u64, frames);

	// The claim is released once the loop exits
	assert_eq!(engine.scheduler.start().await, Ok(()));
	engine.scheduler.stop_processing().await;
}

#[tokio::test]
async fn loop_cools_down_and_recovers() {
	let manager = PluginManager::new();
	let mut config = engine_config(&[1]);
	config.scheduler = SchedulerConfig {
		failure_threshold: 1,
		failure_cooldown_ms: 5,
		..SchedulerConfig::default()
	};
	let engine = async_main(&manager, config).await.unwrap();
	let driver = RecordingDriver::default();
	engine.dmx.register_dmx_driver(driver.clone()).await;
	let mut errors = manager.listen_json("log_error", FilterCriteria::None);

	let mut frames = 0;
	engine.scheduler.add_process(vec![0], process_fn(move |controls, _| {
		frames += 1;
		let mix_mode = if frames <= 3 { MixMode::Clear } else { MixMode::GreaterPriority };
		controls.push_values([MixValue::new(Output::new(1, 1), ChannelValue::new(40.0), mix_mode)]).unwrap();
		return Step::Yield(Effect::WaitNextFrame);
	})).await;

	let scheduler = engine.scheduler.clone();
	let handle = tokio::spawn(async move { scheduler.run_frame_loop().await });
	while driver.recorded().len() < 2 {
		tokio::task::yield_now().await;
	}
	assert_eq!(engine.scheduler.consecutive_failures().await, 0);
	engine.scheduler.stop_processing().await;
	assert_eq!(handle.await.unwrap(), Ok(()));

	// Failed frames are skipped, not written
	assert_eq!(driver.recorded()[0].1[0], 40);
	assert!(engine.scheduler.get_frame().await >= 5);

	let mut messages = Vec::new();
	while let Ok(PortableJSONEvent::Msg(value)) = errors.try_recv() {
		if let Some(message) = value["message"].as_str() {
			messages.push(String::from(message));
		}
	}
	assert_eq!(messages.len(), 3);
	assert!(messages[2].starts_with("Frame failed (3 in a row)"));
}
