use std::{
	collections::VecDeque,
	sync::{
		Arc,
		Mutex,
		PoisonError,
		RwLock,
	},
};
use rustc_hash::FxHashMap;
use procdmx_plugin_framework::*;

/// A raw message received from an input device
#[portable(PartialEq)]
pub struct InputMessage {
	pub message: Vec<u8>,
	pub timestamp: f64,
	pub delta_time: Option<f64>,
}

/// A source of input messages, such as a MIDI port.
///
/// Reads happen once per frame from inside the scheduler, so they must not block.
pub trait InputSource: Send + Sync + 'static {
	/// Returns everything that has queued for `input_id` since the last read
	fn read_input(&self, input_id: &str) -> Vec<InputMessage>;
}

/// Input source fed by a device thread. Messages are drained on read.
#[derive(Default)]
pub struct QueuedInput {
	queue: Mutex<VecDeque<InputMessage>>,
}
impl QueuedInput {
	pub fn new() -> QueuedInput {
		return QueuedInput::default();
	}

	pub fn push(&self, message: InputMessage) {
		self.queue.lock().unwrap_or_else(PoisonError::into_inner).push_back(message);
	}
}
impl InputSource for QueuedInput {
	fn read_input(&self, _input_id: &str) -> Vec<InputMessage> {
		return self.queue.lock().unwrap_or_else(PoisonError::into_inner).drain(..).collect();
	}
}

/// Routes input reads to whichever source is registered for an input ID
#[derive(Clone)]
pub struct InputRouterInterface(PluginContext, Arc<RwLock<FxHashMap<String, Arc<dyn InputSource>>>>);
impl InputRouterInterface {
	pub fn new(plugin_context: PluginContext) -> Self {
		return InputRouterInterface(plugin_context, Arc::new(RwLock::new(FxHashMap::default())));
	}

	/// Registers a source for an input ID, replacing any previous one
	pub fn register_source(&self, input_id: impl Into<String>, source: Arc<dyn InputSource>) {
		let input_id = input_id.into();
		log!(self.0, "Input {input_id} registered");
		self.1.write().unwrap_or_else(PoisonError::into_inner).insert(input_id, source);
	}

	pub fn unregister_source(&self, input_id: &str) -> bool {
		return self.1.write().unwrap_or_else(PoisonError::into_inner).remove(input_id).is_some();
	}

	/// Reads queued messages for an input. Unknown inputs have nothing to read.
	pub fn read_input(&self, input_id: &str) -> Vec<InputMessage> {
		let source = self.1.read().unwrap_or_else(PoisonError::into_inner).get(input_id).cloned();
		return match source {
			Some(source) => source.read_input(input_id),
			None => Vec::new(),
		};
	}

	pub fn list_inputs(&self) -> Vec<String> {
		let mut inputs: Vec<String> = self.1.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect();
		inputs.sort();
		return inputs;
	}
}

pub async fn initialize(plugin_context: PluginContext) -> InputRouterInterface {
	return InputRouterInterface::new(plugin_context);
}
