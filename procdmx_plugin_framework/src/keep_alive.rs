use std::{
	future::Future,
	collections::HashMap,
	pin::Pin,
	sync::Arc,
};

use tokio::{
	task::{
		self,
		JoinHandle,
	},
	sync::{
		Mutex,
		watch,
	},
};
use uuid::Uuid;
use procdmx_plugin_macros::portable;


/// An error returned from a `KeepAlive` registration call
#[portable(PartialEq, Eq)]
pub enum KeepAliveRegistrationError {
	ShuttingDown,
}

/// An error returned from a `KeepAlive` de-registration call
#[portable(PartialEq, Eq)]
pub enum KeepAliveDeregistrationError {
	ShuttingDown,
	NotRegistered,
}


/// This struct provides hooks into the application lifecycle and allows preventing
/// the application from exiting before critical tasks are completed.
#[derive(Clone)]
pub struct KeepAlive {
	/// Internal data is held in an arc so references can be easily passed around to
	/// functions running in parallel.
	internal_data: Arc<KeepAliveInternal>,
}


struct KeepAliveInternal {

	/// Flips to `true` once when the shutdown sequence starts. Long-running tasks watch this
	/// to know when to wind down.
	shutting_down: watch::Sender<bool>,

	/// Blockers are run immediately and prevent the application from closing until
	/// they finish.
	blockers: Mutex<HashMap<Uuid, WithName<JoinHandle<()>>>>,

	/// Volatile tasks are run immediately and are aborted when the application closes.
	volatile: Mutex<HashMap<Uuid, WithName<JoinHandle<()>>>>,

	/// Finishers are run when the application is about to exit, and prevent the
	/// application from closing until they finish.
	finishers: Mutex<HashMap<Uuid, WithName<Pin<Box<dyn Future<Output = ()> + Send + 'static>>>>>,

}

struct WithName<T> {
	#[cfg(feature = "shutdown-debug")]
	name: String,
	data: T,
}

impl KeepAlive {
	pub fn new() -> KeepAlive {
		let (shutting_down, _) = watch::channel(false);
		KeepAlive {
			internal_data: Arc::new(KeepAliveInternal {
				shutting_down,
				blockers: Mutex::new(HashMap::new()),
				volatile: Mutex::new(HashMap::new()),
				finishers: Mutex::new(HashMap::new()),
			}),
		}
	}

	/// Indicates whether the shutdown sequence has started
	pub fn is_shutting_down(&self) -> bool {
		return *self.internal_data.shutting_down.borrow();
	}

	/// Gets a receiver that changes to `true` when the shutdown sequence starts
	pub fn watch_shutdown(&self) -> watch::Receiver<bool> {
		return self.internal_data.shutting_down.subscribe();
	}

	/// Register a routine that should be run to completion before shutting down the application.
	/// Anything that should not be interrupted should be run through this function. If the
	/// application is already shutting down, any call to this function will fail with
	/// `KeepAliveRegistrationError::ShuttingDown`.
	pub async fn register_blocker<F>(&self, _name: impl Into<String>, blocker: F) -> Result<(), KeepAliveRegistrationError>
	where
		F: Future<Output = ()> + Send + 'static,
	{
		if self.is_shutting_down() {
			return Err(KeepAliveRegistrationError::ShuttingDown);
		}
		let uuid = Uuid::new_v4();

		// Hold the lock across the spawn so a blocker that finishes instantly can't try to
		// remove itself before it has been inserted.
		let mut blockers = self.internal_data.blockers.lock().await;
		let internal_data = Arc::clone(&self.internal_data);
		let handle = task::spawn(async move {
			blocker.await;
			if !*internal_data.shutting_down.borrow() {
				internal_data.blockers.lock().await.remove(&uuid);
			}
		});
		blockers.insert(uuid, WithName {
			#[cfg(feature = "shutdown-debug")]
			name: _name.into(),
			data: handle,
		});
		return Ok(());
	}

	/// Register a routine that runs in the background and can be dropped at any point. It is
	/// aborted when the application shuts down.
	pub async fn register_volatile<F>(&self, _name: impl Into<String>, volatile: F) -> Result<(), KeepAliveRegistrationError>
	where
		F: Future<Output = ()> + Send + 'static,
	{
		if self.is_shutting_down() {
			return Err(KeepAliveRegistrationError::ShuttingDown);
		}
		let uuid = Uuid::new_v4();

		let mut volatile_tasks = self.internal_data.volatile.lock().await;
		volatile_tasks.retain(|_, handle| !handle.data.is_finished());
		volatile_tasks.insert(uuid, WithName {
			#[cfg(feature = "shutdown-debug")]
			name: _name.into(),
			data: task::spawn(volatile),
		});
		return Ok(());
	}

	/// Registers a finisher function and returns a UUID representing it.
	/// Finisher functions are run before application exit, and allow for
	/// things like flushing outputs quickly before exiting.
	pub async fn register_finisher<F>(&self, _name: impl Into<String>, finisher: F) -> Result<Uuid, KeepAliveRegistrationError>
	where
		F: Future<Output = ()> + Send + 'static,
	{
		if self.is_shutting_down() {
			return Err(KeepAliveRegistrationError::ShuttingDown);
		}
		let uuid = Uuid::new_v4();
		self.internal_data.finishers.lock().await.insert(uuid, WithName {
			#[cfg(feature = "shutdown-debug")]
			name: _name.into(),
			data: Box::pin(finisher),
		});
		return Ok(uuid);
	}

	/// De-registers a finisher function, removing it from the list of tasks
	/// to accomplish before application exit.
	pub async fn deregister_finisher(&self, handle: Uuid) -> Result<(), KeepAliveDeregistrationError> {
		if self.is_shutting_down() {
			return Err(KeepAliveDeregistrationError::ShuttingDown);
		}
		return match self.internal_data.finishers.lock().await.remove(&handle) {
			Some(_) => Ok(()),
			None => Err(KeepAliveDeregistrationError::NotRegistered),
		};
	}

	/// Initiate the shutdown sequence contained in the KeepAlive. This gives plugins an
	/// opportunity to finish what they were doing and perform cleanup routines before quitting
	/// the application
	pub async fn shut_down(&self) {
		// Mark that we're shutting down
		self.internal_data.shutting_down.send_replace(true);

		// Wait for all blockers to finish
		let blockers: Vec<WithName<JoinHandle<()>>> = self.internal_data.blockers.lock().await
			.drain()
			.map(|(_, handle)| handle)
			.collect();
		for handle in blockers {
			#[cfg(feature = "shutdown-debug")]
			println!("Waiting on {}", handle.name);
			// A panicked blocker has nothing left to wait for
			handle.data.await.ok();
		}

		// Volatile tasks don't get a say
		for (_, handle) in self.internal_data.volatile.lock().await.drain() {
			handle.data.abort();
		}

		// Run all finishers in parallel
		let finishers: Vec<JoinHandle<()>> = self.internal_data.finishers.lock().await
			.drain()
			.map(|(_, finisher)| task::spawn(finisher.data))
			.collect();

		// Wait for all finishers to complete
		for handle in finishers {
			handle.await.ok();
		}
	}

}
