use rustc_hash::{
	FxHashMap,
	FxHashSet,
};

use super::effects::{
	Payload,
	Token,
};

/// Single-slot-per-channel rendezvous used by PUT and TAKE.
///
/// A payload stays queued until every registered taker has received it. Each taker gets a given
/// payload at most once, and takers that finish or stop stop counting.
#[derive(Default)]
pub struct Mailbox {
	slots: FxHashMap<String, Slot>,
}

#[derive(Default)]
struct Slot {
	payload: Option<Payload>,
	takers: Vec<Token>,
	served: FxHashSet<Token>,
}

impl Slot {
	/// A delivered payload is finished with once nobody registered is still owed it. A payload
	/// nobody has taken yet waits for its first taker.
	fn is_exhausted(&self) -> bool {
		return !self.served.is_empty() && self.takers.iter().all(|taker| self.served.contains(taker));
	}
}

impl Mailbox {
	pub fn new() -> Mailbox {
		return Mailbox::default();
	}

	/// Queues a payload, replacing any unconsumed one
	pub fn put(&mut self, channel: &str, payload: Payload) {
		let slot = self.slots.entry(String::from(channel)).or_default();
		slot.payload = Some(payload);
		slot.served.clear();
	}

	/// Registers interest in a channel
	pub fn register_taker(&mut self, channel: &str, token: Token) {
		let slot = self.slots.entry(String::from(channel)).or_default();
		if !slot.takers.contains(&token) {
			slot.takers.push(token);
		}
	}

	/// Takes the queued payload if there is one this taker hasn't received yet.
	///
	/// The taker is deregistered on success, and the payload is dropped once every remaining
	/// taker has received it.
	pub fn try_take(&mut self, channel: &str, token: Token) -> Option<Payload> {
		let slot = self.slots.get_mut(channel)?;
		if slot.served.contains(&token) {
			return None;
		}
		let payload = slot.payload.clone()?;

		slot.takers.retain(|taker| *taker != token);
		slot.served.insert(token);
		if slot.is_exhausted() {
			self.slots.remove(channel);
		}
		return Some(payload);
	}

	/// Like `try_take`, but without leaving the taker registered when nothing is queued
	pub fn take_now(&mut self, channel: &str, token: Token) -> Option<Payload> {
		let payload = self.try_take(channel, token);
		if payload.is_none() {
			self.forget_on(channel, token);
		}
		return payload;
	}

	/// Whether a payload is waiting on the channel
	pub fn is_queued(&self, channel: &str) -> bool {
		return self.slots.get(channel).map_or(false, |slot| slot.payload.is_some());
	}

	/// Whether a task is waiting on the channel
	pub fn is_registered(&self, channel: &str, token: Token) -> bool {
		return self.slots.get(channel).map_or(false, |slot| slot.takers.contains(&token));
	}

	/// Drops every registration held by a task that will never take again
	pub fn forget(&mut self, token: Token) {
		self.slots.retain(|_, slot| {
			slot.takers.retain(|taker| *taker != token);
			if slot.is_exhausted() {
				return false;
			}
			return slot.payload.is_some() || !slot.takers.is_empty();
		});
	}

	fn forget_on(&mut self, channel: &str, token: Token) {
		if let Some(slot) = self.slots.get_mut(channel) {
			slot.takers.retain(|taker| *taker != token);
			if slot.payload.is_none() && slot.takers.is_empty() {
				self.slots.remove(channel);
			}
		}
	}
}
