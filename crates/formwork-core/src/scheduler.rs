//! Batched update scheduling
//!
//! Many independent callers (field controllers, programmatic mutators)
//! request transitions of the same shared state. The scheduler coalesces
//! them: transitions queue up while a short quiescence timer keeps being
//! re-armed, then the whole batch is applied left-fold style in enqueue
//! order and committed as one observable update. Each caller gets a future
//! that resolves only after the merged commit, which gives read-your-writes
//! consistency without any caller seeing intermediate states.
//!
//! Enqueueing is eager: the transition is queued and the timer armed when
//! [`BatchScheduler::enqueue`] is called, so dropping the returned future
//! never cancels the transition.

use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

/// How long the queue must stay quiet before a batch is applied. A tuning
/// constant, not a correctness constant.
pub const QUIESCENCE_WINDOW: Duration = Duration::from_millis(20);

type Transition<S> = Box<dyn FnOnce(S) -> S + Send>;

/// Coalesces state transitions into atomic batched commits.
///
/// Must be used from within a tokio runtime: each enqueue arms a timer
/// task. Re-enqueueing while a timer is pending extends the window instead
/// of opening a second batch — there is exactly one pending batch at a
/// time, tracked by an epoch counter that invalidates superseded timers.
pub struct BatchScheduler<S> {
	shared: Arc<Shared<S>>,
}

impl<S> Clone for BatchScheduler<S> {
	fn clone(&self) -> Self {
		Self {
			shared: Arc::clone(&self.shared),
		}
	}
}

struct Shared<S> {
	state: Arc<RwLock<S>>,
	window: Duration,
	pending: Mutex<Vec<(Transition<S>, oneshot::Sender<()>)>>,
	epoch: AtomicU64,
}

impl<S: Clone + Send + Sync + 'static> BatchScheduler<S> {
	/// Creates a scheduler committing into `state` with the default
	/// quiescence window.
	pub fn new(state: Arc<RwLock<S>>) -> Self {
		Self::with_window(state, QUIESCENCE_WINDOW)
	}

	pub fn with_window(state: Arc<RwLock<S>>, window: Duration) -> Self {
		Self {
			shared: Arc::new(Shared {
				state,
				window,
				pending: Mutex::new(Vec::new()),
				epoch: AtomicU64::new(0),
			}),
		}
	}

	/// Queues a transition and (re)arms the quiescence timer.
	///
	/// The returned future resolves after the batch containing this
	/// transition has been committed. Transitions apply in enqueue order,
	/// each receiving the accumulator produced by the previous one, so
	/// later transitions in a batch observe earlier ones' effects.
	pub fn enqueue<F>(&self, transition: F) -> BoxFuture<'static, ()>
	where
		F: FnOnce(S) -> S + Send + 'static,
	{
		let (done_tx, done_rx) = oneshot::channel();
		let epoch = {
			let mut pending = self.shared.pending.lock();
			pending.push((Box::new(transition), done_tx));
			self.shared.epoch.fetch_add(1, Ordering::AcqRel) + 1
		};
		let shared = Arc::clone(&self.shared);
		tokio::spawn(async move {
			tokio::time::sleep(shared.window).await;
			// A later enqueue re-armed the window; let its timer flush.
			if shared.epoch.load(Ordering::Acquire) == epoch {
				shared.flush();
			}
		});
		Box::pin(async move {
			let _ = done_rx.await;
		})
	}
}

impl<S: Clone> Shared<S> {
	fn flush(&self) {
		let drained: Vec<(Transition<S>, oneshot::Sender<()>)> = {
			let mut pending = self.pending.lock();
			pending.drain(..).collect()
		};
		if drained.is_empty() {
			return;
		}
		tracing::trace!(transitions = drained.len(), "committing batched transitions");
		let mut next = self.state.read().clone();
		let mut notifiers = Vec::with_capacity(drained.len());
		for (transition, notify) in drained {
			next = transition(next);
			notifiers.push(notify);
		}
		*self.state.write() = next;
		for notify in notifiers {
			let _ = notify.send(());
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn scheduler() -> (BatchScheduler<Vec<u32>>, Arc<RwLock<Vec<u32>>>) {
		let state = Arc::new(RwLock::new(Vec::new()));
		(BatchScheduler::new(Arc::clone(&state)), state)
	}

	#[tokio::test(start_paused = true)]
	async fn batch_commits_as_one_observable_update() {
		let (scheduler, state) = scheduler();
		let first = scheduler.enqueue(|mut s: Vec<u32>| {
			s.push(1);
			s
		});
		let _ = scheduler.enqueue(|mut s: Vec<u32>| {
			s.push(2);
			s
		});
		let _ = scheduler.enqueue(|mut s: Vec<u32>| {
			s.push(3);
			s
		});
		// Awaiting only the first caller's future: the whole batch is
		// already committed by the time it resolves.
		first.await;
		assert_eq!(*state.read(), vec![1, 2, 3]);
	}

	#[tokio::test(start_paused = true)]
	async fn later_transitions_see_earlier_effects() {
		let (scheduler, state) = scheduler();
		let _ = scheduler.enqueue(|mut s: Vec<u32>| {
			s.push(10);
			s
		});
		let done = scheduler.enqueue(|mut s: Vec<u32>| {
			let doubled = s[0] * 2;
			s.push(doubled);
			s
		});
		done.await;
		assert_eq!(*state.read(), vec![10, 20]);
	}

	#[tokio::test(start_paused = true)]
	async fn re_enqueue_extends_the_window() {
		let (scheduler, state) = scheduler();
		let _ = scheduler.enqueue(|mut s: Vec<u32>| {
			s.push(1);
			s
		});
		tokio::time::advance(Duration::from_millis(15)).await;
		let second = scheduler.enqueue(|mut s: Vec<u32>| {
			s.push(2);
			s
		});
		// 30ms after the first enqueue its timer has fired and found
		// itself superseded; nothing is committed yet.
		tokio::time::advance(Duration::from_millis(15)).await;
		tokio::task::yield_now().await;
		assert!(state.read().is_empty());
		second.await;
		assert_eq!(*state.read(), vec![1, 2]);
	}

	#[tokio::test(start_paused = true)]
	async fn dropped_future_still_applies() {
		let (scheduler, state) = scheduler();
		drop(scheduler.enqueue(|mut s: Vec<u32>| {
			s.push(7);
			s
		}));
		let done = scheduler.enqueue(|s: Vec<u32>| s);
		done.await;
		assert_eq!(*state.read(), vec![7]);
	}
}
