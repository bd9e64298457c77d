use std::{
    collections::{HashMap, HashSet, VecDeque},
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tokio::sync::Notify;
use tracing::trace;

/// Exponential per-item backoff used by [`WorkQueue::add_rate_limited`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    pub base: Duration,
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(5),
            max: Duration::from_secs(300),
        }
    }
}

impl BackoffConfig {
    /// Delay before the `failures`-th retry. `failures` starts at 1.
    pub fn delay(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exp)
            .map_or(self.max, |d| d.min(self.max))
    }
}

struct State<T> {
    queue: VecDeque<T>,
    /// Items waiting in `queue` or waiting to be re-queued once released.
    dirty: HashSet<T>,
    /// Items handed out by `get` and not yet released with `done`.
    processing: HashSet<T>,
    failures: HashMap<T, u32>,
    shutting_down: bool,
}

/// Deduplicating work queue with per-item serialization.
///
/// An item added while queued collapses into the queued entry. An item added
/// while in flight is parked and handed out again only after `done`, so no two
/// callers of `get` ever hold the same item at once.
pub struct WorkQueue<T> {
    state: Mutex<State<T>>,
    notify: Notify,
    backoff: BackoffConfig,
}

impl<T> Default for WorkQueue<T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

impl<T> WorkQueue<T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    pub fn new(backoff: BackoffConfig) -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                dirty: HashSet::new(),
                processing: HashSet::new(),
                failures: HashMap::new(),
                shutting_down: false,
            }),
            notify: Notify::new(),
            backoff,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // state stays consistent across every critical section, so a
        // poisoned lock is still usable
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add(&self, item: T) {
        let mut state = self.lock();
        if state.shutting_down || state.dirty.contains(&item) {
            return;
        }
        state.dirty.insert(item.clone());
        if state.processing.contains(&item) {
            return;
        }
        state.queue.push_back(item);
        drop(state);
        self.notify.notify_one();
    }

    /// Waits for the next item and marks it in flight. Returns `None` once
    /// the queue has been shut down.
    pub async fn get(&self) -> Option<T> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.lock();
                if state.shutting_down {
                    return None;
                }
                if let Some(item) = state.queue.pop_front() {
                    state.dirty.remove(&item);
                    state.processing.insert(item.clone());
                    let more = !state.queue.is_empty();
                    drop(state);
                    if more {
                        self.notify.notify_one();
                    }
                    return Some(item);
                }
            }
            notified.await;
        }
    }

    /// Releases an item handed out by `get`. If it was added again while in
    /// flight it goes back on the queue.
    pub fn done(&self, item: &T) {
        let mut state = self.lock();
        state.processing.remove(item);
        if state.dirty.contains(item) && !state.shutting_down {
            state.queue.push_back(item.clone());
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Re-adds `item` after its current backoff delay and bumps the delay for
    /// the next failure.
    pub fn add_rate_limited(self: &Arc<Self>, item: T) -> Duration {
        let delay = {
            let mut state = self.lock();
            let failures = state.failures.entry(item.clone()).or_insert(0);
            *failures = failures.saturating_add(1);
            self.backoff.delay(*failures)
        };
        self.add_after(item, delay);
        delay
    }

    pub fn add_after(self: &Arc<Self>, item: T, delay: Duration) {
        if delay.is_zero() {
            self.add(item);
            return;
        }
        let queue = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(queue) = queue.upgrade() {
                queue.add(item);
            } else {
                trace!("queue dropped before delayed add");
            }
        });
    }

    /// Clears the backoff history of `item`.
    pub fn forget(&self, item: &T) {
        self.lock().failures.remove(item);
    }

    pub fn num_requeues(&self, item: &T) -> u32 {
        self.lock().failures.get(item).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops handing out items. Pending and future `get` calls return `None`;
    /// items already in flight may still be released with `done`.
    pub fn shut_down(&self) {
        self.lock().shutting_down = true;
        self.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }
}
