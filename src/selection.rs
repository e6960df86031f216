//! The currently selected asset and the callbacks watching it.
//!
//! One notifier is owned by each [`Project`](crate::project::Project) and
//! handed by reference to whatever needs to follow the selection. Callbacks
//! run synchronously on the thread that changed the selection, and only when
//! the value actually changes. A callback must not call back into the
//! notifier it is registered with.

use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type SelectionCallback = Box<dyn Fn(Option<Uuid>) + Send>;

#[derive(Default)]
struct State {
    selection: Option<Uuid>,
    next_id: u64,
    subscribers: Vec<(SubscriptionId, SelectionCallback)>,
}

#[derive(Default)]
pub struct SelectionNotifier {
    state: Mutex<State>,
}

impl SelectionNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> Option<Uuid> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .selection
    }

    /// Change the selection, notifying subscribers if it differs from the
    /// current one. Returns whether it changed.
    pub fn select(&self, asset: Option<Uuid>) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.selection == asset {
            return false;
        }
        state.selection = asset;
        for (_, callback) in &state.subscribers {
            callback(asset);
        }
        true
    }

    pub fn subscribe(&self, callback: impl Fn(Option<Uuid>) + Send + 'static) -> SubscriptionId {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        state.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Returns whether `id` was subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let before = state.subscribers.len();
        state.subscribers.retain(|(sub, _)| *sub != id);
        state.subscribers.len() != before
    }
}
