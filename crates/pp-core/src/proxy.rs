//! Key-value store proxy.
//!
//! The only writer of the shared store. A write whose stored form already
//! matches is dropped without notification; every real change is handed to
//! local observers, queued for the current settle cycle and kept in the outbox
//! for delivery to other contexts.
//!
//! Settling is driven from outside (see [`crate::Controller`]): while a cycle is
//! active, writes made by reactors still reach the backend but only append to
//! the running queue instead of opening a cycle of their own.

use pp_rules::{Admission, StoreView, WritePolicy};
use pp_storage::KeyValueStore;
use pp_types::{ChangeEvent, WriteOutcome, is_true};
use std::collections::VecDeque;
use tracing::{debug, warn};

pub type SubscriptionId = u64;

type Observer = Box<dyn FnMut(&ChangeEvent) + Send>;

pub struct StoreProxy<S> {
    backend: S,
    policies: Vec<Box<dyn WritePolicy>>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: SubscriptionId,
    pending: VecDeque<ChangeEvent>,
    outbox: Vec<ChangeEvent>,
    settling: bool,
    notifications: u64,
}

impl<S: KeyValueStore> StoreProxy<S> {
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            policies: Vec::new(),
            observers: Vec::new(),
            next_subscription: 1,
            pending: VecDeque::new(),
            outbox: Vec::new(),
            settling: false,
            notifications: 0,
        }
    }

    pub fn with_policy(mut self, policy: impl WritePolicy + 'static) -> Self {
        self.policies.push(Box::new(policy));
        self
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(err) => {
                warn!("store read of {} failed: {}", key, err);
                None
            }
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        is_true(self.get(key).as_deref())
    }

    pub fn write(&mut self, key: &str, value: &str) -> WriteOutcome {
        let mut value = value;
        let mut coerced = false;
        let view: &dyn StoreView = &*self;
        for policy in &self.policies {
            if let Admission::Coerce { value: forced, rule } = policy.admit(view, key, value) {
                debug!(?rule, "write of {}={} coerced to {}", key, value, forced);
                value = forced;
                coerced = true;
            }
        }

        let old_value = self.get(key);
        if old_value.as_deref() == Some(value) {
            debug!("redundant write of {}={} suppressed", key, value);
            return if coerced {
                WriteOutcome::Coerced
            } else {
                WriteOutcome::Unchanged
            };
        }

        if let Err(err) = self.backend.set(key, value) {
            warn!("store write of {}={} failed: {}", key, value, err);
            return WriteOutcome::Failed;
        }

        self.commit(ChangeEvent::new(key, old_value, Some(value.to_owned())));
        if coerced {
            WriteOutcome::Coerced
        } else {
            WriteOutcome::Committed
        }
    }

    pub fn remove(&mut self, key: &str) -> WriteOutcome {
        let Some(old_value) = self.get(key) else {
            return WriteOutcome::Unchanged;
        };

        if let Err(err) = self.backend.remove(key) {
            warn!("store removal of {} failed: {}", key, err);
            return WriteOutcome::Failed;
        }

        self.commit(ChangeEvent::new(key, Some(old_value), None));
        WriteOutcome::Committed
    }

    /// Writes without notifying anyone. Reserved for first-load defaults.
    pub fn direct_write(&self, key: &str, value: &str) {
        if let Err(err) = self.backend.set(key, value) {
            warn!("direct write of {}={} failed: {}", key, value, err);
        }
    }

    pub fn direct_remove(&self, key: &str) {
        if let Err(err) = self.backend.remove(key) {
            warn!("direct removal of {} failed: {}", key, err);
        }
    }

    /// Seeds `key` with `value` if it has never been set. Returns whether it did.
    pub fn ensure_default(&self, key: &str, value: &str) -> bool {
        if self.get(key).is_some() {
            return false;
        }
        self.direct_write(key, value);
        true
    }

    /// Feeds a change committed by another context into this one.
    pub fn observe_remote(&mut self, event: ChangeEvent) {
        self.notify(&event);
        self.pending.push_back(event);
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&ChangeEvent) + Send + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        before != self.observers.len()
    }

    /// Opens a settle cycle. Returns `false` if one is already running.
    pub fn begin_settle(&mut self) -> bool {
        if self.settling {
            return false;
        }
        self.settling = true;
        true
    }

    pub fn end_settle(&mut self) {
        self.settling = false;
    }

    pub fn is_settling(&self) -> bool {
        self.settling
    }

    pub fn next_pending(&mut self) -> Option<ChangeEvent> {
        self.pending.pop_front()
    }

    pub fn discard_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    /// Changes committed here since the last call, oldest first.
    pub fn take_outbox(&mut self) -> Vec<ChangeEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Count of change notifications delivered so far.
    pub fn notifications(&self) -> u64 {
        self.notifications
    }

    fn commit(&mut self, event: ChangeEvent) {
        self.notify(&event);
        self.outbox.push(event.clone());
        self.pending.push_back(event);
    }

    fn notify(&mut self, event: &ChangeEvent) {
        self.notifications += 1;
        for (_, observer) in self.observers.iter_mut() {
            observer(event);
        }
    }
}

impl<S: KeyValueStore> StoreView for StoreProxy<S> {
    fn value(&self, key: &str) -> Option<String> {
        self.get(key)
    }
}
