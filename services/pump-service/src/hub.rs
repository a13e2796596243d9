//! Execution contexts sharing one backend.
//!
//! Each context plays the part of a browser tab: it owns its own controller
//! and only learns about writes from its peers through delivered change
//! events, or through the reconciliation tick when a delivery was missed.

use pp_core::{Controller, ControllerConfig, Surface, surface::SurfaceResult};
use pp_storage::KeyValueStore;
use pp_types::{ChangeEvent, ModeSnapshot};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

pub(crate) type SharedStore = Arc<dyn KeyValueStore>;
pub(crate) type ContextController = Controller<SharedStore, MessageLog>;

/// Surface for headless contexts: keeps user-facing messages until a client
/// collects them and tracks whether the duration picker is open.
#[derive(Debug, Default)]
pub(crate) struct MessageLog {
    messages: Vec<String>,
    picker_open: bool,
}

impl MessageLog {
    pub(crate) fn drain_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }

    pub(crate) fn picker_open(&self) -> bool {
        self.picker_open
    }
}

impl Surface for MessageLog {
    fn show_message(&mut self, message: &str) -> SurfaceResult {
        self.messages.push(message.to_owned());
        Ok(())
    }

    fn open_exercise_picker(&mut self, _default_minutes: u32) -> SurfaceResult {
        self.picker_open = true;
        Ok(())
    }

    fn close_exercise_picker(&mut self) -> SurfaceResult {
        self.picker_open = false;
        Ok(())
    }
}

pub(crate) struct ContextHub {
    store: SharedStore,
    config: ControllerConfig,
    contexts: RwLock<HashMap<Uuid, Arc<Mutex<ContextController>>>>,
}

impl ContextHub {
    pub(crate) fn new(store: SharedStore, config: ControllerConfig) -> Self {
        Self {
            store,
            config,
            contexts: RwLock::new(HashMap::new()),
        }
    }

    /// Opens and loads a new context.
    pub(crate) async fn create(self: &Arc<Self>) -> (Uuid, ModeSnapshot) {
        let id = Uuid::new_v4();
        let mut controller = Controller::new(
            Arc::clone(&self.store),
            MessageLog::default(),
            self.config.clone(),
        );
        controller.load();
        let snapshot = controller.snapshot();
        let outbox = controller.take_outbox();

        self.contexts
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(controller)));
        info!(%id, "context opened");
        self.spawn_broadcast(id, outbox).await;
        (id, snapshot)
    }

    pub(crate) async fn close(&self, id: Uuid) -> bool {
        let removed = self.contexts.write().await.remove(&id).is_some();
        if removed {
            info!(%id, "context closed");
        }
        removed
    }

    pub(crate) async fn len(&self) -> usize {
        self.contexts.read().await.len()
    }

    /// Runs `op` against one context, then hands whatever it committed to
    /// the others. Returns `None` for an unknown context.
    pub(crate) async fn with_context<T>(
        self: &Arc<Self>,
        id: Uuid,
        op: impl FnOnce(&mut ContextController) -> T,
    ) -> Option<T> {
        let context = self.contexts.read().await.get(&id).cloned()?;
        let (value, outbox) = {
            let mut controller = context.lock().await;
            let value = op(&mut controller);
            (value, controller.take_outbox())
        };
        self.spawn_broadcast(id, outbox).await;
        Some(value)
    }

    /// Cross-context delivery happens off the caller's task.
    pub(crate) async fn spawn_broadcast(self: &Arc<Self>, origin: Uuid, events: Vec<ChangeEvent>) {
        if events.is_empty() || self.len().await < 2 {
            return;
        }
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            hub.broadcast(origin, events).await;
        });
    }

    /// Delivers `events` to every context except `origin`. Writes made by the
    /// receivers while settling are delivered onwards in turn.
    pub(crate) async fn broadcast(&self, origin: Uuid, events: Vec<ChangeEvent>) {
        let mut work = VecDeque::from([(origin, events)]);
        while let Some((from, events)) = work.pop_front() {
            for (id, context) in self.peers().await {
                if id == from {
                    continue;
                }
                let mut controller = context.lock().await;
                for event in &events {
                    controller.apply_remote(event.clone());
                }
                let reactions = controller.take_outbox();
                if !reactions.is_empty() {
                    debug!(%id, count = reactions.len(), "context reacted to remote changes");
                    work.push_back((id, reactions));
                }
            }
        }
    }

    /// One reconciliation pass over every context.
    pub(crate) async fn reconcile_all(&self) {
        for (id, context) in self.peers().await {
            let outbox = {
                let mut controller = context.lock().await;
                controller.reconcile();
                controller.take_outbox()
            };
            if !outbox.is_empty() {
                info!(%id, count = outbox.len(), "reconciliation corrected shared state");
                self.broadcast(id, outbox).await;
            }
        }
    }

    pub(crate) fn spawn_reconciler(self: &Arc<Self>) -> JoinHandle<()> {
        let hub = Arc::clone(self);
        let period = Duration::from_millis(self.config.reconcile_interval_ms);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                hub.reconcile_all().await;
            }
        })
    }

    async fn peers(&self) -> Vec<(Uuid, Arc<Mutex<ContextController>>)> {
        self.contexts
            .read()
            .await
            .iter()
            .map(|(id, context)| (*id, Arc::clone(context)))
            .collect()
    }
}
