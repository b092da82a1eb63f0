//! Manager - in-process reconciliation engine
//!
//! Each binding gets its own controller loop:
//!
//! ```text
//! MemoryClient ──watch──► forwarder ──add──► WorkQueue ──get──► workers ──► Controller::reconcile
//!                                              ▲                   │
//!                                              └── requeue/backoff ┘
//! ```
//!
//! Reconcile calls run on the blocking pool, at most `workers` at a time per
//! binding, and never twice concurrently for the same key.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use kubeplug_api::{
    Client, NullRecorder, ObjectKey, ReconcileContext, ReconcileRequest, Recorder, ResourceKind,
};

use super::backoff::BackoffPolicy;
use super::queue::WorkQueue;
use super::stats::EngineStats;
use super::{Binding, ReconcileEngine};
use crate::client::{MemoryClient, WatchEvent};
use crate::plugins::BindError;

/// Configuration for Manager
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Concurrent reconciles per binding
    pub workers: usize,
    /// Retry schedule for failed reconciles
    pub backoff: BackoffPolicy,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Errors from running the manager
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Manager already started")]
    AlreadyStarted,

    #[error("Controller loop failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// State shared by every controller loop
struct Shared {
    config: ManagerConfig,
    client: Arc<MemoryClient>,
    recorder: Arc<dyn Recorder>,
    stats: Arc<EngineStats>,
}

/// Watches the in-memory store and drives bound controllers
pub struct Manager {
    shared: Arc<Shared>,
    bindings: Mutex<Vec<Binding>>,
    started: AtomicBool,
}

impl Manager {
    pub fn new(client: Arc<MemoryClient>, config: ManagerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                client,
                recorder: Arc::new(NullRecorder),
                stats: Arc::new(EngineStats::new()),
            }),
            bindings: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Route controller log lines to `recorder`
    pub fn with_recorder(self, recorder: Arc<dyn Recorder>) -> Self {
        let shared = Shared {
            config: self.shared.config.clone(),
            client: Arc::clone(&self.shared.client),
            recorder,
            stats: Arc::clone(&self.shared.stats),
        };
        Self {
            shared: Arc::new(shared),
            ..self
        }
    }

    pub fn client(&self) -> &Arc<MemoryClient> {
        &self.shared.client
    }

    pub fn stats(&self) -> Arc<EngineStats> {
        Arc::clone(&self.shared.stats)
    }

    /// Whether [`Manager::start`] has been called
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Registered watches as (controller, kind) pairs
    pub fn watches(&self) -> Vec<(String, ResourceKind)> {
        self.bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|b| (b.controller_name.clone(), b.kind.clone()))
            .collect()
    }

    /// Run every bound controller until `shutdown` fires.
    ///
    /// Returns after in-flight reconciles have finished.
    pub async fn start(&self, shutdown: CancellationToken) -> Result<(), ManagerError> {
        let bindings = {
            let bindings = self.bindings.lock().unwrap_or_else(PoisonError::into_inner);
            if self.started.swap(true, Ordering::SeqCst) {
                return Err(ManagerError::AlreadyStarted);
            }
            bindings.clone()
        };

        if bindings.is_empty() {
            tracing::info!("Manager started with no controllers bound");
        } else {
            tracing::info!(controllers = bindings.len(), "Manager started");
        }

        let mut loops = JoinSet::new();
        for binding in bindings {
            let shared = Arc::clone(&self.shared);
            let shutdown = shutdown.clone();
            loops.spawn(run_controller(binding, shared, shutdown));
        }

        shutdown.cancelled().await;
        tracing::info!("Manager shutting down");

        while let Some(result) = loops.join_next().await {
            result?;
        }

        tracing::info!("Manager stopped");
        Ok(())
    }
}

impl ReconcileEngine for Manager {
    fn watch(&self, binding: Binding) -> Result<(), BindError> {
        let mut bindings = self.bindings.lock().unwrap_or_else(PoisonError::into_inner);

        if self.started.load(Ordering::SeqCst) {
            return Err(BindError::EngineStarted {
                controller: binding.controller_name,
            });
        }

        let duplicate = bindings
            .iter()
            .any(|b| b.controller_name == binding.controller_name && b.kind == binding.kind);
        if duplicate {
            return Err(BindError::DuplicateWatch {
                controller: binding.controller_name,
                kind: binding.kind,
            });
        }

        tracing::debug!(
            controller = %binding.controller_name,
            kind = %binding.kind,
            "Watch registered"
        );
        bindings.push(binding);
        self.shared.stats.watch_added();
        Ok(())
    }
}

/// Controller loop for one binding
async fn run_controller(binding: Binding, shared: Arc<Shared>, shutdown: CancellationToken) {
    let binding = Arc::new(binding);
    let queue: Arc<WorkQueue<ObjectKey>> = Arc::new(WorkQueue::new());

    // Subscribe before listing so no change falls between the two
    let events = shared.client.subscribe();
    enqueue_all(&shared.client, &binding.kind, &queue);

    let forwarder = tokio::spawn(forward_events(
        events,
        binding.kind.clone(),
        Arc::clone(&shared.client),
        Arc::clone(&queue),
        shutdown.clone(),
    ));

    let permits = Arc::new(Semaphore::new(shared.config.workers.max(1)));
    let mut in_flight = JoinSet::new();

    loop {
        let permit = tokio::select! {
            _ = shutdown.cancelled() => break,
            permit = Arc::clone(&permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let key = tokio::select! {
            _ = shutdown.cancelled() => break,
            key = queue.get() => match key {
                Some(key) => key,
                None => break,
            },
        };

        let binding = Arc::clone(&binding);
        let shared = Arc::clone(&shared);
        let queue = Arc::clone(&queue);
        let token = shutdown.child_token();
        in_flight.spawn(async move {
            reconcile_key(&binding, &shared, &queue, key, token).await;
            drop(permit);
        });

        while in_flight.try_join_next().is_some() {}
    }

    queue.shut_down();
    forwarder.abort();

    // Drain in-flight reconciles
    while in_flight.join_next().await.is_some() {}

    tracing::debug!(controller = %binding.controller_name, "Controller loop stopped");
}

/// Queue every existing object of `kind`
fn enqueue_all(client: &MemoryClient, kind: &ResourceKind, queue: &WorkQueue<ObjectKey>) {
    match client.list(kind, None) {
        Ok(objects) => {
            for object in objects {
                queue.add(object.key);
            }
        }
        Err(e) => tracing::warn!(kind = %kind, error = %e, "Failed to list objects"),
    }
}

/// Feed store changes for `kind` into `queue`
async fn forward_events(
    mut events: broadcast::Receiver<WatchEvent>,
    kind: ResourceKind,
    client: Arc<MemoryClient>,
    queue: Arc<WorkQueue<ObjectKey>>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Ok(event) if event.kind == kind => queue.add(event.key),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(kind = %kind, skipped, "Watch lagged, relisting");
                enqueue_all(&client, &kind, &queue);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Reconcile one key and schedule whatever comes next for it
async fn reconcile_key(
    binding: &Binding,
    shared: &Shared,
    queue: &Arc<WorkQueue<ObjectKey>>,
    key: ObjectKey,
    token: CancellationToken,
) {
    let attempt = queue.failures(&key);
    let ctx = ReconcileContext::new(&binding.controller_name, Arc::clone(&shared.recorder))
        .with_attempt(attempt)
        .with_cancellation(token);
    let request = ReconcileRequest::new(key.clone());
    let controller = Arc::clone(&binding.controller);

    shared.stats.reconcile_started();
    let outcome =
        tokio::task::spawn_blocking(move || controller.reconcile(&ctx, &request)).await;

    match outcome {
        Ok(Ok(action)) => {
            shared.stats.reconcile_succeeded();
            queue.forget(&key);
            if let Some(delay) = action.requeue_after() {
                shared.stats.requeued();
                queue.add_after(key.clone(), delay);
            }
        }
        Ok(Err(e)) => {
            shared.stats.reconcile_failed();
            let failures = queue.record_failure(&key);
            let delay = shared.config.backoff.delay(failures);
            tracing::warn!(
                controller = %binding.controller_name,
                kind = %binding.kind,
                key = %key,
                error = %e,
                retry_in = ?delay,
                "Reconcile failed"
            );
            shared.stats.requeued();
            queue.add_after(key.clone(), delay);
        }
        Err(join_error) => {
            shared.stats.reconcile_panicked();
            let failures = queue.record_failure(&key);
            let delay = shared.config.backoff.delay(failures);
            tracing::error!(
                controller = %binding.controller_name,
                kind = %binding.kind,
                key = %key,
                error = %join_error,
                retry_in = ?delay,
                "Reconcile panicked"
            );
            shared.stats.requeued();
            queue.add_after(key.clone(), delay);
        }
    }

    queue.done(&key);
}
