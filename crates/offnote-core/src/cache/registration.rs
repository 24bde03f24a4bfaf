//! Owns the active and waiting workers and drives them from an event loop.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::clients::{ClientCommand, ClientHub};
use super::clock::Clock;
use super::fetch::Fetcher;
use super::policy::PolicyContext;
use super::settings::CacheSettings;
use super::store::CacheStorage;
use super::types::{Request, Served};
use super::worker::{ActivationReport, CacheWorker, WorkerState};
use crate::error::{OffnoteError, Result};

/// Result of installing a new worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The new worker took control immediately.
    Activated(ActivationReport),
    /// The new worker is installed and waiting for the current one to retire.
    Waiting { generation: String },
}

/// Result of handling a page message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    Activated(ActivationReport),
    /// `SKIP_WAITING` with no worker waiting
    NothingWaiting,
    /// `CLEAR_CACHE`: the generations that were deleted
    Cleared(Vec<String>),
}

/// Inputs to `Registration::run`.
#[derive(Debug)]
pub enum WorkerEvent {
    Install {
        reply: oneshot::Sender<Result<InstallOutcome>>,
    },
    Fetch {
        request: Request,
        reply: oneshot::Sender<Result<Served>>,
    },
    Message {
        command: ClientCommand,
        reply: oneshot::Sender<Result<MessageOutcome>>,
    },
}

pub struct Registration {
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    settings: Arc<CacheSettings>,
    clients: ClientHub,
    active: Mutex<Option<Arc<CacheWorker>>>,
    waiting: Mutex<Option<Arc<CacheWorker>>>,
}

fn lock_slot(
    slot: &Mutex<Option<Arc<CacheWorker>>>,
) -> Result<MutexGuard<'_, Option<Arc<CacheWorker>>>> {
    slot.lock()
        .map_err(|_| OffnoteError::Lifecycle("worker slot poisoned".to_string()))
}

impl Registration {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
        settings: CacheSettings,
    ) -> Self {
        Self {
            storage,
            fetcher,
            clock,
            settings: Arc::new(settings),
            clients: ClientHub::new(),
            active: Mutex::new(None),
            waiting: Mutex::new(None),
        }
    }

    pub fn clients(&self) -> &ClientHub {
        &self.clients
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn active(&self) -> Result<Option<Arc<CacheWorker>>> {
        Ok(lock_slot(&self.active)?.clone())
    }

    pub fn waiting(&self) -> Result<Option<Arc<CacheWorker>>> {
        Ok(lock_slot(&self.waiting)?.clone())
    }

    /// All generations currently in storage, oldest first.
    pub async fn generations(&self) -> Result<Vec<String>> {
        self.storage.keys().await
    }

    /// Re-attach to generations left behind by a previous run.
    ///
    /// With no pages open, a worker left waiting by that run takes over now:
    /// the newest of our generations is activated and the rest are purged.
    pub async fn resume(&self) -> Result<Option<ActivationReport>> {
        if self.active()?.is_some() {
            return Ok(None);
        }
        let newest = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter_map(|name| {
                let millis = self.settings.generation_millis(&name)?;
                Some((millis, name))
            })
            .max();
        let Some((_, generation)) = newest else {
            return Ok(None);
        };

        debug!(generation = %generation, "resuming existing generation");
        let worker = Arc::new(CacheWorker::installed(
            generation,
            Arc::clone(&self.storage),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.clock),
            Arc::clone(&self.settings),
        ));
        self.promote(worker).await.map(Some)
    }

    /// Install a new worker version.
    ///
    /// It activates immediately when nothing is active or it asked to skip
    /// waiting; otherwise it waits. A previously waiting worker is replaced and
    /// its generation discarded.
    pub async fn install(&self) -> Result<InstallOutcome> {
        let worker = Arc::new(
            CacheWorker::create(
                Arc::clone(&self.storage),
                Arc::clone(&self.fetcher),
                Arc::clone(&self.clock),
                Arc::clone(&self.settings),
            )
            .await?,
        );
        worker.install().await?;

        if self.active()?.is_none() || worker.wants_skip_waiting() {
            return self
                .promote_or_park(worker)
                .await
                .map(InstallOutcome::Activated);
        }

        let generation = worker.generation().to_string();
        let replaced = lock_slot(&self.waiting)?.replace(worker);
        if let Some(old) = replaced {
            old.supersede();
            self.storage.delete(old.generation()).await?;
        }
        info!(generation = %generation, "installed, waiting for activation");
        Ok(InstallOutcome::Waiting { generation })
    }

    /// Activate `worker` and retire whatever was active before.
    async fn promote(&self, worker: Arc<CacheWorker>) -> Result<ActivationReport> {
        let report = worker.activate(&self.clients).await?;

        let previous = lock_slot(&self.active)?.replace(Arc::clone(&worker));
        if let Some(previous) = previous {
            previous.supersede();
        }
        // activation purged every other generation, including a waiting one's
        let waiting = lock_slot(&self.waiting)?.take();
        if let Some(waiting) = waiting {
            if waiting.generation() != worker.generation() {
                waiting.supersede();
            }
        }
        Ok(report)
    }

    /// Promote `worker`; if activation fails, leave it waiting so a later
    /// `SKIP_WAITING` can retry.
    async fn promote_or_park(&self, worker: Arc<CacheWorker>) -> Result<ActivationReport> {
        match self.promote(Arc::clone(&worker)).await {
            Ok(report) => Ok(report),
            Err(err) => {
                if worker.is_installed() && worker.state() == WorkerState::Installing {
                    let mut waiting = lock_slot(&self.waiting)?;
                    if waiting.is_none() {
                        debug!(generation = %worker.generation(), "activation failed, worker left waiting");
                        *waiting = Some(worker);
                    }
                }
                Err(err)
            }
        }
    }

    /// Handle a message posted by a page.
    pub async fn message(&self, command: ClientCommand) -> Result<MessageOutcome> {
        match command {
            ClientCommand::SkipWaiting => {
                let waiting = lock_slot(&self.waiting)?.take();
                match waiting {
                    Some(worker) => {
                        worker.skip_waiting();
                        self.promote_or_park(worker)
                            .await
                            .map(MessageOutcome::Activated)
                    }
                    None => Ok(MessageOutcome::NothingWaiting),
                }
            }
            ClientCommand::ClearCache => {
                let mut cleared = Vec::new();
                for generation in self.storage.keys().await? {
                    if self.storage.delete(&generation).await? {
                        cleared.push(generation);
                    }
                }
                info!(count = cleared.len(), "cleared all cache generations");
                Ok(MessageOutcome::Cleared(cleared))
            }
        }
    }

    /// Answer an intercepted request through the active worker. Without one,
    /// requests go straight to the network.
    pub async fn fetch(&self, request: &Request) -> Result<Served> {
        match self.active()? {
            Some(worker) => worker.handle_fetch(request).await,
            None => {
                let no_writes = std::sync::atomic::AtomicBool::new(false);
                let ctx = PolicyContext {
                    generation: "",
                    storage: self.storage.as_ref(),
                    fetcher: self.fetcher.as_ref(),
                    clock: self.clock.as_ref(),
                    settings: &self.settings,
                    writable: &no_writes,
                };
                ctx.pass_through(request).await
            }
        }
    }

    /// Process events until every sender is dropped.
    ///
    /// Install and message events are handled one at a time in arrival order.
    /// Fetches are spawned so slow network requests never block lifecycle
    /// events or each other.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<WorkerEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                WorkerEvent::Install { reply } => {
                    let _ = reply.send(self.install().await);
                }
                WorkerEvent::Fetch { request, reply } => {
                    let registration = Arc::clone(&self);
                    tokio::spawn(async move {
                        let _ = reply.send(registration.fetch(&request).await);
                    });
                }
                WorkerEvent::Message { command, reply } => {
                    let _ = reply.send(self.message(command).await);
                }
            }
        }
        debug!("worker event loop stopped");
    }

    /// Spawn the event loop and return a handle for sending it events.
    pub fn spawn(self: Arc<Self>, capacity: usize) -> RegistrationHandle {
        let (sender, receiver) = mpsc::channel(capacity);
        tokio::spawn(self.run(receiver));
        RegistrationHandle { sender }
    }
}

/// Cloneable sender side of a running `Registration`.
#[derive(Clone)]
pub struct RegistrationHandle {
    sender: mpsc::Sender<WorkerEvent>,
}

impl RegistrationHandle {
    pub async fn install(&self) -> Result<InstallOutcome> {
        let (reply, response) = oneshot::channel();
        self.send(WorkerEvent::Install { reply }).await?;
        Self::wait(response).await
    }

    pub async fn fetch(&self, request: Request) -> Result<Served> {
        let (reply, response) = oneshot::channel();
        self.send(WorkerEvent::Fetch { request, reply }).await?;
        Self::wait(response).await
    }

    pub async fn post(&self, command: ClientCommand) -> Result<MessageOutcome> {
        let (reply, response) = oneshot::channel();
        self.send(WorkerEvent::Message { command, reply }).await?;
        Self::wait(response).await
    }

    async fn send(&self, event: WorkerEvent) -> Result<()> {
        self.sender.send(event).await.map_err(|_| {
            warn!("worker event loop is gone");
            OffnoteError::Lifecycle("worker event loop stopped".to_string())
        })
    }

    async fn wait<T>(response: oneshot::Receiver<Result<T>>) -> Result<T> {
        response
            .await
            .map_err(|_| OffnoteError::Lifecycle("worker dropped the reply".to_string()))?
    }
}
