//! One installed version of the request cache.
//!
//! Lifecycle: `Installing → Activating → Active → Superseded`. A worker whose
//! install finished but that has not activated yet stays in `Installing` with
//! `is_installed()` true; this is the "waiting" worker. Transitions out of
//! order are rejected with `OffnoteError::Lifecycle`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::clients::{ClientHub, ClientNotification};
use super::clock::Clock;
use super::fetch::{fetch_with_timeout, Fetcher};
use super::policy::PolicyContext;
use super::settings::CacheSettings;
use super::store::CacheStorage;
use super::types::{Request, Served};
use crate::error::{OffnoteError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Activating,
    Active,
    Superseded,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkerState::Installing => "installing",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Superseded => "superseded",
        };
        f.write_str(name)
    }
}

/// What an activation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub generation: String,
    /// Pages placed under this worker's control
    pub claimed: usize,
    /// Generations deleted because they were not this worker's
    pub purged: Vec<String>,
    /// Pages that received `CACHE_UPDATED`
    pub notified: usize,
}

pub struct CacheWorker {
    generation: String,
    state: Mutex<WorkerState>,
    installed: AtomicBool,
    skip_waiting: AtomicBool,
    writable: AtomicBool,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    settings: Arc<CacheSettings>,
}

impl std::fmt::Debug for CacheWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheWorker")
            .field("generation", &self.generation)
            .field("state", &self.state())
            .field("installed", &self.is_installed())
            .finish()
    }
}

impl CacheWorker {
    /// Create a worker with a generation id derived from the current time.
    /// The id is bumped until it does not collide with an existing generation.
    pub async fn create(
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
        settings: Arc<CacheSettings>,
    ) -> Result<Self> {
        let existing = storage.keys().await?;
        let mut millis = clock.now().timestamp_millis();
        let mut generation = settings.generation_id(millis);
        while existing.contains(&generation) {
            millis += 1;
            generation = settings.generation_id(millis);
        }
        Ok(Self::with_generation(
            generation, storage, fetcher, clock, settings,
        ))
    }

    /// Create a worker for an already-populated generation, ready to activate.
    pub fn installed(
        generation: String,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
        settings: Arc<CacheSettings>,
    ) -> Self {
        let worker = Self::with_generation(generation, storage, fetcher, clock, settings);
        worker.installed.store(true, Ordering::SeqCst);
        worker
    }

    fn with_generation(
        generation: String,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
        settings: Arc<CacheSettings>,
    ) -> Self {
        Self {
            generation,
            state: Mutex::new(WorkerState::Installing),
            installed: AtomicBool::new(false),
            skip_waiting: AtomicBool::new(false),
            writable: AtomicBool::new(false),
            storage,
            fetcher,
            clock,
            settings,
        }
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub fn state(&self) -> WorkerState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    /// Installed but not yet activated.
    pub fn is_waiting(&self) -> bool {
        self.is_installed() && self.state() == WorkerState::Installing
    }

    /// Ask to activate without waiting for pages to go away.
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn wants_skip_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Move `from → to`, or fail without changing state.
    fn transition(&self, from: WorkerState, to: WorkerState) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| OffnoteError::Lifecycle("worker state poisoned".to_string()))?;
        if *state != from {
            return Err(OffnoteError::Lifecycle(format!(
                "{}: cannot go from {} to {} (expected {})",
                self.generation, *state, to, from
            )));
        }
        *state = to;
        Ok(())
    }

    /// Pre-cache the application shell into this worker's generation.
    ///
    /// All or nothing: if any shell resource fails to fetch or answers with a
    /// non-success status, the partially written generation is deleted and the
    /// error returned. The worker then stays uninstalled.
    pub async fn install(&self) -> Result<()> {
        if self.state() != WorkerState::Installing || self.is_installed() {
            return Err(OffnoteError::Lifecycle(format!(
                "{}: install called twice or after activation",
                self.generation
            )));
        }

        if let Err(err) = self.seed_shell().await {
            warn!(generation = %self.generation, error = %err, "install failed, discarding generation");
            if let Err(cleanup) = self.storage.delete(&self.generation).await {
                warn!(generation = %self.generation, error = %cleanup, "failed to discard generation");
            }
            return Err(err);
        }

        self.installed.store(true, Ordering::SeqCst);
        if self.settings.skip_waiting_on_install {
            self.skip_waiting();
        }
        info!(generation = %self.generation, resources = self.settings.shell.len(), "installed");
        Ok(())
    }

    async fn seed_shell(&self) -> Result<()> {
        self.storage.open(&self.generation).await?;
        for url in &self.settings.shell {
            let request = Request::get(url.as_str());
            let response =
                fetch_with_timeout(self.fetcher.as_ref(), &request, self.settings.network_timeout)
                    .await?;
            if !response.status.is_success() {
                return Err(OffnoteError::Network(format!(
                    "{} answered {}",
                    url, response.status
                )));
            }
            self.storage
                .put(&self.generation, &request.key(), &response)
                .await?;
        }
        Ok(())
    }

    /// Take control: claim all pages and purge every other generation
    /// concurrently, then announce the new generation.
    ///
    /// If any step fails the worker drops back to installed, so the same
    /// worker can be activated again.
    pub async fn activate(&self, clients: &ClientHub) -> Result<ActivationReport> {
        if !self.is_installed() {
            return Err(OffnoteError::Lifecycle(format!(
                "{}: cannot activate before install completes",
                self.generation
            )));
        }
        self.transition(WorkerState::Installing, WorkerState::Activating)?;

        match self.take_control(clients).await {
            Ok(report) => Ok(report),
            Err(err) => {
                warn!(generation = %self.generation, error = %err, "activation failed, still installed");
                self.transition(WorkerState::Activating, WorkerState::Installing)?;
                Err(err)
            }
        }
    }

    async fn take_control(&self, clients: &ClientHub) -> Result<ActivationReport> {
        let (claimed, purged) = tokio::join!(
            async { clients.claim(&self.generation) },
            self.purge_other_generations()
        );
        let claimed = claimed?;
        let purged = purged?;

        let notified = clients.broadcast(&ClientNotification::CacheUpdated {
            generation_id: self.generation.clone(),
        })?;

        self.transition(WorkerState::Activating, WorkerState::Active)?;
        self.writable.store(true, Ordering::SeqCst);
        info!(
            generation = %self.generation,
            claimed,
            purged = purged.len(),
            "activated"
        );
        Ok(ActivationReport {
            generation: self.generation.clone(),
            claimed,
            purged,
            notified,
        })
    }

    async fn purge_other_generations(&self) -> Result<Vec<String>> {
        let stale: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|name| *name != self.generation)
            .collect();

        let results = join_all(stale.iter().map(|name| self.storage.delete(name))).await;
        for result in results {
            result?;
        }
        debug!(generation = %self.generation, purged = ?stale, "purged stale generations");
        Ok(stale)
    }

    /// A newer worker took over.
    pub fn supersede(&self) {
        self.writable.store(false, Ordering::SeqCst);
        if let Ok(mut state) = self.state.lock() {
            *state = WorkerState::Superseded;
        }
        debug!(generation = %self.generation, "superseded");
    }

    /// Answer an intercepted request. Only an active worker serves requests.
    pub async fn handle_fetch(&self, request: &Request) -> Result<Served> {
        let state = self.state();
        if state != WorkerState::Active {
            return Err(OffnoteError::Lifecycle(format!(
                "{}: {} worker cannot serve requests",
                self.generation, state
            )));
        }

        let ctx = PolicyContext {
            generation: &self.generation,
            storage: self.storage.as_ref(),
            fetcher: self.fetcher.as_ref(),
            clock: self.clock.as_ref(),
            settings: &self.settings,
            writable: &self.writable,
        };
        ctx.respond(request).await
    }
}
