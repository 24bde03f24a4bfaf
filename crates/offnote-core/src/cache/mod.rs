//! Request cache: intercepts page requests and answers them from the network
//! or from a versioned local cache.
//!
//! Each installed version of the cache is a `CacheWorker` owning one
//! generation in `CacheStorage`. A `Registration` keeps the active worker and
//! at most one waiting worker, routes fetches to the active one and processes
//! page messages. Activating a worker deletes every other generation, so at
//! steady state exactly one generation exists.

pub mod clients;
pub mod clock;
pub mod fetch;
pub mod policy;
pub mod registration;
pub mod settings;
pub mod sqlite;
pub mod store;
pub mod types;
pub mod worker;

pub use clients::{ClientCommand, ClientHandle, ClientHub, ClientId, ClientNotification};
pub use clock::{Clock, ManualClock, SystemClock};
pub use fetch::{fetch_with_timeout, Fetcher, HttpFetcher};
pub use policy::PolicyContext;
pub use registration::{
    InstallOutcome, MessageOutcome, Registration, RegistrationHandle, WorkerEvent,
};
pub use settings::{CacheSettings, GENERATION_PREFIX};
pub use sqlite::SqliteCacheStorage;
pub use store::{CacheStorage, MemoryCacheStorage};
pub use types::{http_date, Destination, Request, RequestKey, Response, Served, ServedFrom};
pub use worker::{ActivationReport, CacheWorker, WorkerState};
