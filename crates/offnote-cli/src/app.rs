//! Application context for the Offnote CLI.
//!
//! Bundles parsed arguments with the lazily loaded config and resolves the
//! database path and user identity the same way for every command.

use std::cell::OnceCell;
use std::path::PathBuf;
use std::sync::Arc;

use offnote_core::cache::{HttpFetcher, Registration, SqliteCacheStorage, SystemClock};
use offnote_core::{EncryptedMirror, SqliteStore};

use crate::cli::Cli;
use crate::config::{default_config_path, read_config, OffnoteConfig};

const DEFAULT_USER: &str = "local";

pub struct AppContext<'a> {
    cli: &'a Cli,
    config: OnceCell<OffnoteConfig>,
}

impl<'a> AppContext<'a> {
    pub fn new(cli: &'a Cli) -> Self {
        Self {
            cli,
            config: OnceCell::new(),
        }
    }

    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    /// Database path given explicitly on the command line or in the environment.
    pub fn cli_db(&self) -> Option<&str> {
        self.cli.db.as_deref()
    }

    /// Config file path: `--config`/`OFFNOTE_CONFIG`, else the XDG default.
    pub fn config_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = self.cli.config.as_deref() {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        default_config_path()
    }

    /// Loaded config, or built-in defaults when no config file exists.
    pub fn config(&self) -> anyhow::Result<&OffnoteConfig> {
        if let Some(config) = self.config.get() {
            return Ok(config);
        }
        let path = self.config_path()?;
        let config = if path.exists() {
            read_config(&path)?
        } else {
            OffnoteConfig::fallback()?
        };
        Ok(self.config.get_or_init(|| config))
    }

    pub fn db_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = self.cli_db() {
            return Ok(PathBuf::from(path));
        }
        Ok(PathBuf::from(&self.config()?.storage.path))
    }

    pub fn user_id(&self) -> anyhow::Result<String> {
        if let Some(user) = self.cli.user.as_deref() {
            if user.trim().is_empty() {
                return Err(anyhow::anyhow!("--user cannot be empty"));
            }
            return Ok(user.to_string());
        }
        Ok(self
            .config()?
            .storage
            .default_user
            .clone()
            .unwrap_or_else(|| DEFAULT_USER.to_string()))
    }

    pub fn open_mirror(&self) -> anyhow::Result<EncryptedMirror> {
        let store = SqliteStore::open(&self.db_path()?)?;
        Ok(EncryptedMirror::with_store(Arc::new(store)))
    }

    /// Request cache backed by the local database and the real network.
    pub fn open_registration(&self) -> anyhow::Result<Registration> {
        let storage = SqliteCacheStorage::open(&self.db_path()?)?;
        let settings = self.config()?.cache.to_settings()?;
        Ok(Registration::new(
            Arc::new(storage),
            Arc::new(HttpFetcher::new()?),
            Arc::new(SystemClock),
            settings,
        ))
    }
}
