use std::path::{Path, PathBuf};
use std::time::Duration;

use offnote_core::cache::CacheSettings;
use serde::{Deserialize, Serialize};

const DEFAULT_SHELL: &[&str] = &["/", "/index.html", "/manifest.json"];

#[derive(Debug, Serialize, Deserialize)]
pub struct OffnoteConfig {
    pub storage: StorageSection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StorageSection {
    pub path: String,
    /// User identity used when neither --user nor OFFNOTE_USER is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_user: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default = "default_freshness_window_secs")]
    pub freshness_window_secs: u64,
    /// 0 disables the timeout
    #[serde(default = "default_network_timeout_secs")]
    pub network_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,
    /// Base URL that relative shell entries are resolved against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default)]
    pub shell: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct LoggingSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

fn default_freshness_window_secs() -> u64 {
    300
}

fn default_network_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            freshness_window_secs: default_freshness_window_secs(),
            network_timeout_secs: default_network_timeout_secs(),
            skip_waiting_on_install: true,
            origin: None,
            shell: Vec::new(),
        }
    }
}

impl OffnoteConfig {
    pub fn new(db_path: PathBuf, origin: Option<String>) -> Self {
        let shell = if origin.is_some() {
            DEFAULT_SHELL.iter().map(|path| path.to_string()).collect()
        } else {
            Vec::new()
        };
        Self {
            storage: StorageSection {
                path: db_path.to_string_lossy().to_string(),
                default_user: None,
            },
            cache: CacheSection {
                origin,
                shell,
                ..CacheSection::default()
            },
            logging: LoggingSection::default(),
        }
    }

    /// Defaults used when no config file exists.
    pub fn fallback() -> anyhow::Result<Self> {
        Ok(Self::new(default_db_path()?, None))
    }
}

impl CacheSection {
    /// Resolve into core settings. Relative shell entries need `origin`.
    pub fn to_settings(&self) -> anyhow::Result<CacheSettings> {
        let shell = self
            .shell
            .iter()
            .map(|entry| resolve_url(self.origin.as_deref(), entry))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let timeout = match self.network_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Ok(CacheSettings::default()
            .with_shell(shell)
            .with_freshness_window(Duration::from_secs(self.freshness_window_secs))
            .with_network_timeout(timeout)
            .with_skip_waiting_on_install(self.skip_waiting_on_install))
    }
}

/// Absolute URLs pass through; paths are joined onto `origin`.
pub fn resolve_url(origin: Option<&str>, entry: &str) -> anyhow::Result<String> {
    if entry.starts_with("http://") || entry.starts_with("https://") {
        return Ok(entry.to_string());
    }
    let origin = origin.ok_or_else(|| {
        anyhow::anyhow!(
            "Relative URL \"{}\" needs [cache] origin in the config",
            entry
        )
    })?;
    Ok(format!(
        "{}/{}",
        origin.trim_end_matches('/'),
        entry.trim_start_matches('/')
    ))
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn default_db_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_data_dir()?.join("offnote.db"))
}

pub fn read_config(path: &Path) -> anyhow::Result<OffnoteConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

pub fn write_config(path: &Path, config: &OffnoteConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            )
        })?;
    }
    let contents =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {}", e))?;
    std::fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", path.display(), e))?;
    Ok(())
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("offnote"));
        }
    }
    Ok(home_dir()?.join(".config").join("offnote"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("offnote"));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join("offnote"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url(Some("https://notes.test/"), "/index.html").unwrap(),
            "https://notes.test/index.html"
        );
        assert_eq!(
            resolve_url(None, "https://cdn.test/app.js").unwrap(),
            "https://cdn.test/app.js"
        );
        assert!(resolve_url(None, "/").is_err());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: OffnoteConfig = toml::from_str("[storage]\npath = \"/tmp/x.db\"\n").unwrap();
        let settings = config.cache.to_settings().unwrap();
        assert_eq!(settings.freshness_window, Duration::from_secs(300));
        assert_eq!(settings.network_timeout, Some(Duration::from_secs(30)));
        assert!(settings.shell.is_empty());
    }

    #[test]
    fn test_zero_timeout_is_unbounded() {
        let config: OffnoteConfig = toml::from_str(
            "[storage]\npath = \"/tmp/x.db\"\n\n[cache]\nnetwork_timeout_secs = 0\norigin = \"http://localhost:3000\"\nshell = [\"/\"]\n",
        )
        .unwrap();
        let settings = config.cache.to_settings().unwrap();
        assert_eq!(settings.network_timeout, None);
        assert_eq!(settings.shell, vec!["http://localhost:3000/"]);
    }
}
