//! Tunables for the request cache.

use std::time::Duration;

/// Prefix shared by every generation this crate creates.
pub const GENERATION_PREFIX: &str = "offnote-cache-";

/// Runtime settings for a cache worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Maximum age of a cached subresource that is served without revalidation
    pub freshness_window: Duration,

    /// Upper bound on a single network fetch; `None` waits indefinitely
    pub network_timeout: Option<Duration>,

    /// Activate immediately after install instead of waiting for clients to go away
    pub skip_waiting_on_install: bool,

    /// Absolute URLs pre-cached by every install (the application shell)
    pub shell: Vec<String>,

    /// Prefix for generation identifiers
    pub generation_prefix: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            freshness_window: Duration::from_secs(5 * 60),
            network_timeout: Some(Duration::from_secs(30)),
            skip_waiting_on_install: true,
            shell: Vec::new(),
            generation_prefix: GENERATION_PREFIX.to_string(),
        }
    }
}

impl CacheSettings {
    pub fn with_shell<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shell = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    pub fn with_network_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.network_timeout = timeout;
        self
    }

    pub fn with_skip_waiting_on_install(mut self, skip: bool) -> Self {
        self.skip_waiting_on_install = skip;
        self
    }

    /// Generation identifier for an install started at `millis`.
    pub fn generation_id(&self, millis: i64) -> String {
        format!("{}{}", self.generation_prefix, millis)
    }

    /// Install timestamp encoded in `generation`, if it is one of ours.
    pub fn generation_millis(&self, generation: &str) -> Option<i64> {
        generation
            .strip_prefix(&self.generation_prefix)?
            .parse()
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = CacheSettings::default();
        assert_eq!(settings.freshness_window, Duration::from_secs(300));
        assert_eq!(settings.network_timeout, Some(Duration::from_secs(30)));
        assert!(settings.skip_waiting_on_install);
    }

    #[test]
    fn test_generation_id_round_trip() {
        let settings = CacheSettings::default();
        let id = settings.generation_id(1_700_000_000_123);
        assert_eq!(id, "offnote-cache-1700000000123");
        assert_eq!(settings.generation_millis(&id), Some(1_700_000_000_123));
        assert_eq!(settings.generation_millis("other-cache-1"), None);
    }
}
