//! Generation-scoped response storage.
//!
//! A generation is a named set of request→response entries produced by one
//! worker install. Generations are only ever created by `open` or `put` and
//! destroyed wholesale by `delete`; nothing evicts single entries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::types::{RequestKey, Response};
use crate::error::{OffnoteError, Result};

#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create `generation` if it does not exist yet.
    async fn open(&self, generation: &str) -> Result<()>;

    /// Look up a stored response.
    async fn match_request(&self, generation: &str, key: &RequestKey) -> Result<Option<Response>>;

    /// Store `response` under `key`, creating the generation if needed.
    async fn put(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<()>;

    /// Destroy a generation and all its entries. Returns whether it existed.
    async fn delete(&self, generation: &str) -> Result<bool>;

    /// Names of all existing generations, oldest first.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Number of entries in `generation` (0 if absent).
    async fn entry_count(&self, generation: &str) -> Result<usize>;
}

#[derive(Default)]
struct Generation {
    name: String,
    entries: HashMap<RequestKey, Response>,
}

/// In-process `CacheStorage`. Clones share the same generations.
#[derive(Clone, Default)]
pub struct MemoryCacheStorage {
    generations: Arc<Mutex<Vec<Generation>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Generation>>> {
        self.generations
            .lock()
            .map_err(|_| OffnoteError::Storage("cache storage lock poisoned".to_string()))
    }
}

fn find_or_create<'a>(generations: &'a mut Vec<Generation>, name: &str) -> &'a mut Generation {
    match generations.iter().position(|g| g.name == name) {
        Some(index) => &mut generations[index],
        None => {
            generations.push(Generation {
                name: name.to_string(),
                entries: HashMap::new(),
            });
            let last = generations.len() - 1;
            &mut generations[last]
        }
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, generation: &str) -> Result<()> {
        let mut generations = self.lock()?;
        find_or_create(&mut generations, generation);
        Ok(())
    }

    async fn match_request(&self, generation: &str, key: &RequestKey) -> Result<Option<Response>> {
        let generations = self.lock()?;
        Ok(generations
            .iter()
            .find(|g| g.name == generation)
            .and_then(|g| g.entries.get(key).cloned()))
    }

    async fn put(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<()> {
        let mut generations = self.lock()?;
        find_or_create(&mut generations, generation)
            .entries
            .insert(key.clone(), response.clone());
        Ok(())
    }

    async fn delete(&self, generation: &str) -> Result<bool> {
        let mut generations = self.lock()?;
        let before = generations.len();
        generations.retain(|g| g.name != generation);
        Ok(generations.len() != before)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.iter().map(|g| g.name.clone()).collect())
    }

    async fn entry_count(&self, generation: &str) -> Result<usize> {
        Ok(self
            .lock()?
            .iter()
            .find(|g| g.name == generation)
            .map_or(0, |g| g.entries.len()))
    }
}
