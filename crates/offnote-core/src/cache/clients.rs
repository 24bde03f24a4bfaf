//! Pages controlled by the cache worker and the messages exchanged with them.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{OffnoteError, Result};

/// Commands a page can post to the worker.
///
/// Wire form: `{"type":"SKIP_WAITING"}`, `{"type":"CLEAR_CACHE"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientCommand {
    /// Activate the waiting worker now
    SkipWaiting,
    /// Delete every cache generation
    ClearCache,
}

impl ClientCommand {
    /// Parse a posted message. Unknown message types are rejected.
    pub fn parse(message: &str) -> Result<Self> {
        serde_json::from_str(message)
            .map_err(|e| OffnoteError::InvalidInput(format!("Unrecognized worker message: {}", e)))
    }
}

/// Notifications the worker broadcasts to pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientNotification {
    /// A new cache generation took control
    CacheUpdated {
        #[serde(rename = "generationId")]
        generation_id: String,
    },
}

pub type ClientId = u64;

struct ClientSlot {
    controller: Option<String>,
    sender: mpsc::UnboundedSender<ClientNotification>,
}

#[derive(Default)]
struct HubInner {
    next_id: ClientId,
    clients: BTreeMap<ClientId, ClientSlot>,
}

/// Registry of open pages. Clones share the same registry.
#[derive(Clone, Default)]
pub struct ClientHub {
    inner: Arc<Mutex<HubInner>>,
}

/// A connected page's end of the hub.
pub struct ClientHandle {
    id: ClientId,
    receiver: mpsc::UnboundedReceiver<ClientNotification>,
}

impl ClientHandle {
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Wait for the next notification. `None` once the page is disconnected.
    pub async fn recv(&mut self) -> Option<ClientNotification> {
        self.receiver.recv().await
    }

    /// Next notification if one is already queued.
    pub fn try_recv(&mut self) -> Option<ClientNotification> {
        self.receiver.try_recv().ok()
    }
}

impl ClientHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HubInner>> {
        self.inner
            .lock()
            .map_err(|_| OffnoteError::Lifecycle("client registry poisoned".to_string()))
    }

    /// Register a new page. It starts uncontrolled.
    pub fn connect(&self) -> Result<ClientHandle> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut inner = self.lock()?;
        let id = inner.next_id;
        inner.next_id += 1;
        inner.clients.insert(
            id,
            ClientSlot {
                controller: None,
                sender,
            },
        );
        debug!(client = id, "client connected");
        Ok(ClientHandle { id, receiver })
    }

    pub fn disconnect(&self, id: ClientId) -> Result<()> {
        self.lock()?.clients.remove(&id);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.clients.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Generation currently controlling `id`, if any.
    pub fn controller(&self, id: ClientId) -> Result<Option<String>> {
        Ok(self
            .lock()?
            .clients
            .get(&id)
            .and_then(|slot| slot.controller.clone()))
    }

    /// Put every open page under `generation`. Returns how many were claimed.
    pub fn claim(&self, generation: &str) -> Result<usize> {
        let mut inner = self.lock()?;
        for slot in inner.clients.values_mut() {
            slot.controller = Some(generation.to_string());
        }
        Ok(inner.clients.len())
    }

    /// Send `notification` to every open page. Pages whose receiver is gone
    /// are dropped from the registry. Returns how many received it.
    pub fn broadcast(&self, notification: &ClientNotification) -> Result<usize> {
        let mut inner = self.lock()?;
        inner
            .clients
            .retain(|_, slot| slot.sender.send(notification.clone()).is_ok());
        Ok(inner.clients.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        assert_eq!(
            ClientCommand::parse(r#"{"type":"SKIP_WAITING"}"#).unwrap(),
            ClientCommand::SkipWaiting
        );
        assert_eq!(
            ClientCommand::parse(r#"{"type":"CLEAR_CACHE"}"#).unwrap(),
            ClientCommand::ClearCache
        );
        assert!(matches!(
            ClientCommand::parse(r#"{"type":"REBOOT"}"#),
            Err(OffnoteError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_notification_wire_format() {
        let json = serde_json::to_string(&ClientNotification::CacheUpdated {
            generation_id: "offnote-cache-1".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"CACHE_UPDATED","generationId":"offnote-cache-1"}"#);
    }

    #[test]
    fn test_claim_and_broadcast() {
        let hub = ClientHub::new();
        let mut first = hub.connect().unwrap();
        let second = hub.connect().unwrap();
        assert_eq!(hub.controller(first.id()).unwrap(), None);

        assert_eq!(hub.claim("gen-1").unwrap(), 2);
        assert_eq!(hub.controller(second.id()).unwrap().as_deref(), Some("gen-1"));

        drop(second);
        let update = ClientNotification::CacheUpdated {
            generation_id: "gen-1".to_string(),
        };
        assert_eq!(hub.broadcast(&update).unwrap(), 1);
        assert_eq!(first.try_recv(), Some(update));
        assert_eq!(hub.len(), 1);
    }
}
