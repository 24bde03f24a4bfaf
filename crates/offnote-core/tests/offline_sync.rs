use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use offnote_core::mirror::EncryptedMirror;
use offnote_core::storage::MemoryStore;
use offnote_core::{LoadSource, Note, OffnoteError, OfflineFirstNotes, RemoteNotes, Result, SyncStatus};

#[derive(Default)]
struct RemoteState {
    reachable: bool,
    hang: bool,
    notes: BTreeMap<String, Note>,
}

#[derive(Clone, Default)]
struct FakeRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl FakeRemote {
    fn online() -> Self {
        let remote = Self::default();
        remote.state.lock().expect("remote lock").reachable = true;
        remote
    }

    fn set_reachable(&self, reachable: bool) {
        self.state.lock().expect("remote lock").reachable = reachable;
    }

    fn set_hang(&self, hang: bool) {
        self.state.lock().expect("remote lock").hang = hang;
    }

    fn ids(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("remote lock")
            .notes
            .keys()
            .cloned()
            .collect()
    }

    async fn gate(&self) -> Result<()> {
        let (reachable, hang) = {
            let state = self.state.lock().expect("remote lock");
            (state.reachable, state.hang)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if !reachable {
            return Err(OffnoteError::Network("remote unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteNotes for FakeRemote {
    async fn fetch_notes(&self, _user_id: &str) -> Result<Vec<Note>> {
        self.gate().await?;
        Ok(self
            .state
            .lock()
            .expect("remote lock")
            .notes
            .values()
            .cloned()
            .collect())
    }

    async fn push_note(&self, _user_id: &str, note: &Note) -> Result<()> {
        self.gate().await?;
        self.state
            .lock()
            .expect("remote lock")
            .notes
            .insert(note.id.clone(), note.clone());
        Ok(())
    }

    async fn delete_note(&self, _user_id: &str, note_id: &str) -> Result<()> {
        self.gate().await?;
        self.state.lock().expect("remote lock").notes.remove(note_id);
        Ok(())
    }
}

fn coordinator(remote: FakeRemote) -> OfflineFirstNotes<FakeRemote> {
    let mirror = EncryptedMirror::with_store(Arc::new(MemoryStore::new()));
    OfflineFirstNotes::new(remote, mirror)
}

#[tokio::test]
async fn test_load_prefers_remote_and_refreshes_mirror() {
    let remote = FakeRemote::online();
    let notes = coordinator(remote.clone());
    notes
        .save("alice", &Note::new("n1", "Remote", "body"))
        .await
        .expect("save");

    let loaded = notes.load("alice").await.expect("load");

    assert_eq!(loaded.source, LoadSource::Remote);
    assert_eq!(loaded.notes.len(), 1);
    assert_eq!(notes.mirror().load_notes("alice").expect("mirror").len(), 1);
}

#[tokio::test]
async fn test_load_falls_back_to_mirror_when_offline() {
    let remote = FakeRemote::online();
    let notes = coordinator(remote.clone());
    notes
        .save("alice", &Note::new("n1", "Mirrored", "body"))
        .await
        .expect("save");

    remote.set_reachable(false);
    let loaded = notes.load("alice").await.expect("load");

    assert_eq!(loaded.source, LoadSource::Mirror);
    assert_eq!(loaded.notes[0].title, "Mirrored");
}

#[tokio::test(start_paused = true)]
async fn test_hung_remote_times_out_to_mirror() {
    let remote = FakeRemote::online();
    let notes = coordinator(remote.clone()).with_timeout(Some(Duration::from_secs(5)));
    notes
        .save("alice", &Note::new("n1", "Kept", "body"))
        .await
        .expect("save");

    remote.set_hang(true);
    let loaded = notes.load("alice").await.expect("load");

    assert_eq!(loaded.source, LoadSource::Mirror);
    assert_eq!(loaded.notes.len(), 1);
}

#[tokio::test]
async fn test_offline_save_is_pending_but_mirrored() {
    let remote = FakeRemote::default();
    let notes = coordinator(remote.clone());

    let status = notes
        .save("alice", &Note::new("n1", "Draft", "offline"))
        .await
        .expect("save");

    assert_eq!(status, SyncStatus::Pending);
    assert!(remote.ids().is_empty());
    assert_eq!(
        notes.mirror().get_note("n1", "alice").expect("mirror").map(|n| n.title),
        Some("Draft".to_string())
    );
}

#[tokio::test]
async fn test_delete_removes_locally_even_when_offline() {
    let remote = FakeRemote::online();
    let notes = coordinator(remote.clone());
    notes.save("alice", &Note::new("a", "A", "a")).await.expect("save a");
    notes.save("alice", &Note::new("b", "B", "b")).await.expect("save b");

    remote.set_reachable(false);
    let status = notes.delete("alice", "a").await.expect("delete");

    assert_eq!(status, SyncStatus::Pending);
    assert_eq!(remote.ids(), vec!["a", "b"]);
    let local: Vec<String> = notes
        .mirror()
        .load_notes("alice")
        .expect("mirror")
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(local, vec!["b"]);
}

#[tokio::test]
async fn test_sign_out_clears_mirror() {
    let remote = FakeRemote::online();
    let notes = coordinator(remote);
    notes.save("alice", &Note::new("a", "A", "a")).await.expect("save");

    notes.sign_out("alice").expect("sign out");

    assert!(notes.mirror().load_notes("alice").expect("mirror").is_empty());
    assert!(!notes.mirror().keys().has_cached_key("alice"));
}
