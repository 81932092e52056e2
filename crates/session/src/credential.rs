use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::SessionError;
use crate::storage::TokenStorage;

/// The bearer token, in memory and in durable storage.
///
/// "Authenticated" is derived from token presence and nothing else. Durable
/// writes happen under the same write lock as the memory update, so a reader
/// never sees one without the other.
pub struct CredentialStore {
    storage: Arc<dyn TokenStorage>,
    token: RwLock<Option<String>>,
    generation: AtomicU64,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("authenticated", &self.is_authenticated())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Read the persisted token once.
    pub fn open(storage: Arc<dyn TokenStorage>) -> Result<Self, SessionError> {
        let token = storage.load().map_err(SessionError::Storage)?;
        tracing::debug!(restored = token.is_some(), "credential store opened");

        Ok(Self {
            storage,
            token: RwLock::new(token),
            generation: AtomicU64::new(0),
        })
    }

    /// Persist then adopt `token`, trimmed the way storage reads it back.
    /// A blank token clears instead.
    pub fn set_token(&self, token: impl Into<String>) -> Result<(), SessionError> {
        let token: String = token.into();
        let token = token.trim().to_string();
        if token.is_empty() {
            return self.clear();
        }

        let mut slot = self.token.write();
        self.storage.save(&token).map_err(|e| {
            tracing::error!(error = %format!("{e:#}"), "failed to persist token");
            SessionError::Storage(e)
        })?;
        *slot = Some(token);
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Forget the token. Memory is always cleared; the error reports a
    /// durable copy that could not be removed or blanked.
    pub fn clear(&self) -> Result<(), SessionError> {
        let mut slot = self.token.write();
        *slot = None;
        self.generation.fetch_add(1, Ordering::SeqCst);

        if let Err(remove_err) = self.storage.remove() {
            tracing::error!(error = %format!("{remove_err:#}"), "failed to remove persisted token");
            // blank reads back as absent
            self.storage.save("").map_err(|e| {
                tracing::error!(error = %format!("{e:#}"), "failed to blank persisted token");
                SessionError::Storage(remove_err)
            })?;
        }
        Ok(())
    }

    pub fn current(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.read().is_some()
    }

    /// Bumped on every `set_token` and `clear`. Async work started under one
    /// generation must not commit under another.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::storage::MemoryTokenStorage;

    #[derive(Default)]
    struct BrokenStorage {
        blank_ok: bool,
        saved: parking_lot::Mutex<Vec<String>>,
    }

    impl TokenStorage for BrokenStorage {
        fn load(&self) -> anyhow::Result<Option<String>> {
            Ok(Some("persisted".into()))
        }

        fn save(&self, token: &str) -> anyhow::Result<()> {
            if token.is_empty() && self.blank_ok {
                self.saved.lock().push(String::new());
                return Ok(());
            }
            anyhow::bail!("disk full")
        }

        fn remove(&self) -> anyhow::Result<()> {
            anyhow::bail!("read-only")
        }
    }

    #[test]
    fn restores_token_from_storage() {
        let storage = Arc::new(MemoryTokenStorage::with_token("abc"));
        let store = CredentialStore::open(storage).unwrap();

        assert!(store.is_authenticated());
        assert_eq!(store.current().as_deref(), Some("abc"));
    }

    #[test]
    fn set_and_clear_keep_storage_in_step() {
        let storage = Arc::new(MemoryTokenStorage::new());
        let store = CredentialStore::open(storage.clone()).unwrap();
        assert!(!store.is_authenticated());

        store.set_token("t-1").unwrap();
        assert_eq!(storage.peek().as_deref(), Some("t-1"));
        assert_eq!(store.generation(), 1);

        store.clear().unwrap();
        assert_eq!(storage.peek(), None);
        assert_eq!(store.current(), None);
        assert_eq!(store.generation(), 2);
    }

    #[test]
    fn blank_token_is_a_clear() {
        let storage = Arc::new(MemoryTokenStorage::with_token("abc"));
        let store = CredentialStore::open(storage.clone()).unwrap();

        store.set_token("   ").unwrap();
        assert!(!store.is_authenticated());
        assert_eq!(storage.peek(), None);
    }

    #[test]
    fn padded_token_survives_a_reload_unchanged() {
        let storage = Arc::new(MemoryTokenStorage::new());
        let store = CredentialStore::open(storage.clone()).unwrap();

        store.set_token(" abc \n").unwrap();
        assert_eq!(store.current().as_deref(), Some("abc"));

        let reloaded = CredentialStore::open(storage).unwrap();
        assert_eq!(reloaded.current(), store.current());
    }

    #[test]
    fn failed_persist_leaves_memory_untouched() {
        let store = CredentialStore::open(Arc::new(BrokenStorage::default())).unwrap();

        assert!(matches!(store.set_token("new"), Err(SessionError::Storage(_))));
        assert_eq!(store.current().as_deref(), Some("persisted"));
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn clear_falls_back_to_blanking() {
        let storage = Arc::new(BrokenStorage {
            blank_ok: true,
            ..Default::default()
        });
        let store = CredentialStore::open(storage.clone()).unwrap();

        store.clear().unwrap();
        assert!(!store.is_authenticated());
        assert_eq!(storage.saved.lock().as_slice(), [String::new()]);

        let store = CredentialStore::open(Arc::new(BrokenStorage::default())).unwrap();
        assert!(store.clear().is_err());
        assert!(!store.is_authenticated());
    }
}
