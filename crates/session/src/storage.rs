//! Durable token storage backends.
//!
//! Exactly one value is persisted: the raw bearer token. An empty stored value
//! reads back as "no token".

use std::path::{Path, PathBuf};

use anyhow::Context;
use parking_lot::Mutex;

/// Key under which the browser backend stores the token.
pub const TOKEN_KEY: &str = "token";

/// Overrides the native token file location.
pub const TOKEN_PATH_ENV: &str = "TRACKER_TOKEN_PATH";

pub trait TokenStorage: Send + Sync {
    fn load(&self) -> anyhow::Result<Option<String>>;
    fn save(&self, token: &str) -> anyhow::Result<()>;
    fn remove(&self) -> anyhow::Result<()>;
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == raw.len() {
        Some(raw)
    } else {
        Some(trimmed.to_string())
    }
}

/// Process-local storage; survives a `CredentialStore` rebuild but not a
/// process restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(token.into())),
        }
    }

    /// What a fresh `CredentialStore` would read.
    pub fn peek(&self) -> Option<String> {
        self.slot.lock().clone().and_then(non_empty)
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> anyhow::Result<Option<String>> {
        Ok(self.peek())
    }

    fn save(&self, token: &str) -> anyhow::Result<()> {
        *self.slot.lock() = Some(token.to_string());
        Ok(())
    }

    fn remove(&self) -> anyhow::Result<()> {
        *self.slot.lock() = None;
        Ok(())
    }
}

/// Token kept in a single file, replaced atomically.
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$TRACKER_TOKEN_PATH`, else `<data dir>/tracker/token`.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_location() -> anyhow::Result<PathBuf> {
        if let Some(path) = std::env::var_os(TOKEN_PATH_ENV).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }

        let base = dirs::data_dir().context("could not resolve the user data directory")?;
        Ok(base.join("tracker").join(TOKEN_KEY))
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn at_default_location() -> anyhow::Result<Self> {
        Ok(Self::new(Self::default_location()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> anyhow::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(non_empty(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read token file {:?}", self.path)),
        }
    }

    fn save(&self, token: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create token directory {:?}", parent))?;
        }

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, token)
            .with_context(|| format!("failed to write token file {:?}", tmp))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to move token file into place at {:?}", self.path))?;
        Ok(())
    }

    fn remove(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove token file {:?}", self.path)),
        }
    }
}

/// `window.localStorage[key]`.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone)]
pub struct BrowserTokenStorage {
    key: String,
}

#[cfg(target_arch = "wasm32")]
impl Default for BrowserTokenStorage {
    fn default() -> Self {
        Self::new(TOKEN_KEY)
    }
}

#[cfg(target_arch = "wasm32")]
impl BrowserTokenStorage {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    fn storage(&self) -> anyhow::Result<web_sys::Storage> {
        let window = web_sys::window().context("no window object")?;
        window
            .local_storage()
            .map_err(|e| anyhow::anyhow!("localStorage is not accessible: {e:?}"))?
            .context("localStorage is unavailable")
    }
}

#[cfg(target_arch = "wasm32")]
impl TokenStorage for BrowserTokenStorage {
    fn load(&self) -> anyhow::Result<Option<String>> {
        let value = self
            .storage()?
            .get_item(&self.key)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e:?}", self.key))?;
        Ok(value.and_then(non_empty))
    }

    fn save(&self, token: &str) -> anyhow::Result<()> {
        self.storage()?
            .set_item(&self.key, token)
            .map_err(|e| anyhow::anyhow!("failed to write {}: {e:?}", self.key))
    }

    fn remove(&self) -> anyhow::Result<()> {
        self.storage()?
            .remove_item(&self.key)
            .map_err(|e| anyhow::anyhow!("failed to remove {}: {e:?}", self.key))
    }
}
