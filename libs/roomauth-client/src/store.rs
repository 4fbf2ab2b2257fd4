//! Persistence of the token pair and the cached user record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use roomauth_types::{TokenPair, User};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use crate::error::StoreError;

/// Stores the token pair and cached user.
///
/// Writes are atomic with respect to readers: a reader never sees the access
/// token of one pair next to the refresh token of another.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Current token pair, or `None` when absent or structurally invalid.
    async fn get(&self) -> Option<TokenPair>;
    async fn save(&self, pair: &TokenPair) -> Result<(), StoreError>;
    async fn cached_user(&self) -> Option<User>;
    async fn save_user(&self, user: &User) -> Result<(), StoreError>;
    /// Replace the token pair and the cached user in a single write.
    async fn save_session(&self, pair: &TokenPair, user: &User) -> Result<(), StoreError>;
    /// Remove everything. Idempotent.
    async fn clear(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSession {
    #[serde(default)]
    tokens: Option<TokenPair>,
    #[serde(default)]
    user: Option<User>,
}

impl PersistedSession {
    fn valid_tokens(&self) -> Option<TokenPair> {
        self.tokens.clone().filter(TokenPair::is_well_formed)
    }
}

// ============================================================================
// InMemoryTokenStore
// ============================================================================

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryTokenStore {
    state: RwLock<PersistedSession>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(pair: TokenPair, user: Option<User>) -> Self {
        Self {
            state: RwLock::new(PersistedSession {
                tokens: Some(pair),
                user,
            }),
        }
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get(&self) -> Option<TokenPair> {
        self.state.read().await.valid_tokens()
    }

    async fn save(&self, pair: &TokenPair) -> Result<(), StoreError> {
        self.state.write().await.tokens = Some(pair.clone());
        Ok(())
    }

    async fn cached_user(&self) -> Option<User> {
        self.state.read().await.user.clone()
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        self.state.write().await.user = Some(user.clone());
        Ok(())
    }

    async fn save_session(&self, pair: &TokenPair, user: &User) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.tokens = Some(pair.clone());
        state.user = Some(user.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.state.write().await = PersistedSession::default();
        Ok(())
    }
}

// ============================================================================
// FileTokenStore
// ============================================================================

/// Keeps the session in a single JSON document on disk.
///
/// Every write goes to a sibling temp file that is then renamed over the
/// document, so concurrent readers see either the old or the new session.
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn load(&self) -> PersistedSession {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return PersistedSession::default(),
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "Failed to read session file");
                return PersistedSession::default();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "Ignoring corrupt session file");
                PersistedSession::default()
            }
        }
    }

    async fn update<F>(&self, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut PersistedSession) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut session = self.load().await;
        apply(&mut session);
        self.write(&session).await
    }

    async fn write(&self, session: &PersistedSession) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(session)?;
        let temp = self.temp_path();
        write_private(&temp, &json).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

/// Write `bytes` to `path`, readable and writable by the owner only.
async fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;

    // `mode` only applies on creation; a leftover temp file keeps its old bits.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    Ok(())
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self) -> Option<TokenPair> {
        self.load().await.valid_tokens()
    }

    async fn save(&self, pair: &TokenPair) -> Result<(), StoreError> {
        let pair = pair.clone();
        self.update(move |s| s.tokens = Some(pair)).await
    }

    async fn cached_user(&self) -> Option<User> {
        self.load().await.user
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        let user = user.clone();
        self.update(move |s| s.user = Some(user)).await
    }

    async fn save_session(&self, pair: &TokenPair, user: &User) -> Result<(), StoreError> {
        let session = PersistedSession {
            tokens: Some(pair.clone()),
            user: Some(user.clone()),
        };
        let _guard = self.write_lock.lock().await;
        self.write(&session).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
