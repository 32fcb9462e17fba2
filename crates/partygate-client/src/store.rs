//! Durable client-side storage for the session token and logout marker.
//!
//! Two keys, matching what a browser client keeps in local storage:
//!
//! | key | value |
//! |---|---|
//! | `partySessionToken` | the opaque token string |
//! | `justLoggedOut` | epoch milliseconds of the last explicit logout, as a string |
//!
//! Stores are synchronous and cheap; every write goes through
//! [`SessionContext`](crate::SessionContext), which serializes writers.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use partygate_protocol::{Codec, JsonCodec, SessionToken};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Milliseconds since the Unix epoch, the unit of the logout marker.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Key/value storage for one client's session.
///
/// Object-safe so the context can hold `Arc<dyn SessionStore>`.
pub trait SessionStore: Send + Sync + 'static {
    fn token(&self) -> Result<Option<SessionToken>, StoreError>;
    fn set_token(&self, token: &SessionToken) -> Result<(), StoreError>;
    fn clear_token(&self) -> Result<(), StoreError>;

    /// Epoch milliseconds of the last explicit logout, if recorded.
    fn logout_marker(&self) -> Result<Option<u64>, StoreError>;
    fn set_logout_marker(&self, at_millis: u64) -> Result<(), StoreError>;
    fn clear_logout_marker(&self) -> Result<(), StoreError>;
}

/// The persisted document. Field names are the storage keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StoredSession {
    #[serde(rename = "partySessionToken", default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,

    #[serde(rename = "justLoggedOut", default, skip_serializing_if = "Option::is_none")]
    logged_out_at: Option<String>,
}

impl StoredSession {
    fn marker(&self) -> Option<u64> {
        // A marker that is not a number is as good as none.
        self.logged_out_at.as_deref().and_then(|s| s.parse().ok())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MemorySessionStore
// ---------------------------------------------------------------------------

/// Process-local store. State is lost when the value is dropped.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<StoredSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn token(&self) -> Result<Option<SessionToken>, StoreError> {
        Ok(lock(&self.inner).token.clone().map(SessionToken::new))
    }

    fn set_token(&self, token: &SessionToken) -> Result<(), StoreError> {
        lock(&self.inner).token = Some(token.as_str().to_string());
        Ok(())
    }

    fn clear_token(&self) -> Result<(), StoreError> {
        lock(&self.inner).token = None;
        Ok(())
    }

    fn logout_marker(&self) -> Result<Option<u64>, StoreError> {
        Ok(lock(&self.inner).marker())
    }

    fn set_logout_marker(&self, at_millis: u64) -> Result<(), StoreError> {
        lock(&self.inner).logged_out_at = Some(at_millis.to_string());
        Ok(())
    }

    fn clear_logout_marker(&self) -> Result<(), StoreError> {
        lock(&self.inner).logged_out_at = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileSessionStore
// ---------------------------------------------------------------------------

/// JSON file store that survives process restarts (the "reload" case).
///
/// Each write replaces the whole document through a temp file and a
/// rename, so a crash mid-write leaves the old document intact. An
/// unreadable document is treated as empty rather than locking the client
/// out.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    codec: JsonCodec,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            codec: JsonCodec,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StoredSession, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoredSession::default());
            }
            Err(e) => return Err(e.into()),
        };
        match self.codec.decode(&bytes) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "session store unreadable, starting empty"
                );
                Ok(StoredSession::default())
            }
        }
    }

    fn save(&self, doc: &StoredSession) -> Result<(), StoreError> {
        let bytes = self.codec.encode(doc)?;
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut StoredSession)) -> Result<(), StoreError> {
        let _guard = lock(&self.write_lock);
        let mut doc = self.load()?;
        f(&mut doc);
        self.save(&doc)
    }
}

impl SessionStore for FileSessionStore {
    fn token(&self) -> Result<Option<SessionToken>, StoreError> {
        Ok(self.load()?.token.map(SessionToken::new))
    }

    fn set_token(&self, token: &SessionToken) -> Result<(), StoreError> {
        let raw = token.as_str().to_string();
        self.update(|doc| doc.token = Some(raw))
    }

    fn clear_token(&self) -> Result<(), StoreError> {
        self.update(|doc| doc.token = None)
    }

    fn logout_marker(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.load()?.marker())
    }

    fn set_logout_marker(&self, at_millis: u64) -> Result<(), StoreError> {
        self.update(|doc| doc.logged_out_at = Some(at_millis.to_string()))
    }

    fn clear_logout_marker(&self) -> Result<(), StoreError> {
        self.update(|doc| doc.logged_out_at = None)
    }
}
