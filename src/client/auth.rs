//! Session token and signed-in user, passed explicitly to whatever needs them.

use crate::models::backend::User;
use log::{ info, warn };
use serde::{ Deserialize, Serialize };
use std::fs;
use std::path::PathBuf;
use std::sync::{ Arc, Mutex, RwLock };

use super::ClientError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    #[serde(default)]
    pub user: Option<User>,
}

/// Where a session survives between runs.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<StoredSession>, ClientError>;
    fn save(&self, session: &StoredSession) -> Result<(), ClientError>;
    fn clear(&self) -> Result<(), ClientError>;
}

/// Keeps the session as a small JSON file.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<StoredSession>, ClientError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path).map_err(storage)?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&raw).map(Some).map_err(storage)
    }

    fn save(&self, session: &StoredSession) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(storage)?;
            }
        }
        let raw = serde_json::to_string_pretty(session).map_err(storage)?;
        fs::write(&self.path, raw).map_err(storage)
    }

    fn clear(&self) -> Result<(), ClientError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage(e)),
        }
    }
}

#[derive(Default)]
pub struct MemoryTokenStore {
    session: Mutex<Option<StoredSession>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<StoredSession>, ClientError> {
        Ok(self.session.lock().map_err(storage)?.clone())
    }

    fn save(&self, session: &StoredSession) -> Result<(), ClientError> {
        *self.session.lock().map_err(storage)? = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), ClientError> {
        *self.session.lock().map_err(storage)? = None;
        Ok(())
    }
}

fn storage(e: impl std::fmt::Display) -> ClientError {
    ClientError::Storage(e.to_string())
}

/// Shared authentication state. Clones see the same session.
#[derive(Clone)]
pub struct AuthContext {
    store: Arc<dyn TokenStore>,
    session: Arc<RwLock<Option<StoredSession>>>,
}

impl AuthContext {
    /// Starts from whatever session `store` holds. An unreadable store starts
    /// signed out.
    pub fn initialize(store: Arc<dyn TokenStore>) -> Self {
        let session = match store.load() {
            Ok(session) => session,
            Err(e) => {
                warn!("Ignoring unreadable stored session: {}", e);
                None
            }
        };
        if session.is_some() {
            info!("Restored stored session");
        }
        Self { store, session: Arc::new(RwLock::new(session)) }
    }

    pub fn token(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.token.clone())
    }

    pub fn user(&self) -> Option<User> {
        self.read().as_ref().and_then(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    pub fn sign_in(&self, token: String, user: Option<User>) -> Result<(), ClientError> {
        let session = StoredSession { token, user };
        self.store.save(&session)?;
        *self.write() = Some(session);
        Ok(())
    }

    /// Forgets the session in memory even when storage cannot be cleared.
    pub fn logout(&self) -> Result<(), ClientError> {
        *self.write() = None;
        self.store.clear()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<StoredSession>> {
        self.session.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<StoredSession>> {
        self.session.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Sign-up form input, checked before any request is made.
#[derive(Clone, Debug, Default)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignUpForm {
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.password != self.confirm_password {
            return Err(ClientError::Validation("Passwords do not match".into()));
        }
        Ok(())
    }
}
