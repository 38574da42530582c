//! Session state and the token persistence seam

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Opaque bearer token issued by the credential validator.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(raw: impl Into<String>) -> Self {
        SessionToken(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken(***)")
    }
}

/// What a `TokenStore` persists: the token and when it was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: SessionToken,
    pub saved_at: DateTime<Utc>,
}

/// Persistence backend for the single current session.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<StoredSession>>;
    fn save(&self, session: &StoredSession) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Owns the current session and mirrors it through a `TokenStore` so a
/// restart preserves the login. Sole mutator of session state; everything
/// else only reads it.
pub struct SessionStore {
    backend: Arc<dyn TokenStore>,
    current: RwLock<Option<StoredSession>>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn TokenStore>) -> Self {
        let current = match backend.load() {
            Ok(Some(session)) => {
                debug!(saved_at = %session.saved_at, "Restored persisted session");
                Some(session)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Could not read persisted session, starting logged out");
                None
            }
        };

        Self {
            backend,
            current: RwLock::new(current),
        }
    }

    /// Records a validated token and persists it.
    pub fn login(&self, token: SessionToken) -> Result<()> {
        let session = StoredSession {
            token,
            saved_at: Utc::now(),
        };
        self.backend.save(&session)?;
        *self.current.write().unwrap() = Some(session);
        debug!("Session established");
        Ok(())
    }

    /// Clears the session and its persisted copy. A no-op when already
    /// logged out.
    pub fn logout(&self) -> Result<()> {
        self.backend.clear()?;
        let previous = self.current.write().unwrap().take();
        if previous.is_some() {
            debug!("Session cleared");
        }
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.read().unwrap().is_some()
    }

    pub fn token(&self) -> Option<SessionToken> {
        self.current
            .read()
            .unwrap()
            .as_ref()
            .map(|session| session.token.clone())
    }
}
