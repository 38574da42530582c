use crate::core::session::{StoredSession, TokenStore};
use anyhow::Result;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// In-memory session store. The fallback when no disk location is usable,
/// and the backend of choice in tests.
#[derive(Clone)]
pub struct MemoryTokenStore {
    inner: Arc<RwLock<Option<StoredSession>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
        }
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<StoredSession>> {
        Ok(self.inner.read().unwrap().clone())
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        debug!("Session SAVE (memory)");
        *self.inner.write().unwrap() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        debug!("Session CLEAR (memory)");
        *self.inner.write().unwrap() = None;
        Ok(())
    }
}
