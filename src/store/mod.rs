pub mod memory;

use crate::core::config::AppConfig;
use crate::core::session::{StoredSession, TokenStore};
use anyhow::{Context, Result};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use memory::MemoryTokenStore;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

const SESSION_PARTITION: &str = "session";
const TOKEN_KEY: &str = "token";

/// Session persistence backed by a fjall keyspace on disk.
pub struct FjallTokenStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl FjallTokenStore {
    pub fn open(path: &Path) -> Result<Self> {
        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open session store at {}", path.display()))?;
        let partition = keyspace
            .open_partition(SESSION_PARTITION, PartitionCreateOptions::default())
            .context("Failed to open session partition")?;

        Ok(FjallTokenStore {
            keyspace,
            partition,
        })
    }
}

impl TokenStore for FjallTokenStore {
    fn load(&self) -> Result<Option<StoredSession>> {
        let Some(raw) = self.partition.get(TOKEN_KEY)? else {
            debug!("No persisted session");
            return Ok(None);
        };
        let session: StoredSession =
            serde_json::from_slice(&raw).context("Persisted session is not readable")?;
        debug!("Loaded persisted session from {}", session.saved_at);
        Ok(Some(session))
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        self.partition
            .insert(TOKEN_KEY, serde_json::to_vec(session)?)?;
        // Logging in is rare; always pay for a full sync so the token
        // survives an immediate process exit.
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("Persisted session");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.partition.remove(TOKEN_KEY)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("Cleared persisted session");
        Ok(())
    }
}

/// Opens the session store under the configured data path. When the disk
/// location cannot be used the app still runs, with a memory-only session
/// that lasts until the process exits.
pub fn open_default(config: &AppConfig) -> Arc<dyn TokenStore> {
    let path = match config.default_data_path() {
        Ok(path) => path.join("session"),
        Err(e) => {
            warn!(
                "No usable data directory ({e:#}); session will not survive a restart"
            );
            return Arc::new(MemoryTokenStore::new());
        }
    };

    match FjallTokenStore::open(&path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(
                "Could not open session store ({e:#}); session will not survive a restart"
            );
            Arc::new(MemoryTokenStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::SessionToken;
    use chrono::Utc;
    use tempfile::tempdir;

    fn session(token: &str) -> StoredSession {
        StoredSession {
            token: SessionToken::new(token),
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = FjallTokenStore::open(dir.path()).unwrap();

        assert!(store.load().unwrap().is_none());

        store.save(&session("tok-1")).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.token.as_str(), "tok-1");
    }

    #[test]
    fn test_clear_removes_the_session() {
        let dir = tempdir().unwrap();
        let store = FjallTokenStore::open(dir.path()).unwrap();

        store.save(&session("tok-1")).unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());

        // Clearing an empty store is fine.
        store.clear().unwrap();
    }

    #[test]
    fn test_session_survives_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = FjallTokenStore::open(dir.path()).unwrap();
            store.save(&session("tok-persist")).unwrap();
        }

        let reopened = FjallTokenStore::open(dir.path()).unwrap();
        let loaded = reopened.load().unwrap().unwrap();
        assert_eq!(loaded.token.as_str(), "tok-persist");
    }

    #[test]
    fn test_unreadable_payload_is_an_error() {
        let dir = tempdir().unwrap();

        {
            let store = FjallTokenStore::open(dir.path()).unwrap();
            store
                .partition
                .insert(TOKEN_KEY, b"definitely not json")
                .unwrap();
            store.keyspace.persist(PersistMode::SyncAll).unwrap();
        }

        let reopened = FjallTokenStore::open(dir.path()).unwrap();
        assert!(reopened.load().is_err());
    }

    #[test]
    fn test_open_default_degrades_to_memory() {
        // Point the data path at a plain file so the keyspace cannot open.
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let config = AppConfig {
            data_path: Some(blocker.path().to_string_lossy().into_owned()),
            ..AppConfig::default()
        };

        let store = open_default(&config);
        store.save(&session("tok-mem")).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.token.as_str(), "tok-mem");
    }
}
