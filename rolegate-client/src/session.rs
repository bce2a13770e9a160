//! Session Store
//!
//! Persists the access token and the minimal user record under the
//! `accessToken` and `user` keys of a storage backend.

use crate::storage::{FileStorage, MemoryStorage, StorageBackend};
use rolegate_core::{AccessToken, RolegateResult, SessionUser, StorageConfig};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Storage key of the bearer string
pub const TOKEN_KEY: &str = "accessToken";
/// Storage key of the serialized `SessionUser`
pub const USER_KEY: &str = "user";

/// Handle to the current session records.
///
/// Cheap to clone; clones share the same backend.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("has_token", &self.get_token().is_some())
            .finish()
    }
}

impl SessionStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Session that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Session persisted in the configured profile directory
    pub fn open_profile(config: &StorageConfig) -> RolegateResult<Self> {
        let dir = config.profile_dir()?;
        let storage = FileStorage::open(&dir)?;
        Ok(Self::new(Arc::new(storage)))
    }

    pub fn get_token(&self) -> Option<AccessToken> {
        self.backend.get_item(TOKEN_KEY).and_then(AccessToken::new)
    }

    /// Replace the stored token wholesale
    pub fn set_token(&self, token: &AccessToken) -> RolegateResult<()> {
        debug!("Storing new access token");
        self.backend.set_item(TOKEN_KEY, token.as_str())
    }

    /// Stored user record. Unparseable records read as absent.
    pub fn get_user(&self) -> Option<SessionUser> {
        let raw = self.backend.get_item(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!("Ignoring malformed stored user record: {}", e);
                None
            }
        }
    }

    /// Store a token and its user together
    pub fn set_session(&self, token: &AccessToken, user: &SessionUser) -> RolegateResult<()> {
        let user_json = serde_json::to_string(user)?;
        self.backend.set_item(USER_KEY, &user_json)?;

        if let Err(e) = self.backend.set_item(TOKEN_KEY, token.as_str()) {
            // Never leave a user record behind without its token
            if let Err(rollback) = self.backend.remove_item(USER_KEY) {
                warn!(error = %rollback, "User record could not be rolled back");
            }
            return Err(e);
        }

        info!(user_id = %user.id, "Session stored");
        Ok(())
    }

    /// Token and user, only when both are present.
    ///
    /// A user record without a token is an orphan and counts as signed out.
    pub fn current_session(&self) -> Option<(AccessToken, SessionUser)> {
        let token = self.get_token();
        let user = self.get_user();

        match (token, user) {
            (Some(token), Some(user)) => Some((token, user)),
            (None, Some(user)) => {
                debug!(user_id = %user.id, "Orphaned user record without token");
                None
            }
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_session().is_some()
    }

    /// Remove both records. The token goes first so a partial failure can only
    /// leave an orphaned user, which already reads as signed out.
    pub fn clear(&self) -> RolegateResult<()> {
        self.backend.remove_item(TOKEN_KEY)?;
        self.backend.remove_item(USER_KEY)?;
        info!("Session cleared");
        Ok(())
    }
}
