//! Rolegate Client - the authenticated channel to the API
//!
//! - **Session** (`session`): token and user records over a pluggable
//!   key/value backend
//! - **Refresh** (`refresh`): single-flight token refresh shared by all
//!   concurrent requests
//! - **Http** (`http`): reqwest client that attaches the bearer token and
//!   replays a request once after a 401

pub mod http;
pub mod refresh;
pub mod session;
pub mod storage;

pub use http::{HttpClient, PendingRequest};
pub use refresh::{HttpTokenRefresher, RefreshCoordinator, TokenRefresher};
pub use session::{SessionStore, TOKEN_KEY, USER_KEY};
pub use storage::{FileStorage, MemoryStorage, StorageBackend};
