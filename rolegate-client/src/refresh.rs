//! Single-flight token refresh
//!
//! However many requests hit a 401 at the same time, at most one refresh call
//! is in flight. Every caller that arrives while it runs awaits the same
//! outcome.

use crate::session::SessionStore;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use rolegate_core::{with_timeout, AccessToken, ApiConfig, RefreshFailure, RefreshResponse};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Obtains a new access token from the server
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> Result<AccessToken, RefreshFailure>;
}

/// `POST {base}/auth/refresh` using the ambient cookie credentials
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    client: reqwest::Client,
    url: String,
}

impl HttpTokenRefresher {
    /// `client` must share the cookie store of the session it refreshes
    pub fn new(client: reqwest::Client, api: &ApiConfig) -> Self {
        Self {
            client,
            url: api.refresh_url(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self) -> Result<AccessToken, RefreshFailure> {
        debug!("POST {}", self.url);

        let response = self
            .client
            .post(&self.url)
            .send()
            .await
            .map_err(|e| RefreshFailure::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshFailure::Rejected {
                status: status.as_u16(),
            });
        }

        let body: RefreshResponse =
            response
                .json()
                .await
                .map_err(|e| RefreshFailure::MalformedResponse {
                    message: e.to_string(),
                })?;

        AccessToken::new(body.access_token).ok_or_else(|| RefreshFailure::MalformedResponse {
            message: "missing or invalid accessToken".to_string(),
        })
    }
}

type PendingRefresh = Shared<BoxFuture<'static, Result<AccessToken, RefreshFailure>>>;

enum RefreshState {
    Idle,
    Refreshing { flight: u64, pending: PendingRefresh },
}

/// Shares one refresh call between every concurrent caller.
///
/// The refresh runs on its own task, so it settles (and persists the new
/// token) even if every caller has gone away.
pub struct RefreshCoordinator {
    refresher: Arc<dyn TokenRefresher>,
    store: SessionStore,
    timeout: Duration,
    state: Arc<Mutex<RefreshState>>,
    flights: AtomicU64,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("timeout", &self.timeout)
            .field("refreshing", &self.is_refreshing())
            .field("flights", &self.refresh_count())
            .finish()
    }
}

fn lock_state(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Return to idle, unless a newer flight already replaced this one
fn settle(state: &Mutex<RefreshState>, flight: u64) {
    let mut state = lock_state(state);
    if matches!(&*state, RefreshState::Refreshing { flight: current, .. } if *current == flight) {
        *state = RefreshState::Idle;
    }
}

impl RefreshCoordinator {
    pub fn new(refresher: Arc<dyn TokenRefresher>, store: SessionStore, timeout: Duration) -> Self {
        Self {
            refresher,
            store,
            timeout,
            state: Arc::new(Mutex::new(RefreshState::Idle)),
            flights: AtomicU64::new(0),
        }
    }

    /// Await the in-flight refresh, or start one if none is running.
    ///
    /// On success the new token has already been written to the session store
    /// when this returns. Failures are returned as-is: no retry, no clearing.
    pub async fn get_or_start_refresh(&self) -> Result<AccessToken, RefreshFailure> {
        let pending = {
            let mut state = lock_state(&self.state);
            match &*state {
                RefreshState::Refreshing { flight, pending } => {
                    debug!(flight, "Joining in-flight token refresh");
                    pending.clone()
                }
                RefreshState::Idle => {
                    let flight = self.flights.fetch_add(1, Ordering::SeqCst) + 1;
                    let pending = self.start_flight(flight);
                    *state = RefreshState::Refreshing {
                        flight,
                        pending: pending.clone(),
                    };
                    pending
                }
            }
        };

        pending.await
    }

    /// Whether a refresh call is currently in flight
    pub fn is_refreshing(&self) -> bool {
        matches!(&*lock_state(&self.state), RefreshState::Refreshing { .. })
    }

    /// Number of refresh calls started so far
    pub fn refresh_count(&self) -> u64 {
        self.flights.load(Ordering::SeqCst)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // Called with the state lock held; the spawned task cannot settle before
    // the caller has recorded the flight.
    fn start_flight(&self, flight: u64) -> PendingRefresh {
        let refresher = Arc::clone(&self.refresher);
        let store = self.store.clone();
        let state = Arc::clone(&self.state);
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);

        info!(flight, "Starting token refresh");

        let handle = tokio::spawn(async move {
            let outcome = with_timeout(refresher.refresh(), timeout_ms, "token_refresh")
                .await
                .unwrap_or(Err(RefreshFailure::TimedOut {
                    after_ms: timeout_ms,
                }));

            match &outcome {
                Ok(token) => {
                    if let Err(e) = store.set_token(token) {
                        warn!(flight, error = %e, "Refreshed token could not be persisted");
                    }
                    info!(flight, "Token refresh succeeded");
                }
                Err(failure) => {
                    warn!(flight, %failure, "Token refresh failed");
                }
            }

            settle(&state, flight);
            outcome
        });

        let state = Arc::clone(&self.state);
        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    settle(&state, flight);
                    Err(RefreshFailure::Aborted {
                        message: e.to_string(),
                    })
                }
            }
        }
        .boxed()
        .shared()
    }
}
