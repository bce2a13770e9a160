//! Authenticated HTTP client
//!
//! Attaches the stored bearer token to every request. A 401 triggers one
//! shared token refresh and a single replay of the request.

use crate::refresh::{HttpTokenRefresher, RefreshCoordinator};
use crate::session::SessionStore;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::{Method, Request, RequestBuilder, Response, StatusCode};
use rolegate_core::{
    validation_error, AccessToken, ApiConfig, ErrorContext, RolegateError, RolegateResult,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// An outgoing request and whether it has already been replayed
#[derive(Debug)]
pub struct PendingRequest {
    request: Request,
    retried: bool,
}

impl PendingRequest {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            retried: false,
        }
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    /// One-way: a retried request is never retried again
    pub fn mark_retried(&mut self) {
        self.retried = true;
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Set `Authorization: Bearer <token>`, replacing any previous value
    pub fn authorize(&mut self, token: &AccessToken) -> RolegateResult<()> {
        let value = HeaderValue::from_str(&token.bearer_header())
            .map_err(|e| validation_error!(e, "access_token", "http_client"))?;
        self.request.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }

    /// Copy for replay; `None` when the body is a stream
    pub fn try_clone(&self) -> Option<Self> {
        self.request.try_clone().map(|request| Self {
            request,
            retried: self.retried,
        })
    }

    pub fn into_request(self) -> Request {
        self.request
    }
}

/// Build the shared reqwest client; the cookie store carries refresh credentials
pub(crate) fn create_http_client(api: &ApiConfig) -> RolegateResult<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&api.user_agent).map_err(|e| RolegateError::Config {
            message: format!("Invalid user agent: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_client").with_operation("create_client"),
        })?,
    );

    reqwest::Client::builder()
        .timeout(Duration::from_secs(api.timeout_seconds))
        .default_headers(headers)
        .cookie_store(true)
        .build()
        .map_err(|e| RolegateError::Internal {
            message: format!("Failed to create HTTP client: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_client").with_operation("create_client"),
        })
}

fn transport_error(error: reqwest::Error, url: &str, operation: &str) -> RolegateError {
    RolegateError::Transport {
        message: format!("Request to {} failed: {}", url, error),
        source: Some(Box::new(error)),
        context: ErrorContext::new("http_client")
            .with_operation(operation)
            .with_metadata("url", url)
            .with_suggestion("Check network connectivity and API status"),
    }
}

fn retry_exhausted(url: &str) -> RolegateError {
    RolegateError::RetryExhausted {
        status: StatusCode::UNAUTHORIZED.as_u16(),
        url: url.to_string(),
        context: ErrorContext::new("http_client")
            .with_operation("execute")
            .with_suggestion("Sign in again"),
    }
}

async fn status_error(response: Response, operation: &str) -> RolegateError {
    let status = response.status();
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();

    RolegateError::Status {
        status: status.as_u16(),
        url,
        message: if body.is_empty() {
            status.canonical_reason().unwrap_or("Unknown error").to_string()
        } else {
            body
        },
        context: ErrorContext::new("http_client")
            .with_operation(operation)
            .with_suggestion(match status.as_u16() {
                403 => "The signed-in role may not access this resource",
                404 => "Check the request path",
                _ => "Check network connectivity and API status",
            }),
    }
}

/// HTTP client bound to one session and one refresh coordinator
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    api: ApiConfig,
    session: SessionStore,
    coordinator: Arc<RefreshCoordinator>,
}

impl HttpClient {
    /// Client with its own coordinator refreshing against `api.refresh_url()`
    pub fn new(api: ApiConfig, session: SessionStore) -> RolegateResult<Self> {
        let client = create_http_client(&api)?;
        let refresher = Arc::new(HttpTokenRefresher::new(client.clone(), &api));
        let coordinator = Arc::new(RefreshCoordinator::new(
            refresher,
            session.clone(),
            Duration::from_secs(api.refresh_timeout_seconds),
        ));

        Ok(Self {
            client,
            api,
            session,
            coordinator,
        })
    }

    /// Client for another API on the same session.
    ///
    /// Shares the session store, cookie jar and refresh coordinator with
    /// `self`, so a refresh triggered through either client is seen by both.
    /// Refreshes still go to the endpoint this client was created with, and
    /// the connection settings of `api` other than the base URL are ignored.
    pub fn for_api(&self, api: ApiConfig) -> Self {
        Self {
            client: self.client.clone(),
            api,
            session: self.session.clone(),
            coordinator: Arc::clone(&self.coordinator),
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn api(&self) -> &ApiConfig {
        &self.api
    }

    /// Request builder for a path relative to the base URL
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.api.endpoint(path))
    }

    pub async fn get(&self, path: &str) -> RolegateResult<Response> {
        self.send(self.request(Method::GET, path)).await
    }

    /// GET and decode a JSON body; non-2xx statuses become `RolegateError::Status`
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> RolegateResult<T> {
        let response = self.get(path).await?;
        if !response.status().is_success() {
            return Err(status_error(response, "get_json").await);
        }

        let url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, &url, "get_json"))?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> RolegateResult<Response> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> RolegateResult<Response> {
        self.send(self.request(Method::PUT, path).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> RolegateResult<Response> {
        self.send(self.request(Method::DELETE, path)).await
    }

    pub async fn send(&self, builder: RequestBuilder) -> RolegateResult<Response> {
        let request = builder.build().map_err(|e| {
            let url = e.url().map(|u| u.to_string()).unwrap_or_default();
            transport_error(e, &url, "build_request")
        })?;
        self.execute(request).await
    }

    /// Send a request through the auth pipeline.
    ///
    /// Responses other than 401 are returned unchanged, error statuses
    /// included. A 401 is answered by one refresh and one replay; a second 401
    /// is `RetryExhausted`. Refresh failures are returned without a replay and
    /// without touching the session. Transport errors are never retried.
    pub async fn execute(&self, request: Request) -> RolegateResult<Response> {
        let mut pending = PendingRequest::new(request);
        if let Some(token) = self.session.get_token() {
            if let Err(e) = pending.authorize(&token) {
                warn!(error = %e, "Stored token is not a valid header value, sending without it");
            }
        }

        loop {
            let replay = if pending.is_retried() {
                None
            } else {
                pending.try_clone()
            };
            let retried = pending.is_retried();
            let request = pending.into_request();
            let method = request.method().clone();
            let url = request.url().to_string();

            debug!("{} {}", method, url);
            let response = self
                .client
                .execute(request)
                .await
                .map_err(|e| transport_error(e, &url, "execute"))?;

            if response.status() != StatusCode::UNAUTHORIZED {
                debug!("{} {} -> {}", method, url, response.status());
                return Ok(response);
            }

            if retried {
                warn!("{} {} still unauthorized after token refresh", method, url);
                return Err(retry_exhausted(&url));
            }

            let Some(mut replay) = replay else {
                warn!("{} {} unauthorized and its body cannot be replayed", method, url);
                return Err(retry_exhausted(&url));
            };

            debug!("{} {} unauthorized, refreshing token", method, url);
            replay.mark_retried();
            let token = self
                .coordinator
                .get_or_start_refresh()
                .await
                .map_err(|failure| RolegateError::refresh(failure, "execute"))?;
            replay.authorize(&token)?;
            pending = replay;
        }
    }

    /// Forget the stored session. Callers use this after a refresh failure
    /// before sending the user to login.
    pub fn end_session(&self) -> RolegateResult<()> {
        self.session.clear()
    }
}
