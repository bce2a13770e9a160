//! Core data type definitions

use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Short-lived bearer credential.
///
/// Opaque to this layer. Replaced wholesale on refresh, never edited in place.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a bearer string.
    ///
    /// Blank strings are not tokens, and neither are strings that could not be
    /// sent in an `Authorization` header (anything but visible ASCII).
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_graphic()) {
            None
        } else if trimmed.len() == token.len() {
            Some(Self(token))
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Peek at the `exp` claim when the token happens to be a JWT.
    ///
    /// The signature is not verified; use this for display only.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        #[derive(Deserialize)]
        struct ExpClaim {
            exp: i64,
        }

        let parts: Vec<&str> = self.0.split('.').collect();
        if parts.len() != 3 {
            return None;
        }

        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(parts[1].trim_end_matches('='))
            .ok()?;
        let claim: ExpClaim = serde_json::from_slice(&payload).ok()?;
        Utc.timestamp_opt(claim.exp, 0).single()
    }

    /// Whether the JWT `exp` claim lies in the past. Opaque tokens are never considered expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at().map(|exp| exp <= Utc::now()).unwrap_or(false)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let visible: String = self.0.chars().take(6).collect();
        write!(f, "AccessToken({}…)", visible)
    }
}

/// Minimal user record persisted next to the access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Server-side identifier, stored as a string even when the server sends a number
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Raw role as sent by the server; may be stale, mixed case or a legacy alias
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Display fields this layer does not interpret
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl SessionUser {
    pub fn new(id: impl Into<String>, role: Option<&str>) -> Self {
        Self {
            id: id.into(),
            role: role.map(str::to_string),
            name: None,
            email: None,
            extra: HashMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Get user display string
    pub fn display_string(&self) -> String {
        match (&self.name, &self.email) {
            (Some(name), Some(email)) => format!("{} <{}>", name, email),
            (Some(name), None) => name.clone(),
            (None, Some(email)) => email.clone(),
            (None, None) => self.id.clone(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

/// Outcome of a failed refresh flight.
///
/// Cloned to every caller that waited on the same flight.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshFailure {
    #[error("refresh endpoint answered HTTP {status}")]
    Rejected { status: u16 },

    #[error("refresh endpoint unreachable: {message}")]
    Transport { message: String },

    #[error("refresh response malformed: {message}")]
    MalformedResponse { message: String },

    #[error("refresh did not settle within {after_ms} ms")]
    TimedOut { after_ms: u64 },

    #[error("refresh task aborted: {message}")]
    Aborted { message: String },
}

/// Body of a successful `POST /auth/refresh`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}
