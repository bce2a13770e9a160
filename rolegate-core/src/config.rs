//! Configuration management

use crate::error::{ErrorContext, RolegateError, RolegateResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RolegateConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub gate: GateConfig,
}

/// Remote API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every request path is joined onto
    pub base_url: String,
    /// Path of the token refresh endpoint, relative to `base_url`
    pub refresh_path: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Upper bound for one refresh flight in seconds
    pub refresh_timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            refresh_path: "/auth/refresh".to_string(),
            timeout_seconds: 30,
            refresh_timeout_seconds: 10,
            user_agent: "rolegate/0.1".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_refresh_timeout(mut self, seconds: u64) -> Self {
        self.refresh_timeout_seconds = seconds;
        self
    }

    /// Join a request path onto the base URL
    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn refresh_url(&self) -> String {
        self.endpoint(&self.refresh_path)
    }
}

/// Where the session records live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Profile name; each profile keeps its own session
    pub profile: String,
    /// Overrides the platform data directory
    pub data_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            profile: "default".to_string(),
            data_dir: None,
        }
    }
}

impl StorageConfig {
    /// Directory holding this profile's storage file
    pub fn profile_dir(&self) -> RolegateResult<PathBuf> {
        let base = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_local_dir()
                .or_else(|| dirs::home_dir().map(|d| d.join(".local").join("share")))
                .ok_or_else(|| RolegateError::Config {
                    message: "Could not determine a data directory".to_string(),
                    source: None,
                    context: ErrorContext::new("config")
                        .with_operation("profile_dir")
                        .with_suggestion("Set storage.data_dir in the config file"),
                })?
                .join("rolegate"),
        };
        Ok(base.join(&self.profile))
    }
}

/// Access gate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Unauthenticated entry point denied navigations are sent to
    pub login_path: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
        }
    }
}

impl RolegateConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|d| d.join(".config")))
            .map(|d| d.join("rolegate").join("config.toml"))
    }

    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> RolegateResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RolegateError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: RolegateConfig =
            toml::from_str(&content).map_err(|e| RolegateError::Config {
                message: format!("Failed to parse config: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config")
                    .with_operation("parse_toml")
                    .with_suggestion("Check TOML syntax in config file"),
            })?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> RolegateResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| RolegateError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content).map_err(|e| RolegateError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Apply `ROLEGATE_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var("ROLEGATE_BASE_URL") {
            self.api.base_url = base_url;
        }
        if let Ok(profile) = std::env::var("ROLEGATE_PROFILE") {
            self.storage.profile = profile;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> RolegateResult<()> {
        if let Err(e) = url::Url::parse(&self.api.base_url) {
            return Err(RolegateError::Config {
                message: format!("api.base_url is not a valid URL: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Use an absolute URL such as https://example.com/api"),
            });
        }

        if !self.api.refresh_path.starts_with('/') {
            return Err(RolegateError::Config {
                message: "api.refresh_path must start with '/'".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set api.refresh_path to /auth/refresh"),
            });
        }

        if self.api.timeout_seconds == 0 || self.api.refresh_timeout_seconds == 0 {
            return Err(RolegateError::Config {
                message: "api timeouts must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set api.timeout_seconds and api.refresh_timeout_seconds"),
            });
        }

        if self.gate.login_path.trim().is_empty() {
            return Err(RolegateError::Config {
                message: "gate.login_path must not be empty".to_string(),
                source: None,
                context: ErrorContext::new("config").with_operation("validate"),
            });
        }

        if self.storage.profile.trim().is_empty()
            || self.storage.profile.contains(['/', '\\'])
        {
            return Err(RolegateError::Config {
                message: format!("Invalid storage profile name: '{}'", self.storage.profile),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Use a plain name without path separators"),
            });
        }

        Ok(())
    }
}
