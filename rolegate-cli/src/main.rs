//! Rolegate CLI - drive the session layer from a terminal
//!
//! Stores a session obtained elsewhere, sends authenticated requests through
//! the refresh-aware client and evaluates the access gate for the stored user.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rolegate_access::{normalize_role, AccessGate, AccessRequirement, GateDecision};
use rolegate_client::{HttpClient, SessionStore};
use rolegate_core::{
    init_logging, log_operation_error, log_operation_start, log_operation_success, AccessToken,
    LoggingConfig, RolegateConfig, SessionUser,
};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "rolegate")]
#[command(about = "Session, token refresh and role gating for a role-gated web API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a session obtained from the login flow
    Login {
        /// Access token
        #[arg(short, long)]
        token: String,

        /// User record as JSON, e.g. '{"id":1,"role":"coach"}'
        #[arg(short, long)]
        user: String,
    },

    /// Show the stored user and role
    Whoami,

    /// Clear the stored session
    Logout,

    /// Authenticated GET, relative to the configured base URL
    Get {
        /// Request path, e.g. /users/me
        path: String,
    },

    /// Evaluate the access gate for the stored session
    Check {
        /// Minimum role
        #[arg(long)]
        role: Option<String>,

        /// Any of these minimum roles (comma separated)
        #[arg(long, value_delimiter = ',')]
        roles: Vec<String>,

        /// Only these exact roles (comma separated)
        #[arg(long, value_delimiter = ',')]
        exact: Vec<String>,
    },

    /// Normalize a raw role string
    Role {
        /// Raw role as sent by the server
        raw: String,
    },

    /// Configuration management
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logging_config = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig::default()
    };
    init_logging(&logging_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting rolegate CLI v{}", env!("CARGO_PKG_VERSION"));

    let config_path = cli.config.clone().or_else(RolegateConfig::default_path);

    if let Commands::Config { show, init } = cli.command {
        return handle_config(config_path, show, init);
    }

    let config = load_config(config_path.as_ref())?;

    match cli.command {
        Commands::Login { token, user } => handle_login(&config, &token, &user),
        Commands::Whoami => handle_whoami(&config),
        Commands::Logout => handle_logout(&config),
        Commands::Get { path } => handle_get(&config, &path).await,
        Commands::Check { role, roles, exact } => handle_check(&config, role, roles, exact),
        Commands::Role { raw } => {
            handle_role(&raw);
            Ok(())
        }
        Commands::Config { .. } => Ok(()),
    }
}

fn load_config(config_path: Option<&PathBuf>) -> anyhow::Result<RolegateConfig> {
    let mut config = match config_path {
        Some(path) if path.exists() => {
            info!("Loading configuration from {:?}", path);
            RolegateConfig::from_file(path)?
        }
        _ => {
            info!("No configuration file found, using defaults");
            RolegateConfig::default()
        }
    };

    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

fn open_session(config: &RolegateConfig) -> anyhow::Result<SessionStore> {
    SessionStore::open_profile(&config.storage)
        .with_context(|| format!("Failed to open profile '{}'", config.storage.profile))
}

fn handle_login(config: &RolegateConfig, token: &str, user: &str) -> anyhow::Result<()> {
    log_operation_start!("login");

    let Some(token) = AccessToken::new(token) else {
        bail!("Access token must not be empty");
    };
    let user: SessionUser =
        serde_json::from_str(user).context("User record is not valid JSON")?;

    let session = open_session(config)?;
    if let Err(e) = session.set_session(&token, &user) {
        log_operation_error!("login", e);
        return Err(e.into());
    }

    log_operation_success!("login", user_id = %user.id);
    println!(
        "Signed in as {} ({})",
        user.display_string(),
        normalize_role(user.role.as_deref())
    );
    Ok(())
}

fn handle_whoami(config: &RolegateConfig) -> anyhow::Result<()> {
    let session = open_session(config)?;
    let Some((token, user)) = session.current_session() else {
        println!("Not signed in");
        return Ok(());
    };

    let role = normalize_role(user.role.as_deref());
    println!("User:  {}", user.display_string());
    println!("Id:    {}", user.id);
    println!("Role:  {} (level {})", role, role.level());
    match token.expires_at() {
        Some(expiry) if token.is_expired() => println!("Token: expired at {}", expiry),
        Some(expiry) => println!("Token: expires at {}", expiry),
        None => println!("Token: opaque"),
    }
    Ok(())
}

fn handle_logout(config: &RolegateConfig) -> anyhow::Result<()> {
    open_session(config)?.clear()?;
    println!("Signed out");
    Ok(())
}

async fn handle_get(config: &RolegateConfig, path: &str) -> anyhow::Result<()> {
    log_operation_start!("get", path = path);

    let session = open_session(config)?;
    let client = HttpClient::new(config.api.clone(), session)?;

    match client.get(path).await {
        Ok(response) => {
            let status = response.status();
            let body = response.text().await.context("Failed to read response body")?;
            log_operation_success!("get", status = status.as_u16());
            println!("HTTP {}", status);
            if !body.is_empty() {
                println!("{}", body);
            }
            Ok(())
        }
        Err(e) if e.requires_login() => {
            e.log();
            if let Err(clear_err) = client.end_session() {
                warn!("Failed to clear session: {}", clear_err);
            }
            println!("Session expired; redirecting to {}", config.gate.login_path);
            Err(e.into())
        }
        Err(e) => {
            log_operation_error!("get", e);
            Err(e.into())
        }
    }
}

fn handle_check(
    config: &RolegateConfig,
    role: Option<String>,
    roles: Vec<String>,
    exact: Vec<String>,
) -> anyhow::Result<()> {
    let mut requirement = AccessRequirement::authenticated()
        .with_roles(roles)
        .with_exact_roles(exact);
    if let Some(role) = role {
        requirement = requirement.with_role(role);
    }

    if !requirement.is_role_restricted() {
        info!("No role constraints given, checking for a signed-in session only");
    }

    let session = open_session(config)?;
    let token = session.get_token();
    let user = session.get_user();
    let gate = AccessGate::from_config(&config.gate);

    let decision = gate.check_session(user.as_ref(), token.is_some(), &requirement);
    println!("{}", serde_json::to_string_pretty(&decision)?);

    if let GateDecision::Redirect { to, reason } = decision {
        bail!("Access denied ({}); redirect to {}", reason, to);
    }
    Ok(())
}

fn handle_role(raw: &str) {
    let role = normalize_role(Some(raw));
    if role.is_recognized() {
        println!("{} (level {})", role, role.level());
    } else {
        println!("{} (unrecognized, level 0)", role);
    }
}

fn handle_config(config_path: Option<PathBuf>, show: bool, init: bool) -> anyhow::Result<()> {
    let Some(config_path) = config_path else {
        bail!("Could not determine a configuration directory; pass --config");
    };

    if init {
        if config_path.exists() {
            bail!("Configuration already exists at {:?}", config_path);
        }
        RolegateConfig::default().save_to_file(&config_path)?;
        println!("Configuration initialized at: {:?}", config_path);
    }

    if show {
        let config = load_config(Some(&config_path))?;
        println!("{}", toml::to_string_pretty(&config)?);
    }

    if !init && !show {
        println!("Configuration file: {:?}", config_path);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_check_splits_role_lists() {
        let cli = Cli::try_parse_from([
            "rolegate",
            "check",
            "--role",
            "creator",
            "--roles",
            "creator,admin",
            "--exact",
            "viewer",
        ])
        .unwrap();

        match cli.command {
            Commands::Check { role, roles, exact } => {
                assert_eq!(role.as_deref(), Some("creator"));
                assert_eq!(roles, vec!["creator", "admin"]);
                assert_eq!(exact, vec!["viewer"]);
            }
            _ => panic!("expected check command"),
        }
    }

    #[test]
    fn test_missing_config_file_uses_defaults() {
        let dir = std::env::temp_dir().join("rolegate-cli-test-missing");
        let config = load_config(Some(&dir.join("absent.toml"))).unwrap();
        assert_eq!(config.gate.login_path, "/login");
    }
}
