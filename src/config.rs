use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

use crate::auth::jwt::MAX_TOKEN_HOURS;

/// Environment variable that overrides `auth.token_secret`.
pub const TOKEN_SECRET_ENV: &str = "AGORA_TOKEN_SECRET";

#[derive(Parser, Debug)]
#[command(name = "agora", about = "A social-content GraphQL server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub errors: ErrorsConfig,
    pub social: SocialConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub token_secret: String,
    pub token_hours: u64,
}

/// Messages containing any of these patterns are replaced before reaching clients.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ErrorsConfig {
    pub sensitive_patterns: Vec<String>,
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct SocialConfig {
    pub google_token_info_url: String,
    /// OAuth client id Google ID tokens must be issued to (`aud`)
    pub google_client_id: String,
    pub facebook_me_url: String,
    pub facebook_debug_token_url: String,
    /// App Facebook access tokens must belong to
    pub facebook_app_id: String,
    /// App access token (`app_id|app_secret`) used to inspect user tokens
    pub facebook_app_token: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "agora_token".to_string(),
            token_secret: String::new(),
            token_hours: 720,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("cookie_name", &self.cookie_name)
            .field("token_secret", &"<redacted>")
            .field("token_hours", &self.token_hours)
            .finish()
    }
}

impl std::fmt::Debug for SocialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocialConfig")
            .field("google_token_info_url", &self.google_token_info_url)
            .field("google_client_id", &self.google_client_id)
            .field("facebook_me_url", &self.facebook_me_url)
            .field("facebook_debug_token_url", &self.facebook_debug_token_url)
            .field("facebook_app_id", &self.facebook_app_id)
            .field("facebook_app_token", &"<redacted>")
            .finish()
    }
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self {
            sensitive_patterns: vec!["password".to_string(), "secret".to_string()],
        }
    }
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            google_token_info_url: "https://oauth2.googleapis.com/tokeninfo".to_string(),
            google_client_id: String::new(),
            facebook_me_url: "https://graph.facebook.com/me".to_string(),
            facebook_debug_token_url: "https://graph.facebook.com/debug_token".to_string(),
            facebook_app_id: String::new(),
            facebook_app_token: String::new(),
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        if let Ok(secret) = std::env::var(TOKEN_SECRET_ENV) {
            config.auth.token_secret = secret;
        }
        if config.auth.token_secret.is_empty() {
            tracing::warn!(
                "No token secret configured; using an ephemeral one. Sessions will not survive a restart."
            );
            config.auth.token_secret = format!(
                "{}{}",
                uuid::Uuid::new_v4().simple(),
                uuid::Uuid::new_v4().simple()
            );
        }

        if config.auth.token_hours == 0 || config.auth.token_hours > MAX_TOKEN_HOURS {
            anyhow::bail!(
                "auth.token_hours must be between 1 and {}, got {}",
                MAX_TOKEN_HOURS,
                config.auth.token_hours
            );
        }

        if config.social.google_client_id.is_empty() {
            tracing::warn!("social.google_client_id is not set; Google login is disabled");
        }
        if config.social.facebook_app_id.is_empty() || config.social.facebook_app_token.is_empty() {
            tracing::warn!("social.facebook_app_id/facebook_app_token not set; Facebook login is disabled");
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("agora.db"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".agora")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("agora.db"))
    }
}
