use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        info!("Loading configuration from {}", path.display());
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str::<Config>(&raw).context("Failed to parse configuration file")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    #[serde(default = "ServerConfig::default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "ServerConfig::default_static_dir")]
    pub static_dir: PathBuf,
}

impl ServerConfig {
    fn default_host() -> String {
        "0.0.0.0".into()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_data_dir() -> PathBuf {
        "./data".into()
    }

    fn default_static_dir() -> PathBuf {
        "static/dist".into()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            data_dir: Self::default_data_dir(),
            static_dir: Self::default_static_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "AuthConfig::default_admin_token")]
    pub admin_token: String,
    #[serde(default = "AuthConfig::default_session_ttl_days")]
    pub session_ttl_days: i64,
    /// When true, create the admin account below at startup if it is missing.
    /// Off by default: the normal path is the one-time /api/auth/setup flow.
    #[serde(default)]
    pub bootstrap_admin: bool,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    #[serde(default = "AuthConfig::default_admin_name")]
    pub admin_name: String,
}

impl AuthConfig {
    /// Random per-process token when the config does not pin one
    fn default_admin_token() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn default_session_ttl_days() -> i64 {
        7
    }

    fn default_admin_name() -> String {
        "Administrator".into()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_token: Self::default_admin_token(),
            session_ttl_days: Self::default_session_ttl_days(),
            bootstrap_admin: false,
            admin_email: None,
            admin_password: None,
            admin_name: Self::default_admin_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Turn sending off without discarding the SMTP settings
    #[serde(default = "EmailConfig::default_enabled")]
    pub enabled: bool,
    pub smtp_host: Option<String>,
    #[serde(default = "EmailConfig::default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default = "EmailConfig::default_smtp_tls")]
    pub smtp_tls: bool,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: Option<String>,
    #[serde(default = "EmailConfig::default_from_name")]
    pub from_name: String,
    /// Where new-lead notifications are sent. Usually the instructor's inbox.
    pub notify_address: Option<String>,
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        self.enabled && self.smtp_host.is_some() && self.from_address.is_some()
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_smtp_port() -> u16 {
        587
    }

    fn default_smtp_tls() -> bool {
        true
    }

    fn default_from_name() -> String {
        "Drivedesk".into()
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            smtp_host: None,
            smtp_port: Self::default_smtp_port(),
            smtp_tls: Self::default_smtp_tls(),
            smtp_username: None,
            smtp_password: None,
            from_address: None,
            from_name: Self::default_from_name(),
            notify_address: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "RateLimitConfig::default_enabled")]
    pub enabled: bool,
    /// Authenticated admin API endpoints
    #[serde(default = "RateLimitConfig::default_api_requests")]
    pub api_requests_per_window: u32,
    /// Unauthenticated form endpoints (contact form, review form)
    #[serde(default = "RateLimitConfig::default_public_requests")]
    pub public_requests_per_window: u32,
    /// Login and setup endpoints
    #[serde(default = "RateLimitConfig::default_auth_requests")]
    pub auth_requests_per_window: u32,
    #[serde(default = "RateLimitConfig::default_window_seconds")]
    pub window_seconds: u64,
    #[serde(default = "RateLimitConfig::default_cleanup_interval")]
    pub cleanup_interval: u64,
}

impl RateLimitConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_api_requests() -> u32 {
        100
    }

    fn default_public_requests() -> u32 {
        10
    }

    fn default_auth_requests() -> u32 {
        20
    }

    fn default_window_seconds() -> u64 {
        60
    }

    fn default_cleanup_interval() -> u64 {
        300
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            api_requests_per_window: Self::default_api_requests(),
            public_requests_per_window: Self::default_public_requests(),
            auth_requests_per_window: Self::default_auth_requests(),
            window_seconds: Self::default_window_seconds(),
            cleanup_interval: Self::default_cleanup_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".into()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "MetricsConfig::default_enabled")]
    pub enabled: bool,
}

impl MetricsConfig {
    fn default_enabled() -> bool {
        true
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.session_ttl_days, 7);
        assert!(!config.auth.bootstrap_admin);
        assert!(config.rate_limit.enabled);
        assert!(!config.email.is_configured());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9090

            [email]
            smtp_host = "smtp.example.com"
            from_address = "noreply@example.com"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.email.is_configured());
        assert_eq!(config.email.smtp_port, 587);
    }

    #[test]
    fn test_email_enabled_flag_gates_is_configured() {
        let config: Config = toml::from_str(
            r#"
            [email]
            enabled = false
            smtp_host = "smtp.example.com"
            from_address = "noreply@example.com"
            "#,
        )
        .unwrap();
        assert!(!config.email.is_configured());
    }

    #[test]
    fn test_bootstrap_admin_requires_explicit_opt_in() {
        let config: Config = toml::from_str(
            r#"
            [auth]
            admin_email = "admin@example.com"
            admin_password = "correct horse battery staple"
            "#,
        )
        .unwrap();
        // Credentials alone must not turn bootstrapping on.
        assert!(!config.auth.bootstrap_admin);
    }
}
