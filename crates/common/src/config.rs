//! Application configuration.

use serde::Deserialize;
use std::path::PathBuf;

use crate::time::parse_hhmm;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Story photo storage configuration.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Web Push configuration. Push is disabled when absent.
    #[serde(default)]
    pub push: Option<PushConfig>,
    /// SMTP configuration. Reminder emails are disabled when absent.
    #[serde(default)]
    pub email: Option<EmailSettings>,
    /// Daily job schedule.
    #[serde(default)]
    pub jobs: JobsConfig,
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Local file storage for story photos.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Directory files are written to.
    #[serde(default = "default_storage_path")]
    pub base_path: PathBuf,
    /// URL prefix files are served under.
    #[serde(default = "default_storage_url")]
    pub base_url: String,
    /// Largest accepted upload in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            base_path: default_storage_path(),
            base_url: default_storage_url(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// VAPID keys for Web Push.
#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// Public key (base64 URL-safe, uncompressed P-256 point) handed to browsers.
    pub vapid_public_key: String,
    /// Private key in PEM form used to sign VAPID claims.
    pub vapid_private_key_pem: String,
    /// Contact URI placed in the `sub` claim (`mailto:` or `https:`).
    pub subject: String,
}

/// SMTP relay settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    /// SMTP host.
    pub smtp_host: String,
    /// SMTP port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP username.
    #[serde(default)]
    pub username: Option<String>,
    /// SMTP password.
    #[serde(default)]
    pub password: Option<String>,
    /// Sender address.
    pub from_address: String,
    /// Sender display name.
    #[serde(default = "default_from_name")]
    pub from_name: String,
    /// Use STARTTLS instead of implicit TLS.
    #[serde(default = "default_true")]
    pub starttls: bool,
}

/// Times (UTC, `HH:MM`) at which the daily jobs run.
#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    /// Whether this replica schedules daily jobs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Streak rollover time.
    #[serde(default = "default_streak_rollover_at")]
    pub streak_rollover_at: String,
    /// Reminder email time.
    #[serde(default = "default_reminder_at")]
    pub reminder_at: String,
    /// Expired story purge time.
    #[serde(default = "default_story_cleanup_at")]
    pub story_cleanup_at: String,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            streak_rollover_at: default_streak_rollover_at(),
            reminder_at: default_reminder_at(),
            story_cleanup_at: default_story_cleanup_at(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./files")
}

fn default_storage_url() -> String {
    "/files".to_string()
}

const fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

const fn default_smtp_port() -> u16 {
    587
}

fn default_from_name() -> String {
    "habitgrid".to_string()
}

fn default_streak_rollover_at() -> String {
    "00:05".to_string()
}

fn default_reminder_at() -> String {
    "20:00".to_string()
}

fn default_story_cleanup_at() -> String {
    "00:15".to_string()
}

const fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present, into the process environment)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `HABITGRID_ENV`)
    /// 4. Environment variables with `HABITGRID__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();
        let env = std::env::var("HABITGRID_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("HABITGRID")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot express.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        for (key, value) in [
            ("jobs.streak_rollover_at", &self.jobs.streak_rollover_at),
            ("jobs.reminder_at", &self.jobs.reminder_at),
            ("jobs.story_cleanup_at", &self.jobs.story_cleanup_at),
        ] {
            parse_hhmm(value)
                .map_err(|e| config::ConfigError::Message(format!("{key}: {e}")))?;
        }
        if self.storage.max_upload_bytes == 0 {
            return Err(config::ConfigError::Message(
                "storage.max_upload_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Config {
        Config {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/habitgrid".to_string(),
                max_connections: 10,
                min_connections: 1,
            },
            storage: StorageSettings::default(),
            push: None,
            email: None,
            jobs: JobsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_defaults_validate() {
        assert!(minimal().validate().is_ok());
        let jobs = JobsConfig::default();
        assert_eq!(jobs.streak_rollover_at, "00:05");
        assert_eq!(jobs.reminder_at, "20:00");
        assert!(jobs.enabled);
    }

    #[test]
    fn test_invalid_job_time_rejected() {
        let mut config = minimal();
        config.jobs.reminder_at = "25:00".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("jobs.reminder_at"));
    }

    #[test]
    fn test_zero_upload_limit_rejected() {
        let mut config = minimal();
        config.storage.max_upload_bytes = 0;
        assert!(config.validate().is_err());
    }
}
