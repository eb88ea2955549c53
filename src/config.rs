//! Application configuration, read once at startup

use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATABASE_PATH: &str = "data/consulting_report.db";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_OPENAI_TIMEOUT_SECS: u64 = 120;

/// Configuration errors are fatal at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required settings: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Fixed configuration bundle passed to every component that needs it
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub admin_email: String,
    pub admin_bootstrap_key: SecretString,
    pub openai_api_key: SecretString,
    pub openai_model: String,
    pub openai_base_url: String,
    pub openai_timeout: Duration,
    pub bind_addr: String,
    /// TrueType font embedded in reports; Helvetica when unset
    pub report_font: Option<PathBuf>,
    /// Bold face; the regular face is reused when unset
    pub report_font_bold: Option<PathBuf>,
}

impl AppConfig {
    /// Load from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using any key lookup. Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let admin_email = get("ADMIN_EMAIL");
        let bootstrap_key = get("ADMIN_BOOTSTRAP_KEY");
        let openai_api_key = get("OPENAI_API_KEY");

        let mut missing = Vec::new();
        if admin_email.is_none() {
            missing.push("ADMIN_EMAIL");
        }
        if bootstrap_key.is_none() {
            missing.push("ADMIN_BOOTSTRAP_KEY");
        }
        if openai_api_key.is_none() {
            missing.push("OPENAI_API_KEY");
        }

        let (Some(admin_email), Some(bootstrap_key), Some(openai_api_key)) =
            (admin_email, bootstrap_key, openai_api_key)
        else {
            return Err(ConfigError::Missing(missing));
        };

        let openai_timeout = match get("OPENAI_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| ConfigError::Invalid {
                    key: "OPENAI_TIMEOUT_SECS",
                    reason: format!("'{}' is not a whole number of seconds", raw),
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_OPENAI_TIMEOUT_SECS),
        };

        let report_font = get("REPORT_FONT_PATH").map(PathBuf::from);
        let report_font_bold = get("REPORT_FONT_BOLD_PATH").map(PathBuf::from);
        if report_font.is_none() && report_font_bold.is_some() {
            return Err(ConfigError::Invalid {
                key: "REPORT_FONT_BOLD_PATH",
                reason: "requires REPORT_FONT_PATH".to_string(),
            });
        }

        Ok(Self {
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            admin_email: admin_email.to_lowercase(),
            admin_bootstrap_key: SecretString::from(bootstrap_key),
            openai_api_key: SecretString::from(openai_api_key),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            openai_timeout,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            report_font,
            report_font_bold,
        })
    }
}
