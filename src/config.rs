//! Agent configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_SESSION_FILE: &str = ".gigboard/session.json";
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_BOOTSTRAP_DELAY_MS: u64 = 100;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("unsupported URL scheme in {key}: {value:?} (expected http or https)")]
    UnsupportedScheme { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

/// Timing and feature switches for the session runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleSettings {
    /// Delay before the bootstrap guard runs its one session check.
    pub bootstrap_delay: Duration,
    /// Inactivity window before the idle monitor forces logout.
    pub idle_timeout: Duration,
    /// Static feature flag for the realtime channel.
    pub realtime_enabled: bool,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            bootstrap_delay: Duration::from_millis(DEFAULT_BOOTSTRAP_DELAY_MS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            realtime_enabled: false,
        }
    }
}

/// Sign-in credentials supplied through the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("email", &self.email).finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_base_url: String,
    pub ws_base_url: String,
    pub session_file: PathBuf,
    pub timeouts: HttpTimeouts,
    pub lifecycle: LifecycleSettings,
    pub credentials: Option<Credentials>,
}

impl Config {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `GIGBOARD_API_URL`: default `http://127.0.0.1:3000`
    /// - `GIGBOARD_WS_URL`: derived from the API URL when absent
    /// - `GIGBOARD_REALTIME_ENABLED`: default off
    /// - `GIGBOARD_IDLE_TIMEOUT_SECS`: default 600
    /// - `GIGBOARD_BOOTSTRAP_DELAY_MS`: default 100
    /// - `GIGBOARD_SESSION_FILE`: default `.gigboard/session.json`
    /// - `GIGBOARD_REQUEST_TIMEOUT_SECS`: default 30
    /// - `GIGBOARD_CONNECT_TIMEOUT_SECS`: default 10
    /// - `GIGBOARD_EMAIL` + `GIGBOARD_PASSWORD`: sign-in credentials
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build typed config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a value is present but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = lookup("GIGBOARD_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let ws_base_url = match lookup("GIGBOARD_WS_URL") {
            Some(raw) => raw.trim_end_matches('/').to_owned(),
            None => derive_ws_url(&api_base_url)?,
        };

        let realtime_enabled = match lookup("GIGBOARD_REALTIME_ENABLED") {
            Some(raw) => parse_flag("GIGBOARD_REALTIME_ENABLED", &raw)?,
            None => false,
        };
        let lifecycle = LifecycleSettings {
            bootstrap_delay: Duration::from_millis(parse_u64(
                &lookup,
                "GIGBOARD_BOOTSTRAP_DELAY_MS",
                DEFAULT_BOOTSTRAP_DELAY_MS,
            )?),
            idle_timeout: Duration::from_secs(parse_u64(
                &lookup,
                "GIGBOARD_IDLE_TIMEOUT_SECS",
                DEFAULT_IDLE_TIMEOUT_SECS,
            )?),
            realtime_enabled,
        };
        if lifecycle.idle_timeout.is_zero() {
            return Err(ConfigError::InvalidValue { key: "GIGBOARD_IDLE_TIMEOUT_SECS", value: "0".into() });
        }

        let timeouts = HttpTimeouts {
            request_secs: parse_u64(&lookup, "GIGBOARD_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: parse_u64(&lookup, "GIGBOARD_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };

        let session_file =
            lookup("GIGBOARD_SESSION_FILE").map_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE), PathBuf::from);

        let credentials = match (lookup("GIGBOARD_EMAIL"), lookup("GIGBOARD_PASSWORD")) {
            (Some(email), Some(password)) if !email.is_empty() => Some(Credentials { email, password }),
            _ => None,
        };

        Ok(Self { api_base_url, ws_base_url, session_file, timeouts, lifecycle, credentials })
    }
}

fn parse_u64<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        None => Ok(default),
    }
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue { key, value: raw.to_owned() }),
    }
}

fn derive_ws_url(api_base_url: &str) -> Result<String, ConfigError> {
    if let Some(rest) = api_base_url.strip_prefix("https://") {
        Ok(format!("wss://{rest}"))
    } else if let Some(rest) = api_base_url.strip_prefix("http://") {
        Ok(format!("ws://{rest}"))
    } else {
        Err(ConfigError::UnsupportedScheme { key: "GIGBOARD_API_URL", value: api_base_url.to_owned() })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
