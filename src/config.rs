//! Chat configuration parsed from environment variables.

use std::time::Duration;

use crate::error::ChatError;

pub const DEFAULT_API_URL: &str = "https://7hn0iksiy0.execute-api.ap-south-1.amazonaws.com/prod/chat";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 30 * 60;
pub const DEFAULT_MAX_HISTORY: usize = 100;
pub const DEFAULT_ERROR_BANNER_SECS: u64 = 5;

/// Whether a new store starts clean or picks up what tab storage holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistenceMode {
    /// Wipe tab storage on construction; every store starts empty.
    #[default]
    Fresh,
    /// Restore a still-valid session and its history from tab storage.
    Restore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub session_timeout: Duration,
    pub max_history: usize,
    pub persistence: PersistenceMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(DEFAULT_SESSION_TIMEOUT_SECS),
            max_history: DEFAULT_MAX_HISTORY,
            persistence: PersistenceMode::Fresh,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    pub api_url: String,
    /// Per-attempt bound; expiry counts as a retryable timeout.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub health_timeout: Duration,
    pub max_attempts: u32,
    /// Delay before retry `n + 1` is `backoff_base * 2^n`.
    pub backoff_base: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            health_timeout: Duration::from_secs(DEFAULT_HEALTH_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub store: StoreConfig,
    pub dispatch: DispatchConfig,
    /// How long a view keeps showing an error banner.
    pub error_banner_ttl: Duration,
}

impl ChatConfig {
    /// Build typed chat config from environment variables.
    ///
    /// Optional:
    /// - `CHAT_API_URL`: hosted chatbot endpoint
    /// - `CHAT_REQUEST_TIMEOUT_SECS`: default 30
    /// - `CHAT_CONNECT_TIMEOUT_SECS`: default 10
    /// - `CHAT_HEALTH_TIMEOUT_SECS`: default 5
    /// - `CHAT_MAX_ATTEMPTS`: default 3
    /// - `CHAT_BACKOFF_BASE_MS`: default 1000
    /// - `CHAT_SESSION_TIMEOUT_SECS`: default 1800
    /// - `CHAT_MAX_HISTORY`: default 100
    /// - `CHAT_ERROR_BANNER_SECS`: default 5
    /// - `CHAT_PERSISTENCE`: `fresh` (default) or `restore`
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] for unparsable numbers, a zero attempt
    /// budget or history cap, or an unknown persistence mode.
    pub fn from_env() -> Result<Self, ChatError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ChatConfig::from_env`] but reading through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`ChatConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ChatError> {
        let api_url = lookup("CHAT_API_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let max_attempts: u32 = parse_or(&lookup, "CHAT_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        if max_attempts == 0 {
            return Err(ChatError::Config("CHAT_MAX_ATTEMPTS must be at least 1".into()));
        }
        let max_history: usize = parse_or(&lookup, "CHAT_MAX_HISTORY", DEFAULT_MAX_HISTORY)?;
        if max_history == 0 {
            return Err(ChatError::Config("CHAT_MAX_HISTORY must be at least 1".into()));
        }

        let dispatch = DispatchConfig {
            api_url,
            request_timeout: secs(parse_or(&lookup, "CHAT_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?),
            connect_timeout: secs(parse_or(&lookup, "CHAT_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?),
            health_timeout: secs(parse_or(&lookup, "CHAT_HEALTH_TIMEOUT_SECS", DEFAULT_HEALTH_TIMEOUT_SECS)?),
            max_attempts,
            backoff_base: Duration::from_millis(parse_or(&lookup, "CHAT_BACKOFF_BASE_MS", DEFAULT_BACKOFF_BASE_MS)?),
        };
        let store = StoreConfig {
            session_timeout: secs(parse_or(&lookup, "CHAT_SESSION_TIMEOUT_SECS", DEFAULT_SESSION_TIMEOUT_SECS)?),
            max_history,
            persistence: parse_persistence(lookup("CHAT_PERSISTENCE").as_deref())?,
        };
        let error_banner_ttl = secs(parse_or(&lookup, "CHAT_ERROR_BANNER_SECS", DEFAULT_ERROR_BANNER_SECS)?);

        Ok(Self { store, dispatch, error_banner_ttl })
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            dispatch: DispatchConfig::default(),
            error_banner_ttl: Duration::from_secs(DEFAULT_ERROR_BANNER_SECS),
        }
    }
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ChatError>
where
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ChatError::Config(format!("invalid {key}: '{raw}'"))),
    }
}

fn parse_persistence(raw: Option<&str>) -> Result<PersistenceMode, ChatError> {
    match raw.map(str::trim).unwrap_or("fresh") {
        "fresh" => Ok(PersistenceMode::Fresh),
        "restore" => Ok(PersistenceMode::Restore),
        other => Err(ChatError::Config(format!(
            "unsupported CHAT_PERSISTENCE '{other}' (expected 'fresh' or 'restore')"
        ))),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
