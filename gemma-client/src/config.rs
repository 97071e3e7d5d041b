//! Connection settings for the LM Studio server
//!
//! Settings come from the process environment, falling back to a dotenv file
//! (`.env` by default). Process variables always win over the file, which is
//! how `dotenv` loaders behave.

use crate::error::{Error, ErrorKind, Result};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const ENV_HOST: &str = "LM_STUDIO_HOST";
pub const ENV_PORT: &str = "LM_STUDIO_PORT";
pub const ENV_MODEL: &str = "LM_STUDIO_MODEL";
pub const ENV_MAX_TOKENS: &str = "LM_STUDIO_MAX_TOKENS";
pub const ENV_TIMEOUT_SECS: &str = "LM_STUDIO_TIMEOUT_SECS";
pub const ENV_MAX_RETRIES: &str = "LM_STUDIO_MAX_RETRIES";

pub const DEFAULT_MAX_TOKENS: usize = 100;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 0;

/// Where and how to reach the LM Studio server.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Model identifier sent with every completion, e.g. `gemma-3-4b-it`
    pub model: String,
    /// Default completion length when a request does not set one
    pub max_tokens: usize,
    pub timeout: Duration,
    /// Extra attempts for connection failures, timeouts, 429 and 5xx
    pub max_retries: u32,
}

impl Settings {
    pub fn new(host: impl Into<String>, port: u16, model: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// `http://{host}:{port}`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Load settings from the process environment after merging `.env`.
    ///
    /// A missing `.env` is fine; a malformed one is a `ConfigInvalid` error.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded dotenv file"),
            Err(e) if e.not_found() => debug!("no .env file found, using process environment"),
            Err(e) => {
                return Err(Error::new(ErrorKind::ConfigInvalid, format!("failed to read .env: {}", e))
                    .with_operation("settings::from_env")
                    .set_source(e))
            }
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an explicit dotenv file without touching the
    /// process environment. Process variables still take precedence.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_vars = read_env_file(path)?;
        debug!(path = %path.display(), vars = file_vars.len(), "loaded env file");

        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| file_vars.get(key).cloned()))
    }

    /// Build settings from any key lookup.
    ///
    /// Unset and empty values count as missing. Every missing required
    /// variable is reported in one error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let host = get(ENV_HOST);
        let port = get(ENV_PORT);
        let model = get(ENV_MODEL);

        let missing: Vec<&str> = [(ENV_HOST, &host), (ENV_PORT, &port), (ENV_MODEL, &model)]
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();

        let (Some(host), Some(port), Some(model)) = (host, port, model) else {
            return Err(Error::config_missing(&missing).with_operation("settings::load"));
        };

        let port = parse_port(&port).map_err(|e| e.with_operation("settings::load"))?;

        let max_tokens = parse_optional(get(ENV_MAX_TOKENS), ENV_MAX_TOKENS, DEFAULT_MAX_TOKENS)?;
        let timeout_secs =
            parse_optional(get(ENV_TIMEOUT_SECS), ENV_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS)?;
        let max_retries =
            parse_optional(get(ENV_MAX_RETRIES), ENV_MAX_RETRIES, DEFAULT_MAX_RETRIES)?;

        if timeout_secs == 0 {
            return Err(Error::config_invalid(ENV_TIMEOUT_SECS, "timeout must be at least 1 second")
                .with_operation("settings::load"));
        }

        Ok(Self {
            host,
            port,
            model,
            max_tokens,
            timeout: Duration::from_secs(timeout_secs),
            max_retries,
        })
    }
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let iter = dotenvy::from_path_iter(path).map_err(|e| {
        let kind = if e.not_found() {
            ErrorKind::FileNotFound
        } else {
            ErrorKind::ConfigInvalid
        };
        Error::new(kind, format!("cannot read env file {}: {}", path.display(), e))
            .with_operation("settings::from_env_file")
            .set_source(e)
    })?;

    let mut vars = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| {
            Error::new(
                ErrorKind::ConfigInvalid,
                format!("malformed env file {}: {}", path.display(), e),
            )
            .with_operation("settings::from_env_file")
            .set_source(e)
        })?;
        vars.insert(key, value);
    }
    Ok(vars)
}

fn parse_port(raw: &str) -> Result<u16> {
    let port: i64 = raw
        .trim()
        .parse()
        .map_err(|_| Error::config_invalid(ENV_PORT, format!("'{}' is not an integer", raw)))?;

    if !(1..=65535).contains(&port) {
        return Err(Error::config_invalid(ENV_PORT, "Port must be between 1 and 65535"));
    }
    Ok(port as u16)
}

fn parse_optional<T: std::str::FromStr>(raw: Option<String>, name: &'static str, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| {
            Error::config_invalid(name, format!("'{}' is not a valid number", value))
                .with_operation("settings::load")
        }),
    }
}
