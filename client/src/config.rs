//! Configuration resolution.
//!
//! Settings come from three kinds of [`ConfigSource`], tried in the order
//! they were added to a [`ConfigResolver`]: command-line flags, a JSON config
//! file and the environment. For every field the first source that has a
//! non-empty value wins. The result is an immutable [`ResolvedConfig`].
//!
//! # Config file
//!
//! ```json
//! {
//!   "base_url": "https://reportportal.example.com",
//!   "token": "0123abcd-...",
//!   "project": "shop",
//!   "verify_ssl": true,
//!   "cache_hours": 2,
//!   "timeout_secs": 30
//! }
//! ```
//!
//! `username`/`password` may replace `token` to select basic authentication.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use launch_report_cache::default_cache_dir;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{ReportError, Result};

/// Environment variable holding the service base URL.
pub const ENV_URL: &str = "REPORT_PORTAL_URL";
/// Environment variable holding the API token.
pub const ENV_TOKEN: &str = "REPORT_PORTAL_TOKEN";
/// Environment variable holding the project name.
pub const ENV_PROJECT: &str = "REPORT_PORTAL_PROJECT";

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CACHE_HOURS: f64 = 1.0;

/// One layer of settings. Every field is optional; absent and blank values
/// defer to the next source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub project: Option<String>,
    pub verify_ssl: Option<bool>,
    pub cache_hours: Option<f64>,
    pub timeout_secs: Option<u64>,
    pub cache_dir: Option<PathBuf>,
}

impl ConfigLayer {
    /// Reads a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Config`] if the file cannot be read or is not a
    /// valid config object.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ReportError::config(format!("cannot read config file '{}': {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            ReportError::config(format!("invalid config file '{}': {e}", path.display()))
        })
    }
}

/// The three recognized environment variables, captured once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    pub url: Option<String>,
    pub token: Option<String>,
    pub project: Option<String>,
}

impl EnvSnapshot {
    /// Reads the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Builds a snapshot from explicit variables.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            url: vars.get(ENV_URL).cloned(),
            token: vars.get(ENV_TOKEN).cloned(),
            project: vars.get(ENV_PROJECT).cloned(),
        }
    }

    fn to_layer(&self) -> ConfigLayer {
        ConfigLayer {
            base_url: self.url.clone(),
            token: self.token.clone(),
            project: self.project.clone(),
            ..ConfigLayer::default()
        }
    }
}

/// Where a layer of settings comes from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Values given on the command line.
    Flags(ConfigLayer),
    /// A JSON config file. A missing optional file is skipped.
    File { path: PathBuf, required: bool },
    /// Environment variables.
    Env(EnvSnapshot),
}

/// How requests authenticate.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Basic { username: String, password: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(***)"),
            Self::Basic { username, .. } => write!(f, "Basic({username}, ***)"),
        }
    }
}

/// Fully resolved, immutable settings for one run.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub project: String,
    pub credentials: Credentials,
    pub verify_ssl: bool,
    pub timeout: Duration,
    pub cache_ttl: chrono::Duration,
    pub cache_dir: PathBuf,
}

/// Builder for a [`ResolvedConfig`] over an ordered list of sources.
///
/// # Examples
///
/// ```
/// use launch_report_client::config::{ConfigLayer, ConfigResolver, EnvSnapshot};
///
/// let flags = ConfigLayer {
///     project: Some("shop".into()),
///     ..ConfigLayer::default()
/// };
/// let env = EnvSnapshot::from_vars([
///     ("REPORT_PORTAL_URL", "https://rp.example.com"),
///     ("REPORT_PORTAL_TOKEN", "secret"),
///     ("REPORT_PORTAL_PROJECT", "ignored"),
/// ]);
///
/// let config = ConfigResolver::new()
///     .with_flags(flags)
///     .with_env(env)
///     .resolve()
///     .unwrap();
/// assert_eq!(config.project, "shop");
/// assert_eq!(config.base_url, "https://rp.example.com");
/// ```
#[derive(Debug, Default)]
pub struct ConfigResolver {
    sources: Vec<ConfigSource>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds command-line values as a source.
    pub fn with_flags(mut self, flags: ConfigLayer) -> Self {
        self.sources.push(ConfigSource::Flags(flags));
        self
    }

    /// Adds a config file that must exist.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(ConfigSource::File {
            path: path.into(),
            required: true,
        });
        self
    }

    /// Adds a config file that is skipped when absent.
    pub fn with_optional_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(ConfigSource::File {
            path: path.into(),
            required: false,
        });
        self
    }

    /// Adds an environment snapshot as a source.
    pub fn with_env(mut self, env: EnvSnapshot) -> Self {
        self.sources.push(ConfigSource::Env(env));
        self
    }

    /// Loads every source and merges them, earlier sources first.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Config`] when a required file is missing or
    /// malformed, or when the URL, project or credentials cannot be resolved.
    pub fn resolve(self) -> Result<ResolvedConfig> {
        let mut layers = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match source {
                ConfigSource::Flags(layer) => layers.push(layer.clone()),
                ConfigSource::Env(env) => layers.push(env.to_layer()),
                ConfigSource::File { path, required } => {
                    if !required && !path.exists() {
                        debug!(path = %path.display(), "optional config file not found");
                        continue;
                    }
                    debug!(path = %path.display(), "loading config file");
                    layers.push(ConfigLayer::load(path)?);
                }
            }
        }
        resolve_layers(&layers)
    }
}

fn first_text(layers: &[ConfigLayer], field: impl Fn(&ConfigLayer) -> Option<&String>) -> Option<String> {
    layers
        .iter()
        .filter_map(|layer| field(layer))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

fn first_value<T: Copy>(layers: &[ConfigLayer], field: impl Fn(&ConfigLayer) -> Option<T>) -> Option<T> {
    layers.iter().find_map(field)
}

fn resolve_layers(layers: &[ConfigLayer]) -> Result<ResolvedConfig> {
    let base_url = first_text(layers, |l| l.base_url.as_ref()).ok_or_else(|| {
        ReportError::config(format!(
            "no service URL; pass --url, set base_url in the config file or {ENV_URL}"
        ))
    })?;
    let base_url = base_url.trim_end_matches('/').to_string();
    validate_base_url(&base_url)?;

    let project = first_text(layers, |l| l.project.as_ref()).ok_or_else(|| {
        ReportError::config(format!(
            "no project; pass --project, set project in the config file or {ENV_PROJECT}"
        ))
    })?;

    let credentials = resolve_credentials(layers)?;

    let cache_hours = first_value(layers, |l| l.cache_hours).unwrap_or(DEFAULT_CACHE_HOURS);
    if !cache_hours.is_finite() || cache_hours < 0.0 {
        return Err(ReportError::config(format!(
            "cache_hours must be a non-negative number, got {cache_hours}"
        )));
    }
    let timeout_secs = first_value(layers, |l| l.timeout_secs).unwrap_or(DEFAULT_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(ReportError::config("timeout_secs must be at least 1"));
    }

    let cache_dir = layers
        .iter()
        .find_map(|l| l.cache_dir.clone())
        .unwrap_or_else(default_cache_dir);

    Ok(ResolvedConfig {
        base_url,
        project,
        credentials,
        verify_ssl: first_value(layers, |l| l.verify_ssl).unwrap_or(true),
        timeout: Duration::from_secs(timeout_secs),
        cache_ttl: chrono::Duration::milliseconds((cache_hours * 3_600_000.0) as i64),
        cache_dir,
    })
}

/// Accepts absolute `http`/`https` URLs with a host.
fn validate_base_url(base_url: &str) -> Result<()> {
    let url = Url::parse(base_url).map_err(|e| {
        ReportError::config(format!(
            "service URL '{base_url}' is not an absolute http:// or https:// URL: {e}"
        ))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ReportError::config(format!(
            "service URL must use http:// or https://, got '{}://'",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ReportError::config("service URL has no host"));
    }
    Ok(())
}

/// A token anywhere in the chain wins over basic credentials, following the
/// same source order.
fn resolve_credentials(layers: &[ConfigLayer]) -> Result<Credentials> {
    for layer in layers {
        if let Some(token) = layer.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return Ok(Credentials::Bearer(token.to_string()));
        }
        let username = layer.username.as_deref().map(str::trim).filter(|u| !u.is_empty());
        if let (Some(username), Some(password)) = (username, layer.password.as_deref()) {
            return Ok(Credentials::Basic {
                username: username.to_string(),
                password: password.to_string(),
            });
        }
    }
    Err(ReportError::config(format!(
        "no API token; pass --token, set token in the config file or {ENV_TOKEN}"
    )))
}
