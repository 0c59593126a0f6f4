//! Fetch, cache, filter and render ReportPortal launch reports.
//!
//! This crate wires the pure pieces of `launch-report-core` to the outside
//! world: configuration resolution, the HTTP API, the cache store and the
//! renderers.
//!
//! # Main entry points
//!
//! - [`config::ConfigResolver`] resolves flags, config file and environment
//!   into a [`config::ResolvedConfig`].
//! - [`api::ApiClient`] talks to the service; [`api::LaunchApi`] is the seam
//!   tests replace.
//! - [`Pipeline`] runs one fetch, filter and aggregate cycle and returns a
//!   [`RunReport`].
//! - [`output::render`] turns a report into JSON, YAML, text or HTML.
//!
//! # Example
//!
//! ```no_run
//! use launch_report_client::api::ApiClient;
//! use launch_report_client::config::{ConfigResolver, EnvSnapshot};
//! use launch_report_client::output::{OutputFormat, render};
//! use launch_report_client::request::{FilterArgs, RunRequest};
//! use launch_report_client::{Pipeline, open_cache};
//! use launch_report_client::CacheBackend;
//!
//! let config = ConfigResolver::new()
//!     .with_optional_file("config.json")
//!     .with_env(EnvSnapshot::from_env())
//!     .resolve()?;
//!
//! let params = FilterArgs::default().to_query(&config.project)?;
//! let mut request = RunRequest::new(params);
//! request.summarize = true;
//!
//! let api = ApiClient::new(&config)?;
//! let mut pipeline = Pipeline::new(api, config.base_url.clone());
//! if let Some(store) = open_cache(&config, CacheBackend::Json) {
//!     pipeline = pipeline.with_cache(store);
//! }
//! let report = pipeline.run(&request)?;
//! print!("{}", render(&report, OutputFormat::Summary)?);
//! # Ok::<(), launch_report_client::ReportError>(())
//! ```

pub mod api;
pub mod config;
mod error;
pub mod output;
mod pipeline;
pub mod report;
pub mod request;

use launch_report_cache::{CacheStore, JsonFileStore, namespace_file, namespace_for};
use launch_report_sqlite::SqliteCacheStore;
use tracing::{debug, warn};

pub use error::{BODY_SNIPPET_CHARS, ReportError, Result, Stage};
pub use pipeline::Pipeline;
pub use report::RunReport;

use config::ResolvedConfig;

/// File name of the SQLite cache database inside the cache directory.
pub const SQLITE_CACHE_FILE: &str = "cache.db";

/// Persistent cache backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum CacheBackend {
    /// One JSON file per service host.
    #[default]
    Json,
    /// A shared SQLite database.
    Sqlite,
}

/// Opens the cache store for `config`'s service.
///
/// Returns `None`, after logging a warning, if the store cannot be opened; the
/// run then proceeds without a cache.
pub fn open_cache(config: &ResolvedConfig, backend: CacheBackend) -> Option<Box<dyn CacheStore>> {
    let namespace = namespace_for(&config.base_url);
    match backend {
        CacheBackend::Json => {
            let path = namespace_file(&config.cache_dir, &namespace);
            debug!(path = %path.display(), "using JSON cache");
            Some(Box::new(JsonFileStore::new(path, config.cache_ttl)))
        }
        CacheBackend::Sqlite => {
            let path = config.cache_dir.join(SQLITE_CACHE_FILE);
            debug!(path = %path.display(), %namespace, "using SQLite cache");
            match SqliteCacheStore::open(&path, namespace, config.cache_ttl) {
                Ok(store) => Some(Box::new(store)),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "cannot open SQLite cache, continuing without cache");
                    None
                }
            }
        }
    }
}
