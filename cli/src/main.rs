use std::fs;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser};
use launch_report_client::api::ApiClient;
use launch_report_client::config::{
    ConfigLayer, ConfigResolver, DEFAULT_CONFIG_FILE, EnvSnapshot, ResolvedConfig,
};
use launch_report_client::output::{OutputFormat, render};
use launch_report_client::request::{DEFAULT_PAGE_SIZE, FilterArgs, RunRequest};
use launch_report_client::{CacheBackend, Pipeline, ReportError, open_cache};
use launch_report_core::LaunchStatus;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// CLI-specific output format enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
    Table,
    Summary,
    Detailed,
    Html,
    Csv,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(fmt: CliOutputFormat) -> Self {
        match fmt {
            CliOutputFormat::Json => Self::Json,
            CliOutputFormat::Yaml => Self::Yaml,
            CliOutputFormat::Table => Self::Table,
            CliOutputFormat::Summary => Self::Summary,
            CliOutputFormat::Detailed => Self::Detailed,
            CliOutputFormat::Html => Self::Html,
            CliOutputFormat::Csv => Self::Csv,
        }
    }
}

/// Launch status accepted by `--status`.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliStatus {
    Passed,
    Failed,
    Stopped,
    Interrupted,
    #[value(alias = "in_progress")]
    InProgress,
}

impl From<CliStatus> for LaunchStatus {
    fn from(status: CliStatus) -> Self {
        match status {
            CliStatus::Passed => Self::Passed,
            CliStatus::Failed => Self::Failed,
            CliStatus::Stopped => Self::Stopped,
            CliStatus::Interrupted => Self::Interrupted,
            CliStatus::InProgress => Self::InProgress,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "rp-report", version)]
#[command(about = "Fetch, filter, cache and render ReportPortal launches")]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,
    #[command(flatten)]
    filters: FilterOpts,
    #[command(flatten)]
    cache: CacheArgs,
    #[command(flatten)]
    output: OutputArgs,
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Args)]
struct ConnectionArgs {
    /// ReportPortal base URL (overrides config file and REPORT_PORTAL_URL).
    #[arg(long)]
    url: Option<String>,
    /// API token (overrides config file and REPORT_PORTAL_TOKEN).
    #[arg(long)]
    token: Option<String>,
    /// Project name (overrides config file and REPORT_PORTAL_PROJECT).
    #[arg(long)]
    project: Option<String>,
    /// JSON config file (default: ./config.json when present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Disable SSL certificate verification.
    #[arg(long)]
    no_verify: bool,
}

#[derive(Debug, Args)]
struct FilterOpts {
    /// Keep launches whose name contains this text (case-insensitive).
    #[arg(long)]
    name: Option<String>,
    /// Drop launches whose name contains this text (case-insensitive).
    #[arg(long)]
    exclude_name: Option<String>,
    /// Keep launches with this status.
    #[arg(long, ignore_case = true)]
    status: Option<CliStatus>,
    /// Required tags; repeatable and comma-separated.
    #[arg(long = "tags", alias = "tag")]
    tags: Vec<String>,
    /// Required attribute as KEY=VALUE; repeatable.
    #[arg(long = "attr", alias = "attributes")]
    attributes: Vec<String>,
    /// Earliest start date (YYYY-MM-DD), inclusive.
    #[arg(long)]
    start_from: Option<String>,
    /// Latest start date (YYYY-MM-DD), inclusive.
    #[arg(long)]
    start_to: Option<String>,
    /// Page number, starting at 1.
    #[arg(long, default_value_t = 1)]
    page: u32,
    /// Launches per page.
    #[arg(long, alias = "page-size", default_value_t = DEFAULT_PAGE_SIZE)]
    limit: u32,
    /// Follow pagination up to the last page.
    #[arg(long)]
    all_pages: bool,
    /// List failed tests of the matching launches.
    #[arg(long)]
    failed_tests: bool,
    /// Keep failed tests whose name contains this text (with --failed-tests).
    #[arg(long)]
    test_name: Option<String>,
}

#[derive(Debug, Args)]
struct CacheArgs {
    /// Clear the cache before fetching.
    #[arg(long, alias = "clear-cache")]
    reset_cache: bool,
    /// Neither read nor write the cache (--reset-cache still clears it).
    #[arg(long)]
    no_cache: bool,
    /// Cache entry lifetime in hours (default: 1).
    #[arg(long)]
    cache_hours: Option<f64>,
    /// Cache directory (default: ~/.launch-report/cache).
    #[arg(long)]
    cache_dir: Option<PathBuf>,
    /// Cache storage backend.
    #[arg(long, value_enum, default_value = "json")]
    cache_backend: CacheBackend,
}

#[derive(Debug, Args)]
struct OutputArgs {
    /// Output format.
    #[arg(short, long = "output", default_value = "table")]
    output: CliOutputFormat,
    /// Write the report to this file instead of stdout.
    #[arg(long)]
    output_file: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("{}", err.user_message());
        std::process::exit(err.exit_code());
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn resolve_config(cli: &Cli) -> Result<ResolvedConfig, ReportError> {
    let flags = ConfigLayer {
        base_url: cli.connection.url.clone(),
        token: cli.connection.token.clone(),
        project: cli.connection.project.clone(),
        verify_ssl: cli.connection.no_verify.then_some(false),
        cache_hours: cli.cache.cache_hours,
        cache_dir: cli.cache.cache_dir.clone(),
        ..ConfigLayer::default()
    };

    let resolver = ConfigResolver::new().with_flags(flags);
    let resolver = match &cli.connection.config {
        Some(path) => resolver.with_file(path),
        None => resolver.with_optional_file(DEFAULT_CONFIG_FILE),
    };
    resolver.with_env(EnvSnapshot::from_env()).resolve()
}

fn filter_args(opts: &FilterOpts) -> FilterArgs {
    FilterArgs {
        name: opts.name.clone(),
        exclude_name: opts.exclude_name.clone(),
        status: opts.status.map(LaunchStatus::from),
        tags: opts.tags.clone(),
        attributes: opts.attributes.clone(),
        start_from: opts.start_from.clone(),
        start_to: opts.start_to.clone(),
        page: opts.page,
        limit: opts.limit,
    }
}

fn run(cli: Cli) -> Result<(), ReportError> {
    let config = resolve_config(&cli)?;
    debug!(base_url = %config.base_url, project = %config.project, "configuration resolved");

    let format = OutputFormat::from(cli.output.output);
    let params = filter_args(&cli.filters).to_query(&config.project)?;
    let mut request = RunRequest::new(params);
    request.all_pages = cli.filters.all_pages;
    request.failed_tests = cli.filters.failed_tests;
    request.test_name = cli.filters.test_name.clone();
    request.summarize = format.needs_summary();
    request.reset_cache = cli.cache.reset_cache;
    request.no_cache = cli.cache.no_cache;

    let api = ApiClient::new(&config)?;
    let mut pipeline = Pipeline::new(api, config.base_url.clone());
    if request.reset_cache || !request.no_cache {
        if let Some(store) = open_cache(&config, cli.cache.cache_backend) {
            pipeline = pipeline.with_cache(store);
        }
    }

    let report = pipeline.run(&request)?;
    let rendered = render(&report, format)?;

    match &cli.output.output_file {
        Some(path) => {
            write_atomic(path, &rendered)?;
            info!(path = %path.display(), "report written");
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

/// Writes through a sibling temp file and a rename so a failed run never
/// leaves a truncated report behind.
fn write_atomic(path: &Path, contents: &str) -> Result<(), ReportError> {
    let fail = |e: std::io::Error| {
        ReportError::render(format!("cannot write '{}': {e}", path.display()))
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(fail)?;
        }
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    fs::write(&tmp, contents).map_err(fail)?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        fail(e)
    })
}
