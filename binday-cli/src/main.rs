//! Command line surface for binday: one-shot lookups, MQTT publishing, and polling.

mod lookup;
mod output;
mod publish;
mod watch;

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use binday_core::model::AddressQuery;
use binday_core::service::BindayService;
use binday_provider_ryde::{self as ryde, RydeEndpoints};

#[derive(Parser)]
#[command(
    name = "binday",
    about = "Look up City of Ryde bin collection days",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    endpoints: EndpointArgs,

    /// Log progress at info level
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct EndpointArgs {
    /// Address search endpoint
    #[arg(long, global = true, env = "BINDAY_SEARCH_URL", default_value = ryde::SEARCH_URL)]
    search_url: String,

    /// Waste services endpoint
    #[arg(long, global = true, env = "BINDAY_SCHEDULE_URL", default_value = ryde::SCHEDULE_URL)]
    schedule_url: String,

    /// Locale sent with schedule requests
    #[arg(long, global = true, env = "BINDAY_LOCALE", default_value = ryde::DEFAULT_LOCALE)]
    locale: String,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "BINDAY_TIMEOUT_SECS", default_value_t = ryde::DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve an address and print its next collections
    Lookup(lookup::LookupArgs),

    /// Publish the next collections to an MQTT broker with discovery
    Publish(publish::PublishArgs),

    /// Poll on an interval and print per-category sensor states
    Watch(watch::WatchArgs),
}

impl Command {
    fn default_level(&self, verbose: bool) -> LevelFilter {
        match self {
            _ if verbose => LevelFilter::INFO,
            Command::Publish(_) | Command::Watch(_) => LevelFilter::INFO,
            Command::Lookup(_) => LevelFilter::WARN,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(
            cli.command.default_level(cli.verbose),
            directives.as_deref(),
        ))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Print the full error chain (anyhow's alternate Display)
            let _ignored = writeln!(io::stderr(), "error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` directives when set, otherwise the subcommand's default level.
fn log_filter(default_level: LevelFilter, directives: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .parse_lossy(directives.unwrap_or_default())
}

async fn run(cli: Cli) -> Result<()> {
    let timeout = Duration::from_secs(cli.endpoints.timeout_secs);
    let service = Arc::new(build_service(cli.endpoints, timeout)?);

    match cli.command {
        Command::Lookup(args) => lookup::run(&service, args).await,
        Command::Publish(args) => publish::run(&service, args, timeout).await,
        Command::Watch(args) => watch::run(service, args).await,
    }
}

fn build_service(args: EndpointArgs, timeout: Duration) -> Result<BindayService> {
    let client = ryde::http_client(timeout).context("building HTTP client")?;
    let endpoints = RydeEndpoints {
        search_url: args.search_url,
        schedule_url: args.schedule_url,
        locale: args.locale,
    };
    Ok(BindayService::new(ryde::plugin(client, endpoints)))
}

fn parse_address(input: &str) -> Result<AddressQuery> {
    AddressQuery::new(input).context("address must not be empty")
}
