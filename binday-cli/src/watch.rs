use std::io::{self, Write};
use std::num::NonZeroU32;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use binday_core::coordinator::{Coordinator, DEFAULT_SCAN_INTERVAL_HOURS, ScanInterval};
use binday_core::service::BindayService;
use binday_core::session::{AddressSession, ResolvePolicy};

use crate::output;

#[derive(Args)]
pub(crate) struct WatchArgs {
    /// Street address to poll
    address: String,

    /// Hours between refreshes, between 1 and 24
    #[arg(long, env = "BINDAY_SCAN_INTERVAL_HOURS", default_value_t = DEFAULT_SCAN_INTERVAL_HOURS)]
    scan_interval_hours: f64,

    /// Resolve the address again after this many polls instead of caching it forever
    #[arg(long, env = "BINDAY_RE_RESOLVE_EVERY")]
    re_resolve_every: Option<NonZeroU32>,

    /// Print sensor states as JSON lines
    #[arg(long)]
    json: bool,
}

pub(crate) async fn run(service: Arc<BindayService>, args: WatchArgs) -> Result<()> {
    let query = crate::parse_address(&args.address)?;
    let interval = ScanInterval::from_hours(args.scan_interval_hours)?;
    let session = AddressSession::new(query, ResolvePolicy::from_polls(args.re_resolve_every));
    let policy = session.policy();

    let mut coordinator = Coordinator::new(service, session, interval);
    tracing::info!(
        title = coordinator.title(),
        interval = ?coordinator.interval().as_duration(),
        policy = ?policy,
        "watching collection schedule"
    );

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    coordinator
        .run_until(shutdown, |sensors| {
            let mut out = io::stdout().lock();
            if let Err(err) = output::write_sensors(&mut out, sensors, args.json) {
                tracing::warn!(error = %err, "writing sensor states failed");
            }
            let _ignored = out.flush();
        })
        .await;

    tracing::info!("stopped watching");
    Ok(())
}
