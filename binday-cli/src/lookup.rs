use std::io::{self, Write};

use anyhow::Result;
use clap::Args;

use binday_core::service::BindayService;

use crate::output;

#[derive(Args)]
pub(crate) struct LookupArgs {
    /// Street address to look up, e.g. "1 Devlin Street, Ryde"
    address: String,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

pub(crate) async fn run(service: &BindayService, args: LookupArgs) -> Result<()> {
    let query = crate::parse_address(&args.address)?;
    let snapshot = service.waste_collection_info(&query).await?;
    let today = service.clock().today();

    let mut out = io::stdout().lock();
    if args.json {
        output::write_snapshot_json(&mut out, &snapshot, today)?;
    } else {
        output::write_snapshot_table(&mut out, &snapshot, today)?;
    }
    out.flush()?;
    Ok(())
}
