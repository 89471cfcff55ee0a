//! JSD - JSON Service Definition server and client.

use anyhow::Result;
use jsd::cli::Cli;
use jsd::config::init_logging_with_level;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging_with_level(cli.log_level.as_deref())?;

    cli.run().await
}
