//! `nhub`: keep a device's notification hub registrations in sync.
//!
//! Usage:
//!   nhub --hub myhub register --device-token <hex> --tag sports
//!   nhub --hub myhub unregister-all --device-token <hex>
//!
//! The connection string comes from `--connection-string` or
//! `NHUB_CONNECTION_STRING`. Results are printed as JSON on stdout.

use anyhow::Result;
use clap::Parser;
use nhub_cli::{connect, execute, Args};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let client = connect(&args)?;
    let report = execute(&client, &args.command).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
