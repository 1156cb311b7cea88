#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::ignored_unit_patterns)]

//! Tachyon - subscribe client CLI entrypoint.
//!
//! Usage:
//!   tachyon subscribe --subscribe-key demo --channel news
//!   tachyon subscribe --config tachyon.toml --channel news --presence

use anyhow::Result;
use clap::Parser;
use tachyon::cli::commands::run_subscribe;
use tachyon::cli::{Cli, Commands};
use tachyon::ops::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(Some(&cli.log_level))?;

    match cli.command {
        Commands::Subscribe(args) => run_subscribe(args).await,
    }
}
