//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Tachyon - real-time messaging subscribe client.
#[derive(Parser)]
#[command(name = "tachyon")]
#[command(version)]
#[command(about = "Tachyon subscribe client")]
pub struct Cli {
    /// Log level filter (tracing env-filter syntax)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Subscribe to channels and stream received events to stdout
    Subscribe(SubscribeArgs),
}

// -----------------------------------------------------------------------------
// Subscribe command
// -----------------------------------------------------------------------------

#[derive(Args)]
pub struct SubscribeArgs {
    /// Path to a TOML configuration file; flags below override it
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subscribe key for the keyset to stream from
    #[arg(long, required_unless_present = "config")]
    pub subscribe_key: Option<String>,

    /// Client identifier (auto-generated if not specified)
    #[arg(long)]
    pub uuid: Option<String>,

    /// Broker origin host
    #[arg(long)]
    pub origin: Option<String>,

    /// Channel to subscribe to (can be repeated)
    #[arg(long = "channel", action = clap::ArgAction::Append)]
    pub channels: Vec<String>,

    /// Channel group to subscribe to (can be repeated)
    #[arg(long = "group", action = clap::ArgAction::Append)]
    pub groups: Vec<String>,

    /// Also subscribe to the presence feeds of the given channels
    #[arg(long)]
    pub presence: bool,

    /// Server-side stream filter expression
    #[arg(long)]
    pub filter: Option<String>,

    /// Catch up from this timetoken instead of "now"
    #[arg(long)]
    pub timetoken: Option<u64>,

    /// Output format for received events
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per line with a timestamp
    Json,
    /// Raw payload text
    Raw,
}
