//! Clap derive structures for the `medlink` CLI.

use std::net::Ipv4Addr;

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// medlink -- diagnostics for the edge discovery and sync engine
#[derive(Debug, Parser)]
#[command(
    name = "medlink",
    version,
    about = "Discover edge translation devices and manage offline sync",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Cloud API base URL (overrides config)
    #[arg(long, env = "MEDLINK_CLOUD_URL", global = true)]
    pub cloud_url: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a discovery pass over the local network
    Discover(DiscoverArgs),

    /// Health-check a single address
    Probe(ProbeArgs),

    /// Show endpoint, device, queue, and cache state
    Status,

    /// Replay the offline queue against the cloud
    Sync,

    /// Translate a piece of text through the active endpoint
    Translate(TranslateArgs),

    /// Manage known edge devices
    #[command(subcommand)]
    Device(DeviceCommand),
}

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Sweep the entire /24 instead of the heuristic ranges
    #[arg(long)]
    pub full_sweep: bool,

    /// Keep known devices that fail re-verification this run
    #[arg(long)]
    pub merge: bool,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Device address
    pub ip: Ipv4Addr,

    /// Device port
    #[arg(long, default_value = "3000")]
    pub port: u16,
}

#[derive(Debug, Args)]
pub struct TranslateArgs {
    /// Text to translate
    pub text: String,

    /// Source language code
    #[arg(long = "from")]
    pub source: String,

    /// Target language code
    #[arg(long = "to")]
    pub target: String,

    /// Medical context hint
    #[arg(long)]
    pub context: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum DeviceCommand {
    /// Probe an address and add it to the known set
    Add(ProbeArgs),

    /// Remove a device from the known set
    Remove {
        /// Device address
        ip: Ipv4Addr,
    },

    /// Pin a known device as the preferred endpoint
    Prefer {
        /// Device address
        ip: Ipv4Addr,
    },
}
