//! CLI argument parsing for the demo binary (spec.md Non-goals: no file-output
//! formatting, no interactive UX — this wires the library's pieces together
//! for a single manual run and prints the raw JSON document).

use clap::Parser;

use crate::config::{defaults, esi};

/// Run a single ESI harvest for one access token and print the final document.
#[derive(Parser, Debug)]
#[command(name = "esi-knife")]
#[command(version)]
#[command(about = "Harvest every ESI endpoint an access token is authorized to call", long_about = None)]
pub struct Cli {
    /// OAuth2 access token to harvest with.
    #[arg(short, long, env = "ESI_KNIFE_TOKEN")]
    pub token: String,

    /// ESI base URL (overridable for testing against a stub server).
    #[arg(short, long, default_value = esi::DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = defaults::LOG_LEVEL)]
    pub log_level: String,
}
