//! Demo entry point: runs a single harvest for one access token and prints
//! the resulting JSON document to stdout. Not a deliverable surface (spec.md
//! §1 Non-goals exclude the CLI entrypoint and file-output formatting) —
//! a production deployment drives `Supervisor::poll_forever` against a real
//! `StateStore` and its own web shell creates `new.<uuid>` markers.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::info;
use uuid::Uuid;

use esi_knife::cli::Cli;
use esi_knife::{document, MemoryStateStore, StateStore, Supervisor};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level)).init();

    info!("esi-knife v{} starting one harvest", env!("CARGO_PKG_VERSION"));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("harvest failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(MemoryStateStore::new());
    let supervisor = Supervisor::new(store.clone(), cli.base_url);

    let run_id = Uuid::new_v4().to_string();
    store.set(&format!("new.{}", run_id), cli.token, None).await;

    supervisor.reset_stale_markers().await;
    supervisor.process_new().await;

    match document::read(store.as_ref(), &run_id).await? {
        Some(doc) => {
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        }
        None => Err("harvest produced no document".into()),
    }
}
