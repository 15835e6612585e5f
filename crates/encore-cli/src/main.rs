//! encore-watch: follow one user's realtime state from the terminal.
//!
//! Streams playback, streaks, presence and the notification feed, and
//! keeps a chat socket open when a token is available. Everything that
//! happens is logged; the process runs until interrupted.

mod demo;
mod setup;
mod wiring;

use std::path::PathBuf;

use clap::Parser;
use encore_common::UserId;
use tracing_subscriber::EnvFilter;

use crate::setup::Runtime;

#[derive(Parser)]
#[command(name = "encore-watch", about = "Follow Encore realtime state for one user")]
struct Args {
    /// User whose state is watched.
    #[arg(short, long)]
    user: i64,

    /// Friends whose presence is watched. Repeatable.
    #[arg(short, long = "friend")]
    friends: Vec<i64>,

    /// Config file. Defaults to the platform config directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (e.g. `debug`).
    #[arg(long)]
    log_level: Option<String>,

    /// Serve scripted data from an in-process database instead of the network.
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let loaded = setup::load_config(args.config.as_deref());

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| loaded.config.logging.level.as_directive().to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("encore={level}").into()),
        )
        .init();

    if let Some(warning) = &loaded.warning {
        tracing::warn!("{warning}; using defaults");
    }

    let user = UserId(args.user);
    let token = std::env::var("ENCORE_TOKEN").ok().filter(|t| !t.is_empty());
    let friends: Vec<UserId> = args.friends.iter().copied().map(UserId).collect();

    let runtime = match Runtime::build(&loaded.config, args.demo, token) {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start");
            std::process::exit(1);
        }
    };

    if let Some(memory) = &runtime.memory {
        demo::seed(memory, user, &friends);
        tokio::spawn(demo::script(memory.clone(), user));
    }

    let mut session = wiring::start(&runtime, &loaded.config, user, &friends);
    tracing::info!(user = %user, demo = runtime.memory.is_some(), "encore-watch running");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for ctrl-c");
    }
    tracing::info!("Shutting down");
    session.shutdown().await;
}
