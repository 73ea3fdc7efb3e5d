//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p fieldsync_client -- [--config client.json] [--addr localhost:8080] [--player 1] [--tick-hz 60]
//!
//! Without `--player` the player id (1..=3) is read from stdin. The client connects to the host,
//! runs the sync loop, and keeps drawing its replica. If the connection fails the frontend keeps
//! running on stale state until Ctrl-C.

use std::env;
use std::io::BufRead;
use std::path::PathBuf;

use anyhow::Context;
use fieldsync_client::client::SyncClient;
use fieldsync_shared::{
    config::SyncConfig,
    frontend::run_frontend,
    input::OrbitInput,
    render::TraceRenderer,
    world::{SharedWorld, World, DEFAULT_POSITIONS},
};
use tokio::sync::watch;
use tracing::{error, info};

fn parse_args() -> anyhow::Result<SyncConfig> {
    let args: Vec<String> = env::args().collect();

    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => SyncConfig::load(&PathBuf::from(&args[i + 1]))?,
        _ => SyncConfig::default(),
    };

    let mut player: Option<u8> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--path" if i + 1 < args.len() => {
                cfg.path = args[i + 1].clone();
                i += 2;
            }
            "--player" if i + 1 < args.len() => {
                player = Some(args[i + 1].parse::<u8>().context("--player")?);
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse::<u32>().context("--tick-hz")?;
                i += 2;
            }
            "--frame-hz" if i + 1 < args.len() => {
                cfg.frame_hz = args[i + 1].parse::<u32>().context("--frame-hz")?;
                i += 2;
            }
            _ => i += 1,
        }
    }

    cfg.player_id = match player {
        Some(p) => p,
        None => read_player_id()?,
    };
    cfg.validate()?;
    Ok(cfg)
}

fn read_player_id() -> anyhow::Result<u8> {
    println!("Player id (1-3):");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read player id")?;
    line.trim().parse::<u8>().context("parse player id")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    let me = cfg.local_player()?;
    info!(server = %cfg.server_addr, player = %me, tick_hz = cfg.tick_hz, "Starting client");

    let replica = SharedWorld::new(World::new());
    let client = SyncClient::connect(&cfg, me, replica.clone())
        .await
        .context("connect")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sync = tokio::spawn(client.run(shutdown_rx.clone()));

    let frame_interval = cfg.frame_interval();
    let frontend = tokio::spawn(async move {
        let mut input = OrbitInput::new(DEFAULT_POSITIONS[me.index()], 60.0, 1.5);
        let mut renderer = TraceRenderer::new(120);
        run_frontend(
            &replica,
            me,
            &mut input,
            &mut renderer,
            frame_interval,
            shutdown_rx,
        )
        .await
    });

    tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
    info!("Interrupt received, shutting down");
    let _ = shutdown_tx.send(true);

    match sync.await {
        Ok(state) => info!(?state, "Sync stopped"),
        Err(e) => error!(error = %e, "Sync task panicked"),
    }
    match frontend.await {
        Ok(Ok(frames)) => info!(frames, "Frontend stopped"),
        Ok(Err(e)) => error!(error = %e, "Frontend failed"),
        Err(e) => error!(error = %e, "Frontend task panicked"),
    }
    Ok(())
}
