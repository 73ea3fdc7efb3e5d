//! Standalone host binary.
//!
//! Usage:
//!   cargo run -p fieldsync_host -- [--config host.json] [--addr localhost:8080] [--idle-timeout-ms 30000]
//!
//! The host owns player 0 and the canonical world. It accepts clients on `ws://<addr>/player`
//! and answers every player update with the merged world. Its own player is driven by a
//! headless orbiting input and drawn by a logging renderer.

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use fieldsync_host::server::HostServer;
use fieldsync_shared::{
    config::SyncConfig,
    frontend::run_frontend,
    input::OrbitInput,
    render::TraceRenderer,
    world::{PlayerId, DEFAULT_POSITIONS},
};
use tokio::sync::watch;
use tracing::{error, info};

fn parse_args() -> anyhow::Result<SyncConfig> {
    let args: Vec<String> = env::args().collect();

    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => SyncConfig::load(&PathBuf::from(&args[i + 1]))?,
        _ => SyncConfig::default(),
    };

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
            "--frame-hz" if i + 1 < args.len() => {
                cfg.frame_hz = args[i + 1].parse::<u32>().context("--frame-hz")?;
                i += 2;
            }
            "--idle-timeout-ms" if i + 1 < args.len() => {
                cfg.idle_timeout_ms = Some(args[i + 1].parse::<u64>().context("--idle-timeout-ms")?);
                i += 2;
            }
            _ => i += 1,
        }
    }

    // The host is always player 0.
    cfg.player_id = PlayerId::HOST.get();
    cfg.validate()?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    info!(addr = %cfg.server_addr, path = %cfg.path, "Starting host");

    // Bind failure is fatal.
    let mut server = HostServer::bind(cfg.clone()).await.context("bind host")?;
    info!(local = %server.local_addr()?, "Host listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let world = server.world();
    let frame_interval = cfg.frame_interval();
    let frontend = tokio::spawn(async move {
        let home = DEFAULT_POSITIONS[PlayerId::HOST.index()];
        let mut input = OrbitInput::new(home, 60.0, 1.5);
        let mut renderer = TraceRenderer::new(120);
        run_frontend(
            &world,
            PlayerId::HOST,
            &mut input,
            &mut renderer,
            frame_interval,
            shutdown_rx,
        )
        .await
    });

    tokio::select! {
        res = server.run() => {
            res.context("accept loop")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, shutting down");
        }
    }

    let _ = shutdown_tx.send(true);
    match frontend.await {
        Ok(Ok(frames)) => info!(frames, "Frontend stopped"),
        Ok(Err(e)) => error!(error = %e, "Frontend failed"),
        Err(e) => error!(error = %e, "Frontend task panicked"),
    }
    Ok(())
}
