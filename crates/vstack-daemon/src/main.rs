//! vstack-daemon — the local service supervisor binary. Loads
//! configuration, guards against a second concurrent instance, binds the
//! control-plane listener, and runs the idle reaper alongside it until a
//! shutdown signal arrives.

use anyhow::{Context, Result};
use tracing::info;
use vstack_core::config::Config;
use vstack_core::lockfile::{AcquireResult, DaemonLockfile};
use vstack_daemon::signals;
use vstack_harness::shutdown::ShutdownSignal;
use vstack_supervisor::Supervisor;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    vstack_telemetry::logging::init_logging("vstack-daemon", "info");
    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        "vstack-daemon starting"
    );

    std::fs::create_dir_all(&config.log.dir)
        .with_context(|| format!("failed to create log directory {}", config.log.dir))?;

    let lockfile = DaemonLockfile {
        pid: std::process::id(),
        host: config.daemon.host.clone(),
        port: config.daemon.port,
        started_at: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    match lockfile.acquire() {
        Ok(AcquireResult::Acquired) => {}
        Ok(AcquireResult::StaleRemoved) => {
            // One retry after reclaiming a lock left by a crashed process.
            if !matches!(lockfile.acquire(), Ok(AcquireResult::Acquired)) {
                anyhow::bail!("failed to acquire daemon lockfile after stale cleanup");
            }
        }
        Ok(AcquireResult::AlreadyRunning(existing)) => {
            eprintln!(
                "vstack-daemon already running (pid={}, url={})",
                existing.pid,
                existing.url(),
            );
            std::process::exit(1);
        }
        Err(e) => anyhow::bail!("lockfile I/O error: {e}"),
    }

    let bind_addr = format!("{}:{}", config.daemon.host, config.daemon.port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            DaemonLockfile::remove();
            return Err(e).with_context(|| format!("failed to bind control plane on {bind_addr}"));
        }
    };
    info!(addr = %bind_addr, "control plane listener bound");

    let supervisor = std::sync::Arc::new(Supervisor::new(config));
    let router = vstack_bridge::build_router(supervisor.clone());

    let shutdown = ShutdownSignal::new();

    let reaper_handle = {
        let supervisor = supervisor.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            vstack_supervisor::reaper::run(&supervisor, shutdown).await;
        })
    };

    let server_shutdown = shutdown.clone();
    let mut server_rx = server_shutdown.subscribe();
    let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = server_rx.recv().await;
    });

    tokio::spawn(signals::wait_and_trigger(shutdown.clone()));

    info!("vstack-daemon ready");
    let serve_result = serve.await;

    let _ = reaper_handle.await;
    DaemonLockfile::remove();

    serve_result.context("control plane server error")?;
    info!("vstack-daemon shut down cleanly");
    Ok(())
}
