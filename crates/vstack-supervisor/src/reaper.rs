//! Idle Reaper (§4.6): a background task ticking every 500ms that expires
//! stale leases, and tears everything down once the lease registry has been
//! continuously empty for `idle_timeout_s`.
//!
//! Structured the same way the daemon's other background loops are:
//! `tokio::select!` between the tick interval and a shutdown receiver, so a
//! graceful shutdown can interrupt a sleeping reaper immediately rather than
//! waiting out the rest of the tick.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use vstack_harness::shutdown::{ShutdownGuard, ShutdownSignal};

use crate::state::Stage;
use crate::supervisor::Supervisor;

const TICK_INTERVAL: Duration = Duration::from_millis(500);

/// Run the reaper loop until `shutdown` fires. Intended to be spawned once
/// per daemon process alongside the control-plane listener. Holds a
/// `ShutdownGuard` for the lifetime of the loop so the orchestrator's
/// `wait_for_drain` only resolves once the final teardown has run.
pub async fn run(supervisor: &Supervisor, shutdown: ShutdownSignal) {
    let mut rx = shutdown.subscribe();
    let _guard = ShutdownGuard::new(shutdown);
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                tick(supervisor).await;
            }
            _ = rx.recv() => {
                tracing::info!("idle reaper shutting down, running final teardown");
                teardown(supervisor).await;
                return;
            }
        }
    }
}

async fn tick(supervisor: &Supervisor) {
    let idle_timeout = Duration::from_secs(supervisor.config().timers.idle_timeout_s);

    let should_teardown = {
        let mut state = supervisor.state.lock().await;
        state.leases.expire_stale();
        if state.leases.is_empty() {
            state.leases.idle_for_at_least(idle_timeout, Instant::now())
        } else {
            state.leases.refresh_activity();
            false
        }
    };

    if should_teardown {
        teardown(supervisor).await;
    }
}

/// Bring every owned/managed service back down and reset coarse state to
/// idle. Best-effort: each step runs even if an earlier one logged a
/// failure, since leaving a stray process running is worse than a noisy
/// teardown log.
pub async fn teardown(supervisor: &Supervisor) {
    let mut drivers = supervisor.drivers.lock().await;

    let warm_model = {
        let state = supervisor.state.lock().await;
        state.warm.model.clone()
    };
    if let Some(model) = warm_model {
        drivers.llm.unload(&model).await;
    }

    drivers.stt.stop().await;
    drivers.tts.stop().await;
    drivers.llm.stop().await;
    supervisor.managed_llm.store(false, Ordering::Relaxed);

    let mut state = supervisor.state.lock().await;
    state.leases.reset_idle_clock(Instant::now());
    state.stage = Stage::Idle;
    state.warm.done = false;
    state.last_error = None;
}

#[cfg(test)]
mod tests {
    use vstack_core::config::Config;
    use vstack_harness::shutdown::ShutdownSignal;

    use super::*;

    fn idle_config() -> Config {
        let mut config = Config::default();
        config.timers.idle_timeout_s = 0;
        config.timers.lease_ttl_s = 0;
        config.stt.health_url = "http://127.0.0.1:1/health".into();
        config.tts.base_url = "http://127.0.0.1:1".into();
        config.llm.api_base = "http://127.0.0.1:1/api".into();
        config
    }

    #[tokio::test]
    async fn teardown_resets_stage_and_clears_warm_done() {
        let supervisor = Supervisor::new(idle_config());
        {
            let mut state = supervisor.state.lock().await;
            state.stage = Stage::Ready;
            state.warm.done = true;
            state.warm.model = Some("llama3".into());
        }

        teardown(&supervisor).await;

        let status = supervisor.status().await;
        assert_eq!(status.stage, "idle");
        assert!(!status.warm.done);
        assert!(status.last_error.is_none());
    }

    #[tokio::test]
    async fn tick_tears_down_from_error_stage_too() {
        // Scenario 5: an ensure pipeline can fail (STT exits early) after
        // the LLM server was already spawned and marked managed. Once the
        // lease that triggered that ensure drains, the reaper must still
        // reap the managed LLM process even though `stage == error`, not
        // only from `stage == ready`.
        let supervisor = Supervisor::new(idle_config());
        {
            let mut state = supervisor.state.lock().await;
            state.stage = Stage::Error;
            state.last_error = Some("stt exited rc=3".into());
        }
        supervisor.managed_llm.store(true, Ordering::Relaxed);

        tick(&supervisor).await;

        let status = supervisor.status().await;
        assert_eq!(status.stage, "idle");
        assert!(status.last_error.is_none());
        assert!(!status.services.llm.managed);
    }

    #[tokio::test]
    async fn reaper_loop_exits_promptly_on_shutdown() {
        let signal = ShutdownSignal::new();
        let loop_signal = signal.clone();

        let handle = tokio::spawn(async move {
            run(&Supervisor::new(idle_config()), loop_signal).await;
        });

        signal.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reaper loop did not exit after shutdown")
            .unwrap();
    }
}
