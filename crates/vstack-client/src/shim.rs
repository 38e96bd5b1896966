//! The client shim (§4.8): auto-spawn the daemon, acquire a lease, run a
//! heartbeat ticker, ensure the stack, and release on exit. Every HTTP call
//! here carries the short client-side timeout §5 calls for (≤ 1.2s); the
//! overall budget for a slow operation (ensure, auto-spawn) comes from
//! polling that short call in a loop rather than raising its own timeout.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use vstack_core::config::Config;

use crate::error::{ClientError, Result};
use crate::spawn::spawn_detached_daemon;

const CALL_TIMEOUT: Duration = Duration::from_millis(1200);
const AUTO_SPAWN_WINDOW: Duration = Duration::from_secs(4);
const AUTO_SPAWN_POLL_INTERVAL: Duration = Duration::from_millis(200);
const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
struct AcquireResponse {
    lease_id: String,
    heartbeat_s: u64,
    #[allow(dead_code)]
    lease_ttl_s: u64,
}

/// Entry point for a process wishing to share the managed service stack.
/// Holds no per-lease state itself — call [`Client::acquire`] to get a
/// [`LeaseHandle`], which owns the heartbeat ticker and the release hook.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    status_poll_timeout_s: u64,
}

impl Client {
    /// Build a client pointed at the daemon described by `config` (the same
    /// `DAEMON_HOST`/`DAEMON_PORT`/`DAEMON_STATUS_POLL_TIMEOUT_S` the daemon
    /// itself recognizes — §6).
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(CALL_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: format!("http://{}:{}", config.daemon.host, config.daemon.port),
            status_poll_timeout_s: config.timers.status_poll_timeout_s,
        }
    }

    /// Auto-start (§4.8 step 1): if the control plane isn't reachable,
    /// spawn `daemon_binary` detached and poll the port for up to 4s.
    /// Fatal if it never becomes reachable.
    pub async fn ensure_daemon_running(&self, daemon_binary: &str) -> Result<()> {
        if self.probe().await {
            return Ok(());
        }
        spawn_detached_daemon(daemon_binary, &[], None)?;

        let deadline = Instant::now() + AUTO_SPAWN_WINDOW;
        while Instant::now() < deadline {
            if self.probe().await {
                return Ok(());
            }
            sleep(AUTO_SPAWN_POLL_INTERVAL).await;
        }
        Err(ClientError::DaemonUnreachable(self.base_url.clone()))
    }

    async fn probe(&self) -> bool {
        self.http
            .get(format!("{}/status", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Acquire (§4.8 step 2): POST `/lease/acquire` and start the
    /// heartbeat ticker (§4.8 step 3) immediately, since a lease is only
    /// alive as long as heartbeats keep landing.
    pub async fn acquire(&self, meta: Value) -> Result<LeaseHandle> {
        let resp = self
            .http
            .post(format!("{}/lease/acquire", self.base_url))
            .json(&json!({ "meta": meta }))
            .send()
            .await?
            .error_for_status()?;
        let body: AcquireResponse = resp.json().await?;

        let mut lease = LeaseHandle {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            lease_id: body.lease_id,
            status_poll_timeout_s: self.status_poll_timeout_s,
            heartbeat_cancel: None,
            heartbeat_task: None,
            released: false,
        };
        lease.start_heartbeat(body.heartbeat_s);
        Ok(lease)
    }
}

/// An acquired lease. The heartbeat ticker and release-on-drop hook live
/// here, not on [`Client`], so a client can hold several leases (e.g. for
/// several agents) independently.
pub struct LeaseHandle {
    http: reqwest::Client,
    base_url: String,
    lease_id: String,
    status_poll_timeout_s: u64,
    heartbeat_cancel: Option<watch::Sender<bool>>,
    heartbeat_task: Option<tokio::task::JoinHandle<()>>,
    released: bool,
}

impl LeaseHandle {
    pub fn lease_id(&self) -> &str {
        &self.lease_id
    }

    fn start_heartbeat(&mut self, heartbeat_s: u64) {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let http = self.http.clone();
        let url = format!("{}/lease/heartbeat", self.base_url);
        let lease_id = self.lease_id.clone();
        let period = Duration::from_secs(heartbeat_s.max(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // Errors are swallowed (§4.8 step 3): the reaper's
                        // TTL is the upper bound on a misbehaving heartbeat.
                        let _ = http
                            .post(&url)
                            .json(&json!({ "lease_id": lease_id }))
                            .send()
                            .await;
                    }
                    _ = cancel_rx.changed() => return,
                }
            }
        });
        self.heartbeat_cancel = Some(cancel_tx);
        self.heartbeat_task = Some(task);
    }

    fn stop_heartbeat(&mut self) {
        if let Some(tx) = self.heartbeat_cancel.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.heartbeat_task.take() {
            task.abort();
        }
    }

    /// Ensure (§4.8 step 4): POST `/ensure` then poll `/status` up to
    /// `status_poll_timeout_s`. Raises with the stage and captured error
    /// once the pipeline settles into `error` with `ensuring == false`.
    pub async fn ensure(&self, model: Option<String>) -> Result<()> {
        let mut body = json!({});
        if let Some(m) = &model {
            body["ollama_model"] = json!(m);
        }
        self.http
            .post(format!("{}/ensure", self.base_url))
            .json(&body)
            .send()
            .await?;

        let deadline = Instant::now() + Duration::from_secs(self.status_poll_timeout_s);
        loop {
            let status: Value = self
                .http
                .get(format!("{}/status", self.base_url))
                .send()
                .await?
                .json()
                .await?;

            let ensuring = status["ensuring"].as_bool().unwrap_or(true);
            if !ensuring {
                if let Some(err) = status["last_error"].as_str() {
                    return Err(ClientError::EnsureFailed {
                        stage: status["stage"].as_str().unwrap_or("error").to_string(),
                        last_error: err.to_string(),
                    });
                }
                let all_running = ["stt", "tts", "llm"]
                    .iter()
                    .all(|svc| status["services"][svc]["running"].as_bool().unwrap_or(false));
                let warm_ok = match &model {
                    Some(_) => status["warm"]["done"].as_bool().unwrap_or(false),
                    None => true,
                };
                if all_running && warm_ok {
                    return Ok(());
                }
            }

            if Instant::now() >= deadline {
                return Err(ClientError::EnsureTimeout(self.status_poll_timeout_s));
            }
            sleep(STATUS_POLL_INTERVAL).await;
        }
    }

    /// Release (§4.8 step 5): stop the ticker and POST `/lease/release`.
    /// Consumes `self` so a released handle can't be reused.
    pub async fn release(mut self) -> Result<()> {
        self.stop_heartbeat();
        self.released = true;
        self.http
            .post(format!("{}/lease/release", self.base_url))
            .json(&json!({ "lease_id": self.lease_id }))
            .send()
            .await?;
        Ok(())
    }
}

impl Drop for LeaseHandle {
    /// Guaranteed teardown hook (§4.8 step 5) for paths that drop the
    /// handle without calling `release()` — an early return, a panic
    /// unwinding through the caller. Best-effort: only fires if we're
    /// still inside a Tokio runtime, and its success is not observed.
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.stop_heartbeat();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let http = self.http.clone();
            let url = format!("{}/lease/release", self.base_url);
            let lease_id = self.lease_id.clone();
            handle.spawn(async move {
                let _ = http.post(url).json(&json!({ "lease_id": lease_id })).send().await;
            });
        }
    }
}
