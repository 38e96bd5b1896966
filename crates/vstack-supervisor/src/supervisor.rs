//! The aggregate supervisor (§9 "Global supervisor state"): one record per
//! host, owned by the daemon entry point and handed to the control-plane
//! handlers and the reaper at construction time rather than reached via a
//! global.
//!
//! Mutable state is split across two locks so that `/status`'s concurrent
//! probes and `/lease/*` never wait behind a long-running ensure or
//! teardown:
//! - `state`: the lease registry plus `ensuring`/`stage`/`last_error`/`warm`
//!   — mutated only in short critical sections.
//! - `drivers`: the per-service driver instances (owning process handles)
//!   — held for the duration of an ensure pipeline run or a teardown, which
//!   I1 and the reaper's single-flight teardown already serialize against
//!   each other.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use vstack_core::config::Config;

use crate::drivers::{LlmDriver, SttDriver, TtsDriver};
use crate::leases::{AcquiredLease, HeartbeatOutcome, LeaseRegistry, ReleaseOutcome};
use crate::probe;
use crate::state::{Stage, WarmState};

pub(crate) struct SupervisorState {
    pub leases: LeaseRegistry,
    pub ensuring: bool,
    pub stage: Stage,
    pub last_error: Option<String>,
    pub warm: WarmState,
}

pub(crate) struct Drivers {
    pub stt: SttDriver,
    pub tts: TtsDriver,
    pub llm: LlmDriver,
}

pub struct Supervisor {
    pub(crate) config: Config,
    pub(crate) state: Mutex<SupervisorState>,
    pub(crate) drivers: Mutex<Drivers>,
    /// Fast, lock-free view of `services.llm.managed` for `/status`, set by
    /// the ensure pipeline right after `LlmDriver::start` returns so a
    /// concurrent `/status` call never waits on the drivers lock for the
    /// duration of a long ensure or teardown.
    pub(crate) managed_llm: Arc<AtomicBool>,
}

impl Supervisor {
    pub fn new(config: Config) -> Self {
        let log_dir = PathBuf::from(&config.log.dir);
        let lease_ttl = Duration::from_secs(config.timers.lease_ttl_s);

        let state = SupervisorState {
            leases: LeaseRegistry::new(lease_ttl, config.timers.heartbeat_s),
            ensuring: false,
            stage: Stage::Idle,
            last_error: None,
            warm: WarmState::default(),
        };

        let drivers = Drivers {
            stt: SttDriver::new(config.stt.clone(), log_dir.clone()),
            tts: TtsDriver::new(config.tts.clone(), log_dir.clone()),
            llm: LlmDriver::new(config.llm.clone(), log_dir),
        };

        Self {
            config,
            state: Mutex::new(state),
            drivers: Mutex::new(drivers),
            managed_llm: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // -- Lease Registry (§4.5) -------------------------------------------

    pub async fn acquire_lease(&self, meta: Value) -> AcquiredLease {
        self.state.lock().await.leases.acquire(meta)
    }

    pub async fn heartbeat_lease(&self, lease_id: &str) -> HeartbeatOutcome {
        self.state.lock().await.leases.heartbeat(lease_id)
    }

    pub async fn release_lease(&self, lease_id: &str) -> ReleaseOutcome {
        self.state.lock().await.leases.release(lease_id)
    }

    // -- Status (§4.7) ------------------------------------------------------

    pub async fn status(&self) -> StatusDocument {
        let (stt_running, tts_running, llm_running) = tokio::join!(
            probe::stt_healthy(&self.config.stt.health_url),
            tts_running(&self.config.tts),
            probe::llm_healthy(&self.config.llm.version_url()),
        );

        let guard = self.state.lock().await;
        StatusDocument {
            ok: true,
            leases: guard.leases.len(),
            ensuring: guard.ensuring,
            stage: guard.stage.as_str(),
            last_error: guard.last_error.clone(),
            idle_timeout_s: self.config.timers.idle_timeout_s,
            lease_ttl_s: self.config.timers.lease_ttl_s,
            services: ServicesStatus {
                stt: SttStatus {
                    running: stt_running,
                    health: self.config.stt.health_url.clone(),
                },
                tts: TtsStatus {
                    running: tts_running,
                    voices_url: self.config.tts.voices_url(),
                },
                llm: LlmStatus {
                    running: llm_running,
                    base_url: self.config.llm.api_base.clone(),
                    managed: self.managed_llm.load(Ordering::Relaxed),
                },
            },
            warm: WarmStatus {
                model: guard.warm.model.clone(),
                done: guard.warm.done,
                keep_alive: self.config.llm.warm_keep_alive.clone(),
            },
            logs: self.config.log.dir.clone(),
        }
    }
}

async fn tts_running(cfg: &vstack_core::config::TtsConfig) -> bool {
    let url = reqwest::Url::parse(&cfg.base_url).ok();
    let (host, port) = match url {
        Some(u) => (
            u.host_str().unwrap_or("127.0.0.1").to_string(),
            u.port_or_known_default().unwrap_or(80),
        ),
        None => ("127.0.0.1".to_string(), 80),
    };
    probe::tts_healthy(&host, port, &cfg.voices_url()).await
}

// ---------------------------------------------------------------------------
// Status document (exact JSON shape of §4.7)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct StatusDocument {
    pub ok: bool,
    pub leases: usize,
    pub ensuring: bool,
    pub stage: &'static str,
    pub last_error: Option<String>,
    pub idle_timeout_s: u64,
    pub lease_ttl_s: u64,
    pub services: ServicesStatus,
    pub warm: WarmStatus,
    pub logs: String,
}

#[derive(Debug, Serialize)]
pub struct ServicesStatus {
    pub stt: SttStatus,
    pub tts: TtsStatus,
    pub llm: LlmStatus,
}

#[derive(Debug, Serialize)]
pub struct SttStatus {
    pub running: bool,
    pub health: String,
}

#[derive(Debug, Serialize)]
pub struct TtsStatus {
    pub running: bool,
    pub voices_url: String,
}

#[derive(Debug, Serialize)]
pub struct LlmStatus {
    pub running: bool,
    pub base_url: String,
    pub managed: bool,
}

#[derive(Debug, Serialize)]
pub struct WarmStatus {
    pub model: Option<String>,
    pub done: bool,
    pub keep_alive: String,
}
