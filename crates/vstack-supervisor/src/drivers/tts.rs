use std::path::PathBuf;
use std::time::Duration;

use vstack_core::config::TtsConfig;

use crate::backoff::{poll_until_ready, Backoff};
use crate::error::{Result, SupervisorError};
use crate::probe::tts_healthy;
use crate::process;

/// Container-orchestrator commands this driver invokes against the fixed
/// compose descriptor. Detected by presence on `PATH`, preferring the
/// `docker compose` plugin subcommand and falling back to the standalone
/// `docker-compose` binary, matching the original's `_docker_compose_cmd`.
fn compose_base() -> Option<Vec<String>> {
    if which("docker") {
        return Some(vec!["docker".into(), "compose".into()]);
    }
    if which("docker-compose") {
        return Some(vec!["docker-compose".into()]);
    }
    None
}

fn which(binary: &str) -> bool {
    let Ok(path_var) = std::env::var("PATH") else {
        return false;
    };
    std::env::split_paths(&path_var).any(|dir| dir.join(binary).is_file())
}

fn host_port(base_url: &str) -> (String, u16) {
    match reqwest::Url::parse(base_url) {
        Ok(url) => (
            url.host_str().unwrap_or("127.0.0.1").to_string(),
            url.port_or_known_default().unwrap_or(80),
        ),
        Err(_) => ("127.0.0.1".to_string(), 80),
    }
}

pub struct TtsDriver {
    config: TtsConfig,
    log_dir: PathBuf,
    owned: bool,
}

impl TtsDriver {
    pub fn new(config: TtsConfig, log_dir: PathBuf) -> Self {
        Self {
            config,
            log_dir,
            owned: false,
        }
    }

    pub fn owned(&self) -> bool {
        self.owned
    }

    pub async fn is_running(&self) -> bool {
        let (host, port) = host_port(&self.config.base_url);
        tts_healthy(&host, port, &self.config.voices_url()).await
    }

    /// Invoke the orchestrator's "bring up" command. Fails immediately if
    /// no orchestrator binary is present on `PATH`.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running().await {
            return Ok(());
        }
        let Some(mut cmd) = compose_base() else {
            return Err(SupervisorError::MissingDependency(
                "no docker/docker-compose binary found on PATH".into(),
            ));
        };
        cmd.extend([
            "-f".to_string(),
            self.config.compose_file.clone(),
            "up".to_string(),
            "-d".to_string(),
        ]);

        let log = self.log_dir.join("docker.log");
        let rc = process::run_blocking(&cmd, &self.log_dir, &log, Duration::from_secs(90)).await;
        if rc != 0 {
            let tail = process::tail(&log, 12_000).await;
            return Err(SupervisorError::Protocol(format!(
                "compose up failed rc={rc}\n{tail}"
            )));
        }
        self.owned = true;
        Ok(())
    }

    /// Poll readiness with exponential backoff up to `ready_timeout_s`.
    pub async fn ensure_ready(&mut self) -> Result<()> {
        let timeout = Duration::from_secs(self.config.ready_timeout_s);
        let ready = poll_until_ready(|| self.is_running(), timeout, Backoff::default()).await;
        if ready {
            Ok(())
        } else {
            let tail = process::tail(&self.log_dir.join("docker.log"), 12_000).await;
            Err(SupervisorError::Timeout(format!(
                "TTS not ready after {}s\n{tail}",
                self.config.ready_timeout_s
            )))
        }
    }

    /// Invoke the orchestrator's "stop" command. Failures are log-only.
    pub async fn stop(&mut self) {
        if !self.owned {
            return;
        }
        if let Some(mut cmd) = compose_base() {
            cmd.extend([
                "-f".to_string(),
                self.config.compose_file.clone(),
                "stop".to_string(),
            ]);
            let log = self.log_dir.join("docker.log");
            let rc = process::run_blocking(&cmd, &self.log_dir, &log, Duration::from_secs(90)).await;
            if rc != 0 {
                tracing::warn!(rc, "compose stop exited non-zero");
            }
        }
        self.owned = false;
    }
}
