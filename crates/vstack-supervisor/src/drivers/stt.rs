use std::path::PathBuf;
use std::time::{Duration, Instant};

use vstack_core::config::SttConfig;

use crate::error::{Result, SupervisorError};
use crate::probe::stt_healthy;
use crate::process::{self, ProcessHandle};

/// Poll interval for the STT driver's readiness loop. Flat, not
/// exponential — the original interleaves a child-exit check with each
/// poll, which a flat interval makes simplest to reason about.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct SttDriver {
    config: SttConfig,
    log_dir: PathBuf,
    handle: Option<ProcessHandle>,
    owned: bool,
}

impl SttDriver {
    pub fn new(config: SttConfig, log_dir: PathBuf) -> Self {
        Self {
            config,
            log_dir,
            handle: None,
            owned: false,
        }
    }

    pub fn owned(&self) -> bool {
        self.owned
    }

    pub async fn is_running(&self) -> bool {
        stt_healthy(&self.config.health_url).await
    }

    /// Spawn the STT server if it isn't already healthy. No-op if it is.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running().await {
            return Ok(());
        }
        if let Some(handle) = self.handle.as_mut() {
            if handle.try_exit_code().is_none() {
                // Already spawned and hasn't exited; ensure_ready will poll it.
                return Ok(());
            }
            self.handle = None;
        }

        let log = self.log_dir.join("stt.log");
        let handle = process::spawn_hidden(&self.config.cmd, &self.log_dir, &log, &log).await?;
        self.handle = Some(handle);
        self.owned = true;
        Ok(())
    }

    /// Poll readiness every 200ms up to `ready_timeout_s`. Fails immediately
    /// with the captured log tail if a child we spawned exits early.
    pub async fn ensure_ready(&mut self) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(self.config.ready_timeout_s);
        loop {
            if self.is_running().await {
                return Ok(());
            }
            if let Some(handle) = self.handle.as_mut() {
                if let Some(code) = handle.try_exit_code() {
                    let log = process::tail(&handle.stdout_log, 12_000).await;
                    return Err(SupervisorError::EarlyExit { code, log });
                }
            }
            if Instant::now() >= deadline {
                let log = match &self.handle {
                    Some(h) => process::tail(&h.stdout_log, 12_000).await,
                    None => String::new(),
                };
                return Err(SupervisorError::Timeout(format!(
                    "STT not ready after {}s\n{log}",
                    self.config.ready_timeout_s
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Stop the driver's own child process. No-op if we don't own one.
    pub async fn stop(&mut self) {
        if !self.owned {
            return;
        }
        if let Some(mut handle) = self.handle.take() {
            process::stop(&mut handle, Duration::from_secs(4)).await;
        }
        self.owned = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(health_url: &str) -> SttConfig {
        SttConfig {
            health_url: health_url.to_string(),
            ready_timeout_s: 1,
            cmd: vec!["/definitely/not/a/real/binary".into()],
        }
    }

    #[tokio::test]
    async fn stop_without_start_is_a_noop() {
        let mut driver = SttDriver::new(cfg("http://127.0.0.1:1/health"), std::env::temp_dir());
        driver.stop().await;
        assert!(!driver.owned());
    }

    #[tokio::test]
    async fn ensure_ready_times_out_when_unreachable() {
        let mut driver = SttDriver::new(cfg("http://127.0.0.1:1/health"), std::env::temp_dir());
        let err = driver.ensure_ready().await.unwrap_err();
        assert!(matches!(err, SupervisorError::Timeout(_)));
    }
}
