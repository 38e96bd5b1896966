use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use vstack_core::config::LlmConfig;

use crate::backoff::{poll_until_ready, Backoff};
use crate::error::{Result, SupervisorError};
use crate::probe::llm_healthy;
use crate::process::{self, ProcessHandle};

pub struct LlmDriver {
    config: LlmConfig,
    log_dir: PathBuf,
    handle: Option<ProcessHandle>,
    /// True only if this driver spawned the process itself. An LLM server
    /// found already healthy on first probe is never stopped by the daemon
    /// (I4 / scenario 6: "LLM externally running").
    managed: bool,
}

impl LlmDriver {
    pub fn new(config: LlmConfig, log_dir: PathBuf) -> Self {
        Self {
            config,
            log_dir,
            handle: None,
            managed: false,
        }
    }

    pub fn managed(&self) -> bool {
        self.managed
    }

    pub async fn is_running(&self) -> bool {
        llm_healthy(&self.config.version_url()).await
    }

    /// Spawn the LLM server if `manage_server` is enabled and it isn't
    /// already healthy. If management is disabled and the probe fails,
    /// error out immediately rather than silently waiting forever.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running().await {
            return Ok(());
        }
        if !self.config.manage_server {
            return Err(SupervisorError::MissingDependency(
                "LLM server not reachable and OLLAMA_MANAGE_SERVER is disabled".into(),
            ));
        }

        let cmd = vec![self.config.cmd.clone(), "serve".to_string()];
        let log = self.log_dir.join("ollama.log");
        let handle = process::spawn_hidden(&cmd, &self.log_dir, &log, &log).await?;
        self.handle = Some(handle);
        self.managed = true;
        Ok(())
    }

    /// Poll readiness with exponential backoff up to `ready_timeout_s`.
    pub async fn ensure_ready(&mut self) -> Result<()> {
        let timeout = Duration::from_secs(self.config.ready_timeout_s);
        let ready = poll_until_ready(|| self.is_running(), timeout, Backoff::default()).await;
        if ready {
            Ok(())
        } else {
            let tail = match &self.handle {
                Some(h) => process::tail(&h.stdout_log, 12_000).await,
                None => String::new(),
            };
            Err(SupervisorError::Timeout(format!(
                "LLM server not ready after {}s\n{tail}",
                self.config.ready_timeout_s
            )))
        }
    }

    /// POST `{model, prompt: "", stream: false, keep_alive}` to load the
    /// model's weights and keep them resident. Allowed up to
    /// `warm_timeout_s` since first-time weight load can be slow.
    pub async fn warm(&self, model: &str) -> Result<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.warm_timeout_s))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let body = json!({
            "model": model,
            "prompt": "",
            "stream": false,
            "keep_alive": self.config.warm_keep_alive,
        });

        let resp = client
            .post(self.config.generate_url())
            .json(&body)
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(SupervisorError::Protocol(format!(
                "warm failed with status {}",
                resp.status()
            )))
        }
    }

    /// POST the same endpoint with `keep_alive: 0` to release resident
    /// weights. Fire-and-forget: failures are ignored, matching teardown's
    /// "best effort" contract.
    pub async fn unload(&self, model: &str) {
        if !self.config.manage_model_unload {
            return;
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let body = json!({
            "model": model,
            "prompt": "",
            "stream": false,
            "keep_alive": 0,
        });
        let _ = client
            .post(self.config.generate_url())
            .json(&body)
            .send()
            .await;
    }

    /// Stop the process only if this driver spawned it (I4).
    pub async fn stop(&mut self) {
        if !self.managed {
            return;
        }
        if let Some(mut handle) = self.handle.take() {
            process::stop(&mut handle, Duration::from_secs(4)).await;
        }
        self.managed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> LlmConfig {
        LlmConfig {
            api_base: "http://127.0.0.1:1/api".into(),
            version_url: None,
            generate_url: None,
            cmd: "ollama".into(),
            manage_server: false,
            manage_model_unload: true,
            ready_timeout_s: 1,
            warm_timeout_s: 1,
            warm_keep_alive: "5m".into(),
        }
    }

    #[tokio::test]
    async fn start_errors_immediately_when_unmanaged_and_unhealthy() {
        let mut driver = LlmDriver::new(cfg(), std::env::temp_dir());
        let err = driver.start().await.unwrap_err();
        assert!(matches!(err, SupervisorError::MissingDependency(_)));
        assert!(!driver.managed());
    }

    #[tokio::test]
    async fn stop_without_managing_is_a_noop() {
        let mut driver = LlmDriver::new(cfg(), std::env::temp_dir());
        driver.stop().await;
        assert!(!driver.managed());
    }

    #[tokio::test]
    async fn unload_is_a_noop_when_disabled() {
        let mut config = cfg();
        config.manage_model_unload = false;
        let driver = LlmDriver::new(config, std::env::temp_dir());
        // Must not attempt any network call; absence of a panic/hang is the
        // assertion here given there is no server listening at all.
        driver.unload("some-model").await;
    }
}
