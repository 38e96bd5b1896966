use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the supervisor daemon.
///
/// `from_env()` is the primary loading path and mirrors the environment
/// variables the daemon has always recognized. `load()` additionally layers
/// an optional `~/.vstack/config.toml` underneath the environment, so a
/// fleet of similar hosts can check in shared defaults while still letting
/// per-host environment variables win.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub timers: TimersConfig,
    #[serde(default)]
    pub stt: SttConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::default(),
            timers: TimersConfig::default(),
            stt: SttConfig::default(),
            tts: TtsConfig::default(),
            llm: LlmConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Load `~/.vstack/config.toml` if present, then apply environment
    /// variable overrides on top of it. Falls back to `from_env()` alone
    /// when no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        let base = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        Ok(base.with_env_overrides())
    }

    /// Load from a specific TOML file.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(cfg)
    }

    /// Build configuration purely from the recognized environment
    /// variables, ignoring any TOML file. This is what the original daemon
    /// and its client shim did unconditionally.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Serialize to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".vstack")
            .join("config.toml")
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_string("DAEMON_HOST") {
            self.daemon.host = v;
        }
        if let Some(v) = env_u16("DAEMON_PORT") {
            self.daemon.port = v;
        }

        if let Some(v) = env_u64("DAEMON_IDLE_TIMEOUT_S") {
            self.timers.idle_timeout_s = v;
        }
        if let Some(v) = env_u64("DAEMON_LEASE_TTL_S") {
            self.timers.lease_ttl_s = v;
        }
        if let Some(v) = env_u64("DAEMON_HEARTBEAT_S") {
            self.timers.heartbeat_s = v;
        }
        if let Some(v) = env_u64("DAEMON_STATUS_POLL_TIMEOUT_S") {
            self.timers.status_poll_timeout_s = v;
        }

        if let Some(v) = env_string("STT_HEALTH_URL") {
            self.stt.health_url = v;
        }
        if let Some(v) = env_u64("STT_READY_TIMEOUT_S") {
            self.stt.ready_timeout_s = v;
        }
        if let Some(v) = env_string("STT_CMD") {
            self.stt.cmd = v.split_whitespace().map(String::from).collect();
        }

        if let Some(v) = env_string("KOKORO_BASE_URL") {
            self.tts.base_url = v;
        }
        if let Some(v) = env_string("KOKORO_VOICES_URL") {
            self.tts.voices_url = Some(v);
        }
        if let Some(v) = env_u64("KOKORO_READY_TIMEOUT_S") {
            self.tts.ready_timeout_s = v;
        }
        if let Some(v) = env_string("KOKORO_COMPOSE_FILE") {
            self.tts.compose_file = v;
        }

        if let Some(v) = env_string("OLLAMA_API_BASE") {
            self.llm.api_base = v;
        }
        if let Some(v) = env_string("OLLAMA_VERSION_URL") {
            self.llm.version_url = Some(v);
        }
        if let Some(v) = env_string("OLLAMA_GENERATE_URL") {
            self.llm.generate_url = Some(v);
        }
        if let Some(v) = env_string("OLLAMA_CMD") {
            self.llm.cmd = v;
        }
        if let Some(v) = env_bool("OLLAMA_MANAGE_SERVER") {
            self.llm.manage_server = v;
        }
        if let Some(v) = env_bool("OLLAMA_MANAGE_MODEL_UNLOAD") {
            self.llm.manage_model_unload = v;
        }
        if let Some(v) = env_u64("OLLAMA_READY_TIMEOUT_S") {
            self.llm.ready_timeout_s = v;
        }
        if let Some(v) = env_u64("OLLAMA_WARM_TIMEOUT_S") {
            self.llm.warm_timeout_s = v;
        }
        if let Some(v) = env_string("OLLAMA_WARM_KEEP_ALIVE") {
            self.llm.warm_keep_alive = v;
        }

        if let Some(v) = env_string("DAEMON_LOG_DIR") {
            self.log.dir = v;
        }

        self
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key).and_then(|v| v.parse().ok())
}

fn env_u16(key: &str) -> Option<u16> {
    env_string(key).and_then(|v| v.parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env_string(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_daemon_host")]
    pub host: String,
    #[serde(default = "default_daemon_port")]
    pub port: u16,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: default_daemon_host(),
            port: default_daemon_port(),
        }
    }
}

fn default_daemon_host() -> String {
    "127.0.0.1".into()
}
fn default_daemon_port() -> u16 {
    8790
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimersConfig {
    #[serde(default = "default_idle_timeout_s")]
    pub idle_timeout_s: u64,
    #[serde(default = "default_lease_ttl_s")]
    pub lease_ttl_s: u64,
    #[serde(default = "default_heartbeat_s")]
    pub heartbeat_s: u64,
    #[serde(default = "default_status_poll_timeout_s")]
    pub status_poll_timeout_s: u64,
}

impl Default for TimersConfig {
    fn default() -> Self {
        Self {
            idle_timeout_s: default_idle_timeout_s(),
            lease_ttl_s: default_lease_ttl_s(),
            heartbeat_s: default_heartbeat_s(),
            status_poll_timeout_s: default_status_poll_timeout_s(),
        }
    }
}

fn default_idle_timeout_s() -> u64 {
    25
}
fn default_lease_ttl_s() -> u64 {
    15
}
fn default_heartbeat_s() -> u64 {
    5
}
fn default_status_poll_timeout_s() -> u64 {
    180
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    #[serde(default = "default_stt_health_url")]
    pub health_url: String,
    #[serde(default = "default_stt_ready_timeout_s")]
    pub ready_timeout_s: u64,
    /// Command used to spawn the STT server when it isn't already healthy.
    /// Not part of the original recognized-options table (which only lists
    /// `STT_HEALTH_URL`/`STT_READY_TIMEOUT_S`); the original hardcodes this
    /// as a path into its own repository. Exposed here as `STT_CMD` (a
    /// space-separated argv) since this daemon has no such co-located
    /// script to hardcode against.
    #[serde(default = "default_stt_cmd")]
    pub cmd: Vec<String>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            health_url: default_stt_health_url(),
            ready_timeout_s: default_stt_ready_timeout_s(),
            cmd: default_stt_cmd(),
        }
    }
}

fn default_stt_health_url() -> String {
    "http://127.0.0.1:8765/health".into()
}
fn default_stt_cmd() -> Vec<String> {
    vec!["stt-server".into()]
}
fn default_stt_ready_timeout_s() -> u64 {
    90
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default = "default_tts_base_url")]
    pub base_url: String,
    /// Overrides the derived `{base_url}/v1/audio/voices` when set.
    #[serde(default)]
    pub voices_url: Option<String>,
    #[serde(default = "default_tts_ready_timeout_s")]
    pub ready_timeout_s: u64,
    #[serde(default = "default_tts_compose_file")]
    pub compose_file: String,
}

impl TtsConfig {
    pub fn voices_url(&self) -> String {
        self.voices_url
            .clone()
            .unwrap_or_else(|| format!("{}/v1/audio/voices", self.base_url.trim_end_matches('/')))
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: default_tts_base_url(),
            voices_url: None,
            ready_timeout_s: default_tts_ready_timeout_s(),
            compose_file: default_tts_compose_file(),
        }
    }
}

fn default_tts_base_url() -> String {
    "http://127.0.0.1:8880".into()
}
fn default_tts_ready_timeout_s() -> u64 {
    120
}
fn default_tts_compose_file() -> String {
    "docker-compose.kokoro.yml".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_api_base")]
    pub api_base: String,
    /// Overrides the derived `{api_base}/version` when set.
    #[serde(default)]
    pub version_url: Option<String>,
    /// Overrides the derived `{api_base}/generate` when set.
    #[serde(default)]
    pub generate_url: Option<String>,
    #[serde(default = "default_llm_cmd")]
    pub cmd: String,
    #[serde(default = "default_true")]
    pub manage_server: bool,
    #[serde(default = "default_true")]
    pub manage_model_unload: bool,
    #[serde(default = "default_llm_ready_timeout_s")]
    pub ready_timeout_s: u64,
    #[serde(default = "default_llm_warm_timeout_s")]
    pub warm_timeout_s: u64,
    #[serde(default = "default_llm_warm_keep_alive")]
    pub warm_keep_alive: String,
}

impl LlmConfig {
    pub fn version_url(&self) -> String {
        self.version_url
            .clone()
            .unwrap_or_else(|| format!("{}/version", self.api_base.trim_end_matches('/')))
    }

    pub fn generate_url(&self) -> String {
        self.generate_url
            .clone()
            .unwrap_or_else(|| format!("{}/generate", self.api_base.trim_end_matches('/')))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_llm_api_base(),
            version_url: None,
            generate_url: None,
            cmd: default_llm_cmd(),
            manage_server: default_true(),
            manage_model_unload: default_true(),
            ready_timeout_s: default_llm_ready_timeout_s(),
            warm_timeout_s: default_llm_warm_timeout_s(),
            warm_keep_alive: default_llm_warm_keep_alive(),
        }
    }
}

fn default_llm_api_base() -> String {
    "http://127.0.0.1:11434/api".into()
}
fn default_llm_cmd() -> String {
    "ollama".into()
}
fn default_true() -> bool {
    true
}
fn default_llm_ready_timeout_s() -> u64 {
    30
}
fn default_llm_warm_timeout_s() -> u64 {
    180
}
fn default_llm_warm_keep_alive() -> String {
    "5m".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
        }
    }
}

fn default_log_dir() -> String {
    ".vstack".into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch
    // them so they don't trample each other under the default test runner's
    // thread-per-test execution.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_match_spec() {
        let _guard = ENV_LOCK.lock().unwrap();
        let cfg = Config::default();
        assert_eq!(cfg.daemon.host, "127.0.0.1");
        assert_eq!(cfg.daemon.port, 8790);
        assert_eq!(cfg.timers.idle_timeout_s, 25);
        assert_eq!(cfg.timers.lease_ttl_s, 15);
        assert_eq!(cfg.timers.heartbeat_s, 5);
        assert_eq!(cfg.timers.status_poll_timeout_s, 180);
        assert_eq!(cfg.stt.ready_timeout_s, 90);
        assert_eq!(cfg.tts.ready_timeout_s, 120);
        assert_eq!(cfg.llm.ready_timeout_s, 30);
        assert_eq!(cfg.llm.warm_timeout_s, 180);
        assert_eq!(cfg.llm.warm_keep_alive, "5m");
    }

    #[test]
    fn derived_urls() {
        let _guard = ENV_LOCK.lock().unwrap();
        let tts = TtsConfig::default();
        assert_eq!(tts.voices_url(), "http://127.0.0.1:8880/v1/audio/voices");

        let llm = LlmConfig::default();
        assert_eq!(llm.version_url(), "http://127.0.0.1:11434/api/version");
        assert_eq!(llm.generate_url(), "http://127.0.0.1:11434/api/generate");
    }

    #[test]
    fn env_overrides_win_over_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("DAEMON_PORT", "9999");
        std::env::set_var("DAEMON_LEASE_TTL_S", "42");
        let cfg = Config::from_env();
        assert_eq!(cfg.daemon.port, 9999);
        assert_eq!(cfg.timers.lease_ttl_s, 42);
        std::env::remove_var("DAEMON_PORT");
        std::env::remove_var("DAEMON_LEASE_TTL_S");
    }

    #[test]
    fn toml_roundtrip() {
        let _guard = ENV_LOCK.lock().unwrap();
        let cfg = Config::default();
        let text = cfg.to_toml().unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.daemon.port, cfg.daemon.port);
        assert_eq!(parsed.llm.cmd, cfg.llm.cmd);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let cfg: Config = toml::from_str("[daemon]\nport = 9001\n").unwrap();
        assert_eq!(cfg.daemon.port, 9001);
        assert_eq!(cfg.daemon.host, "127.0.0.1");
        assert_eq!(cfg.timers.idle_timeout_s, 25);
    }
}
