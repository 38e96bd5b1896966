//! The non-lease fields of the Supervisor State record (§3): ensure
//! progress, the warm-model gate, and the coarse `stage` label exposed via
//! `/status`.

use serde::Serialize;

/// Coarse progress label for the ensure pipeline (§3, §4.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Starting,
    #[serde(rename = "ensure:llm_server")]
    EnsureLlmServer,
    #[serde(rename = "ensure:stt")]
    EnsureStt,
    #[serde(rename = "ensure:tts")]
    EnsureTts,
    #[serde(rename = "ensure:llm_warm")]
    EnsureLlmWarm,
    Ready,
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Starting => "starting",
            Stage::EnsureLlmServer => "ensure:llm_server",
            Stage::EnsureStt => "ensure:stt",
            Stage::EnsureTts => "ensure:tts",
            Stage::EnsureLlmWarm => "ensure:llm_warm",
            Stage::Ready => "ready",
            Stage::Error => "error",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `warm_model`/`warm_done` (§3). `warm_model` is intentionally retained
/// across teardown (see Design Notes open question) so a later `/ensure`
/// can default intelligently; only `warm_done` resets.
#[derive(Debug, Clone, Default)]
pub struct WarmState {
    pub model: Option<String>,
    pub done: bool,
}
