//! Per-service lifecycle drivers (§4.3): STT, TTS, and LLM each expose
//! `{start, ensure_ready, stop, is_running}`, with LLM additionally exposing
//! `{warm, unload}`. Every method is idempotent.

pub mod llm;
pub mod stt;
pub mod tts;

pub use llm::LlmDriver;
pub use stt::SttDriver;
pub use tts::TtsDriver;
