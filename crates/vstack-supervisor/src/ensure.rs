//! The ensure pipeline (§4.4): the exact dependency-ordered sequence that
//! brings every backing service up and, optionally, warms a model. Mirrors
//! `_ensure_all` from the original daemon one stage at a time, with no
//! retries within a single run — a failed stage aborts the whole run and
//! leaves `last_error` set for `/status` to report.

use std::sync::atomic::Ordering;

use crate::error::{Result, SupervisorError};
use crate::state::Stage;
use crate::supervisor::Supervisor;

impl Supervisor {
    /// Run the ensure pipeline once, unless one is already in flight (I1:
    /// at most one ensure pipeline runs at a time). `model` is the model to
    /// warm after the services are up; `None` skips the warm stage and
    /// leaves `warm.done` untouched.
    pub async fn ensure(&self, model: Option<String>) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if state.ensuring {
                return Err(SupervisorError::Protocol(
                    "ensure already in progress".into(),
                ));
            }
            state.ensuring = true;
            state.stage = Stage::Starting;
            state.last_error = None;
        }

        let outcome = self.run_stages(model).await;

        let mut state = self.state.lock().await;
        state.ensuring = false;
        match &outcome {
            Ok(()) => {
                state.stage = Stage::Ready;
            }
            Err(e) => {
                state.stage = Stage::Error;
                state.last_error = Some(e.message());
            }
        }
        outcome
    }

    async fn run_stages(&self, model: Option<String>) -> Result<()> {
        let mut drivers = self.drivers.lock().await;

        self.set_stage(Stage::EnsureLlmServer).await;
        drivers.llm.start().await?;
        self.managed_llm
            .store(drivers.llm.managed(), Ordering::Relaxed);
        drivers.llm.ensure_ready().await?;

        self.set_stage(Stage::EnsureStt).await;
        drivers.stt.start().await?;
        drivers.stt.ensure_ready().await?;

        self.set_stage(Stage::EnsureTts).await;
        drivers.tts.start().await?;
        drivers.tts.ensure_ready().await?;

        if let Some(model) = model {
            self.set_stage(Stage::EnsureLlmWarm).await;
            drivers.llm.warm(&model).await?;
            let mut state = self.state.lock().await;
            state.warm.model = Some(model);
            state.warm.done = true;
        }

        Ok(())
    }

    async fn set_stage(&self, stage: Stage) {
        self.state.lock().await.stage = stage;
    }
}
