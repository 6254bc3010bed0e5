//! Pipeline execution implementation.

use super::stage::{Continuation, Stage, UNKNOWN_ABORT_MESSAGE};
use crate::core::params::{ExperimentMetadata, NormalizedParameters};
use crate::core::reporter::RunResult;
use crate::error::{Result, TransformerError};
use crate::events::{null_sender, Event, EventSender, PipelineEvent, PipelinePhase};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Everything the caller supplies for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    /// Path to the experiment metadata JSON
    pub metadata: Option<PathBuf>,
    /// Raw input paths; anything starting with `-` is ignored
    pub files: Vec<String>,
    /// Folder the stage may work in
    pub working_space: Option<PathBuf>,
}

/// Runs one stage through its lifecycle
pub struct Pipeline<S> {
    stage: S,
}

impl<S: Stage> Pipeline<S> {
    pub fn new(stage: S) -> Self {
        Self { stage }
    }

    pub fn stage(&self) -> &S {
        &self.stage
    }

    /// Run the pipeline without events
    pub fn run(&self, request: &RunRequest) -> RunResult {
        self.run_with_events(request, &null_sender())
    }

    /// Run the pipeline with event reporting
    ///
    /// Always produces exactly one result; fatal errors become failures.
    pub fn run_with_events(&self, request: &RunRequest, events: &EventSender) -> RunResult {
        let start_time = Instant::now();
        events.send(Event::Pipeline(PipelineEvent::Started));

        let result = self
            .execute(request, events)
            .unwrap_or_else(RunResult::from);

        info!(
            code = result.code(),
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Run finished"
        );
        events.send(Event::Pipeline(PipelineEvent::Completed {
            code: result.code(),
        }));
        result
    }

    fn execute(&self, request: &RunRequest, events: &EventSender) -> Result<RunResult> {
        // Phase 1: Metadata
        enter(events, PipelinePhase::LoadingMetadata);
        let metadata = ExperimentMetadata::load(request.metadata.as_deref())?;

        // Phase 2: Parameters
        enter(events, PipelinePhase::Normalizing);
        let params = NormalizedParameters::derive(
            &metadata,
            &request.files,
            request.working_space.as_deref(),
            self.stage.metadata_key(),
        )?;

        // Phase 3: Feasibility
        enter(events, PipelinePhase::Checking);
        match self.stage.check_continue(&params) {
            Continuation::Proceed => debug!("Check passed, continuing"),
            Continuation::ProceedAfterFetch(code) => {
                debug!(code, "Check requested additional data");
                self.stage.prefetch(&params, events)?;
            }
            Continuation::Abort { code, message } => {
                return Err(TransformerError::Feasibility {
                    code,
                    message: message
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| UNKNOWN_ABORT_MESSAGE.to_string()),
                });
            }
        }

        // Phase 4: Processing
        enter(events, PipelinePhase::Processing);
        self.stage.perform_process(&params, events)
    }
}

fn enter(events: &EventSender, phase: PipelinePhase) {
    debug!(%phase, "Entering phase");
    events.send(Event::Pipeline(PipelineEvent::PhaseChanged { phase }));
}
