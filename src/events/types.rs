//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// All events emitted while a run is in progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Pipeline-level events
    Pipeline(PipelineEvent),
    /// Project folder staging events
    Stage(StageEvent),
    /// Reconstruction engine events
    Engine(EngineEvent),
}

/// Lifecycle of a single run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// The run has started
    Started,
    /// The run moved to a new phase
    PhaseChanged { phase: PipelinePhase },
    /// The run finished and produced a result with this code
    Completed { code: i32 },
}

/// Phases of a run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    LoadingMetadata,
    Normalizing,
    Checking,
    Processing,
    Collecting,
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelinePhase::LoadingMetadata => "Loading metadata",
            PipelinePhase::Normalizing => "Resolving parameters",
            PipelinePhase::Checking => "Checking inputs",
            PipelinePhase::Processing => "Processing",
            PipelinePhase::Collecting => "Collecting results",
        };
        f.write_str(label)
    }
}

/// Events while the project folder is built
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageEvent {
    /// An image was linked into the project
    ImageLinked { path: PathBuf },
    /// The ground control point file was linked into the project
    ControlPointsLinked { path: PathBuf },
    /// The project folder is ready for the engine
    ProjectReady { project: PathBuf, images: usize },
}

/// Events from the subordinate engine process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    /// The engine process was started
    Started { program: PathBuf, project: PathBuf },
    /// One line of combined stdout/stderr
    Output { line: String },
    /// The engine exited with this code
    Finished { exit_code: i32 },
}
