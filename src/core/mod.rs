//! # Core Module
//!
//! The processing stages and everything they are built from.
//!
//! ## Modules
//! - `metadata` - Reads capture times from image EXIF data
//! - `scanner` - Classifies input paths into images and control points
//! - `params` - Loads caller metadata and derives run parameters
//! - `project` - Links inputs into an engine project folder
//! - `settings` - Sanitizes engine setting overrides
//! - `engine` - Runs the reconstruction engine as a child process
//! - `collector` - Lists the outputs the engine produced
//! - `reporter` - Writes the run result to stdout and/or a file
//! - `pipeline` - The stage contract and the runner driving it
//! - `odm` - The OpenDroneMap stage

pub mod collector;
pub mod engine;
pub mod metadata;
pub mod odm;
pub mod params;
pub mod pipeline;
pub mod project;
pub mod reporter;
pub mod scanner;
pub mod settings;

// Re-export commonly used types
pub use collector::{Artifact, ArtifactKind};
pub use odm::{OdmOptions, OdmStage};
pub use params::{ExperimentMetadata, NormalizedParameters};
pub use pipeline::{Continuation, Pipeline, RunRequest, Stage};
pub use reporter::RunResult;
pub use scanner::ClassifiedFiles;
