//! # OpenDroneMap Stage
//!
//! Turns a set of drone images into orthomosaics, point clouds and
//! elevation models by running OpenDroneMap against a staged project.
//!
//! ## Steps
//! 1. Check that overrides (if any) exist and that there is an image
//! 2. Link the inputs into the working folder
//! 3. Write the sanitized overrides next to them
//! 4. Run the engine and wait for it
//! 5. List whatever outputs it produced
//!
//! ## Example
//! ```rust,ignore
//! use odm_transformer::core::engine::{EngineConfig, ProcessEngine};
//! use odm_transformer::core::odm::{OdmOptions, OdmStage};
//! use odm_transformer::core::pipeline::Pipeline;
//!
//! let engine = ProcessEngine::new(EngineConfig::new("/opt/odm/worker.py"));
//! let pipeline = Pipeline::new(OdmStage::new(OdmOptions::default(), engine));
//! ```

use crate::core::collector;
use crate::core::engine::{EngineInvocation, EngineLauncher};
use crate::core::params::NormalizedParameters;
use crate::core::pipeline::{Continuation, Stage};
use crate::core::project;
use crate::core::reporter::RunResult;
use crate::core::scanner::{classify, image_extensions_display, FileKind};
use crate::core::settings::{EngineOverrides, EngineSettings, OVERRIDES_FILE};
use crate::error::{codes, InputError, Result};
use crate::events::{Event, EventSender, PipelineEvent, PipelinePhase};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Key of the stage's section in the experiment metadata
pub const STAGE_KEY: &str = "opendronemap";

/// Caller options specific to this stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OdmOptions {
    /// YAML file of engine setting overrides
    pub overrides: Option<PathBuf>,
}

/// The OpenDroneMap processing stage
pub struct OdmStage {
    options: OdmOptions,
    launcher: Box<dyn EngineLauncher>,
}

impl OdmStage {
    pub fn new(options: OdmOptions, launcher: impl EngineLauncher + 'static) -> Self {
        Self::with_launcher(options, Box::new(launcher))
    }

    pub fn with_launcher(options: OdmOptions, launcher: Box<dyn EngineLauncher>) -> Self {
        Self { options, launcher }
    }

    pub fn options(&self) -> &OdmOptions {
        &self.options
    }

    fn load_overrides(&self) -> std::result::Result<Option<EngineOverrides>, InputError> {
        self.options
            .overrides
            .as_deref()
            .map(EngineOverrides::load)
            .transpose()
    }
}

impl Stage for OdmStage {
    fn metadata_key(&self) -> &str {
        STAGE_KEY
    }

    fn check_continue(&self, params: &NormalizedParameters) -> Continuation {
        if let Some(path) = &self.options.overrides {
            if !path.exists() {
                let err = InputError::OverridesNotFound { path: path.clone() };
                return Continuation::abort(err.code(), err.to_string());
            }
        }

        for file in params.list_files() {
            debug!(file = %file.display(), "Checking if image file");
            if FileKind::of(file) == FileKind::Image {
                debug!("Found an image file");
                return Continuation::Proceed;
            }
        }

        Continuation::abort(
            codes::NO_IMAGE_FILES,
            format!(
                "Unable to find an image file in files to process. Accepting files types: '{}'",
                image_extensions_display()
            ),
        )
    }

    fn perform_process(
        &self,
        params: &NormalizedParameters,
        events: &EventSender,
    ) -> Result<RunResult> {
        let overrides = self.load_overrides()?;

        let classified = classify(params.list_files());
        let project = project::stage_with_events(&classified, &params.working_folder, events)?;

        let overrides_path = match overrides {
            Some(overrides) => {
                let mut settings = EngineSettings::new(&project);
                let applied = settings.apply_overrides(&overrides);
                let path = project.join(OVERRIDES_FILE);
                settings.write_overrides(&path)?;
                debug!(applied, path = %path.display(), "Wrote engine overrides");
                Some(path)
            }
            None => None,
        };

        info!(project = %project.display(), "Calling OpenDroneMap");
        let completion = self.launcher.launch(
            &EngineInvocation {
                project_path: project.clone(),
                overrides_path,
            },
            events,
        )?;
        if !completion.succeeded() {
            warn!(
                code = completion.exit_code,
                last_output = ?completion.tail.last(),
                "OpenDroneMap finished with a non-zero exit code"
            );
        }

        events.send(Event::Pipeline(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Collecting,
        }));
        let files = collector::collect(&project);
        info!(files = files.len(), "Collected results");

        Ok(RunResult::success(files, completion.exit_code))
    }
}
