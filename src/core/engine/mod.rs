//! # Engine Module
//!
//! Runs the external reconstruction engine as a child process.
//!
//! ## Contract
//! - The engine is started in the project folder with `ODM_PROJECT` set to
//!   the project path and, when overrides exist, `ODM_SETTINGS` set to the
//!   overrides file
//! - Its combined stdout/stderr is drained line by line while the process
//!   runs, so a chatty engine can never stall on a full pipe
//! - The exit code is data, not an error; only failing to start, losing the
//!   process, a timeout or a cancellation are errors
//! - On unix the engine leads its own process group, and stopping it stops
//!   everything it started

mod process;

pub use process::{EngineConfig, ProcessEngine};

use crate::error::EngineError;
use crate::events::EventSender;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Environment variable carrying the project path
pub const PROJECT_ENV: &str = "ODM_PROJECT";

/// Environment variable carrying the overrides file path
pub const SETTINGS_ENV: &str = "ODM_SETTINGS";

/// What to run the engine against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInvocation {
    pub project_path: PathBuf,
    pub overrides_path: Option<PathBuf>,
}

/// Number of trailing engine lines kept in an [`EngineCompletion`]
pub const OUTPUT_TAIL: usize = 50;

/// How an engine run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCompletion {
    /// Exit code; negative signal number when killed by a signal
    pub exit_code: i32,
    /// The last [`OUTPUT_TAIL`] lines the engine wrote, stdout and stderr
    /// interleaved; the full output goes to the log and to events
    pub tail: Vec<String>,
}

impl EngineCompletion {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Trait for engine launchers
///
/// Implement this trait to run the engine some other way (e.g., for testing).
pub trait EngineLauncher: Send + Sync {
    /// Run the engine to completion
    fn launch(
        &self,
        invocation: &EngineInvocation,
        events: &EventSender,
    ) -> Result<EngineCompletion, EngineError>;
}

/// Shared flag used to stop a running engine from another thread
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
