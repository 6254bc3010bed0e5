//! The single outcome every run produces.

use crate::core::collector::Artifact;
use crate::error::{codes, TransformerError};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Outcome of a run, as reported to the caller
///
/// Serializes as `{"error": ..., "code": ...}` or `{"files": [...], "code": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunResult {
    Failure { error: String, code: i32 },
    Success { files: Vec<Artifact>, code: i32 },
}

impl RunResult {
    /// A manifest with the engine's exit code
    pub fn success(files: Vec<Artifact>, code: i32) -> Self {
        RunResult::Success { files, code }
    }

    /// A fatal error; processing stops here
    pub fn failure(code: Option<i32>, message: impl Into<String>) -> Self {
        let code = code.unwrap_or_else(|| {
            warn!("An error has occurred without a return code specified, setting default return code");
            codes::UNSPECIFIED
        });
        let mut message = message.into();
        if message.trim().is_empty() {
            warn!("An error has occurred without a message, setting default message");
            message = format!("An error has occurred with error code ({})", code);
        }

        error!("{}", message);
        error!("Stopping processing");

        RunResult::Failure {
            error: message,
            code,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            RunResult::Failure { code, .. } | RunResult::Success { code, .. } => *code,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RunResult::Failure { .. })
    }

    /// Produced files; empty for failures
    pub fn files(&self) -> &[Artifact] {
        match self {
            RunResult::Success { files, .. } => files,
            RunResult::Failure { .. } => &[],
        }
    }
}

impl From<TransformerError> for RunResult {
    fn from(err: TransformerError) -> Self {
        RunResult::failure(Some(err.code()), err.to_string())
    }
}
