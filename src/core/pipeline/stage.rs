//! The two-phase lifecycle every processing stage implements.

use crate::core::params::NormalizedParameters;
use crate::core::reporter::RunResult;
use crate::error::Result;
use crate::events::EventSender;

/// Message used when a feasibility check aborts without saying why
pub const UNKNOWN_ABORT_MESSAGE: &str = "Unknown error returned from check_continue call";

/// Outcome of a feasibility check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// Go straight to processing
    Proceed,
    /// Run the stage's prefetch step first; carries the positive code
    ProceedAfterFetch(i32),
    /// Stop the run and report `code`
    Abort { code: i32, message: Option<String> },
}

impl Continuation {
    /// Normalize a bare check code: zero proceeds, positive prefetches,
    /// negative aborts
    pub fn from_code(code: i32, message: Option<String>) -> Self {
        match code {
            0 => Continuation::Proceed,
            c if c > 0 => Continuation::ProceedAfterFetch(c),
            c => Continuation::Abort { code: c, message },
        }
    }

    pub fn abort(code: i32, message: impl Into<String>) -> Self {
        Continuation::Abort {
            code,
            message: Some(message.into()),
        }
    }

    /// The numeric form of this continuation
    pub fn code(&self) -> i32 {
        match self {
            Continuation::Proceed => 0,
            Continuation::ProceedAfterFetch(code) | Continuation::Abort { code, .. } => *code,
        }
    }
}

/// Trait for processing stages
///
/// Only `perform_process` is required; a stage without an opinion on
/// feasibility proceeds, and a stage without a prefetch step does nothing.
pub trait Stage {
    /// Key of this stage's own section in the experiment metadata
    fn metadata_key(&self) -> &str;

    /// Decide whether the run can go ahead
    fn check_continue(&self, _params: &NormalizedParameters) -> Continuation {
        Continuation::Proceed
    }

    /// Fetch whatever extra data the check asked for
    fn prefetch(&self, _params: &NormalizedParameters, _events: &EventSender) -> Result<()> {
        Ok(())
    }

    /// Do the work
    fn perform_process(
        &self,
        params: &NormalizedParameters,
        events: &EventSender,
    ) -> Result<RunResult>;
}
