//! # Pipeline Module
//!
//! Runs a processing stage from caller input to a single result.
//!
//! ## Phases
//! 1. **Load** - Read the experiment metadata
//! 2. **Normalize** - Derive the parameter bundle
//! 3. **Check** - Ask the stage whether to proceed, prefetch or abort
//! 4. **Process** - Let the stage do its work
//!
//! A fatal error in any phase ends the run with a failure result; later
//! phases never start.

mod executor;
mod stage;

pub use crate::core::engine::CancellationToken;
pub use executor::{Pipeline, RunRequest};
pub use stage::{Continuation, Stage, UNKNOWN_ABORT_MESSAGE};
