//! # OpenDroneMap Transformer
//!
//! Runs OpenDroneMap over a set of drone images as one step of a larger
//! processing pipeline, and reports what it produced.
//!
//! ## Flow
//! Caller metadata and file list → normalized parameters → feasibility
//! check → project staging → engine run → result collection → report.
//!
//! ## Architecture
//! - `core` - The processing stages and their building blocks
//! - `events` - Event-driven progress reporting
//! - `error` - Error types and the codes reported for them

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{Result, TransformerError};

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Initialize tracing for the library
///
/// Logs go to stderr. `RUST_LOG` takes precedence over `default_level`.
/// Calling this more than once keeps the first subscriber.
pub fn init_tracing(default_level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
