//! # Error Module
//!
//! Error types for the OpenDroneMap transformer.
//!
//! ## Design Principles
//! - **Never panic** on caller data - return errors instead
//! - **Include context** - paths, program names, what went wrong
//! - **Stable codes** - every fatal kind maps to a fixed integer that the
//!   caller sees in the reported result

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Codes reported alongside fatal errors.
pub mod codes {
    pub const NO_METADATA_PATH: i32 = -1;
    pub const METADATA_NOT_ACCESSIBLE: i32 = -2;
    pub const METADATA_INVALID: i32 = -3;
    pub const PARAMETERS_INVALID: i32 = -101;
    pub const OVERRIDES_NOT_FOUND: i32 = -1000;
    pub const NO_IMAGE_FILES: i32 = -1001;
    pub const STAGING_FAILED: i32 = -1002;
    pub const ENGINE_LAUNCH_FAILED: i32 = -1003;
    pub const ENGINE_INTERRUPTED: i32 = -1004;
    pub const OVERRIDES_INVALID: i32 = -1005;
    /// Used when a failure is reported without a usable code
    pub const UNSPECIFIED: i32 = -1;
}

/// Top-level application error
#[derive(Error, Debug)]
pub enum TransformerError {
    #[error("{0}")]
    Input(#[from] InputError),

    #[error("{message}")]
    Feasibility { code: i32, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

impl TransformerError {
    /// The result code reported to the caller for this error
    pub fn code(&self) -> i32 {
        match self {
            TransformerError::Input(e) => e.code(),
            TransformerError::Feasibility { code, .. } => *code,
            TransformerError::Config(_) => codes::PARAMETERS_INVALID,
            TransformerError::Staging(_) => codes::STAGING_FAILED,
            TransformerError::Engine(e) => e.code(),
        }
    }
}

/// Problems with what the caller handed us
#[derive(Error, Debug)]
pub enum InputError {
    #[error("No metadata path was specified.")]
    MissingMetadataPath,

    #[error("Unable to access metadata file '{path}'")]
    MetadataNotFound { path: PathBuf },

    #[error("Unable to load metadata file \"{path}\": {source}")]
    MetadataUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON specified in metadata file \"{path}\": {reason}")]
    InvalidMetadata { path: PathBuf, reason: String },

    #[error("OpenDroneMap overrides specified but file is not available: '{path}'")]
    OverridesNotFound { path: PathBuf },

    #[error("OpenDroneMap overrides file '{path}' is not a settings mapping: {reason}")]
    InvalidOverrides { path: PathBuf, reason: String },
}

impl InputError {
    pub fn code(&self) -> i32 {
        match self {
            InputError::MissingMetadataPath => codes::NO_METADATA_PATH,
            InputError::MetadataNotFound { .. } => codes::METADATA_NOT_ACCESSIBLE,
            InputError::MetadataUnreadable { .. } | InputError::InvalidMetadata { .. } => {
                codes::METADATA_INVALID
            }
            InputError::OverridesNotFound { .. } => codes::OVERRIDES_NOT_FOUND,
            InputError::InvalidOverrides { .. } => codes::OVERRIDES_INVALID,
        }
    }
}

/// Errors that occur while building the project folder
#[derive(Error, Debug)]
pub enum StagingError {
    #[error("Failed to create project folder {path}: {source}")]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refusing to overwrite {link} with a link to {target}; input file names must be unique")]
    NameCollision { link: PathBuf, target: PathBuf },

    #[error("Failed to link {target} into {link}: {source}")]
    LinkFailed {
        link: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write engine settings to {path}: {reason}")]
    WriteSettings { path: PathBuf, reason: String },
}

/// Errors that occur while running the reconstruction engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unable to start engine '{program}': {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Engine did not finish within {after:?} and was stopped")]
    TimedOut { after: Duration },

    #[error("Engine run was cancelled")]
    Cancelled,

    #[error("Lost track of the engine process: {0}")]
    Wait(#[source] std::io::Error),
}

impl EngineError {
    pub fn code(&self) -> i32 {
        match self {
            EngineError::Launch { .. } | EngineError::Wait(_) => codes::ENGINE_LAUNCH_FAILED,
            EngineError::TimedOut { .. } | EngineError::Cancelled => codes::ENGINE_INTERRUPTED,
        }
    }
}

/// Errors that occur while writing the run result
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to create result folder {path}: {source}")]
    CreateFolder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write result to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to output result: {0}")]
    Output(#[from] std::io::Error),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, TransformerError>;
