//! # Reporter Module
//!
//! Writes the run result wherever the caller asked for it.
//!
//! ## Destinations
//! A comma separated list drawn from:
//! - `print` - pretty JSON on stdout
//! - `file` - the same JSON in the result file
//! - `all` - both
//!
//! `none`, or no list at all, writes nothing.

mod result;

pub use result::RunResult;

use crate::error::ReportError;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::{error, warn};

/// Name of the result file written into the working space
pub const RESULT_FILE: &str = "result.json";

/// Which sinks a result goes to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Destinations {
    pub print: bool,
    pub file: bool,
}

impl Destinations {
    /// Parse a destination list such as `"file,print"`
    pub fn parse(spec: Option<&str>) -> Self {
        let mut destinations = Destinations::default();
        let Some(spec) = spec else {
            return destinations;
        };

        for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part {
                "all" => {
                    destinations.print = true;
                    destinations.file = true;
                }
                "print" => destinations.print = true,
                "file" => destinations.file = true,
                "none" => {}
                other => warn!(destination = other, "Ignoring unknown result destination"),
            }
        }
        destinations
    }
}

/// Report a result to stdout and/or a file; returns the result unchanged
pub fn report(spec: Option<&str>, file_path: Option<&Path>, result: RunResult) -> RunResult {
    let stdout = io::stdout();
    report_to(spec, file_path, result, stdout.lock())
}

/// Like [`report`], printing to `out` instead of stdout
pub fn report_to<W: Write>(
    spec: Option<&str>,
    file_path: Option<&Path>,
    result: RunResult,
    out: W,
) -> RunResult {
    let destinations = Destinations::parse(spec);

    if destinations.print {
        if let Err(e) = write_result(&result, out) {
            error!(error = %e, "Failed to print result");
        }
    }

    if destinations.file {
        match file_path {
            Some(path) => {
                if let Err(e) = write_result_file(&result, path) {
                    error!(error = %e, "Failed to write result file");
                }
            }
            None => {
                warn!("Writing result to a file was requested but a file path wasn't provided.");
                warn!("    Skipping writing to a file.");
            }
        }
    }

    result
}

/// Write a result as indented JSON
pub fn write_result<W: Write>(result: &RunResult, mut writer: W) -> Result<(), ReportError> {
    serde_json::to_writer_pretty(&mut writer, result).map_err(|e| {
        if e.is_io() {
            ReportError::Output(e.into())
        } else {
            ReportError::Serialize(e)
        }
    })?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a result file, creating its folder if needed
pub fn write_result_file(result: &RunResult, path: &Path) -> Result<(), ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ReportError::CreateFolder {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let file = File::create(path).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    write_result(result, BufWriter::new(file))
}
