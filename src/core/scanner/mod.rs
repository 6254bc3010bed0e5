//! # Scanner Module
//!
//! Classifies caller-supplied paths into the files the engine can use.
//!
//! ## Rules
//! - A directory is expanded one level; nested directories are ignored
//! - Image files are recognized by a case-insensitive `.tif`, `.tiff` or
//!   `.jpg` extension
//! - The ground control point file is recognized by its exact name,
//!   `gcp_list.txt`; if several are given the last one wins
//! - Everything else is ignored
//!
//! ## Example
//! ```rust,ignore
//! use odm_transformer::core::scanner::classify;
//!
//! let classified = classify(&["/data/flight1", "/data/gcp_list.txt"]);
//! assert!(classified.has_images());
//! ```

mod filter;
mod walker;

pub use filter::{has_file_name, ExtensionFilter};
pub use walker::expand_paths;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions recognized as imagery
pub const IMAGE_EXTENSIONS: [&str; 3] = ["tif", "tiff", "jpg"];

/// Extensions worth passing on to a stage at all
pub const ACCEPTABLE_EXTENSIONS: [&str; 4] = ["tif", "tiff", "jpg", "txt"];

/// File names recognized as ground control point lists
pub const CONTROL_POINT_FILES: [&str; 1] = ["gcp_list.txt"];

/// What a single path is, as far as the engine cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Image,
    ControlPoints,
    Other,
}

impl FileKind {
    /// Classify a path by its name alone
    pub fn of(path: &Path) -> Self {
        if ExtensionFilter::new(IMAGE_EXTENSIONS).should_include(path) {
            FileKind::Image
        } else if has_file_name(path, &CONTROL_POINT_FILES) {
            FileKind::ControlPoints
        } else {
            FileKind::Other
        }
    }
}

/// Image files and the control point file found among the inputs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedFiles {
    /// Images in input order, duplicates preserved
    pub images: Vec<PathBuf>,
    /// The ground control point file, if one was given
    pub control_points: Option<PathBuf>,
}

impl ClassifiedFiles {
    /// Check if at least one image was found
    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }
}

/// Partition paths into image files and a control point file
pub fn classify<P: AsRef<Path>>(paths: &[P]) -> ClassifiedFiles {
    let mut classified = ClassifiedFiles::default();

    for path in expand_paths(paths) {
        match FileKind::of(&path) {
            FileKind::Image => classified.images.push(path),
            FileKind::ControlPoints => {
                if let Some(previous) = classified.control_points.replace(path) {
                    debug!(previous = %previous.display(), "Replacing earlier control point file");
                }
            }
            FileKind::Other => {}
        }
    }

    debug!(
        images = classified.images.len(),
        control_points = ?classified.control_points,
        "Classified input files"
    );
    classified
}

/// Inputs a stage could use: files with an acceptable extension
///
/// Arguments that look like command line flags are dropped.
pub fn acceptable_files<S: AsRef<str>>(inputs: &[S]) -> Vec<PathBuf> {
    let filter = ExtensionFilter::new(ACCEPTABLE_EXTENSIONS);
    let candidates: Vec<&Path> = inputs
        .iter()
        .map(AsRef::<str>::as_ref)
        .filter(|s| !s.starts_with('-'))
        .map(Path::new)
        .collect();

    expand_paths(&candidates)
        .into_iter()
        .filter(|path| filter.should_include(path))
        .collect()
}

/// Accepted image extensions for messages, e.g. `.tif, .tiff, .jpg`
pub fn image_extensions_display() -> String {
    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| format!(".{}", ext))
        .collect::<Vec<_>>()
        .join(", ")
}
