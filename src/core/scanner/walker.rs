//! Shallow expansion of input paths using walkdir.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Expand directories to their immediate, non-directory children
///
/// Anything that isn't a directory passes through unchanged, whether or not
/// it exists. Children are returned in file name order.
pub fn expand_paths<P: AsRef<Path>>(paths: &[P]) -> Vec<PathBuf> {
    let mut expanded = Vec::new();

    for path in paths {
        let path = path.as_ref();
        if !path.is_dir() {
            expanded.push(path.to_path_buf());
            continue;
        }

        debug!(folder = %path.display(), "Checking folder");
        let walker = WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        for entry_result in walker {
            match entry_result {
                Ok(entry) => {
                    if entry.file_type().is_dir() {
                        continue;
                    }
                    expanded.push(entry.into_path());
                }
                Err(e) => {
                    let failed = e.path().map(|p| p.to_path_buf()).unwrap_or_default();
                    warn!(path = %failed.display(), error = %e, "Skipping unreadable entry");
                }
            }
        }
    }

    expanded
}
