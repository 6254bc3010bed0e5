//! Extension and name filters for the classifier.

use std::collections::HashSet;
use std::path::Path;

/// Filters files by their lowercase extension
pub struct ExtensionFilter {
    /// File extensions to include, without the leading dot
    extensions: HashSet<String>,
}

impl ExtensionFilter {
    /// Create a filter accepting the given extensions (case-insensitive)
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Check if a file should be included
    pub fn should_include(&self, path: &Path) -> bool {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            self.extensions.contains(&ext.to_lowercase())
        } else {
            false
        }
    }
}

/// Check whether a path's file name is one of `names`, exactly
pub fn has_file_name(path: &Path, names: &[&str]) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|name| names.contains(&name))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_is_case_insensitive() {
        let filter = ExtensionFilter::new(["tif", "jpg"]);
        assert!(filter.should_include(Path::new("/flight/IMG_0001.JPG")));
        assert!(filter.should_include(Path::new("/flight/ortho.Tif")));
    }

    #[test]
    fn leading_dot_is_ignored_in_configuration() {
        let filter = ExtensionFilter::new([".tiff"]);
        assert!(filter.should_include(Path::new("scan.tiff")));
    }

    #[test]
    fn filter_handles_no_extension() {
        let filter = ExtensionFilter::new(["jpg"]);
        assert!(!filter.should_include(Path::new("/flight/jpg")));
        assert!(!filter.should_include(Path::new("/flight/.jpg")));
    }

    #[test]
    fn file_name_must_match_exactly() {
        let names = ["gcp_list.txt"];
        assert!(has_file_name(Path::new("/flight/gcp_list.txt"), &names));
        assert!(!has_file_name(Path::new("/flight/GCP_LIST.TXT"), &names));
        assert!(!has_file_name(Path::new("/flight/gcp_list.csv"), &names));
        assert!(!has_file_name(Path::new("/flight/my_gcp_list.txt"), &names));
    }
}
