//! # Params Module
//!
//! Loads the caller's experiment metadata and derives the parameter bundle
//! every stage works from.
//!
//! ## Precedence
//! - A caller-supplied `observationTimeStamp` is authoritative; files are
//!   not consulted
//! - Otherwise the earliest capture time found in the input files is used
//!   and written back into the context metadata
//! - Metadata nested under `content` is unwrapped first

use crate::core::metadata;
use crate::core::scanner::acceptable_files;
use crate::error::{InputError, Result, TransformerError};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const TIMESTAMP_KEY: &str = "observationTimeStamp";
pub const SEASON_KEY: &str = "season";
pub const STUDY_NAME_KEY: &str = "studyName";
pub const CONTENT_KEY: &str = "content";

/// Experiment metadata as supplied by the caller
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentMetadata(Map<String, Value>);

impl ExperimentMetadata {
    /// Load metadata from a JSON file
    ///
    /// The file must hold an object. A list is accepted when its first
    /// entry is an object, which is then used.
    pub fn load(path: Option<&Path>) -> std::result::Result<Self, InputError> {
        let path = path.ok_or(InputError::MissingMetadataPath)?;
        if !path.exists() {
            return Err(InputError::MetadataNotFound {
                path: path.to_path_buf(),
            });
        }

        let text = fs::read_to_string(path).map_err(|source| InputError::MetadataUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&text).map_err(|e| InputError::InvalidMetadata {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_value(value).ok_or_else(|| InputError::InvalidMetadata {
            path: path.to_path_buf(),
            reason: "expected a JSON object".to_string(),
        })
    }

    /// Wrap an already parsed value, if it has the right shape
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            Value::Array(mut list) if !list.is_empty() => match list.swap_remove(0) {
                Value::Object(map) => Some(Self(map)),
                _ => None,
            },
            _ => None,
        }
    }

    /// The metadata with any `content` wrapper removed
    pub fn content(&self) -> Result<Map<String, Value>> {
        match self.0.get(CONTENT_KEY) {
            Some(Value::Object(inner)) => Ok(inner.clone()),
            Some(other) => Err(TransformerError::Config(format!(
                "'{}' must be an object, found {}",
                CONTENT_KEY, other
            ))),
            None => Ok(self.0.clone()),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Parameters derived once per run and read by every stage
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedParameters {
    /// ISO-8601 observation time, caller supplied or discovered
    pub timestamp: Option<String>,
    pub season: Option<String>,
    pub experiment: Option<String>,
    /// Stage-specific metadata found under the stage's key
    pub stage_metadata: Option<Value>,
    /// The unwrapped caller metadata, with a discovered timestamp added
    pub context_metadata: Map<String, Value>,
    /// Folder the stage may use as its project directory
    pub working_folder: PathBuf,
    files: Vec<PathBuf>,
}

impl NormalizedParameters {
    /// Derive parameters from metadata and the raw input list
    pub fn derive<S: AsRef<str>>(
        metadata: &ExperimentMetadata,
        inputs: &[S],
        working_folder: Option<&Path>,
        stage_key: &str,
    ) -> Result<Self> {
        let mut context = metadata.content()?;
        debug!(metadata = ?context, "Using experiment metadata");

        let working_folder = working_folder
            .map(Path::to_path_buf)
            .ok_or_else(|| TransformerError::Config("no working space was specified".to_string()))?;

        let mut timestamp = optional_string(&context, TIMESTAMP_KEY)?;
        let season = optional_string(&context, SEASON_KEY)?;
        let experiment = optional_string(&context, STUDY_NAME_KEY)?;

        let files = acceptable_files(inputs);
        debug!(files = ?files, "Found acceptable files");

        if timestamp.is_none() {
            let mut earliest: Option<String> = None;
            for file in &files {
                earliest = metadata::resolve(earliest.as_deref(), file);
            }
            if let Some(found) = earliest {
                debug!(timestamp = %found, "Using earliest capture time from files");
                context.insert(TIMESTAMP_KEY.to_string(), Value::String(found.clone()));
                timestamp = Some(found);
            }
        }

        let stage_metadata = context.get(stage_key).cloned();

        Ok(Self {
            timestamp,
            season,
            experiment,
            stage_metadata,
            context_metadata: context,
            working_folder,
            files,
        })
    }

    /// Files handed to the run, in input order
    pub fn list_files(&self) -> &[PathBuf] {
        &self.files
    }
}

fn optional_string(map: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(TransformerError::Config(format!(
            "'{}' must be a string, found {}",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exif::experimental::Writer;
    use exif::{Field, In, Tag};
    use serde_json::json;
    use std::fs::File;
    use std::io::Cursor;
    use tempfile::TempDir;

    /// A TIFF whose only tag is the given capture time
    fn tiff_taken_at(dir: &TempDir, name: &str, taken: &str) -> String {
        let field = Field {
            tag: Tag::DateTimeOriginal,
            ifd_num: In::PRIMARY,
            value: exif::Value::Ascii(vec![taken.as_bytes().to_vec()]),
        };
        let mut writer = Writer::new();
        writer.push_field(&field);
        let mut buf = Cursor::new(Vec::new());
        writer.write(&mut buf, false).unwrap();

        let path = dir.path().join(name);
        fs::write(&path, buf.into_inner()).unwrap();
        path.display().to_string()
    }

    fn metadata(value: Value) -> ExperimentMetadata {
        ExperimentMetadata::from_value(value).unwrap()
    }

    #[test]
    fn load_requires_a_path() {
        let err = ExperimentMetadata::load(None).unwrap_err();
        assert!(matches!(err, InputError::MissingMetadataPath));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = ExperimentMetadata::load(Some(Path::new("/nonexistent/md.json"))).unwrap_err();
        assert_eq!(err.code(), -2);
    }

    #[test]
    fn load_rejects_malformed_and_null_json() {
        let temp_dir = TempDir::new().unwrap();

        let broken = temp_dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        assert_eq!(ExperimentMetadata::load(Some(broken.as_path())).unwrap_err().code(), -3);

        let null = temp_dir.path().join("null.json");
        fs::write(&null, "null").unwrap();
        assert_eq!(ExperimentMetadata::load(Some(null.as_path())).unwrap_err().code(), -3);
    }

    #[test]
    fn load_accepts_object_and_list() {
        let temp_dir = TempDir::new().unwrap();

        let object = temp_dir.path().join("object.json");
        fs::write(&object, r#"{"season": "S10"}"#).unwrap();
        let loaded = ExperimentMetadata::load(Some(object.as_path())).unwrap();
        assert_eq!(loaded.as_map()["season"], "S10");

        let list = temp_dir.path().join("list.json");
        fs::write(&list, r#"[{"season": "S11"}, {"season": "S12"}]"#).unwrap();
        let loaded = ExperimentMetadata::load(Some(list.as_path())).unwrap();
        assert_eq!(loaded.as_map()["season"], "S11");
    }

    #[test]
    fn content_wrapper_is_unwrapped() {
        let md = metadata(json!({
            "content": {
                "observationTimeStamp": "2019-06-01T10:00:00-07:00",
                "season": "Season 9",
                "studyName": "Sorghum",
                "opendronemap": {"dsm": true}
            }
        }));
        let params = NormalizedParameters::derive(&md, &[] as &[&str], Some(Path::new("/work")), "opendronemap").unwrap();

        assert_eq!(params.timestamp.as_deref(), Some("2019-06-01T10:00:00-07:00"));
        assert_eq!(params.season.as_deref(), Some("Season 9"));
        assert_eq!(params.experiment.as_deref(), Some("Sorghum"));
        assert_eq!(params.stage_metadata, Some(json!({"dsm": true})));
        assert_eq!(params.working_folder, PathBuf::from("/work"));
    }

    #[test]
    fn caller_timestamp_is_authoritative() {
        let temp_dir = TempDir::new().unwrap();
        // The caller's value survives even though it doesn't parse
        File::create(temp_dir.path().join("a.jpg")).unwrap();

        let md = metadata(json!({"observationTimeStamp": "sometime"}));
        let inputs = [temp_dir.path().display().to_string()];
        let params = NormalizedParameters::derive(&md, &inputs, Some(temp_dir.path()), "opendronemap").unwrap();

        assert_eq!(params.timestamp.as_deref(), Some("sometime"));
        assert_eq!(params.list_files().len(), 1);
    }

    #[test]
    fn earliest_capture_time_is_used_and_written_back() {
        let temp_dir = TempDir::new().unwrap();
        let inputs = [
            tiff_taken_at(&temp_dir, "later.tif", "2020:01:15 10:00:00"),
            tiff_taken_at(&temp_dir, "earlier.tif", "2020:01:10 09:00:00"),
        ];

        let md = metadata(json!({"content": {"season": "Season 10"}}));
        let params = NormalizedParameters::derive(&md, &inputs, Some(temp_dir.path()), "opendronemap").unwrap();

        assert_eq!(params.timestamp.as_deref(), Some("2020-01-10T09:00:00"));
        assert_eq!(
            params.context_metadata.get(TIMESTAMP_KEY),
            Some(&json!("2020-01-10T09:00:00"))
        );
        assert_eq!(params.context_metadata.get(SEASON_KEY), Some(&json!("Season 10")));
    }

    #[test]
    fn caller_timestamp_wins_over_earlier_capture_time() {
        let temp_dir = TempDir::new().unwrap();
        let inputs = [tiff_taken_at(&temp_dir, "a.tif", "2020:01:10 09:00:00")];

        let md = metadata(json!({"observationTimeStamp": "2021-05-01T12:00:00-07:00"}));
        let params = NormalizedParameters::derive(&md, &inputs, Some(temp_dir.path()), "opendronemap").unwrap();

        assert_eq!(params.timestamp.as_deref(), Some("2021-05-01T12:00:00-07:00"));
        assert_eq!(
            params.context_metadata.get(TIMESTAMP_KEY),
            Some(&json!("2021-05-01T12:00:00-07:00"))
        );
    }

    #[test]
    fn missing_timestamp_without_exif_stays_missing() {
        let temp_dir = TempDir::new().unwrap();
        File::create(temp_dir.path().join("a.jpg")).unwrap();

        let md = metadata(json!({}));
        let inputs = [temp_dir.path().join("a.jpg").display().to_string()];
        let params = NormalizedParameters::derive(&md, &inputs, Some(temp_dir.path()), "opendronemap").unwrap();

        assert!(params.timestamp.is_none());
        assert!(!params.context_metadata.contains_key(TIMESTAMP_KEY));
    }

    #[test]
    fn working_space_is_required() {
        let md = metadata(json!({}));
        let err = NormalizedParameters::derive(&md, &[] as &[&str], None, "opendronemap").unwrap_err();
        assert_eq!(err.code(), -101);
    }

    #[test]
    fn non_string_season_is_a_configuration_error() {
        let md = metadata(json!({"season": 9}));
        let err = NormalizedParameters::derive(&md, &[] as &[&str], Some(Path::new("/work")), "opendronemap").unwrap_err();
        assert!(matches!(err, TransformerError::Config(_)));
    }

    #[test]
    fn flags_are_not_files() {
        let md = metadata(json!({}));
        let inputs = ["--odm_overrides", "a.jpg", "gcp_list.txt", "notes.md"];
        let params = NormalizedParameters::derive(&md, &inputs, Some(Path::new("/work")), "opendronemap").unwrap();
        assert_eq!(
            params.list_files(),
            &[PathBuf::from("a.jpg"), PathBuf::from("gcp_list.txt")]
        );
    }
}
