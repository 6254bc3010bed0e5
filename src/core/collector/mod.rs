//! # Collector Module
//!
//! Finds the artifacts the engine left in a project folder.
//!
//! Output locations are fixed; a file is listed only if it exists. An empty
//! manifest is a valid answer (the exit code says whether the engine failed).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What kind of data an artifact holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Orthomosaic raster
    Rgb,
    /// Georeferenced point cloud
    Lidar,
    /// Point cloud bounds and projection files
    Shapefile,
    /// Dense point cloud
    Pointcloud,
    /// Digital surface model
    Dsm,
    /// Digital terrain model
    Dtm,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ArtifactKind::Rgb => "rgb",
            ArtifactKind::Lidar => "lidar",
            ArtifactKind::Shapefile => "shapefile",
            ArtifactKind::Pointcloud => "pointcloud",
            ArtifactKind::Dsm => "dsm",
            ArtifactKind::Dtm => "dtm",
        };
        f.write_str(label)
    }
}

/// Known engine outputs: folder, then (file name, kind) in report order
pub const RESULT_FILES: &[(&str, &[(&str, ArtifactKind)])] = &[
    (
        "odm_orthophoto",
        &[("odm_orthophoto.tif", ArtifactKind::Rgb)],
    ),
    (
        "odm_georeferencing",
        &[
            ("odm_georeferenced_model.laz", ArtifactKind::Lidar),
            ("odm_georeferenced_model.bounds.shp", ArtifactKind::Shapefile),
            ("odm_georeferenced_model.bounds.dbf", ArtifactKind::Shapefile),
            ("odm_georeferenced_model.bounds.prj", ArtifactKind::Shapefile),
            ("odm_georeferenced_model.bounds.shx", ArtifactKind::Shapefile),
            ("proj.txt", ArtifactKind::Shapefile),
            ("odm_georeferenced_model.bounds.geojson", ArtifactKind::Shapefile),
            ("odm_georeferenced_model.boundary.json", ArtifactKind::Shapefile),
        ],
    ),
    (
        "mve",
        &[("mve_dense_point_cloud.ply", ArtifactKind::Pointcloud)],
    ),
    (
        "odm_dem",
        &[("dsm.tif", ArtifactKind::Dsm), ("dtm.tif", ArtifactKind::Dtm)],
    ),
];

/// One produced file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    #[serde(rename = "key")]
    pub kind: ArtifactKind,
}

/// Every known output present in `project`, in table order
pub fn collect(project: &Path) -> Vec<Artifact> {
    let mut manifest = Vec::new();

    for (folder, files) in RESULT_FILES {
        let folder_path = project.join(folder);
        for (name, kind) in files.iter() {
            let path = folder_path.join(name);
            if path.exists() {
                debug!(path = %path.display(), kind = %kind, "Found result file");
                manifest.push(Artifact { path, kind: *kind });
            }
        }
    }

    manifest
}
