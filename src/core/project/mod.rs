//! # Project Module
//!
//! Builds the project folder the reconstruction engine works in.
//!
//! ## Layout
//! ```text
//! <working folder>/
//!   images/          links to every input image
//!   gcp_list.txt     link to the control point file, when given
//! ```
//!
//! Files are linked, never copied; flights routinely run to tens of
//! gigabytes. A name collision is an error, not an overwrite.

use crate::core::scanner::ClassifiedFiles;
use crate::error::StagingError;
use crate::events::{null_sender, Event, EventSender, StageEvent};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the image folder inside a project
pub const IMAGES_FOLDER: &str = "images";

/// Stage a project folder without progress events
pub fn stage(files: &ClassifiedFiles, working_folder: &Path) -> Result<PathBuf, StagingError> {
    stage_with_events(files, working_folder, &null_sender())
}

/// Stage a project folder, reporting each link made
///
/// Returns the project root: `working_folder` as an absolute path.
pub fn stage_with_events(
    files: &ClassifiedFiles,
    working_folder: &Path,
    events: &EventSender,
) -> Result<PathBuf, StagingError> {
    let images_folder = working_folder.join(IMAGES_FOLDER);
    debug!(folder = %images_folder.display(), "Creating images folder");
    fs::create_dir_all(&images_folder).map_err(|source| StagingError::CreateFolder {
        path: images_folder.clone(),
        source,
    })?;

    // Absolute, since the engine resolves it from inside the project
    let project = fs::canonicalize(working_folder).map_err(|source| StagingError::CreateFolder {
        path: working_folder.to_path_buf(),
        source,
    })?;
    let images_folder = project.join(IMAGES_FOLDER);

    for image in &files.images {
        let link = link_into(image, &images_folder)?;
        debug!(target = %image.display(), link = %link.display(), "Linked image");
        events.send(Event::Stage(StageEvent::ImageLinked { path: link }));
    }

    if let Some(control_points) = &files.control_points {
        let link = link_into(control_points, &project)?;
        debug!(target = %control_points.display(), link = %link.display(), "Linked control point file");
        events.send(Event::Stage(StageEvent::ControlPointsLinked { path: link }));
    }

    events.send(Event::Stage(StageEvent::ProjectReady {
        project: project.clone(),
        images: files.images.len(),
    }));

    Ok(project)
}

/// Link `target` into `folder` under its own file name
fn link_into(target: &Path, folder: &Path) -> Result<PathBuf, StagingError> {
    let name = target.file_name().ok_or_else(|| StagingError::LinkFailed {
        link: folder.to_path_buf(),
        target: target.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
    })?;
    let link = folder.join(name);

    // symlink_metadata so that dangling links also count as taken
    if link.symlink_metadata().is_ok() {
        return Err(StagingError::NameCollision {
            link,
            target: target.to_path_buf(),
        });
    }

    // Relative targets would resolve against the link's folder
    let resolved = fs::canonicalize(target).unwrap_or_else(|_| target.to_path_buf());

    match symlink(&resolved, &link) {
        Ok(()) => Ok(link),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(StagingError::NameCollision {
            link,
            target: target.to_path_buf(),
        }),
        Err(source) => Err(StagingError::LinkFailed {
            link,
            target: target.to_path_buf(),
            source,
        }),
    }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
