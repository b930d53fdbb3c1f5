//! Organizes downloaded XML bundles into the per-company archive tree.

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use log::{debug, info};
use walkdir::WalkDir;

use crate::error::StorageError;

/// File extensions the portal produces.
const ARTIFACT_EXTENSIONS: &[&str] = &["xml", "zip"];

/// Move a file from `src` to `dst`. Rename first (atomic on the same
/// filesystem), copy + delete as the cross-device fallback.
fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    std::fs::remove_file(src).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// Keeps directory components out of entity labels used as path segments.
fn sanitize_component(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Moves finished downloads from the browser's download directory into a
/// `<output>/<entity>/<YYYY>/<MM>/` tree derived from the query period.
pub struct ArtifactStore {
    download_directory: PathBuf,
    output_directory: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(download_directory: P, output_directory: Q) -> Self {
        Self {
            download_directory: download_directory.as_ref().to_path_buf(),
            output_directory: output_directory.as_ref().to_path_buf(),
        }
    }

    pub fn download_directory(&self) -> &Path {
        &self.download_directory
    }

    /// Sweeps the download directory and moves every artifact into the
    /// entity's period folder. Returns the destination paths in the order
    /// the files were found. An empty result is not an error here; the
    /// caller decides what zero moved files means.
    pub fn collect(
        &self,
        entity_label: &str,
        reference: NaiveDate,
    ) -> Result<Vec<PathBuf>, StorageError> {
        let destination = self
            .output_directory
            .join(sanitize_component(entity_label))
            .join(format!("{:04}", reference.year()))
            .join(format!("{:02}", reference.month()));
        self.ensure_directory(&destination)?;

        let mut moved = Vec::new();
        for entry in WalkDir::new(&self.download_directory)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| StorageError::ScanFailed {
                path: self.download_directory.clone(),
                source: e,
            })?;
            let path = entry.path();
            if !path.is_file() || !is_artifact(path) {
                continue;
            }

            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("download");
            let target = self.resolve_conflict(&destination, name)?;
            move_file(path, &target)?;
            debug!("Archived {} -> {}", path.display(), target.display());
            moved.push(target);
        }

        info!(
            "Collected {} artifact(s) for '{}' into {}",
            moved.len(),
            entity_label,
            destination.display()
        );
        Ok(moved)
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Finds an available name in `directory`, appending `_2`, `_3`, ...
    /// when the original is taken.
    fn resolve_conflict(&self, directory: &Path, filename: &str) -> Result<PathBuf, StorageError> {
        let path = directory.join(filename);
        if std::fs::symlink_metadata(&path).is_err() {
            return Ok(path);
        }

        let (base, ext) = match filename.rfind('.') {
            Some(dot) => (&filename[..dot], Some(&filename[dot..])),
            None => (filename, None),
        };

        for counter in 2..=1000 {
            let candidate = match ext {
                Some(ext) => format!("{}_{}{}", base, counter, ext),
                None => format!("{}_{}", base, counter),
            };
            let candidate_path = directory.join(&candidate);
            if std::fs::symlink_metadata(&candidate_path).is_err() {
                return Ok(candidate_path);
            }
        }

        Err(StorageError::FileExists(path))
    }
}

fn is_artifact(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let lower = e.to_ascii_lowercase();
            ARTIFACT_EXTENSIONS.contains(&lower.as_str())
        })
        .unwrap_or(false)
}
