//! Retention of rotated files by age and count
//!
//! Rotated files are the siblings of the main file named the way this writer
//! names them: `<file_name>.<label>` plus optional numeric and `.gz`
//! suffixes. Other files sharing the prefix, such as the main file of another
//! writer, are left alone. Rotated files are considered oldest-first by
//! modification time.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::naming::is_rotated_name;

/// Outcome of one retention pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RetentionReport {
    /// Number of files removed because they exceeded the maximum age.
    pub removed_by_age: usize,

    /// Number of files removed because too many were kept.
    pub removed_by_count: usize,

    /// Paths of all removed files.
    pub removed_paths: Vec<PathBuf>,
}

impl RetentionReport {
    /// Total number of files removed.
    #[must_use]
    pub fn total_removed(&self) -> usize {
        self.removed_by_age + self.removed_by_count
    }
}

#[derive(Debug)]
struct RotatedFile {
    path: PathBuf,
    modified: DateTime<Utc>,
}

/// Rotated siblings of `file_name` in `dir`, oldest first.
fn list_rotated(dir: &Path, file_name: &str, time_layout: &str) -> Result<Vec<RotatedFile>> {
    let retention_error = |source| Error::Retention {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(retention_error)? {
        let entry = entry.map_err(retention_error)?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if !is_rotated_name(&name, file_name, time_layout) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(retention_error(e)),
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().map_err(retention_error)?;

        files.push(RotatedFile {
            path: entry.path(),
            modified: modified.into(),
        });
    }

    files.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
    Ok(files)
}

fn remove(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(Error::Retention {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Remove rotated files older than `max_age`, then the oldest ones beyond
/// `max_count`.
pub(crate) fn apply(
    dir: &Path,
    file_name: &str,
    time_layout: &str,
    max_age: Option<Duration>,
    max_count: Option<usize>,
    now: DateTime<Utc>,
) -> Result<RetentionReport> {
    let mut report = RetentionReport::default();
    if max_age.is_none() && max_count.is_none() {
        return Ok(report);
    }

    let mut files = list_rotated(dir, file_name, time_layout)?;

    if let Some(max_age) = max_age {
        let mut kept = Vec::with_capacity(files.len());
        for file in files {
            let age = (now - file.modified).to_std().unwrap_or_default();
            if age > max_age {
                if remove(&file.path)? {
                    report.removed_by_age += 1;
                    report.removed_paths.push(file.path);
                }
            } else {
                kept.push(file);
            }
        }
        files = kept;
    }

    if let Some(max_count) = max_count {
        let excess = files.len().saturating_sub(max_count);
        for file in files.drain(..excess) {
            if remove(&file.path)? {
                report.removed_by_count += 1;
                report.removed_paths.push(file.path);
            }
        }
    }

    Ok(report)
}
