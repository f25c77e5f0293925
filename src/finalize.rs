//! End-of-build promotion of staged derivatives.
//!
//! Copies every file under the staging directory into the output directory,
//! keeping relative paths and overwriting what is already there. The staging
//! tree is left in place: it is the derivative cache for the next build.
//!
//! A finalize failure must not fail a build whose pages are already written,
//! so callers at the end of a build use [`finalize_logged`].

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum FinalizeError {
    #[error("failed to copy {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read staging directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// What a finalize run copied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizeReport {
    pub files: usize,
    pub bytes: u64,
}

/// Copy the staging tree into `output_dir`.
///
/// A missing staging directory means nothing was generated and is not an
/// error.
pub fn finalize(staging_dir: &Path, output_dir: &Path) -> Result<FinalizeReport, FinalizeError> {
    let mut report = FinalizeReport::default();
    if !staging_dir.is_dir() {
        tracing::debug!(staging = %staging_dir.display(), "nothing staged");
        return Ok(report);
    }

    for entry in WalkDir::new(staging_dir).sort_by_file_name() {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(staging_dir) else {
            continue;
        };
        let target = output_dir.join(relative);
        let copy_err = |source| FinalizeError::Copy {
            path: entry.path().to_path_buf(),
            source,
        };

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(copy_err)?;
        } else {
            report.bytes += fs::copy(entry.path(), &target).map_err(copy_err)?;
            report.files += 1;
        }
    }
    Ok(report)
}

/// [`finalize`], with the outcome logged instead of returned as an error.
pub fn finalize_logged(staging_dir: &Path, output_dir: &Path) -> Option<FinalizeReport> {
    match finalize(staging_dir, output_dir) {
        Ok(report) => {
            tracing::info!(
                files = report.files,
                bytes = report.bytes,
                output = %output_dir.display(),
                "staged files promoted"
            );
            Some(report)
        }
        Err(e) => {
            tracing::error!(error = %e, output = %output_dir.display(), "finalize failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_source;
    use tempfile::TempDir;

    #[test]
    fn copies_nested_tree() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "stage/a.jpg", b"a");
        write_source(tmp.path(), "stage/img/deep/b_320w.jpg", b"bb");

        let report = finalize(&tmp.path().join("stage"), &tmp.path().join("dist")).unwrap();

        assert_eq!(report, FinalizeReport { files: 2, bytes: 3 });
        assert_eq!(fs::read(tmp.path().join("dist/a.jpg")).unwrap(), b"a");
        assert_eq!(
            fs::read(tmp.path().join("dist/img/deep/b_320w.jpg")).unwrap(),
            b"bb"
        );
    }

    #[test]
    fn overwrites_existing_files_and_keeps_others() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "stage/a.jpg", b"new");
        write_source(tmp.path(), "dist/a.jpg", b"old");
        write_source(tmp.path(), "dist/index.html", b"<html>");

        finalize(&tmp.path().join("stage"), &tmp.path().join("dist")).unwrap();

        assert_eq!(fs::read(tmp.path().join("dist/a.jpg")).unwrap(), b"new");
        assert!(tmp.path().join("dist/index.html").exists());
        // Staging is the cache for the next build
        assert!(tmp.path().join("stage/a.jpg").exists());
    }

    #[test]
    fn missing_staging_is_empty_report() {
        let tmp = TempDir::new().unwrap();
        let report = finalize(&tmp.path().join("nope"), &tmp.path().join("dist")).unwrap();
        assert_eq!(report, FinalizeReport::default());
        assert!(!tmp.path().join("dist").exists());
    }

    #[test]
    fn logged_failure_returns_none() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "stage/a.jpg", b"a");
        // Output "directory" is a file, so nothing can be created under it
        write_source(tmp.path(), "dist", b"not a dir");

        assert!(finalize(&tmp.path().join("stage"), &tmp.path().join("dist")).is_err());
        assert_eq!(
            finalize_logged(&tmp.path().join("stage"), &tmp.path().join("dist")),
            None
        );
    }
}
