//! Derivative identity and file naming.
//!
//! Resizing is the bottleneck of a build, so every derivative is generated at
//! most once: its filename is a pure function of its [`DerivativeKey`], and a
//! file already present under that name in the staging directory *is* the
//! cache. There is no manifest to load, save, or get out of sync.
//!
//! # Design
//!
//! ## Cache keys
//!
//! A derivative is identified by `(source path, width, height, crop position,
//! source modification time)`. Two keys are equal iff all five fields match.
//!
//! ## Naming policies
//!
//! - **Hashed** (default): `{stem}_{digest}.{ext}`, where `digest` is the first
//!   16 hex chars of a SHA-256 over every key field. A distinct key always
//!   yields a distinct name, and replacing a source file changes its mtime and
//!   therefore every derivative name. Stale files are simply never referenced
//!   again.
//!
//! - **Descriptive**: `{stem}_{width}w[{height}h].{ext}`. Readable, but the name
//!   carries neither the crop position nor the mtime. A replaced source keeps
//!   serving the derivatives already on disk until the staging directory is
//!   cleared, and two crops of the same box share one file.
//!
//! Either way the same key always maps to the same name, which is what makes
//! "does the file exist" a valid cache lookup.

use crate::imaging::CropPosition;
use crate::paths::ImageReference;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Number of hex digits of the key digest used in hashed filenames.
const DIGEST_LEN: usize = 16;

/// How derivative filenames are derived from their key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingPolicy {
    /// `{stem}_{width}w[{height}h].{ext}`
    Descriptive,
    /// `{stem}_{digest}.{ext}`
    #[default]
    Hashed,
}

/// Cache identity of one concrete derivative.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivativeKey {
    pub source: PathBuf,
    pub width: u32,
    pub height: Option<u32>,
    pub crop: CropPosition,
    /// Source mtime in nanoseconds since the Unix epoch; `None` when the
    /// source could not be read.
    pub source_modified: Option<u128>,
}

impl DerivativeKey {
    /// Build a key, reading the source's modification time from disk.
    pub fn for_source(source: &Path, width: u32, height: Option<u32>, crop: CropPosition) -> Self {
        Self {
            source: source.to_path_buf(),
            width,
            height,
            crop,
            source_modified: source_modified(source),
        }
    }

    /// SHA-256 of every key field, as a hex string.
    ///
    /// Fields are tagged and length-delimited so no two keys share an encoding.
    pub fn digest(&self) -> String {
        let source = self.source.to_string_lossy();
        let mut hasher = Sha256::new();
        hasher.update(b"derivative\0");
        hasher.update((source.len() as u64).to_le_bytes());
        hasher.update(source.as_bytes());
        hasher.update(self.width.to_le_bytes());
        match self.height {
            Some(h) => {
                hasher.update(b"\x01");
                hasher.update(h.to_le_bytes());
            }
            None => hasher.update(b"\x00"),
        }
        hasher.update(self.crop.as_str().as_bytes());
        hasher.update(b"\0");
        match self.source_modified {
            Some(nanos) => {
                hasher.update(b"\x01");
                hasher.update(nanos.to_le_bytes());
            }
            None => hasher.update(b"\x00"),
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Modification time of `path` in nanoseconds since the Unix epoch.
pub fn source_modified(path: &Path) -> Option<u128> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
}

/// Output filename for `key` under `policy`.
///
/// Deterministic: identical keys (including mtime) give identical names.
pub fn derive_filename(policy: NamingPolicy, image: &ImageReference, key: &DerivativeKey) -> String {
    let suffix = match policy {
        NamingPolicy::Descriptive => match key.height {
            Some(h) => format!("{}w{}h", key.width, h),
            None => format!("{}w", key.width),
        },
        NamingPolicy::Hashed => key.digest()[..DIGEST_LEN].to_string(),
    };
    image.file_name_with_suffix(Some(&suffix))
}

/// What happened when a derivative was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Already on disk under its derived name.
    Cached,
    /// Generated through the resize capability.
    Resized,
    /// Copied verbatim (vector images, or an unresized fallback).
    Copied,
    /// Source missing or resize failed; logged, nothing written.
    Failed,
}

/// Summary of cache performance for a build run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub cached: u32,
    pub resized: u32,
    pub copied: u32,
    pub failed: u32,
}

impl CacheStats {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Cached => self.cached += 1,
            Outcome::Resized => self.resized += 1,
            Outcome::Copied => self.copied += 1,
            Outcome::Failed => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: &CacheStats) {
        self.cached += other.cached;
        self.resized += other.resized;
        self.copied += other.copied;
        self.failed += other.failed;
    }

    pub fn total(&self) -> u32 {
        self.cached + self.resized + self.copied + self.failed
    }
}

impl FromIterator<Outcome> for CacheStats {
    fn from_iter<I: IntoIterator<Item = Outcome>>(iter: I) -> Self {
        let mut stats = Self::default();
        for outcome in iter {
            stats.record(outcome);
        }
        stats
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.cached > 0 {
            parts.push(format!("{} cached", self.cached));
        }
        if self.copied > 0 {
            parts.push(format!("{} copied", self.copied));
        }
        parts.push(format!("{} resized", self.resized));
        if self.failed > 0 {
            parts.push(format!("{} failed", self.failed));
        }
        if parts.len() > 1 {
            write!(f, "{} ({} total)", parts.join(", "), self.total())
        } else {
            write!(f, "{}", parts[0])
        }
    }
}
