//! Image references and the paths derived from them.
//!
//! Markup refers to images by a logical path relative to the configured input
//! root (`/images/My Photo.jpg`, `images/logo.svg`). Everything the pipeline
//! needs from that string (stem, extension, source file, staging location,
//! public URL of a derivative) is derived here, once, from an
//! [`ImageReference`] value. No other module splits path strings.
//!
//! ## Naming rules
//!
//! - The **extension** is the lowercase suffix of the last path segment.
//! - The **file stem** is the last segment without its extension, with every
//!   run of whitespace replaced by a single `-`.
//! - Directories are kept as written so the staging tree mirrors the
//!   source tree.
//!
//! ```text
//! reference            /images/My  Photo.JPG
//! relative path        images/My  Photo.JPG      (source, under input_dir)
//! directory            images
//! file stem            My-Photo
//! extension            jpg
//! fallback file        images/My-Photo.JPG       (under staging_dir)
//! fallback URL         /images/My-Photo.JPG
//! ```

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension of the only vector format the pipeline passes through.
const VECTOR_EXTENSION: &str = "svg";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("empty image reference")]
    Empty,
    #[error("remote or inline image is not processed: {0}")]
    External(String),
    #[error("image reference leaves the input directory: {0}")]
    Traversal(String),
}

/// A logical path to a source image, relative to the input root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    /// Reference as written, minus any query string or fragment.
    raw: String,
    /// `raw` without its leading `/` or `./`.
    relative: String,
    /// Directory part of `relative` (empty at the root).
    dir: String,
    /// Directory prefix of `raw`, including the trailing `/`, for URLs.
    url_dir: String,
    /// Original last segment minus extension.
    file_name: String,
    /// Normalized stem of the last segment.
    stem: String,
    /// Extension exactly as written (case kept, used in output names).
    ext_raw: String,
    /// Lowercase extension.
    extension: String,
}

impl ImageReference {
    /// Parse a reference from an `src` attribute or helper argument.
    pub fn parse(reference: &str) -> Result<Self, ReferenceError> {
        let trimmed = reference.trim();
        let raw = trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string();
        if raw.is_empty() {
            return Err(ReferenceError::Empty);
        }
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("data:") || lower.starts_with("//") || lower.contains("://") {
            return Err(ReferenceError::External(raw));
        }

        let relative = raw
            .trim_start_matches("./")
            .trim_start_matches('/')
            .to_string();
        if relative.split('/').any(|segment| segment == "..") {
            return Err(ReferenceError::Traversal(raw));
        }
        if relative.is_empty() || relative.ends_with('/') {
            return Err(ReferenceError::Empty);
        }

        let (dir, last) = match relative.rfind('/') {
            Some(pos) => (&relative[..pos], &relative[pos + 1..]),
            None => ("", relative.as_str()),
        };
        let url_dir = match raw.rfind('/') {
            Some(pos) => raw[..=pos].to_string(),
            None => String::new(),
        };
        let (file_name, ext_raw) = match last.rfind('.') {
            Some(pos) if pos > 0 => (&last[..pos], &last[pos + 1..]),
            _ => (last, ""),
        };

        Ok(Self {
            dir: dir.to_string(),
            url_dir,
            stem: normalize_whitespace(file_name),
            file_name: file_name.to_string(),
            extension: ext_raw.to_lowercase(),
            ext_raw: ext_raw.to_string(),
            relative,
            raw,
        })
    }

    /// The reference as written (without query or fragment).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Path relative to the input root.
    pub fn relative_path(&self) -> &str {
        &self.relative
    }

    /// Directory relative to the input root, empty at the root.
    pub fn directory(&self) -> &str {
        &self.dir
    }

    /// Whitespace-normalized stem of the file name.
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Lowercase extension (empty when the file has none).
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Vector images are copied verbatim and never get a `srcset`.
    pub fn is_vector(&self) -> bool {
        self.extension == VECTOR_EXTENSION
    }

    /// File name of the fallback derivative: the normalized stem plus the
    /// original extension.
    pub fn fallback_file_name(&self) -> String {
        self.file_name_with_suffix(None)
    }

    /// `{stem}_{suffix}.{ext}`, or `{stem}.{ext}` without a suffix.
    pub fn file_name_with_suffix(&self, suffix: Option<&str>) -> String {
        let mut name = self.stem.clone();
        if let Some(suffix) = suffix {
            name.push('_');
            name.push_str(suffix);
        }
        if !self.ext_raw.is_empty() {
            name.push('.');
            name.push_str(&self.ext_raw);
        }
        name
    }

    /// Public URL of a file placed next to this image in the output tree.
    pub fn url_for(&self, file_name: &str) -> String {
        format!("{}{}", self.url_dir, file_name)
    }

    /// True when the fallback keeps exactly the name the reference uses.
    pub fn fallback_keeps_name(&self) -> bool {
        self.stem == self.file_name
    }
}

/// Replace every run of whitespace with a single `-`.
fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Resolves references against the configured roots.
///
/// Built once from the immutable configuration and shared by the generator
/// and both markup entry points.
#[derive(Debug, Clone)]
pub struct PathResolver {
    input_dir: PathBuf,
    staging_dir: PathBuf,
}

impl PathResolver {
    pub fn new(input_dir: impl Into<PathBuf>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            staging_dir: staging_dir.into(),
        }
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Absolute (or input-relative) path of the source file.
    pub fn source_path(&self, image: &ImageReference) -> PathBuf {
        self.input_dir.join(image.relative_path())
    }

    /// Directory that must exist before any derivative of `image` is written.
    pub fn output_dir(&self, image: &ImageReference) -> PathBuf {
        if image.directory().is_empty() {
            self.staging_dir.clone()
        } else {
            self.staging_dir.join(image.directory())
        }
    }

    /// Staging path for a derivative file of `image`.
    pub fn output_path(&self, image: &ImageReference, file_name: &str) -> PathBuf {
        self.output_dir(image).join(file_name)
    }

    /// Create the output directory for `image` if it is missing.
    ///
    /// Idempotent: an existing directory is not an error.
    pub fn ensure_output_dir(&self, image: &ImageReference) -> io::Result<PathBuf> {
        let dir = self.output_dir(image);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}
