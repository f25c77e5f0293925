//! Derivative generation.
//!
//! [`DerivativeGenerator::ensure`] materializes one resized file in the
//! staging tree if, and only if, nothing is there yet under its derived name:
//!
//! 1. Build the [`DerivativeKey`] (reads the source mtime) and derive the name.
//! 2. If the file exists, stop. Nothing is decoded or encoded.
//! 3. Otherwise copy (vector sources) or resize (everything else) into place.
//!
//! Failures never propagate past this module. A missing source or a failed
//! resize is logged with the offending image and reported as
//! [`Outcome::Failed`]; the caller still emits markup and the rest of the
//! build carries on. A failed resize removes whatever partial file the
//! backend left behind so the next build retries instead of treating it as
//! cached.
//!
//! Concurrent requests for the same key may both miss the existence check and
//! both write. The content is identical because the key is, so the last
//! writer winning is harmless.

use crate::cache::{DerivativeKey, NamingPolicy, Outcome, derive_filename, source_modified};
use crate::imaging::{BackendError, CropPosition, ImageBackend, Quality, ResizeParams};
use crate::paths::{ImageReference, PathResolver};
use crate::plan::{PlannedSize, SrcsetPlan};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeriveError {
    #[error("source image not found: {0}")]
    SourceMissing(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("resize failed: {0}")]
    Backend(#[from] BackendError),
}

/// One derivative file, as referenced from markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivative {
    /// File name inside the image's directory of the staging tree.
    pub file_name: String,
    pub width: u32,
    pub height: Option<u32>,
    pub outcome: Outcome,
}

/// Every derivative one image needs for its markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDerivatives {
    /// Target of `src`.
    pub fallback: Derivative,
    /// Targets of `srcset`, in plan order. Empty for vector images.
    pub breakpoints: Vec<Derivative>,
}

impl ImageDerivatives {
    pub fn outcomes(&self) -> impl Iterator<Item = Outcome> + '_ {
        std::iter::once(self.fallback.outcome).chain(self.breakpoints.iter().map(|d| d.outcome))
    }
}

/// Creates derivative files in the staging tree.
pub struct DerivativeGenerator<B> {
    backend: B,
    resolver: PathResolver,
    naming: NamingPolicy,
    quality: Quality,
    resize_original: bool,
}

impl<B: ImageBackend> DerivativeGenerator<B> {
    pub fn new(
        backend: B,
        resolver: PathResolver,
        naming: NamingPolicy,
        quality: Quality,
        resize_original: bool,
    ) -> Self {
        Self {
            backend,
            resolver,
            naming,
            quality,
            resize_original,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Ensure the breakpoint derivative for `(width, height, crop)` exists.
    pub fn ensure(
        &self,
        image: &ImageReference,
        width: u32,
        height: Option<u32>,
        crop: CropPosition,
    ) -> Derivative {
        let source = self.resolver.source_path(image);
        let key = DerivativeKey::for_source(&source, width, height, crop);
        let file_name = derive_filename(self.naming, image, &key);
        let output = self.resolver.output_path(image, &file_name);

        let outcome = if output.exists() {
            tracing::debug!(image = image.as_str(), file = %file_name, "derivative cached");
            Outcome::Cached
        } else {
            let result = self.generate(image, &source, &output, width, height, crop, true);
            self.settle(image, &output, result)
        };

        Derivative {
            file_name,
            width,
            height,
            outcome,
        }
    }

    /// Ensure the fallback file (the one `src` points at) exists.
    ///
    /// It keeps the reference's own name, so unlike breakpoint derivatives
    /// it is regenerated whenever the source is newer than the staged copy.
    pub fn ensure_fallback(
        &self,
        image: &ImageReference,
        width: u32,
        height: Option<u32>,
        crop: CropPosition,
    ) -> Derivative {
        let source = self.resolver.source_path(image);
        let file_name = image.fallback_file_name();
        let output = self.resolver.output_path(image, &file_name);

        let outcome = if is_fresh(&output, &source) {
            tracing::debug!(image = image.as_str(), file = %file_name, "fallback cached");
            Outcome::Cached
        } else {
            let resize = self.resize_original;
            let result = self.generate(image, &source, &output, width, height, crop, resize);
            self.settle(image, &output, result)
        };

        Derivative {
            file_name,
            width,
            height,
            outcome,
        }
    }

    /// Ensure the fallback and every breakpoint of `plan` exist.
    ///
    /// Vector images only get the fallback, copied verbatim.
    pub fn ensure_plan(
        &self,
        image: &ImageReference,
        plan: &SrcsetPlan,
        crop: CropPosition,
    ) -> ImageDerivatives {
        let fallback = self.ensure_fallback(image, plan.base.width, plan.base.height, crop);
        let breakpoints = if image.is_vector() {
            Vec::new()
        } else {
            plan.breakpoints
                .iter()
                .map(|&PlannedSize { width, height }| self.ensure(image, width, height, crop))
                .collect()
        };
        ImageDerivatives {
            fallback,
            breakpoints,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn generate(
        &self,
        image: &ImageReference,
        source: &Path,
        output: &Path,
        width: u32,
        height: Option<u32>,
        crop: CropPosition,
        resize: bool,
    ) -> Result<Outcome, DeriveError> {
        if !source.is_file() {
            return Err(DeriveError::SourceMissing(source.to_path_buf()));
        }
        self.resolver.ensure_output_dir(image)?;

        if image.is_vector() || !resize {
            fs::copy(source, output)?;
            tracing::debug!(image = image.as_str(), output = %output.display(), "copied");
            return Ok(Outcome::Copied);
        }

        let params = ResizeParams {
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            width,
            height,
            crop,
            quality: self.quality,
        };
        if let Err(e) = self.backend.resize(&params) {
            // Don't leave a partial file that would read as cached next time.
            let _ = fs::remove_file(output);
            return Err(e.into());
        }
        tracing::debug!(
            image = image.as_str(),
            output = %output.display(),
            width,
            height = ?height,
            crop = crop.as_str(),
            "resized"
        );
        Ok(Outcome::Resized)
    }

    /// Log a generation failure with the image identified and turn it into an
    /// outcome. Nothing is raised past this point.
    fn settle(
        &self,
        image: &ImageReference,
        output: &Path,
        result: Result<Outcome, DeriveError>,
    ) -> Outcome {
        match result {
            Ok(outcome) => outcome,
            Err(DeriveError::SourceMissing(path)) => {
                tracing::warn!(
                    image = image.as_str(),
                    source = %path.display(),
                    "source image not found, markup will reference a missing file"
                );
                Outcome::Failed
            }
            Err(e) => {
                tracing::error!(
                    image = image.as_str(),
                    output = %output.display(),
                    error = %e,
                    "could not generate derivative"
                );
                Outcome::Failed
            }
        }
    }
}

/// True when `output` exists and is not older than `source`.
fn is_fresh(output: &Path, source: &Path) -> bool {
    match (source_modified(output), source_modified(source)) {
        (Some(out), Some(src)) => out >= src,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
