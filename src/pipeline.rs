//! Pipeline wiring.
//!
//! A [`Pipeline`] is built once from an immutable [`SiteConfig`] and a resize
//! backend. It parses the selector, constructs the [`PathResolver`] and the
//! [`DerivativeGenerator`], and exposes the operations a host build calls:
//!
//! | Operation | When |
//! |-----------|------|
//! | [`srcset`](Pipeline::srcset) | per helper invocation in a template |
//! | [`transform_document`](Pipeline::transform_document) | per rendered page |
//! | [`transform_site`](Pipeline::transform_site) | all pages under `output_dir` |
//! | [`finalize`](Pipeline::finalize) | once, after every page is written |
//!
//! Nothing in the pipeline reads configuration from anywhere else, so two
//! pipelines with different configs can run side by side.

use crate::cache::CacheStats;
use crate::config::{ConfigError, SiteConfig};
use crate::derive::DerivativeGenerator;
use crate::finalize::{FinalizeReport, finalize_logged};
use crate::imaging::{ImageBackend, Quality};
use crate::markup::{self, Rendered, SrcsetArgs};
use crate::paths::PathResolver;
use crate::plan::{SrcsetPlan, plan};
use crate::selector::Selector;
use crate::transform::{TransformError, Transformed, transform_html};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Only documents with this extension are transformed.
const HTML_EXTENSION: &str = "html";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Transform {
        path: PathBuf,
        #[source]
        source: TransformError,
    },
    #[error("failed to walk output directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Result of transforming one page on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReport {
    /// Path relative to the output directory.
    pub path: PathBuf,
    pub images: usize,
    pub stats: CacheStats,
}

/// Result of [`Pipeline::transform_site`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteReport {
    /// Pages with at least one rewritten image, sorted by path.
    pub pages: Vec<PageReport>,
    /// Number of HTML documents inspected.
    pub scanned: usize,
    /// Pages that could not be read, transformed or written back, sorted by
    /// path. They are left untouched on disk.
    pub failed: Vec<PathBuf>,
    pub stats: CacheStats,
}

pub struct Pipeline<B> {
    config: SiteConfig,
    selector: Option<Selector>,
    generator: DerivativeGenerator<B>,
}

impl<B: ImageBackend> Pipeline<B> {
    /// Validate `config` and build the pipeline around `backend`.
    pub fn new(config: SiteConfig, backend: B) -> Result<Self, ConfigError> {
        config.validate()?;
        let selector = if config.selector.trim().is_empty() {
            None
        } else {
            Some(
                Selector::parse(&config.selector)
                    .map_err(|e| ConfigError::Validation(format!("selector: {e}")))?,
            )
        };
        let generator = DerivativeGenerator::new(
            backend,
            PathResolver::new(&config.input_dir, &config.staging_dir),
            config.naming,
            Quality::new(config.quality),
            config.resize_original,
        );
        Ok(Self {
            config,
            selector,
            generator,
        })
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn generator(&self) -> &DerivativeGenerator<B> {
        &self.generator
    }

    /// Plan for a base box against the configured breakpoints.
    pub fn plan(&self, base_width: u32, base_height: Option<u32>) -> SrcsetPlan {
        plan(base_width, base_height, &self.config.widths)
    }

    /// Explicit helper: an `<img>` tag for `args.image`, derivatives ensured.
    pub fn srcset(&self, args: &SrcsetArgs) -> Rendered {
        markup::srcset(&self.config, &self.generator, args)
    }

    /// Automatic transform of one rendered document.
    ///
    /// Documents whose `output_path` is not `.html`, or any document when the
    /// selector is empty, come back unchanged.
    pub fn transform_document(
        &self,
        html: &str,
        output_path: &Path,
    ) -> Result<Transformed, TransformError> {
        let is_html = output_path
            .extension()
            .is_some_and(|ext| ext == HTML_EXTENSION);
        match &self.selector {
            Some(selector) if is_html => {
                let result = transform_html(&self.config, selector, &self.generator, html)?;
                if result.images > 0 {
                    tracing::info!(
                        page = %output_path.display(),
                        images = result.images,
                        derivatives = %result.stats,
                        "page transformed"
                    );
                }
                Ok(result)
            }
            _ => Ok(Transformed {
                html: html.to_string(),
                ..Transformed::default()
            }),
        }
    }

    /// Transform every `.html` file under `output_dir` in place.
    ///
    /// Pages are independent and processed in parallel on the current rayon
    /// pool. Files are only rewritten when at least one image changed. A page
    /// that fails is logged, listed in [`SiteReport::failed`] and skipped;
    /// only a failure to walk `output_dir` itself is an error.
    pub fn transform_site(&self) -> Result<SiteReport, PipelineError> {
        let root = &self.config.output_dir;
        let mut documents = Vec::new();
        if root.is_dir() {
            for entry in WalkDir::new(root).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|e| e == HTML_EXTENSION)
                {
                    documents.push(entry.into_path());
                }
            }
        }

        let results: Vec<_> = documents
            .par_iter()
            .map(|path| self.transform_file(root, path))
            .collect();

        let mut report = SiteReport {
            scanned: documents.len(),
            ..SiteReport::default()
        };
        for (path, result) in documents.iter().zip(results) {
            match result {
                Ok(Some(page)) => {
                    report.stats.merge(&page.stats);
                    report.pages.push(page);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, "page skipped");
                    report
                        .failed
                        .push(path.strip_prefix(root).unwrap_or(path).to_path_buf());
                }
            }
        }
        Ok(report)
    }

    fn transform_file(&self, root: &Path, path: &Path) -> Result<Option<PageReport>, PipelineError> {
        let io_err = |source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        };
        let html = fs::read_to_string(path).map_err(io_err)?;
        let result = self
            .transform_document(&html, path)
            .map_err(|source| PipelineError::Transform {
                path: path.to_path_buf(),
                source,
            })?;
        if result.images == 0 {
            return Ok(None);
        }
        fs::write(path, &result.html).map_err(io_err)?;
        Ok(Some(PageReport {
            path: path.strip_prefix(root).unwrap_or(path).to_path_buf(),
            images: result.images,
            stats: result.stats,
        }))
    }

    /// Promote staged derivatives into `output_dir`. Failures are logged.
    pub fn finalize(&self) -> Option<FinalizeReport> {
        finalize_logged(&self.config.staging_dir, &self.config.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::NamingPolicy;
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::write_source;
    use tempfile::TempDir;

    fn config(tmp: &TempDir) -> SiteConfig {
        SiteConfig {
            input_dir: tmp.path().join("src"),
            output_dir: tmp.path().join("dist"),
            staging_dir: tmp.path().join("stage"),
            widths: vec![320, 640],
            naming: NamingPolicy::Descriptive,
            ..SiteConfig::default()
        }
    }

    const BODY: &str = r#"<!DOCTYPE html><html><head></head><body><div class="page-body"><img src="/img/a.jpg"></div></body></html>"#;

    #[test]
    fn new_rejects_invalid_config() {
        let tmp = TempDir::new().unwrap();
        let bad = SiteConfig {
            widths: vec![],
            ..config(&tmp)
        };
        assert!(Pipeline::new(bad, MockBackend::new()).is_err());
    }

    #[test]
    fn plan_uses_configured_widths() {
        let tmp = TempDir::new().unwrap();
        let pipeline = Pipeline::new(config(&tmp), MockBackend::new()).unwrap();
        let widths: Vec<_> = pipeline.plan(640, None).sizes().map(|s| s.width).collect();
        assert_eq!(widths, vec![640, 320, 640]);
    }

    #[test]
    fn non_html_documents_pass_through() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "src/img/a.jpg", b"jpeg");
        let pipeline = Pipeline::new(config(&tmp), MockBackend::new()).unwrap();

        let out = pipeline
            .transform_document(BODY, Path::new("dist/feed.xml"))
            .unwrap();

        assert_eq!(out.html, BODY);
        assert_eq!(pipeline.generator().backend().resize_count(), 0);
    }

    #[test]
    fn empty_selector_disables_transform() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "src/img/a.jpg", b"jpeg");
        let cfg = SiteConfig {
            selector: String::new(),
            ..config(&tmp)
        };
        let pipeline = Pipeline::new(cfg, MockBackend::new()).unwrap();

        let out = pipeline
            .transform_document(BODY, Path::new("dist/index.html"))
            .unwrap();
        assert_eq!(out.html, BODY);
    }

    #[test]
    fn html_document_is_transformed() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "src/img/a.jpg", b"jpeg");
        let pipeline = Pipeline::new(config(&tmp), MockBackend::new()).unwrap();

        let out = pipeline
            .transform_document(BODY, Path::new("dist/index.html"))
            .unwrap();
        assert!(out.html.contains("/img/a_320w.jpg 320w"));
    }

    #[test]
    fn transform_site_rewrites_pages_in_place() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "src/img/a.jpg", b"jpeg");
        write_source(tmp.path(), "dist/index.html", BODY.as_bytes());
        write_source(tmp.path(), "dist/blog/post.html", BODY.as_bytes());
        write_source(tmp.path(), "dist/plain.html", b"<p>no images</p>");
        write_source(tmp.path(), "dist/feed.xml", BODY.as_bytes());
        let pipeline = Pipeline::new(config(&tmp), MockBackend::new()).unwrap();

        let report = pipeline.transform_site().unwrap();

        assert_eq!(report.scanned, 3);
        let paths: Vec<_> = report.pages.iter().map(|p| p.path.clone()).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("blog/post.html"), PathBuf::from("index.html")]
        );
        let index = fs::read_to_string(tmp.path().join("dist/index.html")).unwrap();
        assert!(index.contains("srcset="));
        assert_eq!(
            fs::read_to_string(tmp.path().join("dist/feed.xml")).unwrap(),
            BODY
        );
        assert_eq!(report.stats.total(), 6);
    }

    #[test]
    fn transform_site_skips_unreadable_page() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "src/img/a.jpg", b"jpeg");
        write_source(tmp.path(), "dist/a.html", BODY.as_bytes());
        write_source(tmp.path(), "dist/legacy.html", b"<p>caf\xe9</p>");
        write_source(tmp.path(), "dist/z.html", BODY.as_bytes());
        let pipeline = Pipeline::new(config(&tmp), MockBackend::new()).unwrap();

        let report = pipeline.transform_site().unwrap();

        assert_eq!(report.scanned, 3);
        assert_eq!(report.failed, vec![PathBuf::from("legacy.html")]);
        let paths: Vec<_> = report.pages.iter().map(|p| p.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("a.html"), PathBuf::from("z.html")]);
        assert_eq!(
            fs::read(tmp.path().join("dist/legacy.html")).unwrap(),
            b"<p>caf\xe9</p>".to_vec()
        );

        let finalized = pipeline.finalize().unwrap();
        assert_eq!(finalized.files, 3);
        assert!(tmp.path().join("dist/img/a_320w.jpg").exists());
    }

    #[test]
    fn finalize_promotes_staging() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "src/img/a.jpg", b"jpeg");
        let pipeline = Pipeline::new(config(&tmp), MockBackend::new()).unwrap();

        pipeline.srcset(&SrcsetArgs::new("/img/a.jpg"));
        let report = pipeline.finalize().unwrap();

        assert_eq!(report.files, 3);
        assert!(tmp.path().join("dist/img/a_640w.jpg").exists());
    }
}
