//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the resize capability the pipeline consumes:
//! produce a derivative of a source, either at its natural aspect ratio or
//! cover-fit to an exact box.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the recording `MockBackend` defined below.

use super::params::ResizeParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for image processing backends.
///
/// `Sync` because the automatic transform ensures derivatives for all
/// matched images of a page from rayon worker threads.
pub trait ImageBackend: Sync {
    /// Execute a cover-fit resize and write the result to `params.output`.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::CropPosition;
    use std::path::Path;
    use std::sync::Mutex;

    /// Mock backend that records operations.
    ///
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    /// `resize` writes a small placeholder so existence checks see the output,
    /// unless the source path is listed in `failing`.
    #[derive(Default)]
    pub struct MockBackend {
        pub operations: Mutex<Vec<RecordedOp>>,
        pub failing: Mutex<Vec<String>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Resize {
            source: String,
            output: String,
            width: u32,
            height: Option<u32>,
            crop: CropPosition,
            quality: u32,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every resize of `source` fail.
        pub fn fail_on(self, source: &Path) -> Self {
            self.failing
                .lock()
                .unwrap()
                .push(source.to_string_lossy().to_string());
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn resize_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Resize { .. }))
                .count()
        }
    }

    impl ImageBackend for MockBackend {
        fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
            let source = params.source.to_string_lossy().to_string();
            self.operations.lock().unwrap().push(RecordedOp::Resize {
                source: source.clone(),
                output: params.output.to_string_lossy().to_string(),
                width: params.width,
                height: params.height,
                crop: params.crop,
                quality: params.quality.value(),
            });
            if self.failing.lock().unwrap().contains(&source) {
                return Err(BackendError::ProcessingFailed(format!(
                    "Failed to decode {source}"
                )));
            }
            std::fs::write(&params.output, format!("{}w", params.width))?;
            Ok(())
        }
    }

    #[test]
    fn mock_records_resize_and_writes_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("out_320w.jpg");
        let backend = MockBackend::new();

        backend
            .resize(&ResizeParams {
                source: "/source.jpg".into(),
                output: output.clone(),
                width: 320,
                height: Some(180),
                crop: CropPosition::North,
                quality: crate::imaging::Quality::new(90),
            })
            .unwrap();

        assert!(output.exists());
        assert_eq!(backend.resize_count(), 1);
        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::Resize {
                width: 320,
                height: Some(180),
                crop: CropPosition::North,
                quality: 90,
                ..
            }
        ));
    }

    #[test]
    fn mock_fails_listed_sources() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = MockBackend::new().fail_on(Path::new("/broken.jpg"));

        let result = backend.resize(&ResizeParams {
            source: "/broken.jpg".into(),
            output: tmp.path().join("broken_320w.jpg"),
            width: 320,
            height: None,
            crop: CropPosition::Center,
            quality: crate::imaging::Quality::default(),
        });

        assert!(result.is_err());
        assert!(!tmp.path().join("broken_320w.jpg").exists());
    }
}
