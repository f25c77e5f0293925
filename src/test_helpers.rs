//! Shared test utilities.
//!
//! Fixture writers for source trees and synthetic images. Everything panics on
//! failure; these are only compiled for tests.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_source(tmp.path(), "src/img/notes.svg", b"<svg/>");
//! create_test_jpeg(&tmp.path().join("src/img/photo.jpg"), 400, 300);
//! ```

use image::{ImageEncoder, RgbImage, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `bytes` to `root/relative`, creating parent directories.
pub fn write_source(root: &Path, relative: &str, bytes: &[u8]) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, bytes).unwrap();
    path
}

// =========================================================================
// Synthetic images
// =========================================================================

/// Gradient JPEG of the given size.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    create_parent(path);
    let writer = std::io::BufWriter::new(fs::File::create(path).unwrap());
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// PNG with an opaque gradient and a translucent right half.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        let alpha = if x < width / 2 { 255 } else { 128 };
        image::Rgba([(x % 256) as u8, 64, (y % 256) as u8, alpha])
    });
    create_parent(path);
    img.save(path).unwrap();
}

fn create_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
}
