//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, TIFF, WebP) | `image::ImageReader` with format sniffing |
//! | Resize | `image::DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Cover crop | fill-resize, then `crop_imm` at the anchor or best-scoring window |
//! | Encode | inferred from the output extension (JPEG with quality, PNG, GIF, WebP, TIFF, AVIF) |
//!
//! AVIF is encode-only: `image` ships no AV1 decoder, so an `.avif` source
//! fails to decode and is reported as a failed derivative. Animated GIFs are
//! reduced to their first frame.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{
    anchored_offset, best_window, calculate_fill_dimensions, candidate_offsets,
    histogram_entropy, natural_height,
};
use super::params::{CropPosition, ResizeParams};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use std::io::BufWriter;
use std::path::Path;

/// Number of window positions the entropy search scores.
const ENTROPY_STEPS: u32 = 8;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Resize to cover `width × height`, then crop the window chosen by `crop`.
fn cover(img: &DynamicImage, width: u32, height: u32, crop: CropPosition) -> DynamicImage {
    let (fill_w, fill_h) = calculate_fill_dimensions(img.dimensions(), (width, height));
    let filled = img.resize_exact(fill_w, fill_h, FilterType::Lanczos3);

    let (x, y) = match crop.anchor() {
        Some(anchor) => anchored_offset((fill_w, fill_h), (width, height), anchor),
        None if crop == CropPosition::Entropy => entropy_offset(&filled, width, height),
        None => attention_offset(&filled, width, height),
    };
    filled.crop_imm(x, y, width, height)
}

/// Offset of the window whose luminance histogram carries the most entropy.
fn entropy_offset(filled: &DynamicImage, width: u32, height: u32) -> (u32, u32) {
    let luma = filled.to_luma8();
    let (fill_w, fill_h) = luma.dimensions();
    let horizontal = fill_w > width;
    let excess = if horizontal {
        fill_w - width
    } else {
        fill_h.saturating_sub(height)
    };

    let mut best = (0, f64::MIN);
    for offset in candidate_offsets(excess, ENTROPY_STEPS) {
        let (x0, y0) = if horizontal { (offset, 0) } else { (0, offset) };
        let mut histogram = [0u32; 256];
        for y in y0..y0 + height {
            for x in x0..x0 + width {
                histogram[luma.get_pixel(x, y).0[0] as usize] += 1;
            }
        }
        let score = histogram_entropy(&histogram);
        if score > best.1 {
            best = (offset, score);
        }
    }

    if horizontal { (best.0, 0) } else { (0, best.0) }
}

/// Offset of the window with the most edge and saturation energy.
fn attention_offset(filled: &DynamicImage, width: u32, height: u32) -> (u32, u32) {
    let rgb = filled.to_rgb8();
    let (fill_w, fill_h) = rgb.dimensions();
    let horizontal = fill_w > width;

    let luma = |x: u32, y: u32| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
    };
    let energy = |x: u32, y: u32| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let saturation = (r.max(g).max(b) - r.min(g).min(b)) as f64;
        let here = luma(x, y);
        let dx = if x > 0 { (here - luma(x - 1, y)).abs() } else { 0.0 };
        let dy = if y > 0 { (here - luma(x, y - 1)).abs() } else { 0.0 };
        dx + dy + saturation
    };

    if horizontal {
        let profile: Vec<f64> = (0..fill_w)
            .map(|x| (0..fill_h).map(|y| energy(x, y)).sum())
            .collect();
        (best_window(&profile, width as usize) as u32, 0)
    } else {
        let profile: Vec<f64> = (0..fill_h)
            .map(|y| (0..fill_w).map(|x| energy(x, y)).sum())
            .collect();
        (0, best_window(&profile, height as usize) as u32)
    }
}

/// Save a DynamicImage to the given path, inferring format from extension.
fn save_image(img: &DynamicImage, path: &Path, quality: u32) -> Result<(), BackendError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let file = std::fs::File::create(path).map_err(BackendError::Io)?;
    let mut writer = BufWriter::new(file);
    let encode_err =
        |e: image::ImageError| BackendError::ProcessingFailed(format!("{ext} encode failed: {e}"));

    match ext.as_str() {
        "jpg" | "jpeg" => {
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, quality as u8);
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(encode_err)
        }
        "png" => img
            .write_to(&mut writer, ImageFormat::Png)
            .map_err(encode_err),
        "gif" => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_to(&mut writer, ImageFormat::Gif)
            .map_err(encode_err),
        "webp" => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_to(&mut writer, ImageFormat::WebP)
            .map_err(encode_err),
        "tif" | "tiff" => img
            .write_to(&mut writer, ImageFormat::Tiff)
            .map_err(encode_err),
        "avif" => {
            let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
                &mut writer,
                6,
                quality as u8,
            );
            img.write_with_encoder(encoder).map_err(encode_err)
        }
        other => Err(BackendError::ProcessingFailed(format!(
            "Unsupported output format: {}",
            other
        ))),
    }
}

impl ImageBackend for RustBackend {
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let resized = match params.height {
            Some(height) => cover(&img, params.width, height.max(1), params.crop),
            None => {
                let height = natural_height(img.dimensions(), params.width);
                img.resize_exact(params.width, height, FilterType::Lanczos3)
            }
        };
        save_image(&resized, &params.output, params.quality.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::Quality;
    use crate::test_helpers::{create_test_jpeg, create_test_png};
    use image::ImageEncoder;

    fn params(source: &Path, output: &Path, width: u32, height: Option<u32>) -> ResizeParams {
        ResizeParams {
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            width,
            height,
            crop: CropPosition::Center,
            quality: Quality::new(85),
        }
    }

    #[test]
    fn resize_keeps_aspect_without_height() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        let output = tmp.path().join("source_200w.jpg");
        create_test_jpeg(&source, 400, 300);

        let backend = RustBackend::new();
        backend.resize(&params(&source, &output, 200, None)).unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (200, 150));
    }

    #[test]
    fn resize_covers_exact_box_with_height() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.png");
        let output = tmp.path().join("source_100w100h.png");
        create_test_png(&source, 400, 300);

        let backend = RustBackend::new();
        backend
            .resize(&params(&source, &output, 100, Some(100)))
            .unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (100, 100));
    }

    #[test]
    fn resize_with_search_strategies() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.png");
        create_test_png(&source, 120, 60);
        let backend = RustBackend::new();

        for crop in [CropPosition::Entropy, CropPosition::Attention] {
            let output = tmp.path().join(format!("out-{crop}.png"));
            backend
                .resize(&ResizeParams {
                    crop,
                    ..params(&source, &output, 30, Some(30))
                })
                .unwrap();
            assert_eq!(image::image_dimensions(&output).unwrap(), (30, 30));
        }
    }

    #[test]
    fn resize_gif_source() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("anim.gif");
        let output = tmp.path().join("anim_40w.gif");
        image::RgbaImage::from_fn(80, 60, |x, y| image::Rgba([x as u8, y as u8, 90, 255]))
            .save(&source)
            .unwrap();

        let backend = RustBackend::new();
        backend.resize(&params(&source, &output, 40, None)).unwrap();

        assert_eq!(image::image_dimensions(&output).unwrap(), (40, 30));
    }

    #[test]
    fn avif_source_is_not_decodable() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("photo.avif");
        let img = image::RgbImage::from_fn(16, 16, |x, y| image::Rgb([x as u8 * 16, y as u8 * 16, 0]));
        let file = std::fs::File::create(&source).unwrap();
        image::codecs::avif::AvifEncoder::new_with_speed_quality(file, 10, 80)
            .write_image(img.as_raw(), 16, 16, image::ExtendedColorType::Rgb8)
            .unwrap();

        let output = tmp.path().join("photo_8w.avif");
        let result = RustBackend::new().resize(&params(&source, &output, 8, None));
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
    }

    #[test]
    fn resize_unsupported_format_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 100, 100);

        let output = tmp.path().join("output.bmp");
        let result = RustBackend::new().resize(&params(&source, &output, 50, None));
        assert!(result.is_err());
    }

    #[test]
    fn resize_corrupt_source_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("broken.jpg");
        std::fs::write(&source, b"not an image").unwrap();

        let output = tmp.path().join("broken_50w.jpg");
        let result = RustBackend::new().resize(&params(&source, &output, 50, None));
        assert!(matches!(result, Err(BackendError::ProcessingFailed(_))));
    }

    #[test]
    fn attention_prefers_detailed_region() {
        // Left half flat grey, right half a checkerboard.
        let img = image::RgbImage::from_fn(200, 100, |x, y| {
            if x < 100 || (x + y) % 2 == 0 {
                image::Rgb([128, 128, 128])
            } else {
                image::Rgb([255, 0, 0])
            }
        });
        let (x, y) = attention_offset(&DynamicImage::ImageRgb8(img), 100, 100);
        assert_eq!(y, 0);
        assert!(x >= 90, "expected window on the detailed half, got x={x}");
    }

    #[test]
    fn entropy_prefers_varied_region() {
        let img = image::GrayImage::from_fn(100, 200, |x, y| {
            if y >= 100 {
                image::Luma([((x * 7 + y * 13) % 256) as u8])
            } else {
                image::Luma([10])
            }
        });
        let (x, y) = entropy_offset(&DynamicImage::ImageLuma8(img), 100, 100);
        assert_eq!((x, y), (0, 100));
    }
}
