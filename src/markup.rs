//! Responsive image markup.
//!
//! Both entry points (the explicit [`srcset`] helper and the automatic
//! [`transform`](crate::transform)) produce their attribute values here, from
//! the same [`ImageDerivatives`], so the two paths always agree on file names.
//!
//! The helper renders a self-contained tag with Maud:
//!
//! ```html
//! <img src="/img/photo.jpg"
//!      srcset="/img/photo_1a2b….jpg 320w, /img/photo_3c4d….jpg 640w"
//!      sizes="100vw" class="" alt="">
//! ```
//!
//! Missing optional attributes render as empty strings. Vector images get an
//! empty `srcset`.

use crate::cache::CacheStats;
use crate::config::SiteConfig;
use crate::derive::{DerivativeGenerator, ImageDerivatives};
use crate::imaging::{CropPosition, ImageBackend};
use crate::paths::ImageReference;
use crate::plan::plan;
use maud::html;

/// `sizes` used by the helper when the caller gives none.
pub const DEFAULT_SIZES: &str = "100vw";

/// Arguments of the explicit helper. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SrcsetArgs {
    pub image: Option<String>,
    pub alt: Option<String>,
    pub class: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub sizes: Option<String>,
    /// Crop identifier; unknown values fall back to the configured default.
    pub crop: Option<String>,
}

impl SrcsetArgs {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: Some(image.into()),
            ..Self::default()
        }
    }
}

/// Markup plus what it cost to produce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub html: String,
    pub stats: CacheStats,
}

/// The `srcset` attribute value: `"{url} {width}w"` entries joined by `", "`.
pub fn srcset_value(image: &ImageReference, derived: &ImageDerivatives) -> String {
    derived
        .breakpoints
        .iter()
        .map(|d| format!("{} {}w", image.url_for(&d.file_name), d.width))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The `src` attribute value.
pub fn src_value(image: &ImageReference, derived: &ImageDerivatives) -> String {
    image.url_for(&derived.fallback.file_name)
}

/// `sizes` for the automatic transform, capped at the base width.
pub fn auto_sizes(width: u32) -> String {
    format!("(min-width: {width}px) {width}px, 100vw")
}

/// Explicit helper: ensure every derivative of `args.image` and return its
/// `<img>` tag.
///
/// Without an image there is nothing to render and the output is empty.
/// References that cannot be resolved to a local file (remote URLs, `data:`
/// URIs) are rendered as a plain tag without derivatives.
pub fn srcset<B: ImageBackend>(
    config: &SiteConfig,
    generator: &DerivativeGenerator<B>,
    args: &SrcsetArgs,
) -> Rendered {
    let Some(raw) = args.image.as_deref().filter(|s| !s.trim().is_empty()) else {
        return Rendered::default();
    };

    let crop = match args.crop.as_deref() {
        Some(value) => CropPosition::parse_or(value, config.crop_position),
        None => config.crop_position,
    };
    // An explicit width without a height keeps the natural aspect ratio
    // rather than inheriting the configured base height.
    let (width, height) = match args.width.filter(|&w| w > 0) {
        Some(width) => (width, args.height.filter(|&h| h > 0)),
        None => (
            config.fallback_width,
            args.height.or(config.fallback_height).filter(|&h| h > 0),
        ),
    };

    let (src, srcset, stats) = match ImageReference::parse(raw) {
        Ok(image) => {
            let derived = generator.ensure_plan(&image, &plan(width, height, &config.widths), crop);
            let stats: CacheStats = derived.outcomes().collect();
            (src_value(&image, &derived), srcset_value(&image, &derived), stats)
        }
        Err(e) => {
            tracing::warn!(image = raw, error = %e, "no derivatives generated");
            (raw.to_string(), String::new(), CacheStats::default())
        }
    };

    let html = html! {
        img
            src=(src)
            srcset=(srcset)
            sizes=(args.sizes.as_deref().unwrap_or(DEFAULT_SIZES))
            class=(args.class.as_deref().unwrap_or_default())
            alt=(args.alt.as_deref().unwrap_or_default());
    };
    Rendered {
        html: html.into_string(),
        stats,
    }
}
