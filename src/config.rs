//! Build configuration.
//!
//! Handles loading, validating, and merging `srcset.toml`. Stock defaults are
//! overridden by the values in the user's file; the merged result is an
//! immutable [`SiteConfig`] that is handed to [`Pipeline::new`](crate::pipeline::Pipeline::new)
//! and threaded through every component from there.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! input_dir = "src"                   # Where source images live
//! output_dir = "dist"                 # Final site output
//! staging_dir = ".simple-srcset-temp" # Derivatives are written here first
//! selector = ".page-body img"         # Images the automatic transform rewrites
//! widths = [320, 480, 640, 960, 1280, 1600]
//! fallback_width = 640                # Base width for the automatic transform
//! # fallback_height = 360             # Omit to keep each image's aspect ratio
//! resize_original = true              # Resize the fallback file, or copy it as-is
//! crop_position = "center"            # center, north, …, entropy, attention
//! create_captions = false             # <img title> → <figure>/<figcaption>
//! naming = "hashed"                   # "hashed" or "descriptive"
//! quality = 90                        # Lossy encoding quality (1-100)
//!
//! [processing]
//! max_processes = 4                   # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::cache::NamingPolicy;
use crate::imaging::CropPosition;
use crate::selector::Selector;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "srcset.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Build configuration loaded from `srcset.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Root that image references are resolved against.
    pub input_dir: PathBuf,
    /// Final site directory; pages are read from here by the transform.
    pub output_dir: PathBuf,
    /// Derivatives are generated here and promoted by `finalize`.
    pub staging_dir: PathBuf,
    /// Selector for images the automatic transform rewrites. Empty disables it.
    pub selector: String,
    /// Breakpoint widths, in the order they appear in `srcset`.
    pub widths: Vec<u32>,
    /// Base width for the automatic transform and the helper's default.
    pub fallback_width: u32,
    /// Base height. When absent, derivatives keep the source aspect ratio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_height: Option<u32>,
    /// Resize the fallback file to the base size (true) or copy it unchanged.
    pub resize_original: bool,
    /// Default anchor for cover crops.
    pub crop_position: CropPosition,
    /// Turn `title` attributes into `<figcaption>`s.
    pub create_captions: bool,
    /// How derivative filenames are derived.
    pub naming: NamingPolicy,
    /// Lossy encoding quality (1 = worst, 100 = best).
    pub quality: u32,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("src"),
            output_dir: PathBuf::from("dist"),
            staging_dir: PathBuf::from(".simple-srcset-temp"),
            selector: ".page-body img".to_string(),
            widths: vec![320, 480, 640, 960, 1280, 1600],
            fallback_width: 640,
            fallback_height: None,
            resize_original: true,
            crop_position: CropPosition::Center,
            create_captions: false,
            naming: NamingPolicy::Hashed,
            quality: 90,
            processing: ProcessingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.widths.is_empty() {
            return Err(ConfigError::Validation("widths must not be empty".into()));
        }
        if self.widths.contains(&0) {
            return Err(ConfigError::Validation(
                "widths must be greater than zero".into(),
            ));
        }
        if self.fallback_width == 0 {
            return Err(ConfigError::Validation(
                "fallback_width must be greater than zero".into(),
            ));
        }
        if self.fallback_height == Some(0) {
            return Err(ConfigError::Validation(
                "fallback_height must be greater than zero".into(),
            ));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(ConfigError::Validation("quality must be 1-100".into()));
        }
        if !self.selector.trim().is_empty() {
            Selector::parse(&self.selector)
                .map_err(|e| ConfigError::Validation(format!("selector: {e}")))?;
        }
        Ok(())
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(SiteConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file.
///
/// A missing file yields the stock defaults; a file that exists but does not
/// parse, has unknown keys, or fails validation is an error.
pub fn load_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    let overlay = if path.exists() {
        let content = fs::read_to_string(path)?;
        Some(toml::from_str::<toml::Value>(&content)?)
    } else {
        None
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock `srcset.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# simple-srcset configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Directories
# ---------------------------------------------------------------------------
# Image references in markup are resolved against this directory.
input_dir = "src"

# Final site directory. The transform rewrites the .html files found here
# and finalize copies staged derivatives into it.
output_dir = "dist"

# Derivatives are generated here. Files present in this directory are
# reused on the next build instead of being regenerated.
staging_dir = ".simple-srcset-temp"

# ---------------------------------------------------------------------------
# Automatic transform
# ---------------------------------------------------------------------------
# Images matched by this selector get srcset/sizes attributes.
# Supports type, .class, #id and * selectors joined by descendant
# (space) or child (>) combinators; separate alternatives with commas.
# Set to "" to disable the transform.
selector = ".page-body img"

# Replace <img title="..."> with <figure><img><figcaption>...</figcaption></figure>.
create_captions = false

# ---------------------------------------------------------------------------
# Derivatives
# ---------------------------------------------------------------------------
# Breakpoint widths, in the order they appear in srcset.
widths = [320, 480, 640, 960, 1280, 1600]

# Base size. With a height, every breakpoint keeps the width:height ratio
# (height = floor(fallback_height / fallback_width * width)) and is
# cover-cropped. Without one, images keep their own aspect ratio.
fallback_width = 640
# fallback_height = 360

# Resize the fallback file (the one src points at) to the base size.
# When false, the source file is copied unchanged.
resize_original = true

# Anchor for cover crops: center, north, northeast, east, southeast, south,
# southwest, west, northwest, entropy, attention.
crop_position = "center"

# Derivative filenames:
#   "hashed"      -> photo_3f2a9c0d1e4b5a67.jpg (changes when the source changes)
#   "descriptive" -> photo_320w.jpg / photo_320w180h.jpg
#                    (readable, but a replaced source keeps its stale
#                     derivatives until the staging directory is cleared)
naming = "hashed"

# Lossy encoding quality (1 = worst, 100 = best).
quality = 90

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers. Omit to use all CPU cores.
# Values above the core count are clamped down.
# max_processes = 4
"##
}
