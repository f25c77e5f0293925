//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`derive`](crate::derive) stage (which decides what
//! derivatives to create) and the [`backend`](super::backend) (which does the
//! actual pixel work). Tests swap in a recording backend without touching
//! the derivation logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`CropPosition`]: Anchor or strategy for cover-fit crops.
//! - [`ResizeParams`]: Full specification for a resize: source, output, target box, crop, quality.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Where a cover-fit crop keeps its window.
///
/// The directional variants pin the window to an edge or corner of the
/// resized image. `Entropy` and `Attention` search for the most detailed
/// window instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CropPosition {
    #[default]
    Center,
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
    /// Window with the highest luminance entropy.
    Entropy,
    /// Window with the most edges and saturated color.
    Attention,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown crop position: {0:?}")]
pub struct UnknownCropPosition(pub String);

impl CropPosition {
    pub const ALL: [CropPosition; 11] = [
        Self::Center,
        Self::North,
        Self::NorthEast,
        Self::East,
        Self::SouthEast,
        Self::South,
        Self::SouthWest,
        Self::West,
        Self::NorthWest,
        Self::Entropy,
        Self::Attention,
    ];

    /// Canonical identifier, also the one fed into cache keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::North => "north",
            Self::NorthEast => "northeast",
            Self::East => "east",
            Self::SouthEast => "southeast",
            Self::South => "south",
            Self::SouthWest => "southwest",
            Self::West => "west",
            Self::NorthWest => "northwest",
            Self::Entropy => "entropy",
            Self::Attention => "attention",
        }
    }

    /// Horizontal and vertical placement of a directional anchor, each in
    /// `{0, 1, 2}` (start, middle, end). `None` for the search strategies.
    pub fn anchor(self) -> Option<(u8, u8)> {
        match self {
            Self::Center => Some((1, 1)),
            Self::North => Some((1, 0)),
            Self::NorthEast => Some((2, 0)),
            Self::East => Some((2, 1)),
            Self::SouthEast => Some((2, 2)),
            Self::South => Some((1, 2)),
            Self::SouthWest => Some((0, 2)),
            Self::West => Some((0, 1)),
            Self::NorthWest => Some((0, 0)),
            Self::Entropy | Self::Attention => None,
        }
    }

    /// Parse a per-call identifier, falling back to `default` when it isn't
    /// recognized. The fallback is logged so typos show up in the build output.
    pub fn parse_or(value: &str, default: CropPosition) -> CropPosition {
        match value.parse() {
            Ok(crop) => crop,
            Err(UnknownCropPosition(raw)) => {
                tracing::warn!(
                    crop = %raw,
                    fallback = default.as_str(),
                    "unrecognized crop position, using default"
                );
                default
            }
        }
    }
}

impl FromStr for CropPosition {
    type Err = UnknownCropPosition;

    /// Accepts gravity names (`north`), position names (`right top`), strategy
    /// names (`attention`) and the namespaced form (`gravity.center`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.rsplit('.').next().unwrap_or(s);
        let normalized: String = name
            .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        let crop = match normalized.as_str() {
            "center" | "centre" => Self::Center,
            "north" | "top" => Self::North,
            "northeast" | "north east" | "right top" | "top right" => Self::NorthEast,
            "east" | "right" => Self::East,
            "southeast" | "south east" | "right bottom" | "bottom right" => Self::SouthEast,
            "south" | "bottom" => Self::South,
            "southwest" | "south west" | "left bottom" | "bottom left" => Self::SouthWest,
            "west" | "left" => Self::West,
            "northwest" | "north west" | "left top" | "top left" => Self::NorthWest,
            "entropy" => Self::Entropy,
            "attention" => Self::Attention,
            _ => return Err(UnknownCropPosition(s.to_string())),
        };
        Ok(crop)
    }
}

impl fmt::Display for CropPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CropPosition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CropPosition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Parameters for a cover-fit resize.
///
/// With a `height`, the output is exactly `width × height`, cropped around
/// `crop`. Without one, the source aspect ratio is kept and `crop` is unused.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: Option<u32>,
    pub crop: CropPosition,
    pub quality: Quality,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_90() {
        assert_eq!(Quality::default().value(), 90);
    }

    #[test]
    fn crop_parses_gravity_names() {
        assert_eq!("center".parse::<CropPosition>(), Ok(CropPosition::Center));
        assert_eq!("centre".parse::<CropPosition>(), Ok(CropPosition::Center));
        assert_eq!("NorthEast".parse::<CropPosition>(), Ok(CropPosition::NorthEast));
        assert_eq!("south-west".parse::<CropPosition>(), Ok(CropPosition::SouthWest));
    }

    #[test]
    fn crop_parses_position_names() {
        assert_eq!("top".parse::<CropPosition>(), Ok(CropPosition::North));
        assert_eq!("right top".parse::<CropPosition>(), Ok(CropPosition::NorthEast));
        assert_eq!("left bottom".parse::<CropPosition>(), Ok(CropPosition::SouthWest));
    }

    #[test]
    fn crop_parses_namespaced_form() {
        assert_eq!("gravity.center".parse::<CropPosition>(), Ok(CropPosition::Center));
        assert_eq!("strategy.attention".parse::<CropPosition>(), Ok(CropPosition::Attention));
        assert_eq!("position.top".parse::<CropPosition>(), Ok(CropPosition::North));
    }

    #[test]
    fn crop_rejects_unknown() {
        assert_eq!(
            "diagonal".parse::<CropPosition>(),
            Err(UnknownCropPosition("diagonal".into()))
        );
    }

    #[test]
    fn crop_parse_or_falls_back() {
        assert_eq!(
            CropPosition::parse_or("sideways", CropPosition::South),
            CropPosition::South
        );
        assert_eq!(
            CropPosition::parse_or("entropy", CropPosition::South),
            CropPosition::Entropy
        );
    }

    #[test]
    fn crop_identifiers_round_trip_through_as_str() {
        for crop in CropPosition::ALL {
            assert_eq!(crop.as_str().parse::<CropPosition>(), Ok(crop));
        }
    }

    #[test]
    fn search_strategies_have_no_anchor() {
        assert_eq!(CropPosition::Entropy.anchor(), None);
        assert_eq!(CropPosition::Attention.anchor(), None);
        assert_eq!(CropPosition::NorthWest.anchor(), Some((0, 0)));
    }
}
