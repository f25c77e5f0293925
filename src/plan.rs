//! Which sizes a single image needs.
//!
//! A plan is the base (fallback) size followed by one entry per configured
//! breakpoint width, in the configuration's order. When the base carries a
//! height, every breakpoint height keeps the base ratio via
//! [`aspect_height`](crate::imaging::aspect_height); otherwise heights are
//! left to the source's natural aspect ratio.
//!
//! ```text
//! base 640×360, widths [320, 960]
//!   base        640 × 360
//!   breakpoint  320 × 180   floor(360 / 640 * 320)
//!   breakpoint  960 × 540
//! ```

use crate::imaging::aspect_height;
use serde::Serialize;

/// One size to generate. `height: None` keeps the natural aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlannedSize {
    pub width: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Ordered set of sizes for one logical image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SrcsetPlan {
    /// Used for `src`.
    pub base: PlannedSize,
    /// Used for `srcset`, in configuration order.
    pub breakpoints: Vec<PlannedSize>,
}

impl SrcsetPlan {
    /// Base first, then every breakpoint.
    pub fn sizes(&self) -> impl Iterator<Item = PlannedSize> + '_ {
        std::iter::once(self.base).chain(self.breakpoints.iter().copied())
    }
}

/// Plan the sizes for a base box and a list of breakpoint widths.
pub fn plan(base_width: u32, base_height: Option<u32>, widths: &[u32]) -> SrcsetPlan {
    let breakpoints = widths
        .iter()
        .map(|&width| PlannedSize {
            width,
            height: base_height.map(|h| aspect_height(base_width, h, width)),
        })
        .collect();

    SrcsetPlan {
        base: PlannedSize {
            width: base_width,
            height: base_height,
        },
        breakpoints,
    }
}
