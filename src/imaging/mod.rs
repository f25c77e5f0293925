//! Image processing: the resize capability behind derivative generation.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Resize (natural aspect)** | `resize_exact` with Lanczos3 |
//! | **Resize (cover)** | fill-resize + anchored / entropy / attention crop |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and crop-window math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use calculations::{aspect_height, natural_height};
pub use params::{CropPosition, Quality, ResizeParams, UnknownCropPosition};
pub use rust_backend::RustBackend;
