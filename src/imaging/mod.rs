//! Thumbnail generation on top of the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` (header only) |
//! | **Resize** | `DynamicImage::resize_exact` with Lanczos3 |
//! | **Encode** | JPEG with configured quality, other formats by extension |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::calculate_fit_dimensions;
pub use operations::{Thumbnail, ThumbnailConfig, create_thumbnail, plan_thumbnail};
pub use params::{Quality, ThumbnailParams};
pub use rust_backend::RustBackend;
