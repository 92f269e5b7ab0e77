//! Page image export
//!
//! PDF pages are rasterized one at a time and packed into a zip archive
//! named after the source document.

mod archive;
mod rasterizer;

pub use archive::{build_archive, to_png, ImageArchive};
pub use rasterizer::{rasterize_pages, PageImage, RENDER_SCALE};
