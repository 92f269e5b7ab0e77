//! PDF page rasterizer
//!
//! Turns PDF bytes into a lazy stream of PNG page images. Each poll opens
//! the document, renders exactly one page at [`RENDER_SCALE`] on a blocking
//! thread and drops the pixmap once it is encoded, so only one page's pixel
//! buffer is alive at a time.

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, Stream};
use image::DynamicImage;
use mupdf::{Colorspace, Matrix};

use crate::mupdf::SafeDocument;
use crate::preview::{PreviewError, PreviewResult};

/// Fixed scale relative to the PDF's intrinsic page size
pub const RENDER_SCALE: f32 = 1.5;

/// One rendered page
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-based page number
    pub page_number: usize,
    pub width: u32,
    pub height: u32,
    /// PNG-encoded pixels
    pub png: Vec<u8>,
}

enum RasterState {
    Unopened(Bytes),
    Open {
        doc: Arc<SafeDocument>,
        next_index: usize,
    },
    Finished,
}

/// Rasterize every page of a PDF, in order
///
/// The stream ends after the first error; pages already yielded stay valid.
pub fn rasterize_pages(data: Bytes) -> impl Stream<Item = PreviewResult<PageImage>> + Send + 'static {
    stream::unfold(RasterState::Unopened(data), |state| async move {
        let (doc, index) = match state {
            RasterState::Unopened(data) => match open_document(data).await {
                Ok(doc) => {
                    tracing::debug!(pages = doc.page_count(), "Rasterizing PDF");
                    (doc, 0)
                }
                Err(e) => return Some((Err(e), RasterState::Finished)),
            },
            RasterState::Open { doc, next_index } => (doc, next_index),
            RasterState::Finished => return None,
        };

        if index >= doc.page_count() {
            return None;
        }

        match render_page(doc.clone(), index).await {
            Ok(page) => Some((
                Ok(page),
                RasterState::Open {
                    doc,
                    next_index: index + 1,
                },
            )),
            Err(e) => Some((Err(e), RasterState::Finished)),
        }
    })
}

async fn open_document(data: Bytes) -> PreviewResult<Arc<SafeDocument>> {
    tokio::task::spawn_blocking(move || SafeDocument::from_bytes(data).map(Arc::new))
        .await
        .map_err(|e| PreviewError::Internal(format!("Task join error: {}", e)))?
}

async fn render_page(doc: Arc<SafeDocument>, index: usize) -> PreviewResult<PageImage> {
    let page_number = index + 1;

    tokio::task::spawn_blocking(move || {
        doc.with_doc(|mupdf_doc| {
            let page = mupdf_doc
                .load_page(index as i32)
                .map_err(|e| PreviewError::InvalidDocument(format!("page {}: {}", page_number, e)))?;

            let matrix = Matrix::new_scale(RENDER_SCALE, RENDER_SCALE);
            let colorspace = Colorspace::device_rgb();
            let pixmap = page
                .to_pixmap(&matrix, &colorspace, false, true)
                .map_err(|e| PreviewError::RenderSurfaceUnavailable {
                    page: page_number,
                    message: e.to_string(),
                })?;

            let (png, width, height) = encode_png(&pixmap)?;
            Ok(PageImage {
                page_number,
                width,
                height,
                png,
            })
        })
    })
    .await
    .map_err(|e| PreviewError::Internal(format!("Task join error: {}", e)))?
}

fn encode_png(pixmap: &mupdf::Pixmap) -> PreviewResult<(Vec<u8>, u32, u32)> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    let mut rgb_buffer = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * n;
            let r = samples.get(offset).copied().unwrap_or(255);
            let g = samples.get(offset + 1).copied().unwrap_or(255);
            let b = samples.get(offset + 2).copied().unwrap_or(255);
            rgb_buffer.extend_from_slice(&[r, g, b]);
        }
    }

    let img = image::RgbImage::from_raw(width, height, rgb_buffer)
        .ok_or_else(|| PreviewError::Image("Failed to create image buffer".to_string()))?;

    let mut output = Vec::new();
    DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)?;

    Ok((output, width, height))
}
