//! Page image archive
//!
//! Collects a stream of rendered pages into a single uncompressed zip.
//! PNG data does not shrink under deflate, so entries are stored.

use std::io::{Cursor, Write};
use std::pin::pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::preview::naming::{archive_name, page_entry_name};
use crate::preview::{PreviewError, PreviewResult};

use super::PageImage;

/// A finished archive, ready to hand to the platform as a download
#[derive(Debug, Clone)]
pub struct ImageArchive {
    /// `<base>-imagens.zip`
    pub file_name: String,
    pub bytes: Bytes,
    /// Entry names in archive order
    pub entries: Vec<String>,
}

/// Write every page of `pages` into a zip named after `base_name`
///
/// A page failure aborts the whole archive. Nothing partial is returned.
pub async fn build_archive<S>(base_name: &str, pages: S) -> PreviewResult<ImageArchive>
where
    S: Stream<Item = PreviewResult<PageImage>>,
{
    let mut pages = pin!(pages);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut entries = Vec::new();

    while let Some(page) = pages.next().await {
        let page = page.map_err(|source| {
            tracing::warn!(
                base_name,
                written = entries.len(),
                error = %source,
                "Page failed, aborting archive"
            );
            PreviewError::ArchiveAborted {
                written: entries.len(),
                source: Box::new(source),
            }
        })?;

        let name = page_entry_name(base_name, page.page_number);
        writer.start_file(name.as_str(), options)?;
        writer
            .write_all(&page.png)
            .map_err(|e| PreviewError::ArchiveWrite(e.to_string()))?;
        entries.push(name);
    }

    let bytes = writer.finish()?.into_inner();
    tracing::debug!(base_name, entries = entries.len(), size = bytes.len(), "Archive built");

    Ok(ImageArchive {
        file_name: archive_name(base_name),
        bytes: Bytes::from(bytes),
        entries,
    })
}

/// Return `bytes` as PNG, transcoding when the source is another format
pub fn to_png(bytes: Bytes, mime_type: &str) -> PreviewResult<Bytes> {
    if mime_type.eq_ignore_ascii_case("image/png") {
        return Ok(bytes);
    }

    let img = image::load_from_memory(&bytes)?;
    let mut output = Vec::new();
    img.write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)?;
    Ok(Bytes::from(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    use crate::export::rasterize_pages;
    use crate::testing::{image_bytes, pdf_with_pages, zip_entry_names};

    fn fake_page(page_number: usize) -> PageImage {
        PageImage {
            page_number,
            width: 2,
            height: 2,
            png: image_bytes(2, 2, image::ImageFormat::Png),
        }
    }

    #[tokio::test]
    async fn test_archive_from_pdf() {
        let archive = build_archive("recibo", rasterize_pages(Bytes::from(pdf_with_pages(3))))
            .await
            .unwrap();

        assert_eq!(archive.file_name, "recibo-imagens.zip");
        assert_eq!(
            archive.entries,
            vec!["recibo-p01.png", "recibo-p02.png", "recibo-p03.png"]
        );
        assert_eq!(zip_entry_names(&archive.bytes), archive.entries);
    }

    #[tokio::test]
    async fn test_entries_past_ninety_nine() {
        let pages = stream::iter((99..=100).map(|n| Ok(fake_page(n))));
        let archive = build_archive("livro", pages).await.unwrap();
        assert_eq!(archive.entries, vec!["livro-p99.png", "livro-p100.png"]);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_aborts() {
        let pages = stream::iter(vec![
            Ok(fake_page(1)),
            Ok(fake_page(2)),
            Err(PreviewError::RenderSurfaceUnavailable {
                page: 3,
                message: "out of memory".to_string(),
            }),
            Ok(fake_page(4)),
        ]);

        let err = build_archive("recibo", pages).await.unwrap_err();
        match err {
            PreviewError::ArchiveAborted { written, source } => {
                assert_eq!(written, 2);
                assert!(matches!(*source, PreviewError::RenderSurfaceUnavailable { page: 3, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_pdf_aborts_before_any_entry() {
        let err = build_archive("x", rasterize_pages(Bytes::from_static(b"garbage")))
            .await
            .unwrap_err();
        assert!(matches!(err, PreviewError::ArchiveAborted { written: 0, .. }));
        assert_eq!(err.status_code(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_to_png_passthrough_and_transcode() {
        let png = Bytes::from(image_bytes(4, 3, image::ImageFormat::Png));
        assert_eq!(to_png(png.clone(), "image/png").unwrap(), png);

        let jpeg = Bytes::from(image_bytes(4, 3, image::ImageFormat::Jpeg));
        let converted = to_png(jpeg, "image/jpeg").unwrap();
        let decoded = image::load_from_memory_with_format(&converted, image::ImageFormat::Png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
    }

    #[test]
    fn test_to_png_rejects_garbage() {
        let err = to_png(Bytes::from_static(b"nope"), "image/webp").unwrap_err();
        assert!(matches!(err, PreviewError::Image(_)));
    }
}
