//! Thread-safe PDF wrapper for MuPDF
//!
//! # Design
//!
//! MuPDF documents are not thread-safe. This wrapper:
//!
//! 1. Stores the document bytes
//! 2. Opens a fresh document for each operation
//! 3. Uses `parking_lot::Mutex` to serialize access
//!
//! No `mupdf::Document` outlives the closure it is used in, so the wrapper
//! itself only holds plain data and can move freely between blocking tasks.

use bytes::Bytes;
use mupdf::Document;
use parking_lot::Mutex;

use crate::preview::{PreviewError, PreviewResult};

/// MIME type MuPDF uses to pick the PDF handler
const PDF_MAGIC: &str = "application/pdf";

/// PDF bytes that can be opened on any thread
#[derive(Debug)]
pub struct SafeDocument {
    data: Bytes,
    page_count: usize,
    lock: Mutex<()>,
}

impl SafeDocument {
    /// Open and validate PDF bytes
    ///
    /// Runs MuPDF synchronously; call from a blocking task.
    pub fn from_bytes(data: Bytes) -> PreviewResult<Self> {
        if !has_pdf_header(&data) {
            return Err(PreviewError::InvalidDocument("missing %PDF header".to_string()));
        }

        let doc = Document::from_bytes(&data, PDF_MAGIC)
            .map_err(|e| PreviewError::InvalidDocument(e.to_string()))?;
        let page_count = doc
            .page_count()
            .map_err(|e| PreviewError::InvalidDocument(e.to_string()))?;

        Ok(Self {
            data,
            page_count: page_count.max(0) as usize,
            lock: Mutex::new(()),
        })
    }

    /// Number of pages
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Execute a closure with access to a freshly opened document
    ///
    /// ```ignore
    /// let bounds = safe_doc.with_doc(|doc| {
    ///     let page = doc.load_page(0)?;
    ///     Ok(page.bounds()?)
    /// })?;
    /// ```
    pub fn with_doc<F, R>(&self, f: F) -> PreviewResult<R>
    where
        F: FnOnce(&Document) -> PreviewResult<R>,
    {
        // Serialize access
        let _guard = self.lock.lock();

        let doc = Document::from_bytes(&self.data, PDF_MAGIC)
            .map_err(|e| PreviewError::InvalidDocument(e.to_string()))?;

        f(&doc)
    }
}

/// PDF magic within the first KiB, where readers tolerate leading junk
fn has_pdf_header(data: &[u8]) -> bool {
    let head = &data[..data.len().min(1024)];
    head.windows(5).any(|window| window == b"%PDF-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::pdf_with_pages;

    #[test]
    fn test_page_count() {
        let doc = SafeDocument::from_bytes(Bytes::from(pdf_with_pages(3))).unwrap();
        assert_eq!(doc.page_count(), 3);

        let bounds = doc
            .with_doc(|d| {
                let page = d
                    .load_page(0)
                    .map_err(|e| PreviewError::InvalidDocument(e.to_string()))?;
                page.bounds()
                    .map_err(|e| PreviewError::InvalidDocument(e.to_string()))
            })
            .unwrap();
        assert_eq!(bounds.x1 - bounds.x0, 200.0);
    }

    #[test]
    fn test_rejects_garbage() {
        let err = SafeDocument::from_bytes(Bytes::from_static(b"definitely not a pdf")).unwrap_err();
        assert!(matches!(err, PreviewError::InvalidDocument(_)));
    }
}
