//! Document preview pipeline
//!
//! Hands generated documents from a producer to a viewer and exports them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  create   ┌─────────────────────┐
//! │   Producer   │──────────▶│ PreviewSessionStore │── SessionStorage (SQLite)
//! └──────────────┘           └──────────┬──────────┘
//!                                       │ consume / clear
//!                            ┌──────────▼──────────────┐
//!                            │ DocumentViewerController │◀── ViewerRegistry
//!                            └──────────┬──────────────┘
//!                         resolve       │       download_images
//!                    ┌──────────────────┼───────────────────┐
//!             ┌──────▼───────┐                      ┌───────▼──────┐
//!             │ReferenceCache│                      │ export::*    │
//!             └──────┬───────┘                      │ rasterize +  │
//!                    │ fetch / mint / release       │ archive      │
//!             ┌──────▼───────┐                      └──────────────┘
//!             │ PlatformIo   │
//!             └──────────────┘
//! ```

mod cache;
mod error;
pub mod naming;
mod registry;
mod session;
mod storage;
mod types;
mod viewer;

pub use cache::ReferenceCache;
pub use error::{PreviewError, PreviewResult};
pub use registry::{SharedViewer, ViewerRegistry};
pub use session::{storage_key, PreviewSessionStore, DEFAULT_VIEWER_ROUTE, STORAGE_PREFIX};
pub use storage::{MemorySessionStorage, SessionStorage, SqliteSessionStorage};
pub use types::{
    CreatedSession, DocumentKind, DocumentPreviewSession, PreviewDocument, PreviewDocumentInput,
    SessionOptions, DEFAULT_CONTEXT,
};
pub use viewer::{
    DocumentEntry, DocumentStatus, DocumentViewerController, ExportState, ImageExport, RenderTarget,
    ViewerSnapshot, ViewerState, EXPIRED_SESSION_MESSAGE,
};
