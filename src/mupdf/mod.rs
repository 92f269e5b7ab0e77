//! Low-level MuPDF Wrapper
//!
//! MuPDF's `fz_context` is **NOT thread-safe**. [`SafeDocument`] keeps only
//! the bytes and opens a fresh document per operation, serialized by a mutex.
//! Callers run those operations on `tokio::task::spawn_blocking`.

mod safe;

pub use safe::SafeDocument;
