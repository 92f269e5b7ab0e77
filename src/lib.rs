//! Preview Server Library
//!
//! This crate exposes the preview pipeline for the server binary and the
//! benchmarks. The main server binary is in main.rs.
//!
//! # Modules
//!
//! - `preview`: Sessions, reference cache and viewer state machine
//! - `export`: PDF page rasterization and page-image archives
//! - `platform`: Host capabilities (fetch, ephemeral handles, downloads)
//! - `routes`: HTTP surface

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod platform;
pub mod preview;
pub mod routes;
pub mod state;

// Internal MuPDF wrapper used by the rasterizer
mod mupdf;

#[cfg(test)]
mod testing;
