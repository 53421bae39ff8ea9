//! Mural Backend Library
//!
//! Image upload service: accepts base64 JPEG artifacts over HTTP, stores
//! them on a filesystem and lists their metadata newest first.
//! Exposes the modules used by the `mural` binary and integration tests.

pub mod api;
pub mod artifact;
pub mod config;
pub mod middleware;
