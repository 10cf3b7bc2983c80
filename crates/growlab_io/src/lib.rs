//! # Growlab IO
//!
//! Persistence layer for the growlab game engine.
//!
//! This crate provides:
//! - Structured error handling with custom error types
//! - JSON helpers for emitting game data
//! - Checksummed gzip snapshots of the whole store

/// Error types and result aliases for I/O operations
pub mod error;
/// Validated JSON serialization helpers
pub mod serialization;
/// Gzip world snapshots with SHA-256 integrity headers
pub mod snapshot;

pub use error::{IoError, Result};
pub use serialization::{from_json, read_json_file, to_json, to_json_pretty, write_json_file};
pub use snapshot::Snapshot;
