//! Shared types for the Tessera retention subsystem.
//!
//! This crate defines what the other crates agree on:
//! - Configuration for the metadata store, blob store, and cleanup engine
//! - The blob key layout for tile images and share previews

pub mod config;
pub mod keys;

pub use config::{AppConfig, CleanupConfig, MetadataConfig, StorageConfig};
pub use keys::{PREVIEW_PREFIX, TILE_PREFIX, preview_blob_key, tile_blob_key};
