//! Catalog database integration.
//!
//! This module wraps a single SQLite file storing:
//! - Artifacts (firmware archives) keyed by name
//! - Devices, kernelcaches and shared caches bundled in an artifact
//! - Binary images keyed by their build UUID
//! - Symbols, interned once and linked to every image that carries them
//!
//! Layout:
//! - `CatalogConfig`: path + batch size, optionally loaded from JSON.
//! - `schema`: table declarations and the migration routine.
//! - `Entity`: per-type natural key lookup, insert and overwrite.
//! - `Catalog`: the handle callers drive (create-or-find, save, readers, delete).

pub mod catalog;
pub mod config;
pub mod entity;
pub mod models;
pub mod schema;

pub use catalog::*;
pub use config::*;
pub use entity::Entity;
pub use models::*;
