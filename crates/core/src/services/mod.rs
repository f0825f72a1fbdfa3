//! Higher-level workflows built on the catalog.

pub mod ingest;
#[cfg(feature = "macho")]
pub mod macho;
