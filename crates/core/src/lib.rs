//! symcat-core
//!
//! Core library for cataloguing firmware artifacts (archives, device targets,
//! kernelcaches, shared caches, binary images) and the symbols exported by
//! their images.
//!
//! The catalog answers one question repeatedly: which symbol covers address A
//! inside image U? Everything else (ingestion, dedup, schema upkeep) exists to
//! make that lookup cheap and correct. Frontends (the `symcat` CLI) stay thin
//! so the logic here is fully testable.

pub mod db;
pub mod services;
