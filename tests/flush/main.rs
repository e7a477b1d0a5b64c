//! Flush Integration Tests
//!
//! End-to-end audit trails through the flush pipeline, using the in-memory
//! unit of work and the recording sink.

#[path = "../common/mod.rs"]
mod common;

mod concurrency;
mod configuration;
mod deletions;
mod inheritance;
mod inserts;
mod revisions;
mod updates;
