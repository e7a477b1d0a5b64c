//! entaudit - Flush-scoped audit trail for ORM-managed entities
//!
//! Every insert, update and delete of an audited class produces a row in a
//! per-class audit table. All rows of one flush share a single revision that
//! records when the flush happened and who performed it.
//!
//! # Quick Start
//!
//! ```ignore
//! use entaudit::{AuditConfig, AuditManager};
//!
//! let manager = AuditManager::new(AuditConfig::for_entities(["Order"]), provider)?;
//! let mut pipeline = manager.pipeline();
//!
//! // Inside the host's transaction:
//! pipeline.on_flush(&uow)?;
//! // ... primary writes ...
//! pipeline.post_persist(&order)?;
//! let report = pipeline.post_flush(&mut uow, &mut sink)?;
//! ```
//!
//! # Architecture
//!
//! The host supplies mapping metadata, its unit of work and a statement sink
//! through the traits re-exported from `entaudit-core`. The flush pipeline
//! and everything behind it lives in `entaudit-engine`.

pub use entaudit_core::*;
pub use entaudit_engine::*;
