//! In-memory collaborators for testing the audit engine
//!
//! - **MetadataRegistry**: `MetadataProvider` over registered `ClassMetadata`
//! - **InMemoryUnitOfWork**: `PersistenceContext` modelling a host's identity
//!   map, original data and changesets after the primary write
//! - **RecordingSink**: `StorageSink` with transaction semantics, generated
//!   ids and per-table failure injection
//!
//! # Example
//!
//! ```ignore
//! use entaudit_engine::testing::{InMemoryUnitOfWork, MetadataRegistry, RecordingSink};
//!
//! let registry = Arc::new(MetadataRegistry::new());
//! let mut uow = InMemoryUnitOfWork::new(registry.clone());
//! let mut sink = RecordingSink::starting_at(7);
//!
//! sink.begin();
//! pipeline.on_flush(&uow)?;
//! let order = uow.persist("Order", Identifier::single("id", 42), fields);
//! pipeline.post_persist(&order)?;
//! pipeline.post_flush(&mut uow, &mut sink)?;
//! sink.commit();
//! ```

mod host;
mod sink;

pub use host::{InMemoryUnitOfWork, MetadataRegistry};
pub use sink::{RecordedStatement, RecordingSink};
