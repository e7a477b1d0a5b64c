//! Concurrent flushes
//!
//! One manager (and descriptor cache) serves many units of work on many
//! threads; each unit of work drives its own pipeline.

use crate::common::*;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn independent_pipelines_share_one_cache() {
    init_tracing();
    let registry = domain();
    let manager = AuditManager::new(domain_config(), registry.clone()).unwrap();
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let manager = manager.clone();
            let registry = registry.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let mut pipeline = manager.pipeline();
                let mut uow = InMemoryUnitOfWork::new(registry);
                let mut sink = RecordingSink::starting_at(t as i64 * 100);
                barrier.wait();

                pipeline.on_flush(&uow).unwrap();
                let order = uow.persist("Order", Identifier::single("id", t as i64), order_fields(t as i64, 1));
                pipeline.post_persist(&order).unwrap();
                let report = pipeline.post_flush(&mut uow, &mut sink).unwrap();
                (report, sink)
            })
        })
        .collect();

    for (t, handle) in handles.into_iter().enumerate() {
        let (report, sink) = handle.join().unwrap();
        assert_eq!(report.revision.unwrap().id, RevisionId(t as i64 * 100));
        assert_eq!(sink.rows("order_audit").len(), 1);
        assert_eq!(sink.rows("document_audit").len(), 1);
    }

    // Order, its root and its association target, each published once.
    assert_eq!(manager.cache().len(), 3);
}

#[test]
fn shared_pipeline_runs_whole_flushes_under_the_lock() {
    init_tracing();
    let registry = domain();
    let manager = AuditManager::new(domain_config(), registry.clone()).unwrap();
    let shared = manager.shared_pipeline();
    let uow = Arc::new(parking_lot::Mutex::new(InMemoryUnitOfWork::new(registry)));
    let sink = Arc::new(parking_lot::Mutex::new(RecordingSink::starting_at(1)));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let shared = shared.clone();
            let uow = uow.clone();
            let sink = sink.clone();
            thread::spawn(move || {
                let mut pipeline = shared.lock();
                let mut uow = uow.lock();
                let mut sink = sink.lock();
                pipeline.on_flush(&*uow).unwrap();
                let id = unique_id();
                let customer = uow.persist("Customer", Identifier::single("id", id), customer_fields(id, "c"));
                pipeline.post_persist(&customer).unwrap();
                let report = pipeline.post_flush(&mut *uow, &mut *sink).unwrap();
                assert_eq!(report.inserts, 1, "thread {}", t);
                report.revision.unwrap().id
            })
        })
        .collect();

    let mut revisions: Vec<RevisionId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    revisions.sort();
    revisions.dedup();
    assert_eq!(revisions.len(), 4);

    let sink = sink.lock();
    assert_eq!(sink.rows("revisions").len(), 4);
    assert_eq!(sink.rows("customer_audit").len(), 4);
}
