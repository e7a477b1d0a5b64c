//! Revision allocation
//!
//! - One revision per flush, only when something is audited
//! - N inserts + M effective updates + K distinct deletions = N+M+K rows
//! - Distinct flushes get distinct revisions

use crate::common::*;
use proptest::prelude::*;
use std::sync::Arc;

#[test]
fn flush_without_audited_changes_allocates_nothing() {
    let mut h = Harness::new();
    let report = h.flush(|_| {}).unwrap();
    assert!(report.revision.is_none());
    assert!(h.revisions().is_empty());
}

#[test]
fn consecutive_flushes_get_distinct_revisions() {
    let mut h = Harness::new();
    let first = h
        .flush(|f| {
            f.insert("Customer", Identifier::single("id", 1), customer_fields(1, "a"));
        })
        .unwrap();
    let second = h
        .flush(|f| {
            f.insert("Customer", Identifier::single("id", 2), customer_fields(2, "b"));
        })
        .unwrap();

    let first = first.revision.unwrap();
    let second = second.revision.unwrap();
    assert_ne!(first.id, second.id);
    assert!(second.timestamp >= first.timestamp);
    assert_eq!(h.revisions().len(), 2);

    let rows = h.rows("customer_audit");
    assert_eq!(rows[0].get("revision_id"), Some(&Value::Int(first.id.0)));
    assert_eq!(rows[1].get("revision_id"), Some(&Value::Int(second.id.0)));
}

#[test]
fn username_is_resolved_per_flush() {
    let mut h = Harness::new();
    let calls = Arc::new(parking_lot::Mutex::new(0u32));
    let counter = calls.clone();
    h.pipeline = h
        .manager
        .clone()
        .with_username_resolver(Arc::new(move || {
            let mut n = counter.lock();
            *n += 1;
            format!("user-{}", *n)
        }))
        .pipeline();

    for id in 0..2 {
        h.flush(|f| {
            f.insert("Customer", Identifier::single("id", id), customer_fields(id, "x"));
            f.insert("Customer", Identifier::single("id", id + 10), customer_fields(id + 10, "y"));
        })
        .unwrap();
    }

    let names: Vec<&Value> = h
        .revisions()
        .iter()
        .filter_map(|r| r.get("username"))
        .collect();
    assert_eq!(names, vec![&Value::from("user-1"), &Value::from("user-2")]);
    assert_eq!(*calls.lock(), 2);
}

#[test]
fn default_username_comes_from_config() {
    let mut config = domain_config();
    config.default_username = "batch".to_string();
    let registry = domain();
    let manager = AuditManager::new(config, registry.clone()).unwrap();
    let mut pipeline = manager.pipeline();
    let mut uow = InMemoryUnitOfWork::new(registry);
    let mut sink = RecordingSink::new();

    pipeline.on_flush(&uow).unwrap();
    let customer = uow.persist("Customer", Identifier::single("id", 1), customer_fields(1, "a"));
    pipeline.post_persist(&customer).unwrap();
    let report = pipeline.post_flush(&mut uow, &mut sink).unwrap();

    assert_eq!(report.revision.unwrap().username, "batch");
}

/// Run one flush over customers: `deletes` existing ones removed (each
/// scheduled twice), `updates` existing ones renamed, `inserts` new ones.
fn mixed_flush(inserts: usize, updates: usize, deletes: usize) -> (Harness, FlushReport) {
    let mut h = Harness::new();
    let existing: Vec<EntityRef> = (0..updates + deletes)
        .map(|_| {
            let id = unique_id();
            h.seed("Customer", Identifier::single("id", id), customer_fields(id, "old"))
        })
        .collect();
    let (to_update, to_delete) = existing.split_at(updates);
    for entity in to_delete {
        h.uow.remove(entity);
        h.uow.remove(entity);
    }

    let report = h
        .flush(|f| {
            for entity in to_update {
                f.update(entity, &[("name", Value::from("new"))]);
            }
            for _ in 0..inserts {
                let id = unique_id();
                f.insert("Customer", Identifier::single("id", id), customer_fields(id, "fresh"));
            }
        })
        .unwrap();
    (h, report)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn row_count_is_inserts_plus_updates_plus_deletions(
        inserts in 0usize..4,
        updates in 0usize..4,
        deletes in 0usize..4,
    ) {
        let (h, report) = mixed_flush(inserts, updates, deletes);
        let total = inserts + updates + deletes;

        let rows = h.rows("customer_audit");
        prop_assert_eq!(rows.len(), total);
        prop_assert_eq!(report.rows_written, total);
        prop_assert_eq!(h.revisions().len(), usize::from(total > 0));

        if let Some(revision) = report.revision {
            let id = Value::Int(revision.id.0);
            prop_assert!(rows.iter().all(|r| r.get("revision_id") == Some(&id)));
        }

        let kinds = |kind: &str| rows
            .iter()
            .filter(|r| r.get("revision_type") == Some(&Value::from(kind)))
            .count();
        prop_assert_eq!(kinds("INS"), inserts);
        prop_assert_eq!(kinds("UPD"), updates);
        prop_assert_eq!(kinds("DEL"), deletes);
    }
}
