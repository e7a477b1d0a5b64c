//! Deletion auditing
//!
//! - Repeated deletions of one entity are audited once
//! - Hard deletions snapshot the last persisted state
//! - Soft deletions snapshot the state after the delete

use crate::common::*;
use std::sync::Arc;

#[test]
fn double_deletion_writes_one_row() {
    let mut h = Harness::new();
    let customer = h.seed("Customer", Identifier::single("id", 5), customer_fields(5, "acme"));
    h.uow.remove(&customer);
    h.uow.remove(&customer);

    let report = h.flush(|_| {}).unwrap();

    assert_eq!(report.deletions, 1);
    let rows = h.rows("customer_audit");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("revision_type"), Some(&Value::from("DEL")));
    assert_eq!(rows[0].get("id"), Some(&Value::Int(5)));
    assert_eq!(rows[0].get("name"), Some(&Value::from("acme")));
}

#[test]
fn hard_deletion_snapshots_last_persisted_state() {
    let mut h = Harness::new();
    let order = h.seed("Order", Identifier::single("id", 42), order_fields(42, 100));
    h.uow.remove(&order);

    h.flush(|_| {}).unwrap();

    let order_rows = h.rows("order_audit");
    assert_eq!(order_rows.len(), 1);
    assert_eq!(order_rows[0].get("revision_type"), Some(&Value::from("DEL")));
    assert_eq!(order_rows[0].get("total"), Some(&Value::Int(100)));
    assert_eq!(order_rows[0].get("deleted"), Some(&Value::Bool(false)));

    let document_rows = h.rows("document_audit");
    assert_eq!(document_rows.len(), 1);
    assert_eq!(document_rows[0].get("id"), Some(&Value::Int(42)));
    assert_eq!(document_rows[0].get("discriminator"), Some(&Value::from("order")));
}

#[test]
fn soft_deletion_snapshots_post_delete_state() {
    let mut h = Harness::new();
    let order = h.seed("Order", Identifier::single("id", 42), order_fields(42, 100));
    h.uow.soft_remove(&order, "deleted", true);

    let report = h.flush(|_| {}).unwrap();

    assert_eq!(report.deletions, 1);
    let rows = h.rows("order_audit");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("revision_type"), Some(&Value::from("DEL")));
    assert_eq!(rows[0].get("deleted"), Some(&Value::Bool(true)));
}

#[test]
fn snapshot_as_is_hook_keeps_pre_delete_state() {
    let mut h = Harness::new();
    h.pipeline = h
        .manager
        .clone()
        .with_deletion_hook(Arc::new(entaudit::SnapshotAsIs))
        .pipeline();
    let order = h.seed("Order", Identifier::single("id", 42), order_fields(42, 100));
    h.uow.soft_remove(&order, "deleted", true);

    h.flush(|_| {}).unwrap();

    assert_eq!(
        h.rows("order_audit")[0].get("deleted"),
        Some(&Value::Bool(false))
    );
}

#[test]
fn deletion_keeps_identifier_captured_at_flush_start() {
    let mut h = Harness::new();
    let line = h.seed(
        "Line",
        Identifier::new().with("order", 42).with("position", 2),
        Snapshot::new().with("position", 2).with("sku", "B-7"),
    );
    h.uow.remove(&line);

    h.flush(|_| {}).unwrap();

    let rows = h.rows("order_line_audit");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("order_id"), Some(&Value::Int(42)));
    assert_eq!(rows[0].get("position"), Some(&Value::Int(2)));
}

#[test]
fn untracked_deletion_is_ignored() {
    let mut h = Harness::new();
    let note = h.seed("Note", Identifier::single("id", 1), Snapshot::new().with("id", 1));
    h.uow.remove(&note);

    let report = h.flush(|_| {}).unwrap();
    assert_eq!(report.deletions, 0);
    assert!(h.sink.committed().is_empty());
}
