//! Insert auditing
//!
//! - Joined leaf inserts write one row per hierarchy level
//! - Versioned entities record the current version
//! - Association keys come from the identity map
//! - Untracked classes produce nothing

use crate::common::*;

#[test]
fn joined_leaf_insert_writes_root_and_leaf_rows() {
    let mut h = Harness::new();

    let report = h
        .flush(|f| {
            f.insert("Order", Identifier::single("id", 42), order_fields(42, 100));
        })
        .unwrap();

    let revision = report.revision.expect("revision allocated");
    assert_eq!(revision.id, RevisionId(7));
    assert_eq!(revision.username, "alice");
    assert_eq!(report.inserts, 1);
    assert_eq!(report.rows_written, 2);

    let revisions = h.revisions();
    assert_eq!(revisions.len(), 1);
    assert_eq!(revisions[0].get("username"), Some(&Value::from("alice")));

    let document = h.rows("document_audit");
    assert_eq!(document.len(), 1);
    assert_eq!(document[0].get("revision_id"), Some(&Value::Int(7)));
    assert_eq!(document[0].get("revision_type"), Some(&Value::from("INS")));
    assert_eq!(document[0].get("id"), Some(&Value::Int(42)));
    assert_eq!(document[0].get("discriminator"), Some(&Value::from("order")));

    let order = h.rows("order_audit");
    assert_eq!(order.len(), 1);
    assert_eq!(order[0].get("revision_id"), Some(&Value::Int(7)));
    assert_eq!(order[0].get("revision_type"), Some(&Value::from("INS")));
    assert_eq!(order[0].get("id"), Some(&Value::Int(42)));
    assert_eq!(order[0].get("total"), Some(&Value::Int(100)));
    assert_eq!(order[0].get("discriminator"), None);
}

#[test]
fn audit_rows_follow_revision_row() {
    let mut h = Harness::new();
    h.flush(|f| {
        f.insert("Order", Identifier::single("id", 42), order_fields(42, 100));
    })
    .unwrap();

    let tables: Vec<&str> = h.sink.committed().iter().map(|s| s.table.as_str()).collect();
    assert_eq!(tables, vec!["revisions", "document_audit", "order_audit"]);
}

#[test]
fn plain_insert_writes_every_mapped_column() {
    let mut h = Harness::new();
    h.flush(|f| {
        f.insert("Customer", Identifier::single("id", 5), customer_fields(5, "acme"));
    })
    .unwrap();

    let rows = h.rows("customer_audit");
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].columns,
        vec!["revision_id", "revision_type", "id", "name", "version"]
    );
    assert_eq!(rows[0].get("name"), Some(&Value::from("acme")));
    assert_eq!(rows[0].types[0], ColumnType::Integer);
    assert_eq!(rows[0].types[1], ColumnType::String);
}

#[test]
fn insert_records_current_version() {
    let mut h = Harness::new();
    h.flush(|f| {
        let customer = f.insert("Customer", Identifier::single("id", 5), customer_fields(5, "acme"));
        // The host assigns the initial version after the insert statement.
        f.uow.set_current(&customer, "version", 3);
    })
    .unwrap();

    assert_eq!(h.rows("customer_audit")[0].get("version"), Some(&Value::Int(3)));
}

#[test]
fn association_key_uses_target_identifier() {
    let mut h = Harness::new();
    let customer = h.seed("Customer", Identifier::single("id", 5), customer_fields(5, "acme"));

    h.flush(|f| {
        f.insert(
            "Order",
            Identifier::single("id", 42),
            order_fields(42, 100).with("customer", customer.clone()),
        );
    })
    .unwrap();

    assert_eq!(h.rows("order_audit")[0].get("customer_id"), Some(&Value::Int(5)));
}

#[test]
fn association_outside_identity_map_is_null() {
    let mut h = Harness::new();
    let customer = h.seed("Customer", Identifier::single("id", 5), customer_fields(5, "acme"));
    h.uow.evict(&customer);

    h.flush(|f| {
        f.insert(
            "Order",
            Identifier::single("id", 42),
            order_fields(42, 100).with("customer", customer.clone()),
        );
    })
    .unwrap();

    assert_eq!(h.rows("order_audit")[0].get("customer_id"), Some(&Value::Null));
}

#[test]
fn untracked_insert_writes_nothing() {
    let mut h = Harness::new();
    let report = h
        .flush(|f| {
            f.insert(
                "Note",
                Identifier::single("id", 1),
                Snapshot::new().with("id", 1).with("body", "hello"),
            );
        })
        .unwrap();

    assert!(report.revision.is_none());
    assert_eq!(report.rows_written, 0);
    assert!(h.sink.committed().is_empty());
}
