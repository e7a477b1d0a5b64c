//! Update auditing
//!
//! - Changes limited to ignored fields produce no rows
//! - Update rows carry the full post-update snapshot
//! - Identifier associations resolve through the identity map

use crate::common::*;

#[test]
fn ignored_field_only_update_writes_nothing() {
    let mut h = Harness::new();
    let order = h.seed("Order", Identifier::single("id", 42), order_fields(42, 100));

    let report = h
        .flush(|f| f.update(&order, &[("updated_at", Value::from("2026-10-19 08:00:00"))]))
        .unwrap();

    assert_eq!(report.skipped_updates, 1);
    assert_eq!(report.updates, 0);
    assert!(report.revision.is_none());
    assert!(h.sink.committed().is_empty());
}

#[test]
fn skipped_update_does_not_stop_later_updates() {
    let mut h = Harness::new();
    let order = h.seed("Order", Identifier::single("id", 42), order_fields(42, 100));
    let customer = h.seed("Customer", Identifier::single("id", 5), customer_fields(5, "acme"));

    let report = h
        .flush(|f| {
            f.update(&order, &[("updated_at", Value::from("2026-10-19 08:00:00"))]);
            f.update(&customer, &[("name", Value::from("acme inc"))]);
        })
        .unwrap();

    assert_eq!(report.skipped_updates, 1);
    assert_eq!(report.updates, 1);
    assert!(h.rows("order_audit").is_empty());
    assert_eq!(h.rows("customer_audit").len(), 1);
}

#[test]
fn mixed_update_writes_full_snapshot() {
    let mut h = Harness::new();
    let order = h.seed("Order", Identifier::single("id", 42), order_fields(42, 100));

    h.flush(|f| {
        f.update(
            &order,
            &[
                ("total", Value::Int(150)),
                ("updated_at", Value::from("2026-10-19 08:00:00")),
            ],
        )
    })
    .unwrap();

    let rows = h.rows("order_audit");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("revision_type"), Some(&Value::from("UPD")));
    assert_eq!(rows[0].get("total"), Some(&Value::Int(150)));
    assert_eq!(rows[0].get("deleted"), Some(&Value::Bool(false)));
    assert_eq!(
        rows[0].get("updated_at"),
        Some(&Value::from("2026-10-19 08:00:00"))
    );

    let document = h.rows("document_audit");
    assert_eq!(document.len(), 1);
    assert_eq!(document[0].get("revision_type"), Some(&Value::from("UPD")));
    assert_eq!(document[0].get("discriminator"), Some(&Value::from("order")));
}

#[test]
fn update_records_bumped_version() {
    let mut h = Harness::new();
    let customer = h.seed("Customer", Identifier::single("id", 5), customer_fields(5, "acme"));

    h.flush(|f| {
        f.update(&customer, &[("name", Value::from("acme inc"))]);
        f.uow.set_current(&customer, "version", 2);
    })
    .unwrap();

    let rows = h.rows("customer_audit");
    assert_eq!(rows[0].get("name"), Some(&Value::from("acme inc")));
    assert_eq!(rows[0].get("version"), Some(&Value::Int(2)));
}

#[test]
fn identifier_association_resolves_through_identity_map() {
    let mut h = Harness::new();
    let order = h.seed("Order", Identifier::single("id", 42), order_fields(42, 100));
    let line = h.seed(
        "Line",
        Identifier::new().with("order", 42).with("position", 1),
        Snapshot::new()
            .with("order", order.clone())
            .with("position", 1)
            .with("sku", "A-1"),
    );

    h.flush(|f| f.update(&line, &[("sku", Value::from("A-2"))]))
        .unwrap();

    let rows = h.rows("order_line_audit");
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].columns,
        vec!["revision_id", "revision_type", "order_id", "position", "sku"]
    );
    assert_eq!(rows[0].get("order_id"), Some(&Value::Int(42)));
    assert_eq!(rows[0].get("position"), Some(&Value::Int(1)));
    assert_eq!(rows[0].get("sku"), Some(&Value::from("A-2")));
}

#[test]
fn unresolvable_identifier_association_aborts_flush() {
    let mut h = Harness::new();
    let line = h.seed(
        "Line",
        Identifier::new().with("order", 99).with("position", 1),
        Snapshot::new().with("position", 1).with("sku", "A-1"),
    );

    let err = h
        .flush(|f| f.update(&line, &[("sku", Value::from("A-2"))]))
        .unwrap_err();

    assert!(err.is_mapping());
    assert!(matches!(err, AuditError::UnresolvedAssociation { ref field, .. } if field == "order"));
    assert!(h.sink.committed().is_empty());
    assert_eq!(h.pipeline.state(), FlushState::Idle);
}
