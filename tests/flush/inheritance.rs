//! Inheritance encoding
//!
//! - Single-table subclasses write one row with their own discriminator
//! - Joined roots write their own discriminator
//! - Written rows always match the memoized insert statement

use crate::common::*;

#[test]
fn single_table_subclass_writes_one_row() {
    let mut h = Harness::new();
    let report = h
        .flush(|f| {
            f.insert(
                "Car",
                Identifier::single("id", 3),
                Snapshot::new().with("id", 3).with("wheels", 4).with("doors", 5),
            );
        })
        .unwrap();

    assert_eq!(report.rows_written, 1);
    let rows = h.rows("vehicle_audit");
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].columns,
        vec!["revision_id", "revision_type", "id", "wheels", "doors", "type"]
    );
    assert_eq!(rows[0].get("type"), Some(&Value::from("car")));
    assert_eq!(rows[0].get("wheels"), Some(&Value::Int(4)));
}

#[test]
fn joined_root_writes_its_own_discriminator() {
    let mut h = Harness::new();
    h.flush(|f| {
        f.insert("Document", Identifier::single("id", 8), Snapshot::new().with("id", 8));
    })
    .unwrap();

    let rows = h.rows("document_audit");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("discriminator"), Some(&Value::from("document")));
    assert!(h.rows("order_audit").is_empty());
}

#[test]
fn rows_match_insert_statement_columns() {
    let mut h = Harness::new();
    h.flush(|f| {
        f.insert("Order", Identifier::single("id", 42), order_fields(42, 100));
    })
    .unwrap();

    let cache = h.manager.cache();
    for class in ["Order", "Document"] {
        let shape = cache.insert_shape(&ClassName::new(class)).unwrap();
        let rows = h.rows(&shape.table);
        assert_eq!(rows.len(), 1, "{}", shape.table);
        assert_eq!(rows[0].columns, shape.columns);
        assert_eq!(rows[0].params.len(), rows[0].types.len());
    }
}

#[test]
fn every_level_shares_the_revision() {
    let mut h = Harness::new();
    h.flush(|f| {
        f.insert("Order", Identifier::single("id", 1), order_fields(1, 10));
        f.insert("Order", Identifier::single("id", 2), order_fields(2, 20));
    })
    .unwrap();

    let all: Vec<&RecordedStatement> = h
        .rows("document_audit")
        .into_iter()
        .chain(h.rows("order_audit"))
        .collect();
    assert_eq!(all.len(), 4);
    assert!(all.iter().all(|r| r.get("revision_id") == Some(&Value::Int(7))));
}
