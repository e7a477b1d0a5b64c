//! Configuration-driven naming

use crate::common::*;
use tempfile::TempDir;

#[test]
fn prefix_and_suffix_name_audit_tables() {
    let mut config = domain_config();
    config.table_prefix = "aud_".to_string();
    config.table_suffix = "_log".to_string();
    config.revision_table_name = "audit_revisions".to_string();
    config.revision_field_name = "rev".to_string();
    config.revision_type_field_name = "rev_kind".to_string();
    let mut h = Harness::with_config(config);

    h.flush(|f| {
        f.insert("Customer", Identifier::single("id", 5), customer_fields(5, "acme"));
    })
    .unwrap();

    assert_eq!(h.sink.rows("audit_revisions").len(), 1);
    let rows = h.rows("aud_customer_log");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].columns[0], "rev");
    assert_eq!(rows[0].columns[1], "rev_kind");
    assert_eq!(rows[0].get("rev"), Some(&Value::Int(7)));
}

#[test]
fn ignored_columns_are_configurable() {
    let mut config = domain_config();
    config.global_ignore_columns = vec!["name".to_string()];
    let mut h = Harness::with_config(config);
    let customer = h.seed("Customer", Identifier::single("id", 5), customer_fields(5, "acme"));
    let order = h.seed("Order", Identifier::single("id", 42), order_fields(42, 100));

    let report = h
        .flush(|f| {
            f.update(&customer, &[("name", Value::from("acme inc"))]);
            f.update(&order, &[("updated_at", Value::from("2026-10-19 08:00:00"))]);
        })
        .unwrap();

    assert_eq!(report.skipped_updates, 1);
    assert!(h.rows("customer_audit").is_empty());
    assert_eq!(h.rows("order_audit").len(), 1);
}

#[test]
fn manager_opens_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(entaudit::CONFIG_FILE_NAME);
    let mut config = domain_config();
    config.revision_id_field_type = ColumnType::String;
    config.write_to_file(&path).unwrap();

    let manager = AuditManager::open(dir.path(), domain()).unwrap();
    assert_eq!(manager.config(), &config);
    manager.warm_up().unwrap();

    let mut pipeline = manager.pipeline();
    let mut uow = InMemoryUnitOfWork::new(domain());
    let mut sink = RecordingSink::new();
    pipeline.on_flush(&uow).unwrap();
    let customer = uow.persist("Customer", Identifier::single("id", 1), customer_fields(1, "a"));
    pipeline.post_persist(&customer).unwrap();
    pipeline.post_flush(&mut uow, &mut sink).unwrap();

    assert_eq!(sink.rows("customer_audit")[0].types[0], ColumnType::String);
}

#[test]
fn warm_up_reports_unmapped_audited_class() {
    let mut config = domain_config();
    config.audited_entities.push("Ghost".to_string());
    let manager = AuditManager::new(config, domain()).unwrap();
    let err = manager.warm_up().unwrap_err();
    assert!(err.is_mapping());
}
