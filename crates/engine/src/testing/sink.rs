//! Recording storage sink

use entaudit_core::{AuditError, AuditResult, ColumnType, StorageSink, Value};
use std::collections::HashSet;

/// One executed insert
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    /// Target table
    pub table: String,
    /// Column names in statement order
    pub columns: Vec<String>,
    /// Bound parameters
    pub params: Vec<Value>,
    /// Bound parameter types
    pub types: Vec<ColumnType>,
}

impl RecordedStatement {
    /// Parameter bound to a column
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.params.get(i))
    }
}

/// Storage sink that records statements instead of executing them
///
/// Statements issued between `begin` and `commit` stay pending and are
/// dropped by `rollback`. Outside a transaction they commit immediately.
#[derive(Debug, Default)]
pub struct RecordingSink {
    next_id: i64,
    in_transaction: bool,
    pending: Vec<RecordedStatement>,
    committed: Vec<RecordedStatement>,
    failing_tables: HashSet<String>,
    issued: usize,
}

impl RecordingSink {
    /// Create a sink whose generated ids start at 1
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create a sink whose generated ids start at `first_id`
    pub fn starting_at(first_id: i64) -> Self {
        RecordingSink {
            next_id: first_id,
            ..Default::default()
        }
    }

    /// Reject every statement targeting `table`
    pub fn fail_on(&mut self, table: impl Into<String>) {
        self.failing_tables.insert(table.into());
    }

    /// Start a transaction
    pub fn begin(&mut self) {
        self.in_transaction = true;
    }

    /// Commit pending statements
    pub fn commit(&mut self) {
        self.committed.append(&mut self.pending);
        self.in_transaction = false;
    }

    /// Drop pending statements
    pub fn rollback(&mut self) {
        self.pending.clear();
        self.in_transaction = false;
    }

    /// Committed statements
    pub fn committed(&self) -> &[RecordedStatement] {
        &self.committed
    }

    /// Statements issued in the open transaction
    pub fn pending(&self) -> &[RecordedStatement] {
        &self.pending
    }

    /// Committed statements targeting `table`
    pub fn rows(&self, table: &str) -> Vec<&RecordedStatement> {
        self.committed.iter().filter(|s| s.table == table).collect()
    }

    /// Statements accepted so far, committed or not
    pub fn issued(&self) -> usize {
        self.issued
    }

    fn record(&mut self, statement: RecordedStatement) -> AuditResult<()> {
        if self.failing_tables.contains(&statement.table) {
            return Err(AuditError::storage(format!(
                "insert into {} rejected",
                statement.table
            )));
        }
        self.issued += 1;
        if self.in_transaction {
            self.pending.push(statement);
        } else {
            self.committed.push(statement);
        }
        Ok(())
    }
}

/// Table and column list of `INSERT INTO t (a, b) VALUES (...)`
fn parse_insert(sql: &str) -> Option<(String, Vec<String>)> {
    let rest = sql.strip_prefix("INSERT INTO ")?;
    let open = rest.find('(')?;
    let close = rest[open..].find(')')? + open;
    let table = rest[..open].trim().to_string();
    let columns = rest[open + 1..close]
        .split(',')
        .map(|c| c.trim().to_string())
        .collect();
    Some((table, columns))
}

impl StorageSink for RecordingSink {
    fn insert(
        &mut self,
        table: &str,
        values: &[(String, Value)],
        types: &[ColumnType],
    ) -> AuditResult<i64> {
        self.record(RecordedStatement {
            table: table.to_string(),
            columns: values.iter().map(|(c, _)| c.clone()).collect(),
            params: values.iter().map(|(_, v)| v.clone()).collect(),
            types: types.to_vec(),
        })?;
        let id = self.next_id;
        self.next_id += 1;
        Ok(id)
    }

    fn execute_parameterized(
        &mut self,
        sql: &str,
        params: &[Value],
        types: &[ColumnType],
    ) -> AuditResult<u64> {
        let (table, columns) = parse_insert(sql)
            .ok_or_else(|| AuditError::storage(format!("unsupported statement: {}", sql)))?;
        if columns.len() != params.len() || params.len() != types.len() {
            return Err(AuditError::storage(format!(
                "{} columns bound with {} parameters and {} types",
                columns.len(),
                params.len(),
                types.len()
            )));
        }
        self.record(RecordedStatement {
            table,
            columns,
            params: params.to_vec(),
            types: types.to_vec(),
        })?;
        Ok(1)
    }
}
