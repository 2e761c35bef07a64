//! End-to-end pipeline tests over an in-memory source and a recording target.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlite_pg_migrate::ddl;
use sqlite_pg_migrate::{
    map_type, Batch, Column, ColumnClasses, Config, DestinationTypeClass, ForeignKey, Index,
    MigrateError, Orchestrator, Result, Row, SourceReader, SqlValue, Table, TargetColumn,
    TargetWriter, TransferConfig, TransferEngine,
};

// =============================================================================
// Fakes
// =============================================================================

#[derive(Default)]
struct MemorySource {
    tables: BTreeMap<String, (Table, Vec<Row>)>,
    calls: Mutex<Vec<String>>,
}

impl MemorySource {
    fn with_table(mut self, table: Table, rows: Vec<Row>) -> Self {
        self.tables.insert(table.name.clone(), (table, rows));
        self
    }

    fn calls_for(&self, table: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.ends_with(&format!(" {}", table)) || c.contains(&format!(" {} ", table)))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn introspect_table(&self, name: &str) -> Result<Table> {
        self.tables
            .get(name)
            .map(|(t, _)| t.clone())
            .ok_or_else(|| MigrateError::Schema(format!("Table '{}' does not exist", name)))
    }

    async fn get_row_count(&self, table: &str) -> Result<u64> {
        self.calls.lock().unwrap().push(format!("count {}", table));
        Ok(self.tables.get(table).map_or(0, |(_, rows)| rows.len() as u64))
    }

    async fn read_page(&self, table: &Table, limit: usize, offset: u64) -> Result<Batch> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("read {} {}", table.name, offset));
        let rows = &self.tables[&table.name].1;
        let page = rows
            .iter()
            .skip(offset as usize)
            .take(limit)
            .cloned()
            .collect();
        Ok(Batch::new(page, offset))
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}

/// Records every call. Reports column types the way the target would have
/// materialized them, unless overridden per column.
#[derive(Default)]
struct RecordingTarget {
    events: Mutex<Vec<String>>,
    tables: Mutex<HashMap<String, Table>>,
    rows: Mutex<HashMap<String, Vec<Row>>>,
    reported_types: HashMap<(String, String), String>,
}

impl RecordingTarget {
    fn reporting(mut self, table: &str, column: &str, data_type: &str) -> Self {
        self.reported_types
            .insert((table.to_string(), column.to_string()), data_type.to_string());
        self
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn rows(&self, table: &str) -> Vec<Row> {
        self.rows
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl TargetWriter for RecordingTarget {
    async fn create_schema(&self, schema: &str) -> Result<()> {
        self.record(format!("create_schema {}", schema));
        Ok(())
    }

    async fn drop_table(&self, _schema: &str, table: &str) -> Result<()> {
        self.record(format!("drop {}", table));
        self.tables.lock().unwrap().remove(table);
        self.rows.lock().unwrap().remove(table);
        Ok(())
    }

    async fn create_table(&self, table: &Table, _target_schema: &str) -> Result<()> {
        self.record(format!("create {}", table.name));
        self.tables
            .lock()
            .unwrap()
            .insert(table.name.clone(), table.clone());
        Ok(())
    }

    async fn create_unique_index(&self, table: &Table, idx: &Index, _schema: &str) -> Result<()> {
        self.record(format!("index {} {}", table.name, idx.name));
        Ok(())
    }

    async fn column_types(&self, _schema: &str, table: &str) -> Result<Vec<TargetColumn>> {
        self.record(format!("column_types {}", table));
        let tables = self.tables.lock().unwrap();
        let created = tables
            .get(table)
            .ok_or_else(|| MigrateError::Schema(format!("{} not created", table)))?;
        Ok(created
            .columns
            .iter()
            .map(|c| TargetColumn {
                name: c.name.clone(),
                data_type: self
                    .reported_types
                    .get(&(table.to_string(), c.name.clone()))
                    .cloned()
                    .unwrap_or_else(|| map_type(&c.data_type).to_postgres()),
            })
            .collect())
    }

    async fn create_foreign_key(&self, table: &Table, fk: &ForeignKey, schema: &str) -> Result<()> {
        self.record(format!("fk {}", ddl::foreign_key_sql(table, fk, schema)));
        Ok(())
    }

    async fn insert_rows(
        &self,
        _schema: &str,
        table: &str,
        _cols: &[String],
        rows: &[Row],
    ) -> Result<u64> {
        self.record(format!("insert {} {}", table, rows.len()));
        let rejected = rows
            .iter()
            .flatten()
            .any(|v| *v == SqlValue::from("reject"));
        if rejected {
            return Err(MigrateError::Schema(
                "invalid input syntax for type bigint".to_string(),
            ));
        }
        self.rows
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(rows.len() as u64)
    }

    async fn get_row_count(&self, _schema: &str, table: &str) -> Result<u64> {
        Ok(self.rows(table).len() as u64)
    }

    async fn reset_sequence(&self, _schema: &str, table: &Table) -> Result<()> {
        self.record(format!("reset {}", table.name));
        Ok(())
    }

    fn db_type(&self) -> &str {
        "recording"
    }

    async fn close(&self) {}
}

// =============================================================================
// Helpers
// =============================================================================

fn column(name: &str, data_type: &str, pk: bool) -> Column {
    Column {
        name: name.to_string(),
        data_type: data_type.to_string(),
        is_nullable: !pk,
        default_value: None,
        is_primary_key: pk,
    }
}

fn table(name: &str, columns: &[(&str, &str)], pk: &[&str]) -> Table {
    let mut t = Table::new(name);
    for (col, ty) in columns {
        t.columns.push(column(col, ty, pk.contains(col)));
    }
    t.primary_key = pk.iter().map(|c| c.to_string()).collect();
    t
}

fn config(migration: &str) -> Config {
    let yaml = format!(
        "source:\n  path: app.db\ntarget:\n  host: localhost\n  database: app\n  user: postgres\nmigration:\n  max_pg_connections: 4\n{}",
        migration
    );
    Config::from_yaml(&yaml).unwrap()
}

fn orchestrator(
    config: Config,
    source: Arc<MemorySource>,
    target: Arc<RecordingTarget>,
) -> Orchestrator {
    Orchestrator::with_endpoints(config, source, target)
}

fn users_table() -> Table {
    table(
        "users",
        &[
            ("id", "INTEGER"),
            ("name", "TEXT"),
            ("active", "INTEGER"),
            ("created", "INTEGER"),
        ],
        &["id"],
    )
}

fn users_rows() -> Vec<Row> {
    vec![
        vec![
            SqlValue::I64(1),
            SqlValue::from("Alice"),
            SqlValue::I64(1),
            SqlValue::I64(1_700_000_000),
        ],
        vec![
            SqlValue::I64(2),
            SqlValue::from(""),
            SqlValue::I64(0),
            SqlValue::from(""),
        ],
    ]
}

// =============================================================================
// End-to-end
// =============================================================================

#[tokio::test]
async fn test_end_to_end_uses_materialized_classes() {
    let source = Arc::new(MemorySource::default().with_table(users_table(), users_rows()));
    let target = Arc::new(
        RecordingTarget::default()
            .reporting("users", "active", "boolean")
            .reporting("users", "created", "timestamp with time zone"),
    );

    let result = orchestrator(config(""), source, target.clone())
        .run(false)
        .await
        .unwrap();

    assert_eq!(result.status, "completed");
    assert_eq!(result.tables_total, 1);
    assert_eq!(result.tables_migrated, 1);
    assert_eq!(result.rows_transferred, 2);
    assert_eq!(result.foreign_keys_created, 0);

    let created = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    assert_eq!(
        target.rows("users"),
        vec![
            vec![
                SqlValue::I64(1),
                SqlValue::from("Alice"),
                SqlValue::Bool(true),
                SqlValue::DateTime(created),
            ],
            vec![
                SqlValue::I64(2),
                SqlValue::from(""),
                SqlValue::Bool(false),
                SqlValue::Null,
            ],
        ]
    );
}

#[tokio::test]
async fn test_phases_run_in_order() {
    let source = Arc::new(
        MemorySource::default()
            .with_table(users_table(), users_rows())
            .with_table(
                table("tags", &[("label", "VARCHAR(20)")], &["label"]),
                vec![vec![SqlValue::from("red")]],
            ),
    );
    let target = Arc::new(RecordingTarget::default());

    orchestrator(config(""), source, target.clone())
        .run(false)
        .await
        .unwrap();

    assert_eq!(
        target.events(),
        vec![
            "create_schema public",
            "drop tags",
            "create tags",
            "column_types tags",
            "drop users",
            "create users",
            "column_types users",
            "insert tags 1",
            "insert users 2",
            "reset users",
        ]
    );
}

#[tokio::test]
async fn test_pages_advance_by_page_size() {
    let rows: Vec<Row> = (1..=5).map(|i| vec![SqlValue::I64(i)]).collect();
    let source = Arc::new(
        MemorySource::default().with_table(table("nums", &[("n", "INTEGER")], &[]), rows.clone()),
    );
    let target = Arc::new(RecordingTarget::default());

    let result = orchestrator(config("  page_size: 2\n"), source.clone(), target.clone())
        .run(false)
        .await
        .unwrap();

    assert_eq!(result.tables[0].pages, 3);
    assert_eq!(
        source.calls_for("nums"),
        vec!["count nums", "read nums 0", "read nums 2", "read nums 4"]
    );
    assert_eq!(target.rows("nums"), rows);
}

#[tokio::test]
async fn test_zero_row_table_only_counts() {
    let source = Arc::new(
        MemorySource::default().with_table(table("empty", &[("id", "INTEGER")], &["id"]), vec![]),
    );
    let target = Arc::new(RecordingTarget::default());

    let result = orchestrator(config(""), source.clone(), target.clone())
        .run(false)
        .await
        .unwrap();

    assert_eq!(result.rows_transferred, 0);
    assert_eq!(source.calls_for("empty"), vec!["count empty"]);
    assert!(!target.events().iter().any(|e| e.starts_with("insert")));
}

// =============================================================================
// Filters and dry run
// =============================================================================

#[tokio::test]
async fn test_no_matching_tables_completes_without_touching_target() {
    let source = Arc::new(MemorySource::default().with_table(users_table(), users_rows()));
    let target = Arc::new(RecordingTarget::default());

    let result = orchestrator(
        config("  include_tables: [\"orders*\"]\n"),
        source,
        target.clone(),
    )
    .run(false)
    .await
    .unwrap();

    assert_eq!(result.status, "completed");
    assert_eq!(result.tables_total, 0);
    assert_eq!(result.rows_transferred, 0);
    assert!(target.events().is_empty());
}

#[tokio::test]
async fn test_exclude_filter_skips_table() {
    let source = Arc::new(
        MemorySource::default()
            .with_table(users_table(), users_rows())
            .with_table(table("audit_log", &[("msg", "TEXT")], &[]), vec![]),
    );
    let target = Arc::new(RecordingTarget::default());

    let result = orchestrator(
        config("  exclude_tables: [\"*_log\"]\n"),
        source,
        target.clone(),
    )
    .run(false)
    .await
    .unwrap();

    assert_eq!(result.tables_total, 1);
    assert!(!target.events().iter().any(|e| e.contains("audit_log")));
}

#[tokio::test]
async fn test_dry_run_plans_without_writing() {
    let source = Arc::new(MemorySource::default().with_table(users_table(), users_rows()));
    let target = Arc::new(RecordingTarget::default());

    let result = orchestrator(config(""), source, target.clone())
        .run(true)
        .await
        .unwrap();

    assert_eq!(result.status, "dry_run");
    assert_eq!(result.tables_total, 1);
    assert_eq!(result.rows_transferred, 0);
    assert!(result
        .planned_ddl
        .iter()
        .any(|s| s.starts_with("CREATE TABLE \"public\".\"users\"")));
    assert!(result.planned_ddl.iter().any(|s| s.contains("setval")));
    assert!(target.events().is_empty());
}

// =============================================================================
// Constraints
// =============================================================================

fn parent_child() -> MemorySource {
    let parent = table("parent", &[("id", "INTEGER"), ("name", "TEXT")], &["id"]);
    let mut child = table(
        "child",
        &[("id", "INTEGER"), ("parent_id", "INTEGER")],
        &["id"],
    );
    child.foreign_keys.push(ForeignKey {
        id: 0,
        columns: vec!["parent_id".to_string()],
        ref_table: "parent".to_string(),
        ref_columns: Vec::new(),
        on_update: "NO ACTION".to_string(),
        on_delete: "RESTRICT".to_string(),
    });
    child.indexes.push(Index {
        name: "child_parent".to_string(),
        columns: vec!["parent_id".to_string()],
        is_unique: true,
        is_primary: false,
        is_partial: false,
    });

    MemorySource::default()
        .with_table(
            parent,
            vec![vec![SqlValue::I64(1), SqlValue::from("root")]],
        )
        .with_table(child, vec![vec![SqlValue::I64(10), SqlValue::I64(1)]])
}

#[tokio::test]
async fn test_foreign_keys_are_deferred_and_linked_last() {
    let source = Arc::new(parent_child());
    let target = Arc::new(RecordingTarget::default());

    let result = orchestrator(
        config("  create_foreign_keys: true\n"),
        source,
        target.clone(),
    )
    .run(false)
    .await
    .unwrap();

    assert_eq!(result.foreign_keys_created, 1);

    let events = target.events();
    let fk_pos = events.iter().position(|e| e.starts_with("fk ")).unwrap();
    let last_insert = events.iter().rposition(|e| e.starts_with("insert")).unwrap();
    assert!(fk_pos > last_insert);

    let fk = &events[fk_pos];
    assert!(fk.contains("ADD CONSTRAINT \"fk_child_0\""));
    assert!(fk.contains("REFERENCES \"public\".\"parent\" (\"id\")"));
    assert!(fk.contains("ON DELETE NO ACTION"));
    assert!(fk.ends_with("DEFERRABLE INITIALLY DEFERRED"));
    assert!(events.contains(&"index child child_parent".to_string()));
}

#[tokio::test]
async fn test_foreign_keys_skipped_unless_enabled() {
    let source = Arc::new(parent_child());
    let target = Arc::new(RecordingTarget::default());

    let result = orchestrator(config(""), source, target.clone())
        .run(false)
        .await
        .unwrap();

    assert_eq!(result.foreign_keys_created, 0);
    assert!(!target.events().iter().any(|e| e.starts_with("fk ")));
}

#[tokio::test]
async fn test_foreign_key_resolves_table_case_insensitively() {
    let parent = table("Parent", &[("Id", "INTEGER"), ("Code", "TEXT")], &["Id"]);
    let mut child = table("child", &[("id", "INTEGER"), ("code", "TEXT")], &["id"]);
    child.foreign_keys.push(ForeignKey {
        id: 0,
        columns: vec!["code".to_string()],
        ref_table: "parent".to_string(),
        ref_columns: vec!["CODE".to_string()],
        on_update: "NO ACTION".to_string(),
        on_delete: "CASCADE".to_string(),
    });
    let source = Arc::new(
        MemorySource::default()
            .with_table(parent, Vec::new())
            .with_table(child, Vec::new()),
    );
    let target = Arc::new(RecordingTarget::default());

    let result = orchestrator(
        config("  create_foreign_keys: true\n"),
        source,
        target.clone(),
    )
    .run(false)
    .await
    .unwrap();

    assert_eq!(result.foreign_keys_created, 1);
    let events = target.events();
    let fk = events.iter().find(|e| e.starts_with("fk ")).unwrap();
    assert!(fk.contains("REFERENCES \"public\".\"Parent\" (\"Code\")"));
}

// =============================================================================
// Failures
// =============================================================================

fn rejecting_source() -> MemorySource {
    MemorySource::default().with_table(
        table("items", &[("id", "INTEGER"), ("code", "TEXT")], &["id"]),
        vec![
            vec![SqlValue::I64(1), SqlValue::from("ok")],
            vec![SqlValue::I64(2), SqlValue::from("reject")],
            vec![SqlValue::I64(3), SqlValue::from("ok")],
        ],
    )
}

#[tokio::test]
async fn test_failed_page_aborts_run() {
    let source = Arc::new(rejecting_source());
    let target = Arc::new(RecordingTarget::default());

    let err = orchestrator(config(""), source, target.clone())
        .run(false)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        MigrateError::BatchInsert { ref table, offset: 0, .. } if table == "items"
    ));
    assert_eq!(err.exit_code(), 5);
    assert!(target.rows("items").is_empty());
    assert!(!target.events().iter().any(|e| e.starts_with("reset")));
}

#[tokio::test]
async fn test_row_fallback_isolates_bad_row() {
    let source = Arc::new(rejecting_source());
    let target = Arc::new(RecordingTarget::default());

    let err = orchestrator(config("  row_fallback: true\n"), source, target.clone())
        .run(false)
        .await
        .unwrap_err();

    assert!(matches!(err, MigrateError::BatchInsert { .. }));
    assert_eq!(
        target.events().iter().filter(|e| *e == "insert items 1").count(),
        3
    );
    // Rows that succeed on their own stay inserted.
    assert_eq!(target.rows("items").len(), 2);
}

#[tokio::test]
async fn test_diagnose_page_reports_row_position() {
    let source = Arc::new(rejecting_source());
    let target = Arc::new(RecordingTarget::default());
    let items = source.introspect_table("items").await.unwrap();

    let engine = TransferEngine::new(source.clone(), target.clone(), TransferConfig::default());
    let classes: ColumnClasses = vec![
        ("id".to_string(), DestinationTypeClass::Int),
        ("code".to_string(), DestinationTypeClass::Other),
    ]
    .into_iter()
    .collect();
    let rows = source.read_page(&items, 10, 0).await.unwrap().rows;

    let failures = engine
        .diagnose_page(&items, &classes, &items.column_names(), &rows, 40)
        .await;

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].row, 41);
    assert_eq!(failures[0].suspects, vec!["id=2".to_string()]);
    assert!(matches!(failures[0].error, MigrateError::RowInsert { row: 41, .. }));
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_validate_after_run_matches() {
    let source = Arc::new(MemorySource::default().with_table(users_table(), users_rows()));
    let target = Arc::new(RecordingTarget::default());
    let orchestrator = orchestrator(config(""), source, target);

    let before = orchestrator.validate().await.unwrap();
    assert_eq!(before.len(), 1);
    assert!(!before[0].matches);
    assert_eq!(before[0].target_rows, Some(0));

    orchestrator.run(false).await.unwrap();

    let after = orchestrator.validate().await.unwrap();
    assert!(after[0].matches);
    assert_eq!(after[0].source_rows, 2);
}
