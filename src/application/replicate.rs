use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::domain::errors::CopyError;
use crate::domain::fingerprint::fingerprint;
use crate::domain::ports::TableStore;
use crate::domain::replication::{
    ConflictPolicy, CopyOutcome, CopyReport, CopyRequest, TableSnapshot,
};
use crate::domain::value_objects::{DatabaseName, TableName};

// ─── Replication Engine ───

/// Ferries one table between two already-open stores.
///
/// One `copy` call runs to completion before anything else is accepted on
/// these connections; every step's failure aborts the whole operation.
/// Opening the two stores and releasing them on every exit path is the
/// caller's job (see [`crate::copy_table`]) — the engine never closes what it
/// did not open.
pub struct ReplicationEngine {
    source: Arc<dyn TableStore>,
    destination: Arc<dyn TableStore>,
}

impl ReplicationEngine {
    pub fn new(source: Arc<dyn TableStore>, destination: Arc<dyn TableStore>) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Copy one table from source to destination per the request's policy.
    ///
    /// Steps, in order: fetch the source DDL, check the destination for a
    /// conflict, apply DDL as the policy dictates, read the source rows,
    /// bulk-insert them in one destination transaction. A destination table
    /// that already exists and no policy is a [`CopyError::ConflictRequiresPolicy`]
    /// before anything is mutated.
    #[instrument(
        name = "copy_table",
        skip(self, request),
        fields(
            table = %request.table.0,
            source = %request.source_database.0,
            destination = %request.destination_database.0,
        ),
        level = "info"
    )]
    pub async fn copy(&self, request: &CopyRequest) -> Result<CopyReport, CopyError> {
        let started_at = Utc::now();
        let start = Instant::now();

        // Fetching the DDL first doubles as the source-table existence check:
        // a missing source fails here, before the destination is touched.
        let ddl = self
            .source
            .create_statement(&request.source_database, &request.table)
            .await?;
        let rewritten = rewrite_target(&ddl, &request.table, &request.destination_database);

        let exists = self
            .destination
            .table_exists(&request.destination_database, &request.table)
            .await?;

        let mut ddl_applied = false;
        let appended = if exists {
            match request.policy {
                None => {
                    return Err(CopyError::ConflictRequiresPolicy {
                        database: request.destination_database.0.clone(),
                        table: request.table.0.clone(),
                    })
                }
                Some(ConflictPolicy::Overwrite) => {
                    debug!(table = %request.table.0, "dropping destination table for overwrite");
                    self.destination
                        .drop_table(&request.destination_database, &request.table)
                        .await?;
                    self.destination.execute(&rewritten).await?;
                    ddl_applied = true;
                    false
                }
                Some(ConflictPolicy::Append) => true,
            }
        } else {
            self.destination.execute(&rewritten).await?;
            ddl_applied = true;
            false
        };

        // Read after the conflict step on purpose: overwriting a table onto
        // itself drops the data first, and the copy then sees zero rows.
        let (columns, rows) = self
            .source
            .read_table(&request.source_database, &request.table)
            .await?;
        let snapshot = TableSnapshot {
            database: request.source_database.clone(),
            table: request.table.clone(),
            ddl,
            columns,
            rows,
        };

        let (outcome, rows_copied) = if snapshot.rows.is_empty() {
            (CopyOutcome::SchemaOnlyCopy, 0)
        } else {
            self.destination
                .insert_rows(
                    &request.destination_database,
                    &request.table,
                    &snapshot.columns,
                    &snapshot.rows,
                )
                .await
                .map_err(|e| CopyError::Insertion {
                    database: request.destination_database.0.clone(),
                    table: request.table.0.clone(),
                    ddl_applied,
                    message: e.to_string(),
                })?;

            let outcome = if appended {
                CopyOutcome::Appended
            } else {
                CopyOutcome::Created
            };
            (outcome, snapshot.rows.len())
        };

        let digest = fingerprint(&snapshot.rows);
        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            outcome = %outcome,
            rows = rows_copied,
            duration_ms,
            fingerprint = %digest,
            "copy completed"
        );

        Ok(CopyReport::new(
            request,
            outcome,
            snapshot.columns,
            rows_copied,
            digest,
            started_at,
            duration_ms,
        ))
    }
}

/// `SHOW CREATE TABLE` always prints the bare table name. Qualify it with the
/// destination database so the statement runs on a connection with no default
/// database selected. Only the first occurrence is the definition; the name
/// may legitimately reappear later in constraint or comment text.
fn rewrite_target(ddl: &str, table: &TableName, destination: &DatabaseName) -> String {
    let bare = format!("CREATE TABLE `{}`", table.0);
    let qualified = format!("CREATE TABLE `{}`.`{}`", destination.0, table.0);
    ddl.replacen(&bare, &qualified, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use crate::domain::errors::StoreError;
    use crate::domain::replication::Row;
    use crate::domain::value_objects::{ColumnName, InstanceName};

    #[derive(Default, Clone)]
    struct FakeTable {
        columns: Vec<ColumnName>,
        rows: Vec<Row>,
    }

    #[derive(Default)]
    struct FakeStore {
        databases: Mutex<BTreeMap<String, BTreeMap<String, FakeTable>>>,
        executed: Mutex<Vec<String>>,
        fail_insert: Option<String>,
    }

    impl FakeStore {
        fn with_database(db: &str) -> Self {
            let store = FakeStore::default();
            store
                .databases
                .lock()
                .unwrap()
                .insert(db.to_string(), BTreeMap::new());
            store
        }

        fn add_table(self, db: &str, table: &str, rows: Vec<Row>) -> Self {
            self.databases
                .lock()
                .unwrap()
                .entry(db.to_string())
                .or_default()
                .insert(
                    table.to_string(),
                    FakeTable {
                        columns: vec![ColumnName("id".into()), ColumnName("name".into())],
                        rows,
                    },
                );
            self
        }

        fn fail_inserts(mut self, message: &str) -> Self {
            self.fail_insert = Some(message.to_string());
            self
        }

        fn rows_of(&self, db: &str, table: &str) -> Vec<Row> {
            self.databases.lock().unwrap()[db][table].rows.clone()
        }

        fn has_table(&self, db: &str, table: &str) -> bool {
            self.databases
                .lock()
                .unwrap()
                .get(db)
                .is_some_and(|tables| tables.contains_key(table))
        }
    }

    fn parse_created(statement: &str) -> Option<(String, String)> {
        let rest = statement.strip_prefix("CREATE TABLE `")?;
        let (db, rest) = rest.split_once("`.`")?;
        let (table, _) = rest.split_once('`')?;
        Some((db.to_string(), table.to_string()))
    }

    #[async_trait]
    impl TableStore for FakeStore {
        async fn list_databases(&self) -> Result<Vec<DatabaseName>, StoreError> {
            Ok(self
                .databases
                .lock()
                .unwrap()
                .keys()
                .map(|name| DatabaseName(name.clone()))
                .collect())
        }

        async fn list_tables(&self, database: &DatabaseName) -> Result<Vec<TableName>, StoreError> {
            Ok(self
                .databases
                .lock()
                .unwrap()
                .get(&database.0)
                .map(|tables| tables.keys().map(|name| TableName(name.clone())).collect())
                .unwrap_or_default())
        }

        async fn table_exists(
            &self,
            database: &DatabaseName,
            table: &TableName,
        ) -> Result<bool, StoreError> {
            Ok(self.has_table(&database.0, &table.0))
        }

        async fn create_statement(
            &self,
            database: &DatabaseName,
            table: &TableName,
        ) -> Result<String, StoreError> {
            if !self.has_table(&database.0, &table.0) {
                return Err(StoreError::Query {
                    context: "show create table".into(),
                    message: format!("Table '{}.{}' doesn't exist", database.0, table.0),
                });
            }
            Ok(format!(
                "CREATE TABLE `{}` (\n  `id` int(11) DEFAULT NULL,\n  `name` text DEFAULT NULL\n) ENGINE=InnoDB",
                table.0
            ))
        }

        async fn read_table(
            &self,
            database: &DatabaseName,
            table: &TableName,
        ) -> Result<(Vec<ColumnName>, Vec<Row>), StoreError> {
            let dbs = self.databases.lock().unwrap();
            let entry = dbs
                .get(&database.0)
                .and_then(|tables| tables.get(&table.0))
                .ok_or_else(|| StoreError::Query {
                    context: "read table".into(),
                    message: format!("Table '{}.{}' doesn't exist", database.0, table.0),
                })?;
            Ok((entry.columns.clone(), entry.rows.clone()))
        }

        async fn insert_rows(
            &self,
            database: &DatabaseName,
            table: &TableName,
            columns: &[ColumnName],
            rows: &[Row],
        ) -> Result<u64, StoreError> {
            if let Some(message) = &self.fail_insert {
                return Err(StoreError::Query {
                    context: "insert rows".into(),
                    message: message.clone(),
                });
            }
            let mut dbs = self.databases.lock().unwrap();
            let entry = dbs
                .entry(database.0.clone())
                .or_default()
                .entry(table.0.clone())
                .or_default();
            entry.columns = columns.to_vec();
            entry.rows.extend(rows.iter().cloned());
            Ok(rows.len() as u64)
        }

        async fn execute(&self, statement: &str) -> Result<u64, StoreError> {
            self.executed.lock().unwrap().push(statement.to_string());
            if let Some((db, table)) = parse_created(statement) {
                self.databases
                    .lock()
                    .unwrap()
                    .entry(db)
                    .or_default()
                    .insert(table, FakeTable::default());
            }
            Ok(0)
        }

        async fn drop_table(
            &self,
            database: &DatabaseName,
            table: &TableName,
        ) -> Result<(), StoreError> {
            if let Some(tables) = self.databases.lock().unwrap().get_mut(&database.0) {
                tables.remove(&table.0);
            }
            Ok(())
        }

        async fn close(&self) {}
    }

    fn request(policy: Option<ConflictPolicy>) -> CopyRequest {
        CopyRequest {
            source_instance: InstanceName("alpha".into()),
            source_database: DatabaseName("shop".into()),
            table: TableName("users".into()),
            destination_instance: InstanceName("beta".into()),
            destination_database: DatabaseName("staging".into()),
            policy,
        }
    }

    fn source_rows() -> Vec<Row> {
        vec![vec![json!(1), json!("a")], vec![json!(2), json!("b")]]
    }

    fn engine_over(source: &Arc<FakeStore>, destination: &Arc<FakeStore>) -> ReplicationEngine {
        ReplicationEngine::new(
            Arc::clone(source) as Arc<dyn TableStore>,
            Arc::clone(destination) as Arc<dyn TableStore>,
        )
    }

    #[tokio::test]
    async fn creates_missing_destination_table_and_copies_rows() {
        let source = Arc::new(FakeStore::default().add_table("shop", "users", source_rows()));
        let destination = Arc::new(FakeStore::with_database("staging"));

        let report = engine_over(&source, &destination)
            .copy(&request(None))
            .await
            .unwrap();

        assert_eq!(report.outcome, CopyOutcome::Created);
        assert_eq!(report.rows_copied, 2);
        assert_eq!(
            report.columns,
            vec![ColumnName("id".into()), ColumnName("name".into())]
        );
        assert!(report.operation_id.starts_with("cp_"));
        assert_eq!(destination.rows_of("staging", "users"), source_rows());

        let executed = destination.executed.lock().unwrap();
        assert_eq!(executed.len(), 1);
        assert!(executed[0].starts_with("CREATE TABLE `staging`.`users`"));
    }

    #[tokio::test]
    async fn existing_destination_without_policy_is_a_conflict() {
        let source = Arc::new(FakeStore::default().add_table("shop", "users", source_rows()));
        let destination = Arc::new(
            FakeStore::default().add_table("staging", "users", vec![vec![json!(3), json!("c")]]),
        );

        let err = engine_over(&source, &destination)
            .copy(&request(None))
            .await
            .unwrap_err();

        assert!(matches!(err, CopyError::ConflictRequiresPolicy { .. }));
        // Nothing was mutated: old row still there, no DDL ran.
        assert_eq!(
            destination.rows_of("staging", "users"),
            vec![vec![json!(3), json!("c")]]
        );
        assert!(destination.executed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_keeps_existing_rows_and_skips_ddl() {
        let source = Arc::new(FakeStore::default().add_table("shop", "users", source_rows()));
        let destination = Arc::new(
            FakeStore::default().add_table("staging", "users", vec![vec![json!(3), json!("c")]]),
        );

        let report = engine_over(&source, &destination)
            .copy(&request(Some(ConflictPolicy::Append)))
            .await
            .unwrap();

        assert_eq!(report.outcome, CopyOutcome::Appended);
        assert_eq!(
            destination.rows_of("staging", "users"),
            vec![
                vec![json!(3), json!("c")],
                vec![json!(1), json!("a")],
                vec![json!(2), json!("b")],
            ]
        );
        assert!(destination.executed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn overwrite_replaces_the_table_and_reports_created() {
        let source = Arc::new(FakeStore::default().add_table("shop", "users", source_rows()));
        let destination = Arc::new(
            FakeStore::default().add_table("staging", "users", vec![vec![json!(3), json!("c")]]),
        );

        let report = engine_over(&source, &destination)
            .copy(&request(Some(ConflictPolicy::Overwrite)))
            .await
            .unwrap();

        assert_eq!(report.outcome, CopyOutcome::Created);
        assert_eq!(destination.rows_of("staging", "users"), source_rows());
    }

    #[tokio::test]
    async fn repeated_overwrite_lands_on_the_same_rows() {
        let source = Arc::new(FakeStore::default().add_table("shop", "users", source_rows()));
        let destination = Arc::new(FakeStore::with_database("staging"));
        let engine = engine_over(&source, &destination);

        let first = engine
            .copy(&request(Some(ConflictPolicy::Overwrite)))
            .await
            .unwrap();
        let second = engine
            .copy(&request(Some(ConflictPolicy::Overwrite)))
            .await
            .unwrap();

        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(second.outcome, CopyOutcome::Created);
        assert_eq!(destination.rows_of("staging", "users"), source_rows());
    }

    #[tokio::test]
    async fn binary_payloads_ferry_as_opaque_cells() {
        // Byte columns ride as their hex spelling; 00FF8081 is not valid
        // UTF-8 decoded, so any text detour would have mangled it.
        let rows = vec![
            vec![json!(1), json!("00FF8081")],
            vec![json!(2), json!(null)],
        ];
        let source = Arc::new(FakeStore::default().add_table("shop", "users", rows.clone()));
        let destination = Arc::new(FakeStore::with_database("staging"));

        let report = engine_over(&source, &destination)
            .copy(&request(None))
            .await
            .unwrap();

        assert_eq!(destination.rows_of("staging", "users"), rows);
        assert_eq!(report.rows_copied, 2);
        assert_eq!(report.fingerprint, fingerprint(&rows));
    }

    #[tokio::test]
    async fn zero_source_rows_is_a_schema_only_copy() {
        let source = Arc::new(FakeStore::default().add_table("shop", "users", vec![]));
        let destination = Arc::new(FakeStore::with_database("staging"));

        let report = engine_over(&source, &destination)
            .copy(&request(None))
            .await
            .unwrap();

        assert_eq!(report.outcome, CopyOutcome::SchemaOnlyCopy);
        assert_eq!(report.rows_copied, 0);
        assert_eq!(report.fingerprint, fingerprint(&[]));
        // The structure still made it across.
        assert!(destination.has_table("staging", "users"));
        assert!(destination.rows_of("staging", "users").is_empty());
    }

    #[tokio::test]
    async fn zero_source_rows_under_append_is_schema_only_too() {
        let source = Arc::new(FakeStore::default().add_table("shop", "users", vec![]));
        let destination = Arc::new(
            FakeStore::default().add_table("staging", "users", vec![vec![json!(3), json!("c")]]),
        );

        let report = engine_over(&source, &destination)
            .copy(&request(Some(ConflictPolicy::Append)))
            .await
            .unwrap();

        assert_eq!(report.outcome, CopyOutcome::SchemaOnlyCopy);
        assert_eq!(
            destination.rows_of("staging", "users"),
            vec![vec![json!(3), json!("c")]]
        );
    }

    #[tokio::test]
    async fn missing_source_table_fails_before_destination_is_touched() {
        let source = Arc::new(FakeStore::with_database("shop"));
        let destination = Arc::new(FakeStore::with_database("staging"));

        let err = engine_over(&source, &destination)
            .copy(&request(None))
            .await
            .unwrap_err();

        assert!(matches!(err, CopyError::Store(_)));
        assert!(destination.executed.lock().unwrap().is_empty());
        assert!(!destination.has_table("staging", "users"));
    }

    #[tokio::test]
    async fn insertion_failure_reports_whether_ddl_applied() {
        // Fresh destination: DDL runs first, then the insert fails. The error
        // must say the empty table was left behind.
        let source = Arc::new(FakeStore::default().add_table("shop", "users", source_rows()));
        let destination =
            Arc::new(FakeStore::with_database("staging").fail_inserts("Duplicate entry '1'"));

        let err = engine_over(&source, &destination)
            .copy(&request(None))
            .await
            .unwrap_err();

        match err {
            CopyError::Insertion {
                ddl_applied,
                message,
                ..
            } => {
                assert!(ddl_applied);
                assert!(message.contains("Duplicate entry"));
            }
            other => panic!("expected Insertion, got {other:?}"),
        }

        // Appending to an existing table: no DDL ran, so no caveat.
        let destination = Arc::new(
            FakeStore::default()
                .add_table("staging", "users", vec![vec![json!(3), json!("c")]])
                .fail_inserts("Column count doesn't match"),
        );

        let err = engine_over(&source, &destination)
            .copy(&request(Some(ConflictPolicy::Append)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CopyError::Insertion {
                ddl_applied: false,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn copying_a_table_onto_itself_with_overwrite_empties_it() {
        // The drop happens before the read, so overwrite-onto-self ends as a
        // schema-only copy of an empty table. Not special-cased.
        let store = Arc::new(FakeStore::default().add_table("shop", "users", source_rows()));
        let engine = engine_over(&store, &store);

        let mut onto_self = request(Some(ConflictPolicy::Overwrite));
        onto_self.destination_database = DatabaseName("shop".into());

        let report = engine.copy(&onto_self).await.unwrap();

        assert_eq!(report.outcome, CopyOutcome::SchemaOnlyCopy);
        assert!(store.rows_of("shop", "users").is_empty());
    }

    #[tokio::test]
    async fn copying_a_table_onto_itself_with_append_duplicates_rows() {
        let store = Arc::new(FakeStore::default().add_table("shop", "users", source_rows()));
        let engine = engine_over(&store, &store);

        let mut onto_self = request(Some(ConflictPolicy::Append));
        onto_self.destination_database = DatabaseName("shop".into());

        let report = engine.copy(&onto_self).await.unwrap();

        assert_eq!(report.outcome, CopyOutcome::Appended);
        assert_eq!(store.rows_of("shop", "users").len(), 4);
    }

    // ── rewrite_target ──

    #[test]
    fn rewrite_qualifies_the_table_with_the_destination_database() {
        let ddl = "CREATE TABLE `users` (\n  `id` int(11)\n) ENGINE=InnoDB";
        let rewritten = rewrite_target(
            ddl,
            &TableName("users".into()),
            &DatabaseName("staging".into()),
        );
        assert_eq!(
            rewritten,
            "CREATE TABLE `staging`.`users` (\n  `id` int(11)\n) ENGINE=InnoDB"
        );
    }

    #[test]
    fn rewrite_touches_only_the_first_occurrence() {
        let ddl = "CREATE TABLE `users` (\n  `id` int(11)\n) COMMENT='CREATE TABLE `users` archive'";
        let rewritten = rewrite_target(
            ddl,
            &TableName("users".into()),
            &DatabaseName("staging".into()),
        );
        assert!(rewritten.starts_with("CREATE TABLE `staging`.`users`"));
        assert!(rewritten.ends_with("COMMENT='CREATE TABLE `users` archive'"));
    }

    #[test]
    fn rewrite_leaves_column_definitions_verbatim() {
        let ddl = "CREATE TABLE `orders` (\n  `id` bigint(20) unsigned NOT NULL AUTO_INCREMENT,\n  `total` decimal(10,2) NOT NULL,\n  PRIMARY KEY (`id`)\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4";
        let rewritten = rewrite_target(
            ddl,
            &TableName("orders".into()),
            &DatabaseName("mirror".into()),
        );
        assert!(rewritten.contains("`total` decimal(10,2) NOT NULL"));
        assert!(rewritten.contains("PRIMARY KEY (`id`)"));
        assert!(rewritten.contains("DEFAULT CHARSET=utf8mb4"));
    }
}
