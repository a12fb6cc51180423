use async_trait::async_trait;
use serde_json::Value;
use sqlx::any::{AnyArguments, AnyPoolOptions};
use sqlx::query::Query;
use sqlx::{Any, AnyPool};
use tracing::debug;

use crate::domain::errors::StoreError;
use crate::domain::ports::TableStore;
use crate::domain::replication::Row;
use crate::domain::value_objects::{ColumnName, ConnectionParams, DatabaseName, TableName};
use crate::infrastructure::db::decode::{blob_or_string, decode_column};
use crate::infrastructure::db::sql::{
    build_insert, build_typed_select, is_binary_type, qualified, rows_per_chunk,
    INTROSPECT_COLUMNS_SQL, LIST_TABLES_SQL, TABLE_EXISTS_SQL,
};

/// Ceiling on rows per INSERT statement. Wide tables get smaller chunks:
/// `rows_per_chunk` shrinks the count so one statement never exceeds the
/// protocol's u16 bind-parameter cap.
const INSERT_CHUNK_ROWS: usize = 500;

pub struct SqlxTableStore {
    pool: AnyPool,
    endpoint: String,
}

/// Connect to one instance and return a `SqlxTableStore` (pool of 5).
pub async fn connect(
    params: &ConnectionParams,
    database: Option<&DatabaseName>,
) -> Result<SqlxTableStore, StoreError> {
    connect_with(params, database, 5).await
}

/// Connect with a single-connection pool. Scripts need one session so that
/// `USE` and other session state survive from statement to statement.
pub async fn connect_single(
    params: &ConnectionParams,
    database: Option<&DatabaseName>,
) -> Result<SqlxTableStore, StoreError> {
    connect_with(params, database, 1).await
}

async fn connect_with(
    params: &ConnectionParams,
    database: Option<&DatabaseName>,
    max_connections: u32,
) -> Result<SqlxTableStore, StoreError> {
    sqlx::any::install_default_drivers();

    let endpoint = match database {
        Some(db) => format!("{}:{}/{}", params.host, params.port, db.0),
        None => format!("{}:{}", params.host, params.port),
    };

    let pool = AnyPoolOptions::new()
        .max_connections(max_connections)
        .connect(&connection_url(params, database))
        .await
        .map_err(|e| StoreError::Connect {
            endpoint: endpoint.clone(),
            message: e.to_string(),
        })?;

    debug!(%endpoint, "connected");

    Ok(SqlxTableStore { pool, endpoint })
}

fn connection_url(params: &ConnectionParams, database: Option<&DatabaseName>) -> String {
    match database {
        Some(db) => format!(
            "mysql://{}:{}@{}:{}/{}",
            params.user, params.password, params.host, params.port, db.0
        ),
        None => format!(
            "mysql://{}:{}@{}:{}",
            params.user, params.password, params.host, params.port
        ),
    }
}

impl SqlxTableStore {
    fn err(&self, context: &str, e: sqlx::Error) -> StoreError {
        StoreError::Query {
            context: format!("{} on {}", context, self.endpoint),
            message: e.to_string(),
        }
    }

    fn decode_err(&self, column: &str, e: sqlx::Error) -> StoreError {
        StoreError::Decode {
            column: column.to_string(),
            message: e.to_string(),
        }
    }

    /// Query `information_schema.columns` for `(column_name, data_type)`
    /// pairs in ordinal order.
    async fn fetch_column_types(
        &self,
        database: &DatabaseName,
        table: &TableName,
    ) -> Result<Vec<(String, String)>, StoreError> {
        let rows = sqlx::query(INTROSPECT_COLUMNS_SQL)
            .bind(&database.0)
            .bind(&table.0)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.err("introspect columns", e))?;

        let mut cols = Vec::with_capacity(rows.len());
        for row in &rows {
            // MySQL/MariaDB return information_schema strings as BLOB — handle both.
            let col_name = blob_or_string(row, 0).map_err(|e| self.decode_err("column_name", e))?;
            let data_type = blob_or_string(row, 1).map_err(|e| self.decode_err("data_type", e))?;
            cols.push((col_name, data_type));
        }
        Ok(cols)
    }
}

#[async_trait]
impl TableStore for SqlxTableStore {
    async fn list_databases(&self) -> Result<Vec<DatabaseName>, StoreError> {
        let rows = sqlx::query("SHOW DATABASES")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.err("list databases", e))?;

        let mut names = Vec::with_capacity(rows.len());
        for row in &rows {
            let name = blob_or_string(row, 0).map_err(|e| self.decode_err("Database", e))?;
            names.push(DatabaseName(name));
        }
        Ok(names)
    }

    async fn list_tables(&self, database: &DatabaseName) -> Result<Vec<TableName>, StoreError> {
        let rows = sqlx::query(LIST_TABLES_SQL)
            .bind(&database.0)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.err("list tables", e))?;

        let mut names = Vec::with_capacity(rows.len());
        for row in &rows {
            let name = blob_or_string(row, 0).map_err(|e| self.decode_err("table_name", e))?;
            names.push(TableName(name));
        }
        Ok(names)
    }

    async fn table_exists(
        &self,
        database: &DatabaseName,
        table: &TableName,
    ) -> Result<bool, StoreError> {
        let found = sqlx::query(TABLE_EXISTS_SQL)
            .bind(&database.0)
            .bind(&table.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| self.err("check table existence", e))?;
        Ok(found.is_some())
    }

    async fn create_statement(
        &self,
        database: &DatabaseName,
        table: &TableName,
    ) -> Result<String, StoreError> {
        let sql = format!("SHOW CREATE TABLE {}", qualified(database, table));
        debug!("Executing: {}", sql);

        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| self.err("show create table", e))?;

        // Result columns are [Table, Create Table].
        blob_or_string(&row, 1).map_err(|e| self.decode_err("Create Table", e))
    }

    async fn read_table(
        &self,
        database: &DatabaseName,
        table: &TableName,
    ) -> Result<(Vec<ColumnName>, Vec<Row>), StoreError> {
        let col_types = self.fetch_column_types(database, table).await?;
        if col_types.is_empty() {
            return Err(StoreError::Query {
                context: format!("read table on {}", self.endpoint),
                message: format!(
                    "no columns in information_schema for {} (does the table exist?)",
                    qualified(database, table)
                ),
            });
        }

        let query = build_typed_select(database, table, &col_types);
        debug!("Executing: {}", query);

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| self.err("read table", e))?;

        let columns: Vec<ColumnName> = col_types
            .iter()
            .map(|(name, _)| ColumnName(name.clone()))
            .collect();

        let mut result: Vec<Row> = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut cells = Vec::with_capacity(col_types.len());
            for (idx, (name, data_type)) in col_types.iter().enumerate() {
                let value =
                    decode_column(row, idx, data_type).map_err(|e| self.decode_err(name, e))?;
                cells.push(value);
            }
            result.push(cells);
        }
        Ok((columns, result))
    }

    async fn insert_rows(
        &self,
        database: &DatabaseName,
        table: &TableName,
        columns: &[ColumnName],
        rows: &[Row],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        // Binary destination columns take their values through UNHEX(?),
        // mirroring the HEX() read on the source side.
        let dest_types = self.fetch_column_types(database, table).await?;
        let binary: Vec<bool> = columns
            .iter()
            .map(|c| {
                dest_types
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(&c.0))
                    .is_some_and(|(_, data_type)| is_binary_type(data_type))
            })
            .collect();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| self.err("begin insert transaction", e))?;

        let mut inserted: u64 = 0;
        for chunk in rows.chunks(rows_per_chunk(columns.len(), INSERT_CHUNK_ROWS)) {
            let sql = build_insert(database, table, columns, &binary, chunk.len());
            debug!(rows = chunk.len(), "Executing: {}", sql);

            let mut query = sqlx::query(&sql);
            for row in chunk {
                for cell in row {
                    query = bind_value(query, cell);
                }
            }

            // A failure drops the transaction, rolling back earlier chunks.
            let result = query
                .execute(&mut *tx)
                .await
                .map_err(|e| self.err("insert rows", e))?;
            inserted += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| self.err("commit insert transaction", e))?;
        Ok(inserted)
    }

    async fn execute(&self, statement: &str) -> Result<u64, StoreError> {
        debug!("Executing: {}", statement);
        let result = sqlx::query(statement)
            .execute(&self.pool)
            .await
            .map_err(|e| self.err("execute statement", e))?;
        Ok(result.rows_affected())
    }

    async fn drop_table(
        &self,
        database: &DatabaseName,
        table: &TableName,
    ) -> Result<(), StoreError> {
        let sql = format!("DROP TABLE IF EXISTS {}", qualified(database, table));
        debug!("Executing: {}", sql);
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| self.err("drop table", e))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Bind one JSON cell to the right `Any` parameter type. Arrays and objects
/// travel as their JSON text, which MySQL coerces into JSON columns.
fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    cell: &Value,
) -> Query<'q, Any, AnyArguments<'q>> {
    match cell {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(f) = n.as_f64() {
                query.bind(f)
            } else {
                query.bind(n.to_string())
            }
        }
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(serde_json::to_string(other).unwrap_or_default()),
    }
}
