use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::{ColumnName, DatabaseName, Fingerprint, InstanceName, TableName};

/// One table row, cells aligned with the ordered column list of the
/// snapshot that produced it.
pub type Row = Vec<serde_json::Value>;

/// Transient capture of one table during a copy: native DDL, ordered
/// columns and all rows. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct TableSnapshot {
    pub database: DatabaseName,
    pub table: TableName,
    /// Verbatim `SHOW CREATE TABLE` output for the source table.
    pub ddl: String,
    pub columns: Vec<ColumnName>,
    pub rows: Vec<Row>,
}

/// Caller's explicit resolution of a destination-table conflict.
///
/// Chosen before any mutation occurs; the engine never guesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Keep the destination table and insert the source rows after its own.
    Append,
    /// Drop the destination table and recreate it from the source DDL.
    Overwrite,
}

/// How a copy operation ended, when it ended successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyOutcome {
    /// Destination table did not exist; created and populated.
    Created,
    /// Destination table existed; source rows appended to it.
    Appended,
    /// Source table had zero rows; only the structure was copied.
    SchemaOnlyCopy,
}

impl std::fmt::Display for CopyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CopyOutcome::Created => write!(f, "created"),
            CopyOutcome::Appended => write!(f, "appended"),
            CopyOutcome::SchemaOnlyCopy => write!(f, "schema-only copy"),
        }
    }
}

/// Everything needed to ferry one table between two instances.
#[derive(Debug, Clone, Serialize)]
pub struct CopyRequest {
    pub source_instance: InstanceName,
    pub source_database: DatabaseName,
    pub table: TableName,
    pub destination_instance: InstanceName,
    pub destination_database: DatabaseName,
    /// `None` means "fail with a conflict error if the destination table
    /// already exists" rather than defaulting to either behaviour.
    pub policy: Option<ConflictPolicy>,
}

#[derive(Debug, Serialize, Clone)]
pub struct CopyReport {
    pub operation_id: String,
    pub source_instance: String,
    pub source_database: String,
    pub destination_instance: String,
    pub destination_database: String,
    pub table: String,
    pub outcome: CopyOutcome,
    pub columns: Vec<ColumnName>,
    pub rows_copied: usize,
    /// Fingerprint of the row set actually transferred (empty row set hashes
    /// to the empty-input digest, so `SchemaOnlyCopy` reports are comparable
    /// too).
    pub fingerprint: Fingerprint,
    pub started_at: String,
    pub duration_ms: u64,
}

impl CopyReport {
    pub fn new(
        request: &CopyRequest,
        outcome: CopyOutcome,
        columns: Vec<ColumnName>,
        rows_copied: usize,
        fingerprint: Fingerprint,
        started_at: chrono::DateTime<Utc>,
        duration_ms: u64,
    ) -> Self {
        CopyReport {
            operation_id: format!(
                "cp_{}_{}",
                started_at.format("%Y%m%d_%H%M%S"),
                Uuid::new_v4().simple()
            ),
            source_instance: request.source_instance.0.clone(),
            source_database: request.source_database.0.clone(),
            destination_instance: request.destination_instance.0.clone(),
            destination_database: request.destination_database.0.clone(),
            table: request.table.0.clone(),
            outcome,
            columns,
            rows_copied,
            fingerprint,
            started_at: started_at.to_rfc3339(),
            duration_ms,
        }
    }
}
