use crate::domain::{
    errors::{RuntimeError, StoreError},
    instance::{ContainerSummary, LaunchSpec, PortMapping},
    replication::Row,
    value_objects::{ColumnName, DatabaseName, InstanceName, TableName},
};
use async_trait::async_trait;

/// Port: the container runtime (implemented by DockerCli)
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Every container known to the runtime, running or not, in runtime order.
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError>;

    /// Host-port bindings the runtime currently publishes for one container.
    /// Empty for stopped containers and for containers publishing nothing.
    async fn published_ports(&self, name: &InstanceName)
        -> Result<Vec<PortMapping>, RuntimeError>;

    /// Start a new detached database container. The runtime's own rejection
    /// (name clash, port bind failure) comes back as `CommandFailed` with its
    /// stderr intact.
    async fn start_container(&self, spec: &LaunchSpec) -> Result<(), RuntimeError>;

    /// Force-remove a container regardless of running state.
    /// Removing an unknown name is `NoSuchContainer`.
    async fn remove_container(&self, name: &InstanceName) -> Result<(), RuntimeError>;
}

/// Port: access to one connected database instance (implemented by SqlxTableStore)
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn list_databases(&self) -> Result<Vec<DatabaseName>, StoreError>;

    async fn list_tables(&self, database: &DatabaseName) -> Result<Vec<TableName>, StoreError>;

    /// Exact-match existence check against the catalog, never a pattern scan.
    async fn table_exists(
        &self,
        database: &DatabaseName,
        table: &TableName,
    ) -> Result<bool, StoreError>;

    /// The engine's own `SHOW CREATE TABLE` statement, verbatim.
    async fn create_statement(
        &self,
        database: &DatabaseName,
        table: &TableName,
    ) -> Result<String, StoreError>;

    /// Ordered column list (catalog order) and every row of the table, cells
    /// aligned with the columns.
    async fn read_table(
        &self,
        database: &DatabaseName,
        table: &TableName,
    ) -> Result<(Vec<ColumnName>, Vec<Row>), StoreError>;

    /// Insert all rows in one transaction: either every row commits or none
    /// do. Returns the number of rows inserted.
    async fn insert_rows(
        &self,
        database: &DatabaseName,
        table: &TableName,
        columns: &[ColumnName],
        rows: &[Row],
    ) -> Result<u64, StoreError>;

    /// Run one arbitrary statement (DDL or DML). Returns affected rows.
    async fn execute(&self, statement: &str) -> Result<u64, StoreError>;

    async fn drop_table(&self, database: &DatabaseName, table: &TableName)
        -> Result<(), StoreError>;

    /// Release the underlying connections. Safe to call more than once.
    async fn close(&self);
}
