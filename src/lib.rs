use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

// ─── Log level ────────────────────────────────────────────────────────────────

/// Controls the verbosity of tableferry's internal tracing output.
///
/// Pass to [`init_tracing`] before calling any async entry point.
///
/// | Variant | `tracing` level | When to use                          |
/// |---------|-----------------|--------------------------------------|
/// | `Error` | `error`         | `--quiet` / CI scripting             |
/// | `Info`  | `info`          | Default — shows operation outcomes   |
/// | `Debug` | `debug`         | `--verbose` — shows SQL and `docker` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Info,
    Debug,
}

/// Initialise the global `tracing` subscriber for tableferry.
///
/// This is a convenience wrapper around `tracing_subscriber`. It respects
/// `RUST_LOG` when set, falling back to `level` otherwise.
///
/// Call this **once** at application startup, before any tableferry async
/// function. Library consumers who manage their own subscriber should skip
/// this and configure tracing themselves.
pub fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let default_filter = match level {
        LogLevel::Error => "tableferry=error",
        LogLevel::Info => "tableferry=info",
        LogLevel::Debug => "tableferry=debug",
    };

    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

// ─── Public API Facade ───

pub use application::replicate::ReplicationEngine;
pub use application::script::{split_statements, ScriptReport};
pub use domain::errors::{
    CopyError, CreateError, DeleteError, DirectoryError, RuntimeError, ScriptError, StoreError,
};
pub use domain::fingerprint::fingerprint;
pub use domain::instance::{Instance, InstanceOverview, InstanceState, LaunchSpec};
pub use domain::replication::{ConflictPolicy, CopyOutcome, CopyReport, CopyRequest};
pub use domain::value_objects::{
    ConnectionParams, Credentials, DatabaseName, Fingerprint, InstanceName, TableName,
};
pub use infrastructure::config::{Settings, DEFAULT_IMAGE};
pub use infrastructure::runtime::DockerCli;

use crate::application::directory::InstanceDirectory;
use crate::application::lifecycle::LifecycleManager;
use crate::application::script::ScriptRunner;
use crate::domain::ports::{ContainerRuntime, TableStore};
use crate::infrastructure::db::{connect, connect_single};

// ─── Public entry points ───

/// Every container in the fleet with its state and resolved host port.
pub async fn list_fleet(runtime: Arc<dyn ContainerRuntime>) -> Result<Vec<Instance>> {
    let directory = InstanceDirectory::new(runtime);
    Ok(directory.list_instances().await?)
}

/// The fleet plus each running instance's live database list.
///
/// Backs the read-only listing surfaces (CLI and web). A failed database
/// listing degrades that instance to an empty list with a warning instead of
/// failing the whole view; the fleet stays visible when one member is
/// unhealthy.
pub async fn fleet_overview(
    runtime: Arc<dyn ContainerRuntime>,
    credentials: &Credentials,
) -> Result<Vec<InstanceOverview>> {
    let directory = InstanceDirectory::new(runtime);
    let instances = directory.list_instances().await?;

    let mut overview = Vec::with_capacity(instances.len());
    for instance in instances {
        let databases = match instance.port {
            Some(port) if instance.is_running() => {
                let params = ConnectionParams {
                    host: credentials.host.clone(),
                    port,
                    user: credentials.user.clone(),
                    password: credentials.password.clone(),
                };
                match databases_at(&params).await {
                    Ok(databases) => databases,
                    Err(e) => {
                        warn!(instance = %instance.name, error = %e, "could not list databases");
                        Vec::new()
                    }
                }
            }
            _ => Vec::new(),
        };

        overview.push(InstanceOverview {
            name: instance.name,
            state: instance.state,
            port: instance.port,
            databases,
        });
    }
    Ok(overview)
}

/// Launch a new MariaDB instance with the given name, port and root password.
pub async fn create_instance(
    runtime: Arc<dyn ContainerRuntime>,
    spec: &LaunchSpec,
) -> Result<Instance, CreateError> {
    LifecycleManager::new(runtime).create(spec).await
}

/// Force-remove an instance by name, running or stopped.
pub async fn delete_instance(
    runtime: Arc<dyn ContainerRuntime>,
    name: &InstanceName,
) -> Result<(), DeleteError> {
    LifecycleManager::new(runtime).delete(name).await
}

/// Copy one table between two instances per the request's conflict policy.
///
/// Opens one connection pool per side and releases both on every exit path,
/// success or failure — including failures after the destination DDL has
/// already run.
pub async fn copy_table(
    runtime: Arc<dyn ContainerRuntime>,
    credentials: &Credentials,
    request: &CopyRequest,
) -> Result<CopyReport, CopyError> {
    let directory = InstanceDirectory::new(runtime);
    let source_params = directory
        .connection_params(&request.source_instance, credentials)
        .await?;
    let destination_params = directory
        .connection_params(&request.destination_instance, credentials)
        .await?;

    let source = Arc::new(connect(&source_params, None).await.map_err(CopyError::Store)?);
    let destination = match connect(&destination_params, None).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            source.close().await;
            return Err(CopyError::Store(e));
        }
    };

    let engine = ReplicationEngine::new(
        Arc::clone(&source) as Arc<dyn TableStore>,
        Arc::clone(&destination) as Arc<dyn TableStore>,
    );
    let result = engine.copy(request).await;

    source.close().await;
    destination.close().await;

    result
}

/// Run an ad-hoc SQL script against one instance.
///
/// The script runs over a single connection so session state (`USE`, user
/// variables) carries across statements; `database`, when given, is selected
/// before the first statement.
pub async fn run_script(
    runtime: Arc<dyn ContainerRuntime>,
    credentials: &Credentials,
    instance: &InstanceName,
    database: Option<&DatabaseName>,
    script: &str,
) -> Result<ScriptReport, ScriptError> {
    let directory = InstanceDirectory::new(runtime);
    let params = directory.connection_params(instance, credentials).await?;
    run_script_at(&params, database, script).await
}

/// Run an ad-hoc SQL script against an explicit endpoint, bypassing instance
/// name resolution. Same single-connection session semantics as
/// [`run_script`].
pub async fn run_script_at(
    params: &ConnectionParams,
    database: Option<&DatabaseName>,
    script: &str,
) -> Result<ScriptReport, ScriptError> {
    let store = Arc::new(connect_single(params, None).await?);
    let runner = ScriptRunner::new(Arc::clone(&store) as Arc<dyn TableStore>);
    let result = runner.run(script, database).await;
    store.close().await;

    result
}

/// Databases on one instance.
pub async fn list_databases(
    runtime: Arc<dyn ContainerRuntime>,
    credentials: &Credentials,
    instance: &InstanceName,
) -> Result<Vec<DatabaseName>> {
    let directory = InstanceDirectory::new(runtime);
    let params = directory.connection_params(instance, credentials).await?;

    let store = connect(&params, None).await?;
    let result = store.list_databases().await;
    store.close().await;
    Ok(result?)
}

/// Tables in one database on one instance.
pub async fn list_tables(
    runtime: Arc<dyn ContainerRuntime>,
    credentials: &Credentials,
    instance: &InstanceName,
    database: &DatabaseName,
) -> Result<Vec<TableName>> {
    let directory = InstanceDirectory::new(runtime);
    let params = directory.connection_params(instance, credentials).await?;

    let store = connect(&params, None).await?;
    let result = store.list_tables(database).await;
    store.close().await;
    Ok(result?)
}

// ─── Private helpers ──────────────────────────────────────────────────────────

/// One-shot `SHOW DATABASES` against an endpoint, closing the pool afterwards
/// whether the listing worked or not.
async fn databases_at(params: &ConnectionParams) -> Result<Vec<DatabaseName>, StoreError> {
    let store = connect(params, None).await?;
    let result = store.list_databases().await;
    store.close().await;
    result
}
