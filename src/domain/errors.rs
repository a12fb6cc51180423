use thiserror::Error;

/// Container-runtime boundary failures.
///
/// `Unavailable` means the backend itself could not be queried (daemon down,
/// binary missing). `CommandFailed` passes the runtime's own stderr through
/// verbatim.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("container runtime unavailable: {detail}")]
    Unavailable { detail: String },

    #[error("timed out running '{command}' (exceeded {seconds}s)")]
    Timeout { command: String, seconds: u64 },

    #[error("'{command}' failed{}: {stderr}", exit_code_label(.exit_code))]
    CommandFailed {
        command: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    #[error("no such container: {name}")]
    NoSuchContainer { name: String },
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!(" (exit code {c})"),
        None => String::new(),
    }
}

/// Database boundary failures, with the engine's message preserved verbatim.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    #[error("query failed ({context}): {message}")]
    Query { context: String, message: String },

    #[error("could not decode column '{column}': {message}")]
    Decode { column: String, message: String },
}

/// Failures while resolving an instance to something connectable.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The instance publishes no host port (or is stopped); there is nothing
    /// to connect to.
    #[error("instance '{name}' exposes no resolvable host port")]
    PortUnresolved { name: String },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Failures while creating a new instance.
#[derive(Debug, Error)]
pub enum CreateError {
    #[error("instance name must not be empty")]
    EmptyName,

    #[error("an instance named '{name}' is already running")]
    NameTaken { name: String },

    /// Raised both by the optimistic pre-check and by a lost allocation race,
    /// in which case `detail` is the runtime's own bind-failure message.
    #[error("port {port} is already in use: {detail}")]
    PortConflict { port: u16, detail: String },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Failures while deleting an instance.
#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("no instance named '{name}'")]
    NoSuchInstance { name: String },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Failures of a table copy.
///
/// Every multi-step copy states which prefix of steps may have taken effect:
/// `Insertion` records whether the schema step had already applied, so a
/// destination table left existing-but-empty is reported, never hidden.
#[derive(Debug, Error)]
pub enum CopyError {
    #[error(transparent)]
    Resolve(#[from] DirectoryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The destination table exists and the caller gave no policy. The engine
    /// never guesses; nothing has been mutated when this is returned.
    #[error("table `{table}` already exists in `{database}`: pass a conflict policy (append or overwrite)")]
    ConflictRequiresPolicy { database: String, table: String },

    #[error("inserting rows into `{database}`.`{table}` failed{}: {message}", ddl_caveat(.ddl_applied))]
    Insertion {
        database: String,
        table: String,
        ddl_applied: bool,
        message: String,
    },
}

fn ddl_caveat(ddl_applied: &bool) -> &'static str {
    if *ddl_applied {
        " (table structure was already created and is left in place, empty)"
    } else {
        ""
    }
}

/// Failures while running an ad-hoc SQL script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Resolve(#[from] DirectoryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// `index` is 1-based over the split statements; everything before it
    /// executed, everything after it was skipped.
    #[error("statement {index} failed: {message}")]
    Statement { index: usize, message: String },
}
