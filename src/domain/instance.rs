use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{DatabaseName, InstanceName};

/// Lifecycle state of a container instance as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    Running,
    Stopped,
}

impl InstanceState {
    pub fn is_running(&self) -> bool {
        matches!(self, InstanceState::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Running => "running",
            InstanceState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the runtime itself reports about one container: name and state,
/// nothing more. Ports are resolved separately and only when needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub name: InstanceName,
    pub state: InstanceState,
}

/// Everything the runtime needs to start one detached database container.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub name: InstanceName,
    /// Host port to publish the database port (3306) on.
    pub host_port: u16,
    pub root_password: String,
    pub image: String,
}

/// One database instance in the fleet.
///
/// The host port is discovered lazily from the runtime and never stored
/// durably; `None` means the instance publishes no port (or is stopped) and
/// is therefore unusable for any operation that needs a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub name: InstanceName,
    pub port: Option<u16>,
    pub state: InstanceState,
}

impl Instance {
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }
}

/// A single published port binding, e.g. container `3306/tcp` → host `3307`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    /// Container-side port spec as the runtime reports it (`"3306/tcp"`).
    pub container_port: String,
    pub host_port: u16,
}

/// One row of the fleet overview: an instance plus its live databases.
///
/// `databases` is empty when the instance has no resolvable port (nothing to
/// connect to) or when the live listing failed and was degraded to empty.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceOverview {
    pub name: InstanceName,
    pub state: InstanceState,
    pub port: Option<u16>,
    pub databases: Vec<DatabaseName>,
}
