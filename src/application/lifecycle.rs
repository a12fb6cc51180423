use std::sync::Arc;

use tracing::info;

use crate::application::registry::PortRegistry;
use crate::domain::errors::{CreateError, DeleteError, RuntimeError};
use crate::domain::instance::{Instance, InstanceState, LaunchSpec};
use crate::domain::ports::ContainerRuntime;
use crate::domain::value_objects::InstanceName;

// ─── Lifecycle Manager ───

/// Creates and destroys fleet instances.
///
/// The name and port pre-checks are optimistic: another process can take
/// either between the check and `docker run`. The runtime's own rejection is
/// the source of truth; a lost port race is translated back into the same
/// `PortConflict` the pre-check raises, every other rejection is passed
/// through verbatim.
pub struct LifecycleManager {
    runtime: Arc<dyn ContainerRuntime>,
    registry: PortRegistry,
}

impl LifecycleManager {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        let registry = PortRegistry::new(Arc::clone(&runtime));
        Self { runtime, registry }
    }

    /// Launch a new database container and report it as a running instance.
    pub async fn create(&self, spec: &LaunchSpec) -> Result<Instance, CreateError> {
        if spec.name.0.trim().is_empty() {
            return Err(CreateError::EmptyName);
        }

        let containers = self.runtime.list_containers().await?;
        let taken = containers
            .iter()
            .any(|c| c.state.is_running() && c.name == spec.name);
        if taken {
            return Err(CreateError::NameTaken {
                name: spec.name.0.clone(),
            });
        }

        if !self.registry.is_available(spec.host_port).await? {
            return Err(CreateError::PortConflict {
                port: spec.host_port,
                detail: "already published by a running instance".into(),
            });
        }

        self.runtime
            .start_container(spec)
            .await
            .map_err(|e| classify_start_failure(spec.host_port, e))?;

        info!(name = %spec.name, port = spec.host_port, "instance created");

        Ok(Instance {
            name: spec.name.clone(),
            port: Some(spec.host_port),
            state: InstanceState::Running,
        })
    }

    /// Force-remove an instance, running or stopped. Deleting an unknown name
    /// is a reported error, not a crash and not a silent success.
    pub async fn delete(&self, name: &InstanceName) -> Result<(), DeleteError> {
        match self.runtime.remove_container(name).await {
            Ok(()) => {
                info!(name = %name, "instance deleted");
                Ok(())
            }
            Err(RuntimeError::NoSuchContainer { .. }) => Err(DeleteError::NoSuchInstance {
                name: name.0.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

/// The runtime reports a lost port race in `docker run` stderr. Surface it as
/// the conflict it is, keeping the runtime's message verbatim.
fn classify_start_failure(port: u16, e: RuntimeError) -> CreateError {
    if let RuntimeError::CommandFailed { stderr, .. } = &e {
        if stderr.contains("port is already allocated") || stderr.contains("address already in use")
        {
            return CreateError::PortConflict {
                port,
                detail: stderr.clone(),
            };
        }
    }
    e.into()
}
