use std::collections::BTreeSet;
use std::sync::Arc;

use crate::domain::errors::RuntimeError;
use crate::domain::ports::ContainerRuntime;

// ─── Port Registry ───

/// Tracks which host ports the fleet currently occupies.
///
/// There is no cache: instances can be created and destroyed by processes
/// outside this one between any two calls, so every query goes back to the
/// runtime. Only *running* containers hold their published ports; a stopped
/// container's old binding is free for reuse.
pub struct PortRegistry {
    runtime: Arc<dyn ContainerRuntime>,
}

impl PortRegistry {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Every host port published by a running container, recomputed now.
    pub async fn used_ports(&self) -> Result<BTreeSet<u16>, RuntimeError> {
        let containers = self.runtime.list_containers().await?;

        let mut ports = BTreeSet::new();
        for container in containers {
            if !container.state.is_running() {
                continue;
            }
            let mappings = match self.runtime.published_ports(&container.name).await {
                Ok(mappings) => mappings,
                // Removed between the listing and the inspect; it no longer
                // holds any port.
                Err(RuntimeError::NoSuchContainer { .. }) => continue,
                Err(e) => return Err(e),
            };
            for mapping in mappings {
                ports.insert(mapping.host_port);
            }
        }
        Ok(ports)
    }

    /// `true` when `port` is not published by any running container. The
    /// answer is advisory: the runtime's own bind check stays authoritative
    /// for whoever acts on it.
    pub async fn is_available(&self, port: u16) -> Result<bool, RuntimeError> {
        Ok(!self.used_ports().await?.contains(&port))
    }
}
