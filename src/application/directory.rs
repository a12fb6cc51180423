use std::sync::Arc;

use crate::domain::errors::{DirectoryError, RuntimeError};
use crate::domain::instance::{Instance, PortMapping};
use crate::domain::ports::ContainerRuntime;
use crate::domain::value_objects::{ConnectionParams, Credentials, InstanceName};

// ─── Instance Directory ───

/// Answers "what instances exist and how do I reach them".
///
/// Ports are resolved live from the runtime on every call. An instance whose
/// port cannot be resolved is still listed (with `port: None`) but is rejected
/// by `connection_params`, which is the gate every connection-dependent
/// operation goes through.
pub struct InstanceDirectory {
    runtime: Arc<dyn ContainerRuntime>,
}

impl InstanceDirectory {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// All containers in the fleet, each with its resolved host port.
    pub async fn list_instances(&self) -> Result<Vec<Instance>, DirectoryError> {
        let containers = self.runtime.list_containers().await?;

        let mut instances = Vec::with_capacity(containers.len());
        for container in containers {
            let port = match self.runtime.published_ports(&container.name).await {
                Ok(mappings) => pick_host_port(&mappings),
                Err(RuntimeError::NoSuchContainer { .. }) => None,
                Err(e) => return Err(e.into()),
            };
            instances.push(Instance {
                name: container.name,
                port,
                state: container.state,
            });
        }
        Ok(instances)
    }

    /// The published host port of one instance. `None` when it publishes no
    /// port (stopped, or started without `-p`): an answer, not an error.
    pub async fn resolve_port(&self, name: &InstanceName) -> Result<Option<u16>, DirectoryError> {
        let mappings = self.runtime.published_ports(name).await?;
        Ok(pick_host_port(&mappings))
    }

    /// Connection parameters for one instance: the configured credentials
    /// plus whatever port the runtime reports right now. An instance without
    /// a resolvable port cannot be connected to and is rejected here.
    pub async fn connection_params(
        &self,
        name: &InstanceName,
        credentials: &Credentials,
    ) -> Result<ConnectionParams, DirectoryError> {
        let port = self
            .resolve_port(name)
            .await?
            .ok_or_else(|| DirectoryError::PortUnresolved {
                name: name.0.clone(),
            })?;
        Ok(ConnectionParams {
            host: credentials.host.clone(),
            port,
            user: credentials.user.clone(),
            password: credentials.password.clone(),
        })
    }
}

/// Prefer the binding for the database port itself; containers started by us
/// only publish `3306/tcp`, but a hand-started one may expose more.
fn pick_host_port(mappings: &[PortMapping]) -> Option<u16> {
    mappings
        .iter()
        .find(|m| m.container_port == "3306/tcp")
        .or_else(|| mappings.first())
        .map(|m| m.host_port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    use crate::domain::instance::{ContainerSummary, InstanceState, LaunchSpec};

    struct FakeRuntime {
        containers: Vec<ContainerSummary>,
        ports: BTreeMap<String, Vec<PortMapping>>,
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
            Ok(self.containers.clone())
        }

        async fn published_ports(
            &self,
            name: &InstanceName,
        ) -> Result<Vec<PortMapping>, RuntimeError> {
            self.ports
                .get(&name.0)
                .cloned()
                .ok_or_else(|| RuntimeError::NoSuchContainer {
                    name: name.0.clone(),
                })
        }

        async fn start_container(&self, _spec: &LaunchSpec) -> Result<(), RuntimeError> {
            Ok(())
        }

        async fn remove_container(&self, _name: &InstanceName) -> Result<(), RuntimeError> {
            Ok(())
        }
    }

    fn mapping(container_port: &str, host_port: u16) -> PortMapping {
        PortMapping {
            container_port: container_port.to_string(),
            host_port,
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            user: "root".into(),
            password: "secret".into(),
            host: "127.0.0.1".into(),
        }
    }

    #[tokio::test]
    async fn lists_instances_with_resolved_ports() {
        let runtime = FakeRuntime {
            containers: vec![
                ContainerSummary {
                    name: InstanceName("alpha".into()),
                    state: InstanceState::Running,
                },
                ContainerSummary {
                    name: InstanceName("beta".into()),
                    state: InstanceState::Stopped,
                },
            ],
            ports: BTreeMap::from([
                ("alpha".to_string(), vec![mapping("3306/tcp", 3310)]),
                ("beta".to_string(), vec![]),
            ]),
        };

        let directory = InstanceDirectory::new(Arc::new(runtime));
        let instances = directory.list_instances().await.unwrap();

        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].name.0, "alpha");
        assert_eq!(instances[0].port, Some(3310));
        assert!(instances[0].is_running());
        assert_eq!(instances[1].port, None);
    }

    #[tokio::test]
    async fn prefers_database_port_over_extra_mappings() {
        assert_eq!(
            pick_host_port(&[mapping("33060/tcp", 9001), mapping("3306/tcp", 3310)]),
            Some(3310)
        );
        // No 3306 binding: fall back to the first mapping the runtime lists.
        assert_eq!(pick_host_port(&[mapping("33060/tcp", 9001)]), Some(9001));
        assert_eq!(pick_host_port(&[]), None);
    }

    #[tokio::test]
    async fn unresolvable_port_blocks_connection_params() {
        let runtime = FakeRuntime {
            containers: vec![],
            ports: BTreeMap::from([("beta".to_string(), vec![])]),
        };

        let directory = InstanceDirectory::new(Arc::new(runtime));
        let resolved = directory
            .resolve_port(&InstanceName("beta".into()))
            .await
            .unwrap();
        assert_eq!(resolved, None);

        let err = directory
            .connection_params(&InstanceName("beta".into()), &credentials())
            .await
            .unwrap_err();

        assert!(matches!(err, DirectoryError::PortUnresolved { .. }));
    }

    #[tokio::test]
    async fn connection_params_combine_credentials_and_live_port() {
        let runtime = FakeRuntime {
            containers: vec![],
            ports: BTreeMap::from([("alpha".to_string(), vec![mapping("3306/tcp", 3310)])]),
        };

        let directory = InstanceDirectory::new(Arc::new(runtime));
        let params = directory
            .connection_params(&InstanceName("alpha".into()), &credentials())
            .await
            .unwrap();

        assert_eq!(params.host, "127.0.0.1");
        assert_eq!(params.port, 3310);
        assert_eq!(params.user, "root");
        assert_eq!(params.password, "secret");
    }
}
