//! Container runtime adapter over the `docker` CLI.
//!
//! Every runtime interaction goes through [`DockerCli`], which is the single
//! place `Command::new("docker")` is constructed, applies a per-command
//! timeout, and maps failures to [`RuntimeError`].

use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::errors::RuntimeError;
use crate::domain::instance::{ContainerSummary, InstanceState, LaunchSpec, PortMapping};
use crate::domain::ports::ContainerRuntime;
use crate::domain::value_objects::InstanceName;

/// Most commands answer in well under a second when the daemon is healthy.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
/// `docker run` may pull the image on first use.
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(180);

/// Container runtime client shelling out to the `docker` binary.
#[derive(Debug, Clone)]
pub struct DockerCli {
    command_timeout: Duration,
    launch_timeout: Duration,
}

impl DockerCli {
    pub fn new() -> Self {
        DockerCli {
            command_timeout: COMMAND_TIMEOUT,
            launch_timeout: LAUNCH_TIMEOUT,
        }
    }

    /// Run a docker command with a timeout, returning raw output.
    async fn run(&self, args: &[&str], timeout: Duration) -> Result<Output, RuntimeError> {
        let command = format!("docker {}", args.join(" "));
        debug!(%command, "running runtime command");

        let result = tokio::time::timeout(
            timeout,
            tokio::process::Command::new("docker").args(args).output(),
        )
        .await;

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(RuntimeError::Unavailable {
                detail: format!("failed to execute '{command}': {e}"),
            }),
            Err(_) => Err(RuntimeError::Timeout {
                command,
                seconds: timeout.as_secs(),
            }),
        }
    }

    /// Run a docker command, demanding exit 0.
    async fn run_success(&self, args: &[&str], timeout: Duration) -> Result<Output, RuntimeError> {
        let output = self.run(args, timeout).await?;
        if output.status.success() {
            return Ok(output);
        }
        let command = format!("docker {}", args.join(" "));
        Err(classify_failure(&command, &output))
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let output = self
            .run_success(
                &["ps", "-a", "--format", "{{.Names}}\t{{.State}}"],
                self.command_timeout,
            )
            .await?;
        Ok(parse_container_lines(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }

    async fn published_ports(
        &self,
        name: &InstanceName,
    ) -> Result<Vec<PortMapping>, RuntimeError> {
        let output = self
            .run(
                &[
                    "inspect",
                    "--format={{json .NetworkSettings.Ports}}",
                    name.as_str(),
                ],
                self.command_timeout,
            )
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_no_such_container(&stderr) {
                return Err(RuntimeError::NoSuchContainer {
                    name: name.0.clone(),
                });
            }
            let command = format!("docker inspect {}", name.as_str());
            return Err(classify_failure(&command, &output));
        }

        Ok(parse_port_mappings(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }

    async fn start_container(&self, spec: &LaunchSpec) -> Result<(), RuntimeError> {
        let publish = format!("{}:3306", spec.host_port);
        let password = format!("MYSQL_ROOT_PASSWORD={}", spec.root_password);
        self.run_success(
            &[
                "run",
                "--name",
                spec.name.as_str(),
                "-p",
                &publish,
                "-e",
                &password,
                "-d",
                &spec.image,
            ],
            self.launch_timeout,
        )
        .await?;
        Ok(())
    }

    async fn remove_container(&self, name: &InstanceName) -> Result<(), RuntimeError> {
        let output = self
            .run(&["rm", "-f", name.as_str()], self.command_timeout)
            .await?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_no_such_container(&stderr) {
            return Err(RuntimeError::NoSuchContainer {
                name: name.0.clone(),
            });
        }
        let command = format!("docker rm -f {}", name.as_str());
        Err(classify_failure(&command, &output))
    }
}

/// Map a non-zero docker exit to the right error: a daemon that is not
/// answering is `Unavailable`, everything else keeps the stderr verbatim.
fn classify_failure(command: &str, output: &Output) -> RuntimeError {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.contains("Cannot connect to the Docker daemon")
        || stderr.contains("Is the docker daemon running")
    {
        return RuntimeError::Unavailable { detail: stderr };
    }
    RuntimeError::CommandFailed {
        command: command.to_string(),
        stderr,
        exit_code: output.status.code(),
    }
}

fn is_no_such_container(stderr: &str) -> bool {
    stderr.contains("No such container") || stderr.contains("No such object")
}

/// Parse `docker ps -a --format '{{.Names}}\t{{.State}}'` output.
fn parse_container_lines(stdout: &str) -> Vec<ContainerSummary> {
    stdout
        .lines()
        .filter_map(|line| {
            let (name, state) = line.split_once('\t')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let state = if state.trim() == "running" {
                InstanceState::Running
            } else {
                InstanceState::Stopped
            };
            Some(ContainerSummary {
                name: InstanceName(name.to_string()),
                state,
            })
        })
        .collect()
}

/// Parse `docker inspect --format={{json .NetworkSettings.Ports}}` output.
///
/// The shape is `{"3306/tcp": [{"HostIp": "0.0.0.0", "HostPort": "3307"}, …]}`
/// with `null` bindings for unpublished ports and `null` overall for stopped
/// containers. The same host port often appears once per address family;
/// duplicates are collapsed.
fn parse_port_mappings(stdout: &str) -> Vec<PortMapping> {
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(stdout.trim()) else {
        return Vec::new();
    };
    let Some(ports) = parsed.as_object() else {
        return Vec::new();
    };

    let mut mappings: Vec<PortMapping> = Vec::new();
    for (container_port, bindings) in ports {
        let Some(bindings) = bindings.as_array() else {
            continue;
        };
        for binding in bindings {
            let Some(host_port) = binding
                .get("HostPort")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<u16>().ok())
            else {
                continue;
            };
            let mapping = PortMapping {
                container_port: container_port.clone(),
                host_port,
            };
            if !mappings.contains(&mapping) {
                mappings.push(mapping);
            }
        }
    }
    mappings
}
