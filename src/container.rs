use std::collections::HashMap;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{DeployError, DeployResult};
use crate::ssh::{RemoteCommand, SshSession, Tolerance};
use crate::workspace::{BuildDescriptor, LocalWorkspace};

const NO_SUCH_CONTAINER: &str = "No such container";

/// The slice of `docker inspect` output we care about.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerInfo {
    pub name: String,
    pub state: ContainerState,
    #[serde(default)]
    pub host_config: HostConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerState {
    pub status: String,
    pub running: bool,
    #[serde(default)]
    pub restart_count: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfig {
    #[serde(default)]
    pub port_bindings: Option<HashMap<String, Option<Vec<PortBinding>>>>,
    #[serde(default)]
    pub restart_policy: Option<RestartPolicy>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortBinding {
    #[serde(rename = "HostIp", default)]
    pub host_ip: String,
    #[serde(rename = "HostPort", default)]
    pub host_port: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RestartPolicy {
    pub name: String,
}

impl ContainerInfo {
    /// Whether `port` is published on loopback and nowhere else.
    #[must_use]
    pub fn bound_to_loopback(&self, port: u16) -> bool {
        let port = port.to_string();
        let bindings: Vec<&PortBinding> = self
            .host_config
            .port_bindings
            .iter()
            .flat_map(HashMap::values)
            .flatten()
            .flatten()
            .filter(|b| b.host_port == port)
            .collect();

        !bindings.is_empty() && bindings.iter().all(|b| b.host_ip == "127.0.0.1")
    }

    #[must_use]
    pub fn restart_policy(&self) -> Option<&str> {
        self.host_config
            .restart_policy
            .as_ref()
            .map(|p| p.name.as_str())
    }
}

/// Parse the JSON array printed by `docker inspect`.
pub fn parse_inspect(json: &str) -> DeployResult<Vec<ContainerInfo>> {
    Ok(serde_json::from_str(json)?)
}

/// Query the container named `id`. `None` when it does not exist.
pub fn inspect(ssh: &SshSession<'_>, id: &str) -> DeployResult<Option<ContainerInfo>> {
    let output = ssh.run(
        &docker()
            .args(["inspect", id])
            .tolerate(Tolerance::StderrContains("No such object")),
    )?;
    if !output.success() {
        return Ok(None);
    }
    Ok(parse_inspect(&output.stdout)?.into_iter().next())
}

/// Replace whatever runs under `id` with a fresh build of the
/// transferred tree.
pub fn launch(
    ssh: &SshSession<'_>,
    workspace: &LocalWorkspace,
    id: &str,
    remote_dir: &str,
    port: u16,
) -> DeployResult<()> {
    match &workspace.descriptor {
        BuildDescriptor::Dockerfile => launch_dockerfile(ssh, id, remote_dir, port),
        BuildDescriptor::Compose(file) => {
            if !workspace.publishes_loopback(port)? {
                warn!("{file} does not publish 127.0.0.1:{port}; the proxy may not reach the app");
            }
            launch_compose(ssh, id, remote_dir, file)
        }
    }
}

fn launch_dockerfile(ssh: &SshSession<'_>, id: &str, remote_dir: &str, port: u16) -> DeployResult<()> {
    info!("Stopping previous container {id}...");
    ssh.run(
        &docker()
            .args(["stop", id])
            .tolerate(Tolerance::StderrContains(NO_SUCH_CONTAINER)),
    )?;
    ssh.run(
        &docker()
            .args(["rm", id])
            .tolerate(Tolerance::StderrContains(NO_SUCH_CONTAINER)),
    )?;

    let image = format!("{id}:latest");
    info!("Building image {image}...");
    ssh.run(&docker().args(["build", "-t", &image, remote_dir]))?;

    info!("Starting container {id} on 127.0.0.1:{port}...");
    let binding = format!("127.0.0.1:{port}:{port}");
    ssh.run(&docker().args([
        "run",
        "-d",
        "--name",
        id,
        "--restart",
        "always",
        "-p",
        &binding,
        &image,
    ]))?;

    match inspect(ssh, id)? {
        Some(info) if info.state.running => {
            info!("Container {id} is {}", info.state.status);
            Ok(())
        }
        _ => Err(DeployError::ContainerNotRunning(id.to_string())),
    }
}

fn launch_compose(ssh: &SshSession<'_>, id: &str, remote_dir: &str, file: &str) -> DeployResult<()> {
    let compose_file = format!("{remote_dir}/{file}");

    info!("Stopping previous compose project {id}...");
    ssh.run(
        &compose(id, &compose_file)
            .arg("down")
            .tolerate(Tolerance::Always),
    )?;

    info!("Building and starting compose project {id}...");
    ssh.run(&compose(id, &compose_file).args(["up", "-d", "--build"]))?;
    Ok(())
}

/// Last `lines` lines of the deployment's container logs.
pub fn logs(
    ssh: &SshSession<'_>,
    workspace: Option<&LocalWorkspace>,
    id: &str,
    remote_dir: &str,
    lines: u32,
) -> DeployResult<String> {
    let tail = lines.to_string();
    let command = match workspace.map(|w| &w.descriptor) {
        Some(BuildDescriptor::Compose(file)) => compose(id, &format!("{remote_dir}/{file}"))
            .args(["logs", "--no-color", "--tail", &tail]),
        _ => docker().args(["logs", "--tail", &tail, id]),
    };
    let output = ssh.run(&command)?;

    // docker logs replays the container's stderr on ours
    Ok(join_streams(&output.stdout, &output.stderr))
}

fn join_streams(stdout: &str, stderr: &str) -> String {
    match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => format!("{stdout}\n{stderr}"),
    }
}

fn docker() -> RemoteCommand {
    RemoteCommand::new("docker").sudo()
}

fn compose(id: &str, file: &str) -> RemoteCommand {
    RemoteCommand::new("docker-compose")
        .args(["-p", id, "-f", file])
        .sudo()
}
