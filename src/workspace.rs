use std::path::{Path, PathBuf};

use docker_compose_types::{Compose, Ports};
use secrecy::ExposeSecret;
use tracing::info;

use crate::cmd::{self, Executor, Invocation};
use crate::error::{DeployError, DeployResult};
use crate::request::DeploymentRequest;
use crate::settings::Settings;

/// Compose file names recognized at the repository root, in
/// lookup order.
pub const COMPOSE_FILES: [&str; 4] = [
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

/// How the application gets built on the remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildDescriptor {
    Dockerfile,
    Compose(String),
}

/// A fresh local checkout of the repository being deployed.
#[derive(Debug, Clone)]
pub struct LocalWorkspace {
    pub name: String,
    pub path: PathBuf,
    pub descriptor: BuildDescriptor,
}

impl LocalWorkspace {
    /// Remove any previous checkout, clone the repository, check
    /// out the requested branch, and find its build descriptor.
    pub fn prepare(
        executor: &dyn Executor,
        request: &DeploymentRequest,
        settings: &Settings,
    ) -> DeployResult<Self> {
        let name = request.workspace_name();
        let path = settings.workdir.join(&name);

        if path.exists() {
            info!("Removing previous checkout {}", path.display());
            std::fs::remove_dir_all(&path)?;
        }

        info!("Cloning {} into {}", request.repo_url, path.display());
        let url = request.authenticated_url()?;
        cmd::run(
            executor,
            &Invocation::new("git")
                .arg("clone")
                .arg(url)
                .arg(path.to_string_lossy())
                .redact(request.token.expose_secret()),
        )?;

        info!("Checking out branch {}", request.branch);
        cmd::run(
            executor,
            &Invocation::new("git")
                .args(["checkout", &request.branch])
                .current_dir(&path),
        )?;

        let descriptor = detect(&path)?;
        info!("Build descriptor: {descriptor:?}");

        Ok(Self {
            name,
            path,
            descriptor,
        })
    }

    /// Archive the checkout, without version-control metadata, into
    /// a gzipped tarball at `archive`.
    pub fn package(&self, executor: &dyn Executor, archive: &Path) -> DeployResult<()> {
        cmd::run(
            executor,
            &Invocation::new("tar")
                .args(["--exclude=.git", "-czf"])
                .arg(archive.to_string_lossy())
                .arg("-C")
                .arg(self.path.to_string_lossy())
                .arg("."),
        )?;
        Ok(())
    }

    /// Whether the compose file publishes `port` on loopback.
    /// Always `true` for Dockerfile builds, which bind it themselves.
    pub fn publishes_loopback(&self, port: u16) -> DeployResult<bool> {
        match &self.descriptor {
            BuildDescriptor::Dockerfile => Ok(true),
            BuildDescriptor::Compose(file) => {
                let compose = load_compose(&self.path.join(file))?;
                Ok(compose_publishes_loopback(&compose, port))
            }
        }
    }
}

/// Find the build descriptor at the root of a checkout. A
/// Dockerfile wins over a compose file.
pub fn detect(path: &Path) -> DeployResult<BuildDescriptor> {
    if path.join("Dockerfile").is_file() {
        return Ok(BuildDescriptor::Dockerfile);
    }

    for file in COMPOSE_FILES {
        let candidate = path.join(file);
        if candidate.is_file() {
            load_compose(&candidate)?;
            return Ok(BuildDescriptor::Compose(file.to_string()));
        }
    }

    Err(DeployError::BuildDescriptorMissing(path.display().to_string()))
}

/// Parse a compose file.
pub fn load_compose(path: &Path) -> DeployResult<Compose> {
    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|e| DeployError::InvalidCompose {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Whether any service publishes `127.0.0.1:<port>:<target>` in
/// short port syntax.
#[must_use]
pub fn compose_publishes_loopback(compose: &Compose, port: u16) -> bool {
    let prefix = format!("127.0.0.1:{port}:");
    compose
        .services
        .0
        .values()
        .flatten()
        .any(|service| match &service.ports {
            Ports::Short(list) => list.iter().any(|p| p.starts_with(&prefix)),
            _ => false,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compose(yaml: &str) -> Compose {
        serde_yaml::from_str(yaml).expect("valid compose")
    }

    #[test]
    fn loopback_port_detected() {
        let c = compose(
            "services:\n  web:\n    build: .\n    ports:\n      - \"127.0.0.1:3000:3000\"\n",
        );

        assert!(compose_publishes_loopback(&c, 3000));
        assert!(!compose_publishes_loopback(&c, 8080));
    }

    #[test]
    fn public_port_is_not_loopback() {
        let c = compose("services:\n  web:\n    build: .\n    ports:\n      - \"3000:3000\"\n");

        assert!(!compose_publishes_loopback(&c, 3000));
    }
}
