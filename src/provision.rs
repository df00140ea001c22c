use tracing::info;

use crate::error::DeployResult;
use crate::ssh::{RemoteCommand, SshSession, Tolerance};

/// A package the remote host needs, and the binary whose presence
/// means it is already installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Package {
    pub name: &'static str,
    pub binary: &'static str,
}

pub const PACKAGES: [Package; 3] = [
    Package {
        name: "docker.io",
        binary: "docker",
    },
    Package {
        name: "docker-compose",
        binary: "docker-compose",
    },
    Package {
        name: "nginx",
        binary: "nginx",
    },
];

pub const SERVICES: [&str; 2] = ["docker", "nginx"];

/// Bring the host to a state where it can build containers and
/// proxy to them. Safe to repeat.
pub fn provision(ssh: &SshSession<'_>) -> DeployResult<()> {
    ssh.check()?;

    info!("Refreshing package index on {}...", ssh.host());
    ssh.run(&apt().arg("update"))?;

    let mut missing = Vec::new();
    for package in PACKAGES {
        if ssh.probe(&format!("command -v {}", package.binary))? {
            info!("  {} already installed", package.name);
        } else {
            missing.push(package.name);
        }
    }

    if !missing.is_empty() {
        info!("Installing {}...", missing.join(", "));
        ssh.run(&apt().args(["install", "-y"]).args(missing))?;
    }

    for service in SERVICES {
        info!("Enabling {service}...");
        ssh.run(
            &RemoteCommand::new("systemctl")
                .args(["enable", "--now", service])
                .sudo(),
        )?;
    }

    // Takes effect on the next login; docker is invoked with sudo
    // for the rest of this run.
    ssh.run(
        &RemoteCommand::new("usermod")
            .args(["-aG", "docker", ssh.user()])
            .sudo()
            .tolerate(Tolerance::Always),
    )?;

    info!("Host {} provisioned", ssh.host());
    Ok(())
}

fn apt() -> RemoteCommand {
    RemoteCommand::new("apt-get")
        .env("DEBIAN_FRONTEND", "noninteractive")
        .sudo()
}
