use std::path::PathBuf;

use tracing::{info, warn};

use crate::cmd::Executor;
use crate::error::DeployResult;
use crate::ssh::{RemoteCommand, SshSession};
use crate::workspace::LocalWorkspace;

/// Ship the workspace to `remote_dir`, replacing whatever was
/// there. Both archives are removed even when a step fails.
pub fn transfer(
    executor: &dyn Executor,
    ssh: &SshSession<'_>,
    workspace: &LocalWorkspace,
    id: &str,
    remote_dir: &str,
) -> DeployResult<()> {
    let archive = local_archive_path(id);
    let remote_archive = format!("/tmp/{id}.tar.gz");

    info!("Packaging {}...", workspace.path.display());
    let result = workspace
        .package(executor, &archive)
        .and_then(|()| ship(ssh, &archive, &remote_archive, remote_dir));

    if archive.exists() {
        if let Err(e) = std::fs::remove_file(&archive) {
            warn!("could not remove {}: {e}", archive.display());
        }
    }

    result
}

fn ship(
    ssh: &SshSession<'_>,
    archive: &std::path::Path,
    remote_archive: &str,
    remote_dir: &str,
) -> DeployResult<()> {
    info!("Copying archive to {}:{remote_archive}...", ssh.host());
    ssh.scp_to(&archive.to_string_lossy(), remote_archive)?;

    // once copied, the remote archive is removed whatever happens next
    let extracted = extract(ssh, remote_archive, remote_dir);
    let removed = ssh.run(&RemoteCommand::new("rm").args(["-f", remote_archive]));

    extracted?;
    removed?;
    Ok(())
}

fn extract(ssh: &SshSession<'_>, remote_archive: &str, remote_dir: &str) -> DeployResult<()> {
    info!("Extracting into {remote_dir}...");
    ssh.run(&RemoteCommand::new("rm").args(["-rf", remote_dir]).sudo())?;
    ssh.run(&RemoteCommand::new("mkdir").args(["-p", remote_dir]).sudo())?;
    ssh.run(
        &RemoteCommand::new("tar")
            .args(["-xzf", remote_archive, "-C", remote_dir])
            .sudo(),
    )?;
    Ok(())
}

fn local_archive_path(id: &str) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    std::env::temp_dir().join(format!("{id}-{stamp}.tar.gz"))
}
