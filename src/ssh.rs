use tracing::{debug, warn};

use crate::cmd::{self, CommandOutput, Executor, Invocation};
use crate::error::{DeployError, DeployResult};

/// Which non-zero exits of a remote command are absorbed instead
/// of aborting the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tolerance {
    Never,
    Always,
    /// Tolerate failures whose stderr contains this text.
    StderrContains(&'static str),
}

impl Tolerance {
    #[must_use]
    pub fn accepts(&self, output: &CommandOutput) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::StderrContains(needle) => output.stderr.contains(needle),
        }
    }
}

/// A command to run on the remote host, expressed as an argument
/// vector rather than an opaque script.
///
/// ```
/// use trebuchet::ssh::RemoteCommand;
///
/// let cmd = RemoteCommand::new("docker")
///     .args(["build", "-t", "app:latest", "/opt/trebuchet/app"])
///     .sudo();
///
/// assert_eq!(
///     cmd.render(false),
///     "sudo -n 'docker' 'build' '-t' 'app:latest' '/opt/trebuchet/app'"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct RemoteCommand {
    pub program: String,
    pub args: Vec<String>,
    pub sudo: bool,
    pub env: Vec<(String, String)>,
    pub stdin: Option<Vec<u8>>,
    pub tolerance: Tolerance,
}

impl RemoteCommand {
    #[must_use]
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            sudo: false,
            env: Vec::new(),
            stdin: None,
            tolerance: Tolerance::Never,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub const fn sudo(mut self) -> Self {
        self.sudo = true;
        self
    }

    #[must_use]
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    #[must_use]
    pub const fn tolerate(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Render the remote shell command line. `as_root` drops the
    /// `sudo` prefix since the session already has privileges.
    #[must_use]
    pub fn render(&self, as_root: bool) -> String {
        let mut parts = Vec::new();
        if self.sudo && !as_root {
            parts.push("sudo -n".to_string());
        }
        if !self.env.is_empty() {
            parts.push("env".to_string());
            parts.extend(self.env.iter().map(|(k, v)| quote(&format!("{k}={v}"))));
        }
        parts.push(quote(&self.program));
        parts.extend(self.args.iter().map(|a| quote(a)));
        parts.join(" ")
    }
}

/// POSIX single-quote a word for the remote shell.
#[must_use]
pub fn quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', "'\\''"))
}

/// SSH session wrapper for executing commands and transferring
/// files to a remote host.
pub struct SshSession<'a> {
    executor: &'a dyn Executor,
    host: String,
    user: String,
    key: Option<String>,
}

impl<'a> SshSession<'a> {
    #[must_use]
    pub fn new(executor: &'a dyn Executor, host: &str, user: &str) -> Self {
        Self {
            executor,
            host: host.to_string(),
            user: user.to_string(),
            key: None,
        }
    }

    #[must_use]
    pub fn with_key(mut self, key_path: &str) -> Self {
        self.key = Some(key_path.to_string());
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Run a command on the remote host. Non-zero exits abort
    /// unless the command's [`Tolerance`] accepts them.
    pub fn run(&self, command: &RemoteCommand) -> DeployResult<CommandOutput> {
        let line = command.render(self.user == "root");
        let mut invocation = Invocation::new("ssh").args(self.ssh_args(&line));
        if let Some(data) = &command.stdin {
            invocation = invocation.stdin(data.clone());
        }

        debug!("[{}] $ {line}", self.host);
        let output = self.executor.execute(&invocation)?;
        cmd::log_output(&invocation, &output);

        if output.status == 255 {
            return Err(DeployError::SshFailed(format!(
                "{}: {}",
                self.destination(),
                output.stderr
            )));
        }

        if output.success() {
            return Ok(output);
        }

        if command.tolerance.accepts(&output) {
            warn!(
                "ignoring failure of `{line}` (exit {}): {}",
                output.status, output.stderr
            );
            return Ok(output);
        }

        Err(DeployError::CommandFailed {
            command: line,
            status: output.status,
            stderr: output.stderr,
        })
    }

    /// Run a shell check on the remote host and report whether it
    /// succeeded. Used for presence tests such as `command -v`.
    pub fn probe(&self, check: &str) -> DeployResult<bool> {
        let invocation = Invocation::new("ssh").args(self.ssh_args(check));
        let output = self.executor.execute(&invocation)?;
        if output.status == 255 {
            return Err(DeployError::SshFailed(format!(
                "{}: {}",
                self.destination(),
                output.stderr
            )));
        }
        Ok(output.success())
    }

    /// Single round-trip to confirm the host accepts our key.
    pub fn check(&self) -> DeployResult<()> {
        if self.probe("true")? {
            Ok(())
        } else {
            Err(DeployError::SshFailed(format!(
                "cannot run commands on {}",
                self.destination()
            )))
        }
    }

    /// Copy a local file to the remote host.
    pub fn scp_to(&self, local_path: &str, remote_path: &str) -> DeployResult<()> {
        let mut args = self.base_args();
        args.push(local_path.to_string());
        args.push(format!("{}:{remote_path}", self.destination()));

        cmd::run(self.executor, &Invocation::new("scp").args(args))?;
        Ok(())
    }

    /// Write content to a remote file via stdin pipe.
    pub fn write_remote_file(&self, content: &str, remote_path: &str, sudo: bool) -> DeployResult<()> {
        let mut command = RemoteCommand::new("tee")
            .arg(remote_path)
            .stdin(content.as_bytes());
        if sudo {
            command = command.sudo();
        }
        self.run(&command)?;
        Ok(())
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    fn ssh_args(&self, line: &str) -> Vec<String> {
        let mut args = self.base_args();
        args.push("-o".to_string());
        args.push("ConnectTimeout=10".to_string());
        args.push(self.destination());
        args.push(line.to_string());
        args
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
        ];
        if let Some(key) = &self.key {
            args.push("-i".to_string());
            args.push(key.clone());
        }
        args
    }
}
