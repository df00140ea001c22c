use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{DeployError, DeployResult};

/// A single program invocation: program, arguments, and the
/// optional stdin payload and working directory.
///
/// Substrings registered with [`Invocation::redact`] are masked
/// in the `Display` form, which is what ends up in logs and
/// error messages.
///
/// ```
/// use trebuchet::cmd::Invocation;
///
/// let inv = Invocation::new("git")
///     .arg("clone")
///     .arg("https://s3cr3t@github.com/org/app.git")
///     .redact("s3cr3t");
///
/// assert_eq!(
///     inv.to_string(),
///     "git clone https://***@github.com/org/app.git"
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<Vec<u8>>,
    pub cwd: Option<PathBuf>,
    redactions: Vec<String>,
}

impl Invocation {
    #[must_use]
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            ..Self::default()
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
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    #[must_use]
    pub fn redact(mut self, secret: &str) -> Self {
        if !secret.is_empty() {
            self.redactions.push(secret.to_string());
        }
        self
    }

    fn mask(&self, text: &str) -> String {
        self.redactions
            .iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret, "***"))
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        write!(f, "{}", self.mask(&parts.join(" ")))
    }
}

/// Captured result of a finished invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `-1` when the process was killed by a signal.
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn ok(stdout: &str) -> Self {
        Self {
            status: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    #[must_use]
    pub fn failed(status: i32, stderr: &str) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[must_use]
    pub const fn success(&self) -> bool {
        self.status == 0
    }
}

/// Runs invocations. Everything the deployment touches outside
/// the process (git, tar, scp, ssh) goes through this seam.
pub trait Executor {
    /// Run the invocation to completion and capture its output.
    /// Only failures to start the program are errors; a non-zero
    /// exit is reported through [`CommandOutput::status`].
    fn execute(&self, invocation: &Invocation) -> DeployResult<CommandOutput>;
}

/// Spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn execute(&self, invocation: &Invocation) -> DeployResult<CommandOutput> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }

        command.stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DeployError::CommandNotFound(invocation.program.clone())
            } else {
                DeployError::Io(e)
            }
        })?;

        if let (Some(data), Some(stdin)) = (&invocation.stdin, &mut child.stdin) {
            stdin.write_all(data)?;
        }
        drop(child.stdin.take());

        let output = child.wait_with_output()?;

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Run an invocation and return its stdout. Fails if the command
/// returns a non-zero exit code.
pub fn run(executor: &dyn Executor, invocation: &Invocation) -> DeployResult<String> {
    debug!("$ {invocation}");
    let output = executor.execute(invocation)?;
    log_output(invocation, &output);

    if output.success() {
        Ok(output.stdout)
    } else {
        Err(DeployError::CommandFailed {
            command: invocation.to_string(),
            status: output.status,
            stderr: invocation.mask(&output.stderr),
        })
    }
}

/// Check if a command exists on PATH.
#[must_use]
pub fn command_exists(executor: &dyn Executor, program: &str) -> bool {
    executor
        .execute(&Invocation::new("which").arg(program))
        .is_ok_and(|out| out.success())
}

/// Log the captured streams at debug level, masked like the
/// invocation itself.
pub(crate) fn log_output(invocation: &Invocation, output: &CommandOutput) {
    for line in output_lines(invocation, output) {
        debug!("{line}");
    }
}

fn output_lines(invocation: &Invocation, output: &CommandOutput) -> Vec<String> {
    let stdout = output
        .stdout
        .lines()
        .map(|line| format!("  | {}", invocation.mask(line)));
    let stderr = output
        .stderr
        .lines()
        .map(|line| format!("  ! {}", invocation.mask(line)));
    stdout.chain(stderr).collect()
}
