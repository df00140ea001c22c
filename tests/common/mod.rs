//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use trebuchet::probe::Probe;
use trebuchet::{CommandOutput, DeploymentRequest, Executor, Invocation, Settings};

pub const SERVER: &str = "203.0.113.7";
pub const REPO: &str = "https://github.com/acme/shop.git";

pub const RUNNING: &str = r#"[{
    "Name": "/shop",
    "State": {"Status": "running", "Running": true, "RestartCount": 0},
    "HostConfig": {
        "PortBindings": {"3000/tcp": [{"HostIp": "127.0.0.1", "HostPort": "3000"}]},
        "RestartPolicy": {"Name": "always"}
    }
}]"#;

pub const EXITED: &str = r#"[{
    "Name": "/shop",
    "State": {"Status": "exited", "Running": false, "RestartCount": 3},
    "HostConfig": {"PortBindings": null}
}]"#;

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub program: String,
    pub args: Vec<String>,
    /// The redacted form that would appear in logs.
    pub display: String,
    pub stdin: Option<String>,
    pub cwd: Option<PathBuf>,
}

impl Call {
    /// The command line handed to the remote shell, for ssh calls.
    pub fn remote(&self) -> Option<&str> {
        (self.program == "ssh").then(|| self.args.last().map(String::as_str))?
    }

    pub fn joined(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    rules: Vec<(String, CommandOutput)>,
    repo_files: Vec<(String, String)>,
}

/// Records every invocation and answers from canned responses.
/// Unmatched invocations succeed with empty output. `git clone`
/// materializes the configured repository files at its target.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    state: Rc<RefCell<State>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
            .respond("'inspect'", CommandOutput::ok(RUNNING))
            .with_repo_files(&[("Dockerfile", "FROM scratch\n")])
    }

    pub fn with_repo_files(self, files: &[(&str, &str)]) -> Self {
        self.state.borrow_mut().repo_files = files
            .iter()
            .map(|(name, content)| ((*name).to_string(), (*content).to_string()))
            .collect();
        self
    }

    /// Answer invocations whose command line contains `needle`.
    /// Later rules take precedence.
    pub fn respond(self, needle: &str, output: CommandOutput) -> Self {
        self.state
            .borrow_mut()
            .rules
            .push((needle.to_string(), output));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn clear(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Remote command lines, in order.
    pub fn remote(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.remote().map(ToString::to_string))
            .collect()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.joined().contains(needle))
            .count()
    }

    /// Number of calls that ran `program` directly.
    pub fn invoked(&self, program: &str) -> usize {
        self.calls().iter().filter(|c| c.program == program).count()
    }

    /// Index of the first call containing `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.calls().iter().position(|c| c.joined().contains(needle))
    }

    fn materialize(&self, dest: &Path) {
        std::fs::create_dir_all(dest).expect("create checkout");
        for (name, content) in &self.state.borrow().repo_files {
            std::fs::write(dest.join(name), content).expect("write repo file");
        }
    }
}

impl Executor for FakeExecutor {
    fn execute(&self, invocation: &Invocation) -> trebuchet::DeployResult<CommandOutput> {
        let call = Call {
            program: invocation.program.clone(),
            args: invocation.args.clone(),
            display: invocation.to_string(),
            stdin: invocation
                .stdin
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).to_string()),
            cwd: invocation.cwd.clone(),
        };
        let joined = call.joined();

        if call.program == "git" && call.args.first().is_some_and(|a| a == "clone") {
            if let Some(dest) = call.args.last() {
                self.materialize(Path::new(dest));
            }
        }

        self.state.borrow_mut().calls.push(call);

        let state = self.state.borrow();
        let answer = state
            .rules
            .iter()
            .rev()
            .find(|(needle, _)| joined.contains(needle.as_str()))
            .map_or_else(CommandOutput::default, |(_, out)| out.clone());
        Ok(answer)
    }
}

/// Returns a fixed status and remembers the URLs it was asked for.
#[derive(Clone)]
pub struct FakeProbe {
    status: u16,
    urls: Rc<RefCell<Vec<String>>>,
}

impl FakeProbe {
    pub fn returning(status: u16) -> Self {
        Self {
            status,
            urls: Rc::default(),
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.borrow().clone()
    }
}

impl Probe for FakeProbe {
    fn status(&self, url: &str, _timeout: Duration) -> u16 {
        self.urls.borrow_mut().push(url.to_string());
        self.status
    }
}

pub fn settings(workdir: &Path) -> Settings {
    Settings::new()
        .workdir(workdir)
        .settle_delay(Duration::ZERO)
}

pub fn request() -> DeploymentRequest {
    DeploymentRequest::new(REPO, SERVER, 3000)
}
