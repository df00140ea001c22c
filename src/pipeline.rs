use std::fmt;
use std::thread;

use tracing::{error, info, warn};

use crate::cmd::{self, Executor, SystemExecutor};
use crate::container;
use crate::error::{DeployError, DeployResult};
use crate::nginx;
use crate::probe::{self, HttpProbe, Probe};
use crate::provision;
use crate::proxy::{self, ProxySite};
use crate::request::DeploymentRequest;
use crate::settings::Settings;
use crate::ssh::SshSession;
use crate::transfer;
use crate::workspace::LocalWorkspace;

/// Local tools the deployment shells out to.
pub const LOCAL_TOOLS: [&str; 4] = ["git", "ssh", "scp", "tar"];

/// The named steps of a deployment, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Clone,
    Provision,
    Transfer,
    Launch,
    Proxy,
    Verify,
}

impl Stage {
    pub const ALL: [Self; 7] = [
        Self::Validate,
        Self::Clone,
        Self::Provision,
        Self::Transfer,
        Self::Launch,
        Self::Proxy,
        Self::Verify,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Validate => "validate input",
            Self::Clone => "clone repository",
            Self::Provision => "provision host",
            Self::Transfer => "transfer code",
            Self::Launch => "build and run container",
            Self::Proxy => "configure reverse proxy",
            Self::Verify => "verify deployment",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Remote state collected when the final check fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub container_logs: Option<String>,
    pub proxy_errors: Option<String>,
}

#[derive(Debug)]
pub enum Outcome {
    Deployed {
        url: String,
    },
    Failed {
        stage: Stage,
        error: DeployError,
        diagnostics: Option<Diagnostics>,
    },
}

/// What a deployment run did: the stages that completed and how
/// it ended.
#[derive(Debug)]
pub struct Report {
    pub completed: Vec<Stage>,
    pub outcome: Outcome,
}

impl Report {
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.outcome, Outcome::Deployed { .. })
    }

    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        if self.success() { 0 } else { 1 }
    }

    #[must_use]
    pub const fn failed_stage(&self) -> Option<Stage> {
        match &self.outcome {
            Outcome::Failed { stage, .. } => Some(*stage),
            Outcome::Deployed { .. } => None,
        }
    }
}

/// Dry-run preview of a deployment.
#[derive(Debug, Clone)]
pub struct Plan {
    pub id: String,
    pub remote_dir: String,
    pub site_config: String,
    pub actions: Vec<String>,
}

/// Deployment pipeline: runs every [`Stage`] in order and stops at
/// the first failure. Nothing is retried or rolled back.
pub struct Pipeline {
    settings: Settings,
    executor: Box<dyn Executor>,
    probe: Box<dyn Probe>,
}

impl Pipeline {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            executor: Box::new(SystemExecutor),
            probe: Box::new(HttpProbe::new()),
        }
    }

    #[must_use]
    pub fn executor(mut self, executor: impl Executor + 'static) -> Self {
        self.executor = Box::new(executor);
        self
    }

    #[must_use]
    pub fn probe(mut self, probe: impl Probe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Deploy the request end to end.
    pub fn deploy(&self, request: &DeploymentRequest) -> Report {
        let mut run = Run::new(self, request);
        let mut completed = Vec::new();
        let total = Stage::ALL.len();

        for (index, stage) in Stage::ALL.into_iter().enumerate() {
            info!("[{}/{total}] {stage}", index + 1);

            if let Err(error) = run.stage(stage) {
                error!("Stage '{stage}' failed: {error}");
                return Report {
                    completed,
                    outcome: Outcome::Failed {
                        stage,
                        error,
                        diagnostics: run.diagnostics,
                    },
                };
            }
            completed.push(stage);
        }

        let url = run.url();
        info!("Deployment complete! Application available at: {url}");
        Report {
            completed,
            outcome: Outcome::Deployed { url },
        }
    }

    /// Describe what [`Pipeline::deploy`] would do without touching
    /// anything.
    pub fn plan(&self, request: &DeploymentRequest) -> DeployResult<Plan> {
        request.validate()?;

        let id = request.deployment_id();
        let remote_dir = self.settings.remote_dir(&id);
        let site = self.site(&id, request.port);
        let destination = format!("{}@{}", request.ssh_user, request.server);
        let workspace = self.settings.workdir.join(request.workspace_name());

        let actions = vec![
            format!(
                "Clone {} ({}) into {}",
                request.repo_url,
                request.branch,
                workspace.display()
            ),
            format!("Install docker, docker-compose and nginx on {destination} if missing"),
            format!("Replace {remote_dir} with the packaged checkout"),
            format!("Rebuild image {id}:latest and run container {id} on 127.0.0.1:{}", request.port),
            format!(
                "Install proxy site {} and reload nginx",
                site.enabled_path()
            ),
            format!("Wait {:?}, then expect 200 from http://{}/", self.settings.settle_delay, request.server),
        ];

        Ok(Plan {
            site_config: nginx::render(&site),
            id,
            remote_dir,
            actions,
        })
    }

    fn site(&self, id: &str, port: u16) -> ProxySite {
        ProxySite::new(id, port).server_name(&self.settings.server_name)
    }
}

/// State threaded between the stages of one deployment.
struct Run<'a> {
    pipeline: &'a Pipeline,
    request: &'a DeploymentRequest,
    id: String,
    remote_dir: String,
    workspace: Option<LocalWorkspace>,
    diagnostics: Option<Diagnostics>,
}

impl<'a> Run<'a> {
    fn new(pipeline: &'a Pipeline, request: &'a DeploymentRequest) -> Self {
        let id = request.deployment_id();
        let remote_dir = pipeline.settings.remote_dir(&id);
        Self {
            pipeline,
            request,
            id,
            remote_dir,
            workspace: None,
            diagnostics: None,
        }
    }

    fn stage(&mut self, stage: Stage) -> DeployResult<()> {
        match stage {
            Stage::Validate => self.validate(),
            Stage::Clone => {
                self.workspace = Some(LocalWorkspace::prepare(
                    self.executor(),
                    self.request,
                    &self.pipeline.settings,
                )?);
                Ok(())
            }
            Stage::Provision => provision::provision(&self.ssh()),
            Stage::Transfer => transfer::transfer(
                self.executor(),
                &self.ssh(),
                self.workspace()?,
                &self.id,
                &self.remote_dir,
            ),
            Stage::Launch => container::launch(
                &self.ssh(),
                self.workspace()?,
                &self.id,
                &self.remote_dir,
                self.request.port,
            ),
            Stage::Proxy => proxy::configure(
                &self.ssh(),
                &self.pipeline.site(&self.id, self.request.port),
            ),
            Stage::Verify => self.verify(),
        }
    }

    fn validate(&self) -> DeployResult<()> {
        self.request.validate()?;

        for tool in LOCAL_TOOLS {
            if !cmd::command_exists(self.executor(), tool) {
                return Err(DeployError::PrerequisiteMissing(format!(
                    "{tool} is not installed"
                )));
            }
        }

        info!(
            "Deploying {} ({}) to {}@{} as '{}' on port {}",
            self.request.repo_url,
            self.request.branch,
            self.request.ssh_user,
            self.request.server,
            self.id,
            self.request.port
        );
        Ok(())
    }

    fn verify(&mut self) -> DeployResult<()> {
        let settings = &self.pipeline.settings;

        info!("Waiting {:?} for services to settle...", settings.settle_delay);
        thread::sleep(settings.settle_delay);

        let url = format!("http://{}/", self.request.server);
        let status = self.pipeline.probe.status(&url, settings.probe_timeout);
        info!("GET {url} -> {status}");

        if probe::is_healthy(status) {
            return Ok(());
        }

        self.diagnostics = Some(self.collect_diagnostics());
        Err(DeployError::ValidationFailed { url, status })
    }

    fn collect_diagnostics(&self) -> Diagnostics {
        let settings = &self.pipeline.settings;
        let ssh = self.ssh();

        let container_logs = container::logs(
            &ssh,
            self.workspace.as_ref(),
            &self.id,
            &self.remote_dir,
            settings.container_log_lines,
        );
        let container_logs = report_section(
            &format!("last {} container log lines", settings.container_log_lines),
            container_logs,
        );

        let proxy_errors = report_section(
            &format!("last {} nginx error log lines", settings.proxy_log_lines),
            proxy::error_log(&ssh, settings.proxy_log_lines),
        );

        Diagnostics {
            container_logs,
            proxy_errors,
        }
    }

    fn url(&self) -> String {
        format!("http://{}", self.request.server)
    }

    fn executor(&self) -> &'a dyn Executor {
        self.pipeline.executor.as_ref()
    }

    fn ssh(&self) -> SshSession<'a> {
        let session = SshSession::new(self.executor(), &self.request.server, &self.request.ssh_user);
        match self.request.key_path() {
            Some(key) => session.with_key(&key.to_string_lossy()),
            None => session,
        }
    }

    fn workspace(&self) -> DeployResult<&LocalWorkspace> {
        self.workspace
            .as_ref()
            .ok_or_else(|| DeployError::Other("repository has not been cloned".into()))
    }
}

fn report_section(title: &str, fetched: DeployResult<String>) -> Option<String> {
    match fetched {
        Ok(text) => {
            warn!("--- {title} ---");
            for line in text.lines() {
                warn!("{line}");
            }
            Some(text)
        }
        Err(e) => {
            warn!("could not fetch {title}: {e}");
            None
        }
    }
}
