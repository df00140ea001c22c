use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use crate::cmd::SystemExecutor;
use crate::container;
use crate::logging;
use crate::pipeline::Pipeline;
use crate::prompt::{InteractiveFlow, PrefilledRequest};
use crate::proxy;
use crate::settings::Settings;
use crate::ssh::SshSession;

#[derive(Parser)]
#[command(name = "trebuchet")]
#[command(version, about = "Deploy a Git repository to a server behind nginx")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory for the per-run log file
    #[arg(long, env = "TREBUCHET_LOG_DIR", default_value = ".", global = true)]
    log_dir: PathBuf,

    /// Log every command and its output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Clone, ship, build, run, and proxy an application
    Deploy(DeployArgs),

    /// Show the state of a deployed container
    Status(StatusArgs),
}

#[derive(Args)]
struct DeployArgs {
    /// Git repository URL
    #[arg(long, env = "TREBUCHET_REPO")]
    repo: Option<String>,

    /// Access token for private repositories
    #[arg(long, env = "TREBUCHET_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Branch to deploy [default: main]
    #[arg(long, env = "TREBUCHET_BRANCH")]
    branch: Option<String>,

    #[command(flatten)]
    target: TargetArgs,

    /// Port the application listens on
    #[arg(long, env = "TREBUCHET_PORT")]
    port: Option<u16>,

    /// Deployment name [default: repository name]
    #[arg(long, env = "TREBUCHET_NAME")]
    name: Option<String>,

    /// Fail instead of prompting for missing parameters
    #[arg(long)]
    no_input: bool,

    /// Preview the deployment without executing it
    #[arg(long)]
    dry_run: bool,

    /// Local directory the repository is cloned into
    #[arg(long, env = "TREBUCHET_WORKDIR", default_value = ".")]
    workdir: PathBuf,

    /// Remote directory holding deployed trees
    #[arg(long, env = "TREBUCHET_REMOTE_ROOT", default_value = "/opt/trebuchet")]
    remote_root: String,

    /// Seconds to wait before the final HTTP check
    #[arg(long, env = "TREBUCHET_SETTLE_SECS", default_value_t = 10)]
    settle_secs: u64,

    /// Seconds to wait for the final HTTP response
    #[arg(long, env = "TREBUCHET_PROBE_TIMEOUT_SECS", default_value_t = 10)]
    probe_timeout_secs: u64,

    /// nginx server_name for the site
    #[arg(long, env = "TREBUCHET_SERVER_NAME", default_value = "_")]
    server_name: String,

    /// Container log lines shown when the deployment fails its check
    #[arg(long, env = "TREBUCHET_CONTAINER_LOG_LINES", default_value_t = 50)]
    container_log_lines: u32,

    /// nginx error-log lines shown when the deployment fails its check
    #[arg(long, env = "TREBUCHET_PROXY_LOG_LINES", default_value_t = 20)]
    proxy_log_lines: u32,
}

#[derive(Args)]
struct TargetArgs {
    /// Server IP address or hostname
    #[arg(long, env = "TREBUCHET_SERVER")]
    server: Option<String>,

    /// SSH username
    #[arg(long, env = "TREBUCHET_USER")]
    user: Option<String>,

    /// Path to the SSH private key
    #[arg(long, env = "TREBUCHET_KEY")]
    key: Option<String>,
}

#[derive(Args)]
struct StatusArgs {
    /// Deployment name
    name: String,

    /// Application port, to check its loopback binding
    #[arg(long)]
    port: Option<u16>,

    #[command(flatten)]
    target: TargetArgs,
}

/// Parse CLI arguments and dispatch the appropriate command.
#[must_use]
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let log = match logging::init(&cli.log_dir, cli.verbose) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    info!("Logging to {}", log.path.display());

    let result = match cli.command {
        Command::Deploy(args) => cmd_deploy(args),
        Command::Status(args) => cmd_status(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn settings(args: &DeployArgs) -> Settings {
    Settings::new()
        .workdir(&args.workdir)
        .remote_root(&args.remote_root)
        .settle_delay(Duration::from_secs(args.settle_secs))
        .probe_timeout(Duration::from_secs(args.probe_timeout_secs))
        .server_name(&args.server_name)
        .container_log_lines(args.container_log_lines)
        .proxy_log_lines(args.proxy_log_lines)
}

fn cmd_deploy(args: DeployArgs) -> Result<u8> {
    let settings = settings(&args);

    let prefilled = PrefilledRequest {
        repo_url: args.repo,
        token: args.token,
        branch: args.branch,
        server: args.target.server,
        ssh_user: args.target.user,
        ssh_key: args.target.key,
        port: args.port,
        name: args.name,
    };

    let request = if args.no_input {
        prefilled.into_request()?
    } else {
        InteractiveFlow::new(prefilled)
            .collect()
            .context("failed to collect deployment parameters")?
    };

    let pipeline = Pipeline::new(settings);

    if args.dry_run {
        let plan = pipeline.plan(&request)?;

        eprintln!("=== Dry run: no changes will be made ===");
        eprintln!();
        eprintln!("--- {}/{} ---", proxy::SITES_AVAILABLE, plan.id);
        println!("{}", plan.site_config);
        eprintln!("--- Actions that would be performed ---");
        for (i, action) in plan.actions.iter().enumerate() {
            eprintln!("{}. {action}", i + 1);
        }
        return Ok(0);
    }

    Ok(pipeline.deploy(&request).exit_code())
}

fn cmd_status(args: &StatusArgs) -> Result<u8> {
    let server = args
        .target
        .server
        .as_deref()
        .context("--server is required")?;
    let user = args.target.user.as_deref().unwrap_or("root");

    let executor = SystemExecutor;
    let mut ssh = SshSession::new(&executor, server, user);
    if let Some(key) = &args.target.key {
        ssh = ssh.with_key(key);
    }

    let Some(info) = container::inspect(&ssh, &args.name)? else {
        error!("No container named '{}' on {server}", args.name);
        return Ok(1);
    };

    println!("name:     {}", info.name.trim_start_matches('/'));
    println!("status:   {}", info.state.status);
    println!("restarts: {}", info.state.restart_count);
    println!("policy:   {}", info.restart_policy().unwrap_or("none"));

    if let Some(port) = args.port {
        let bound = info.bound_to_loopback(port);
        println!("127.0.0.1:{port}: {}", if bound { "bound" } else { "NOT bound" });
        if !bound {
            return Ok(1);
        }
    }

    Ok(u8::from(!info.state.running))
}
