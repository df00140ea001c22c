//! One-shot deployment of a Git repository to a VPS.
//!
//! Trebuchet clones a repository, prepares a remote Ubuntu/Debian
//! host over SSH, ships the code, builds and runs it in Docker on
//! a loopback-only port, and puts nginx in front of it. Re-running
//! the same deployment converges to the same end state.
//!
//! # Overview
//!
//! A deployment is a [`DeploymentRequest`] handed to a
//! [`Pipeline`], which runs a fixed sequence of named
//! [`Stage`](pipeline::Stage)s and stops at the first failure:
//!
//! 1. **Validate** - check the request and local tools
//! 2. **Clone** - fresh checkout, branch, build descriptor
//!    (`Dockerfile` or compose file)
//! 3. **Provision** - install docker, docker-compose and nginx
//!    when missing, enable the services
//! 4. **Transfer** - tarball over `scp`, extracted into a fresh
//!    remote directory
//! 5. **Launch** - replace the container named after the
//!    deployment, bound to `127.0.0.1:<port>`
//! 6. **Proxy** - install the nginx site, drop the default site,
//!    `nginx -t`, reload
//! 7. **Verify** - after a settle delay, expect exactly `200` from
//!    `http://<server>/`; otherwise fetch container and nginx logs
//!
//! Every external program runs through the [`Executor`] trait and
//! the HTTP check through [`Probe`](probe::Probe), so the whole
//! pipeline can be driven by fakes in tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use trebuchet::{DeploymentRequest, Pipeline, Settings};
//!
//! let request = DeploymentRequest::new(
//!     "https://github.com/acme/web-shop.git",
//!     "203.0.113.7",
//!     3000,
//! )
//! .token("ghp_example")
//! .ssh_user("ubuntu")
//! .ssh_key("~/.ssh/id_ed25519");
//!
//! let report = Pipeline::new(Settings::new()).deploy(&request);
//! std::process::exit(i32::from(report.exit_code()));
//! ```
//!
//! Or from the command line, prompting for anything not given:
//!
//! ```sh
//! trebuchet deploy --repo https://github.com/acme/web-shop.git \
//!     --server 203.0.113.7 --user ubuntu --port 3000
//! trebuchet deploy --dry-run
//! trebuchet status web-shop --server 203.0.113.7 --port 3000
//! ```

// Allow noisy pedantic lints that don't add value for a
// deployment tool crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod cli;
pub mod cmd;
pub mod container;
pub mod error;
pub mod logging;
pub mod nginx;
pub mod pipeline;
pub mod probe;
pub mod prompt;
pub mod provision;
pub mod proxy;
pub mod request;
pub mod settings;
pub mod ssh;
pub mod transfer;
pub mod workspace;

pub use cmd::{CommandOutput, Executor, Invocation, SystemExecutor};
pub use error::{DeployError, DeployResult};
pub use pipeline::{Outcome, Pipeline, Report, Stage};
pub use probe::HttpProbe;
pub use proxy::ProxySite;
pub use request::DeploymentRequest;
pub use settings::Settings;
