use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::{DeployError, DeployResult};

pub const DEFAULT_BRANCH: &str = "main";

/// nginx ships a site under this name, so no deployment may take it.
pub const RESERVED_ID: &str = "default";

/// Everything needed to deploy one repository to one host.
///
/// # Example
///
/// ```
/// use trebuchet::DeploymentRequest;
///
/// let request = DeploymentRequest::new(
///     "https://github.com/acme/web-shop.git",
///     "203.0.113.7",
///     3000,
/// )
/// .ssh_user("ubuntu")
/// .ssh_key("~/.ssh/id_ed25519");
///
/// assert_eq!(request.branch, "main");
/// assert_eq!(request.workspace_name(), "web-shop");
/// assert_eq!(request.deployment_id(), "web-shop");
/// ```
#[derive(Debug)]
pub struct DeploymentRequest {
    pub repo_url: String,
    pub token: SecretString,
    pub branch: String,
    pub server: String,
    pub ssh_user: String,
    pub ssh_key: Option<String>,
    pub port: u16,
    pub name: Option<String>,
}

impl DeploymentRequest {
    #[must_use]
    pub fn new(repo_url: &str, server: &str, port: u16) -> Self {
        Self {
            repo_url: repo_url.trim().to_string(),
            token: SecretString::from(String::new()),
            branch: DEFAULT_BRANCH.to_string(),
            server: server.trim().to_string(),
            ssh_user: "root".to_string(),
            ssh_key: None,
            port,
            name: None,
        }
    }

    #[must_use]
    pub fn token(mut self, token: &str) -> Self {
        self.token = SecretString::from(token.trim().to_string());
        self
    }

    /// Set the branch to deploy. A blank value keeps `main`.
    #[must_use]
    pub fn branch(mut self, branch: &str) -> Self {
        let branch = branch.trim();
        self.branch = if branch.is_empty() {
            DEFAULT_BRANCH.to_string()
        } else {
            branch.to_string()
        };
        self
    }

    #[must_use]
    pub fn ssh_user(mut self, user: &str) -> Self {
        self.ssh_user = user.trim().to_string();
        self
    }

    #[must_use]
    pub fn ssh_key(mut self, path: &str) -> Self {
        self.ssh_key = Some(path.trim().to_string());
        self
    }

    /// Override the deployment identifier, which otherwise comes
    /// from the repository name.
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.trim().to_string());
        self
    }

    /// Name of the local checkout directory.
    #[must_use]
    pub fn workspace_name(&self) -> String {
        workspace_name(&self.repo_url)
    }

    /// Identifier used for the container, image, remote tree and
    /// proxy site. Distinct ids can share one host.
    #[must_use]
    pub fn deployment_id(&self) -> String {
        let base = self
            .name
            .as_deref()
            .filter(|n| !n.is_empty())
            .map_or_else(|| self.workspace_name(), ToString::to_string);
        sanitize_id(&base)
    }

    /// The clone URL with the access token embedded as user-info.
    /// Without a token the URL is returned unchanged.
    pub fn authenticated_url(&self) -> DeployResult<String> {
        let token = self.token.expose_secret();
        if token.is_empty() {
            return Ok(self.repo_url.clone());
        }

        let mut url = Url::parse(&self.repo_url).map_err(|e| {
            DeployError::InvalidInput(format!("repository URL {}: {e}", self.repo_url))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(DeployError::InvalidInput(format!(
                "an access token requires an http(s) repository URL, got {}",
                self.repo_url
            )));
        }

        url.set_username(token)
            .and_then(|()| url.set_password(None))
            .map_err(|()| {
                DeployError::InvalidInput(format!(
                    "cannot embed credentials in {}",
                    self.repo_url
                ))
            })?;

        Ok(url.to_string())
    }

    /// Resolved path of the SSH private key, with `~` expanded.
    #[must_use]
    pub fn key_path(&self) -> Option<PathBuf> {
        self.ssh_key.as_deref().map(expand_home)
    }

    /// Reject requests that cannot possibly succeed.
    pub fn validate(&self) -> DeployResult<()> {
        if self.repo_url.is_empty() {
            return Err(DeployError::InvalidInput("repository URL is empty".into()));
        }
        if !is_plain_dir_name(&self.workspace_name()) {
            return Err(DeployError::InvalidInput(format!(
                "cannot derive a checkout directory from {}",
                self.repo_url
            )));
        }
        let id = self.deployment_id();
        if id.len() < 2 {
            return Err(DeployError::InvalidInput(format!(
                "deployment name '{id}' must have at least two characters"
            )));
        }
        if id == RESERVED_ID {
            return Err(DeployError::InvalidInput(format!(
                "deployment name '{RESERVED_ID}' is taken by nginx's stock site"
            )));
        }
        if self.server.is_empty() {
            return Err(DeployError::InvalidInput("server address is empty".into()));
        }
        if self.ssh_user.is_empty() {
            return Err(DeployError::InvalidInput("SSH user is empty".into()));
        }
        if self.port == 0 {
            return Err(DeployError::InvalidInput("application port must be 1-65535".into()));
        }
        if let Some(key) = self.key_path() {
            if !key.is_file() {
                return Err(DeployError::FileNotFound(key.display().to_string()));
            }
        }
        Ok(())
    }
}

/// Derive the checkout directory name from a repository URL: the
/// last path segment with one trailing `.git` removed.
///
/// ```
/// use trebuchet::request::workspace_name;
///
/// assert_eq!(workspace_name("https://github.com/org/app.git"), "app");
/// assert_eq!(workspace_name("https://github.com/org/app"), "app");
/// assert_eq!(workspace_name("git@github.com:org/tool.git"), "tool");
/// ```
#[must_use]
pub fn workspace_name(repo_url: &str) -> String {
    let trimmed = repo_url.trim().trim_end_matches('/');
    let last = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

const ID_SEPARATORS: [char; 3] = ['.', '-', '_'];

/// Lowercase, map anything outside `[a-z0-9_.-]` to `-`, keep one
/// separator per run, and trim separators from both ends. The
/// result satisfies both the container-name and the image
/// repository grammar.
fn sanitize_id(raw: &str) -> String {
    let mut id = String::with_capacity(raw.len());
    for c in raw.to_lowercase().chars() {
        let c = if c.is_ascii_alphanumeric() || ID_SEPARATORS.contains(&c) {
            c
        } else {
            '-'
        };
        if ID_SEPARATORS.contains(&c) && id.ends_with(ID_SEPARATORS) {
            continue;
        }
        id.push(c);
    }
    id.trim_matches(ID_SEPARATORS).to_string()
}

/// A single, real directory component: the clean-slate step
/// deletes `workdir/<name>`.
fn is_plain_dir_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
