use tracing::info;

use crate::error::{DeployError, DeployResult};
use crate::nginx;
use crate::request::RESERVED_ID;
use crate::ssh::{RemoteCommand, SshSession};

pub const SITES_AVAILABLE: &str = "/etc/nginx/sites-available";
pub const SITES_ENABLED: &str = "/etc/nginx/sites-enabled";
pub const ERROR_LOG: &str = "/var/log/nginx/error.log";

/// A reverse-proxy site routing public traffic to an app bound on
/// loopback.
///
/// # Example
///
/// ```
/// use trebuchet::ProxySite;
///
/// let site = ProxySite::new("shop", 3000).server_name("shop.example.com");
///
/// assert_eq!(site.listen, 80);
/// assert_eq!(site.upstream(), "http://127.0.0.1:3000");
/// assert_eq!(site.headers.len(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct ProxySite {
    pub name: String,
    pub server_name: String,
    pub listen: u16,
    pub upstream_port: u16,
    pub headers: Vec<(String, String)>,
}

impl ProxySite {
    #[must_use]
    pub fn new(name: &str, upstream_port: u16) -> Self {
        Self {
            name: name.to_string(),
            server_name: "_".to_string(),
            listen: 80,
            upstream_port,
            headers: vec![
                ("Host".to_string(), "$host".to_string()),
                ("X-Real-IP".to_string(), "$remote_addr".to_string()),
                (
                    "X-Forwarded-For".to_string(),
                    "$proxy_add_x_forwarded_for".to_string(),
                ),
                ("X-Forwarded-Proto".to_string(), "$scheme".to_string()),
            ],
        }
    }

    #[must_use]
    pub fn server_name(mut self, name: &str) -> Self {
        self.server_name = name.to_string();
        self
    }

    #[must_use]
    pub const fn listen(mut self, port: u16) -> Self {
        self.listen = port;
        self
    }

    /// Forward an extra header to the upstream.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn upstream(&self) -> String {
        format!("http://127.0.0.1:{}", self.upstream_port)
    }

    #[must_use]
    pub fn available_path(&self) -> String {
        format!("{SITES_AVAILABLE}/{}", self.name)
    }

    #[must_use]
    pub fn enabled_path(&self) -> String {
        format!("{SITES_ENABLED}/{}", self.name)
    }
}

/// Install the site, drop nginx's default site, and reload. A
/// config that fails `nginx -t` is never reloaded.
pub fn configure(ssh: &SshSession<'_>, site: &ProxySite) -> DeployResult<()> {
    if site.name == RESERVED_ID {
        return Err(DeployError::InvalidInput(format!(
            "proxy site name '{RESERVED_ID}' would replace nginx's stock site"
        )));
    }
    let content = nginx::render(site);

    info!("Writing proxy site {}...", site.available_path());
    ssh.write_remote_file(&content, &site.available_path(), true)?;

    // drop the stock site before enabling ours
    ssh.run(
        &RemoteCommand::new("rm")
            .args(["-f", &format!("{SITES_ENABLED}/{RESERVED_ID}")])
            .sudo(),
    )?;
    ssh.run(
        &RemoteCommand::new("ln")
            .args(["-sfn", &site.available_path(), &site.enabled_path()])
            .sudo(),
    )?;

    info!("Validating nginx configuration...");
    ssh.run(&RemoteCommand::new("nginx").arg("-t").sudo())
        .map_err(|e| match e {
            DeployError::CommandFailed { stderr, .. } => DeployError::ProxyConfigInvalid(stderr),
            other => other,
        })?;

    info!("Reloading nginx...");
    ssh.run(
        &RemoteCommand::new("systemctl")
            .args(["reload", "nginx"])
            .sudo(),
    )?;

    Ok(())
}

/// Last `lines` lines of the nginx error log.
pub fn error_log(ssh: &SshSession<'_>, lines: u32) -> DeployResult<String> {
    let output = ssh.run(
        &RemoteCommand::new("tail")
            .args(["-n", &lines.to_string(), ERROR_LOG])
            .sudo(),
    )?;
    Ok(output.stdout)
}
