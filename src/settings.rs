use std::path::PathBuf;
use std::time::Duration;

/// Tunables shared by every stage of a deployment.
///
/// ```
/// use std::time::Duration;
/// use trebuchet::Settings;
///
/// let settings = Settings::new()
///     .remote_root("/srv/apps")
///     .settle_delay(Duration::from_secs(3));
///
/// assert_eq!(settings.remote_root, "/srv/apps");
/// assert_eq!(settings.server_name, "_");
/// ```
#[derive(Debug, Clone)]
pub struct Settings {
    pub workdir: PathBuf,
    pub remote_root: String,
    pub settle_delay: Duration,
    pub probe_timeout: Duration,
    pub server_name: String,
    pub container_log_lines: u32,
    pub proxy_log_lines: u32,
}

impl Settings {
    #[must_use]
    pub fn new() -> Self {
        Self {
            workdir: PathBuf::from("."),
            remote_root: "/opt/trebuchet".to_string(),
            settle_delay: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(10),
            server_name: "_".to_string(),
            container_log_lines: 50,
            proxy_log_lines: 20,
        }
    }

    #[must_use]
    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = dir.into();
        self
    }

    #[must_use]
    pub fn remote_root(mut self, root: &str) -> Self {
        self.remote_root = root.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub const fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    #[must_use]
    pub const fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    #[must_use]
    pub fn server_name(mut self, name: &str) -> Self {
        self.server_name = name.to_string();
        self
    }

    /// Container log lines fetched when the final check fails.
    #[must_use]
    pub const fn container_log_lines(mut self, lines: u32) -> Self {
        self.container_log_lines = lines;
        self
    }

    /// nginx error-log lines fetched when the final check fails.
    #[must_use]
    pub const fn proxy_log_lines(mut self, lines: u32) -> Self {
        self.proxy_log_lines = lines;
        self
    }

    /// Remote directory holding the extracted tree of a deployment.
    #[must_use]
    pub fn remote_dir(&self, id: &str) -> String {
        format!("{}/{id}", self.remote_root)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}
