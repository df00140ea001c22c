pub type DeployResult<T> = Result<T, DeployError>;

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("command failed ({status}): {command}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("SSH connection failed: {0}")]
    SshFailed(String),

    #[error("prerequisite missing: {0}")]
    PrerequisiteMissing(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("no Dockerfile or compose file found in {0}")]
    BuildDescriptorMissing(String),

    #[error("invalid compose file {path}: {reason}")]
    InvalidCompose { path: String, reason: String },

    #[error("container '{0}' is not running")]
    ContainerNotRunning(String),

    #[error("proxy configuration rejected: {0}")]
    ProxyConfigInvalid(String),

    #[error("validation failed: {url} returned {status}")]
    ValidationFailed { url: String, status: u16 },

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
