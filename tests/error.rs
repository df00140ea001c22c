use trebuchet::error::DeployError;

#[test]
fn display_command_failed() {
    let err = DeployError::CommandFailed {
        command: "docker build -t app:latest .".into(),
        status: 1,
        stderr: "boom".into(),
    };
    assert_eq!(err.to_string(), "command failed (1): docker build -t app:latest .");
}

#[test]
fn display_command_not_found() {
    let err = DeployError::CommandNotFound("docker".into());
    assert_eq!(err.to_string(), "command not found: docker");
}

#[test]
fn display_ssh_failed() {
    let err = DeployError::SshFailed("timeout".into());
    assert_eq!(err.to_string(), "SSH connection failed: timeout");
}

#[test]
fn display_prerequisite_missing() {
    let err = DeployError::PrerequisiteMissing("git".into());
    assert_eq!(err.to_string(), "prerequisite missing: git");
}

#[test]
fn display_build_descriptor_missing() {
    let err = DeployError::BuildDescriptorMissing("./app".into());
    assert_eq!(
        err.to_string(),
        "no Dockerfile or compose file found in ./app"
    );
}

#[test]
fn display_validation_failed() {
    let err = DeployError::ValidationFailed {
        url: "http://10.0.0.1/".into(),
        status: 502,
    };
    assert_eq!(err.to_string(), "validation failed: http://10.0.0.1/ returned 502");
}

#[test]
fn display_proxy_config_invalid() {
    let err = DeployError::ProxyConfigInvalid("unexpected }".into());
    assert_eq!(err.to_string(), "proxy configuration rejected: unexpected }");
}

#[test]
fn display_other() {
    let err = DeployError::Other("custom error".into());
    assert_eq!(err.to_string(), "custom error");
}

#[test]
fn from_io_error() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
    let err: DeployError = io_err.into();
    assert!(matches!(err, DeployError::Io(_)));
}

#[test]
fn from_json_error() {
    let json_err = serde_json::from_str::<Vec<u64>>("invalid").unwrap_err();
    let err: DeployError = json_err.into();
    assert!(matches!(err, DeployError::Json(_)));
}
