//! Interactive collection of deployment parameters.
//!
//! Values already supplied on the command line or through the
//! environment are used as-is; only the missing ones are asked
//! for. Uses dialoguer for terminal prompts.

use anyhow::{Result, bail};
use dialoguer::{Input, Password, theme::ColorfulTheme};

use crate::request::{DEFAULT_BRANCH, DeploymentRequest};

/// Parameters known before prompting.
#[derive(Debug, Clone, Default)]
pub struct PrefilledRequest {
    pub repo_url: Option<String>,
    pub token: Option<String>,
    pub branch: Option<String>,
    pub server: Option<String>,
    pub ssh_user: Option<String>,
    pub ssh_key: Option<String>,
    pub port: Option<u16>,
    pub name: Option<String>,
}

impl PrefilledRequest {
    /// Build the request without prompting. Fails when a required
    /// value is missing.
    pub fn into_request(self) -> Result<DeploymentRequest> {
        let mut missing = Vec::new();
        if self.repo_url.is_none() {
            missing.push("--repo");
        }
        if self.server.is_none() {
            missing.push("--server");
        }
        if self.port.is_none() {
            missing.push("--port");
        }
        if !missing.is_empty() {
            bail!("missing required parameters: {}", missing.join(", "));
        }

        let Self {
            repo_url,
            token,
            branch,
            server,
            ssh_user,
            ssh_key,
            port,
            name,
        } = self;

        let mut request = DeploymentRequest::new(
            &repo_url.unwrap_or_default(),
            &server.unwrap_or_default(),
            port.unwrap_or_default(),
        )
        .branch(branch.as_deref().unwrap_or(DEFAULT_BRANCH));

        if let Some(token) = token {
            request = request.token(&token);
        }
        if let Some(user) = ssh_user {
            request = request.ssh_user(&user);
        }
        if let Some(key) = ssh_key.filter(|k| !k.trim().is_empty()) {
            request = request.ssh_key(&key);
        }
        if let Some(name) = name {
            request = request.name(&name);
        }
        Ok(request)
    }
}

/// Prompts for whatever the [`PrefilledRequest`] lacks.
pub struct InteractiveFlow {
    prefilled: PrefilledRequest,
    theme: ColorfulTheme,
}

impl InteractiveFlow {
    #[must_use]
    pub fn new(prefilled: PrefilledRequest) -> Self {
        Self {
            prefilled,
            theme: ColorfulTheme::default(),
        }
    }

    /// Ask for the missing parameters, in the order an operator
    /// would think of them.
    pub fn collect(mut self) -> Result<DeploymentRequest> {
        if self.prefilled.repo_url.is_none() {
            self.prefilled.repo_url = Some(self.text("Git repository URL", None, false)?);
        }
        if self.prefilled.token.is_none() {
            self.prefilled.token = Some(
                Password::with_theme(&self.theme)
                    .with_prompt("Access token (leave empty for public repositories)")
                    .allow_empty_password(true)
                    .interact()?,
            );
        }
        if self.prefilled.branch.is_none() {
            self.prefilled.branch = Some(self.text("Branch", Some(DEFAULT_BRANCH), true)?);
        }
        if self.prefilled.server.is_none() {
            self.prefilled.server = Some(self.text("Server IP or hostname", None, false)?);
        }
        if self.prefilled.ssh_user.is_none() {
            self.prefilled.ssh_user = Some(self.text("SSH username", Some("root"), false)?);
        }
        if self.prefilled.ssh_key.is_none() {
            self.prefilled.ssh_key = Some(self.text("Path to SSH private key (empty for agent)", None, true)?);
        }
        if self.prefilled.port.is_none() {
            self.prefilled.port = Some(
                Input::<u16>::with_theme(&self.theme)
                    .with_prompt("Application port")
                    .validate_with(|port: &u16| {
                        if *port == 0 {
                            Err("port must be between 1 and 65535")
                        } else {
                            Ok(())
                        }
                    })
                    .interact_text()?,
            );
        }

        self.prefilled.into_request()
    }

    fn text(&self, prompt: &str, default: Option<&str>, allow_empty: bool) -> Result<String> {
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(allow_empty);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        Ok(input.interact_text()?.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> PrefilledRequest {
        PrefilledRequest {
            repo_url: Some("https://github.com/acme/api.git".into()),
            server: Some("198.51.100.4".into()),
            port: Some(8080),
            ..PrefilledRequest::default()
        }
    }

    #[test]
    fn missing_branch_resolves_to_main() {
        let request = complete().into_request().unwrap();

        assert_eq!(request.branch, "main");
        assert_eq!(request.ssh_user, "root");
        assert!(request.ssh_key.is_none());
    }

    #[test]
    fn empty_key_means_agent() {
        let request = PrefilledRequest {
            ssh_key: Some("  ".into()),
            ..complete()
        }
        .into_request()
        .unwrap();

        assert!(request.ssh_key.is_none());
    }

    #[test]
    fn missing_required_values_listed() {
        let err = PrefilledRequest::default().into_request().unwrap_err();

        assert_eq!(
            err.to_string(),
            "missing required parameters: --repo, --server, --port"
        );
    }

    #[test]
    fn prefilled_values_carried_over() {
        let request = PrefilledRequest {
            branch: Some("release".into()),
            ssh_user: Some("deploy".into()),
            name: Some("api-prod".into()),
            ..complete()
        }
        .into_request()
        .unwrap();

        assert_eq!(request.branch, "release");
        assert_eq!(request.ssh_user, "deploy");
        assert_eq!(request.deployment_id(), "api-prod");
        assert_eq!(request.port, 8080);
    }
}
