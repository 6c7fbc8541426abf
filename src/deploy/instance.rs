use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::config::Environment;
use crate::error::{DeployError, DeployResult};
use crate::shell;
use crate::ssh::Remote;

pub const CONTAINER_LOGS_DIR: &str = "/app/logs";
pub const CONTAINER_CONFIG_FILE: &str = "/app/config/database.env";

/// How to invoke the container runtime on the host, decided once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DockerCli {
    sudo: bool,
}

impl DockerCli {
    pub fn plain() -> Self {
        Self { sudo: false }
    }

    pub fn elevated() -> Self {
        Self { sudo: true }
    }

    pub fn is_elevated(&self) -> bool {
        self.sudo
    }

    /// Probe whether the login user can talk to the daemon; fall back to sudo.
    pub async fn resolve<R: Remote + ?Sized>(remote: &R) -> DeployResult<Self> {
        if remote.exec_ok("docker info > /dev/null 2>&1").await? {
            return Ok(Self::plain());
        }
        if remote
            .exec_ok("sudo -n docker info > /dev/null 2>&1")
            .await?
        {
            info!("docker requires sudo on {}", remote.host());
            return Ok(Self::elevated());
        }
        Err(DeployError::RemoteCommand {
            host: remote.host().to_string(),
            command: "docker info".to_string(),
            exit_code: 1,
            output: "Docker daemon is not reachable, even with sudo".to_string(),
        })
    }

    /// For read-only queries, where a broken daemon shows up in the query output.
    pub async fn resolve_lenient<R: Remote + ?Sized>(remote: &R) -> DeployResult<Self> {
        match Self::resolve(remote).await {
            Err(e) if !e.is_transport() => Ok(Self::plain()),
            other => other,
        }
    }

    pub fn cmd(&self, args: &str) -> String {
        if self.sudo {
            format!("sudo docker {}", args)
        } else {
            format!("docker {}", args)
        }
    }

    /// Prints `true`/`false`; exits non-zero when no such container exists.
    pub fn inspect_running(&self, name: &str) -> String {
        self.cmd(&format!("inspect -f '{{{{.State.Running}}}}' {}", name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    Always,
}

impl RestartPolicy {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Always => "always",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    /// Remote path; `~/` is expanded by the host shell.
    pub host_path: String,
    pub container_path: String,
    pub read_only: bool,
}

/// Launch parameters of the app container. Rebuilt on every deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInstance {
    pub name: String,
    pub image_reference: String,
    pub port_map: Vec<PortMapping>,
    pub environment_variables: BTreeMap<String, String>,
    pub restart_policy: RestartPolicy,
    pub volume_mounts: Vec<VolumeMount>,
}

impl ContainerInstance {
    pub fn new(
        env: &Environment,
        image_reference: &str,
        database_url: &str,
        logs_dir: &str,
        config_file: Option<&str>,
    ) -> Self {
        let mut environment_variables = BTreeMap::new();
        environment_variables.insert("DATABASE_URL".to_string(), database_url.to_string());
        environment_variables.insert("ENVIRONMENT".to_string(), env.name.clone());

        let mut volume_mounts = vec![VolumeMount {
            host_path: logs_dir.to_string(),
            container_path: CONTAINER_LOGS_DIR.to_string(),
            read_only: false,
        }];
        if let Some(file) = config_file {
            volume_mounts.push(VolumeMount {
                host_path: file.to_string(),
                container_path: CONTAINER_CONFIG_FILE.to_string(),
                read_only: true,
            });
        }

        Self {
            name: env.container_name.clone(),
            image_reference: image_reference.to_string(),
            port_map: vec![
                PortMapping {
                    host: env.host_frontend_port,
                    container: env.frontend_container_port,
                },
                PortMapping {
                    host: env.host_backend_port,
                    container: env.backend_container_port,
                },
            ],
            environment_variables,
            restart_policy: RestartPolicy::Always,
            volume_mounts,
        }
    }

    /// Arguments to `docker`, shell-quoted for the remote side.
    pub fn run_args(&self) -> String {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            shell::quote(&self.name),
            "--restart".to_string(),
            self.restart_policy.as_str().to_string(),
        ];

        for port in &self.port_map {
            args.push("-p".to_string());
            args.push(format!("{}:{}", port.host, port.container));
        }

        for (key, value) in &self.environment_variables {
            args.push("-e".to_string());
            args.push(shell::quote(&format!("{}={}", key, value)));
        }

        for mount in &self.volume_mounts {
            args.push("-v".to_string());
            let suffix = if mount.read_only { ":ro" } else { "" };
            args.push(format!(
                "{}:{}{}",
                shell::quote_path(&mount.host_path),
                mount.container_path,
                suffix
            ));
        }

        args.push(shell::quote(&self.image_reference));
        args.join(" ")
    }
}

/// Install Docker with the upstream convenience script when it is missing.
pub async fn ensure_docker<R: Remote + ?Sized>(remote: &R) -> DeployResult<()> {
    if remote.exec_ok("command -v docker").await? {
        return Ok(());
    }

    warn!("docker not found on {}, installing", remote.host());
    remote
        .exec("curl -fsSL https://get.docker.com | sudo sh")
        .await?;
    // Takes effect on the next login; this session falls back to sudo.
    if let Err(e) = remote.exec("sudo usermod -aG docker \"$USER\"").await {
        warn!("could not add {} user to the docker group: {}", remote.host(), e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::fake::FakeRemote;
    use crate::ssh::CommandOutput;

    fn staging_instance(config_file: Option<&str>) -> ContainerInstance {
        let env = Environment::new("staging").unwrap();
        ContainerInstance::new(
            &env,
            "acme/health-message-app:v3",
            "postgresql://hmsg_user:pw@172.17.0.1:5432/health_message_db",
            "~/hmsg/logs",
            config_file,
        )
    }

    #[test]
    fn staging_launch_parameters() {
        let instance = staging_instance(None);
        assert_eq!(instance.name, "hmsg-staging");
        assert_eq!(
            instance.port_map,
            vec![
                PortMapping { host: 3000, container: 3000 },
                PortMapping { host: 8000, container: 8000 },
            ]
        );
        assert_eq!(instance.environment_variables["ENVIRONMENT"], "staging");
        assert_eq!(instance.restart_policy, RestartPolicy::Always);
        assert_eq!(instance.volume_mounts.len(), 1);
    }

    #[test]
    fn run_args_render() {
        let args = staging_instance(Some("~/.hmsg/database.env")).run_args();
        assert_eq!(
            args,
            "run -d --name hmsg-staging --restart always -p 3000:3000 -p 8000:8000 \
             -e DATABASE_URL=postgresql://hmsg_user:pw@172.17.0.1:5432/health_message_db \
             -e ENVIRONMENT=staging \
             -v \"$HOME/hmsg/logs\":/app/logs \
             -v \"$HOME/.hmsg/database.env\":/app/config/database.env:ro \
             acme/health-message-app:v3"
        );
    }

    #[test]
    fn env_values_with_metacharacters_are_quoted() {
        let env = Environment::new("production").unwrap();
        let instance = ContainerInstance::new(&env, "img", "postgresql://u:a$b@h/db", "/logs", None);
        assert!(instance
            .run_args()
            .contains("-e 'DATABASE_URL=postgresql://u:a$b@h/db'"));
        assert!(instance.run_args().contains("-p 80:3000 -p 8080:8000"));
    }

    #[test]
    fn elevated_cli_prefixes_sudo() {
        assert_eq!(DockerCli::elevated().cmd("ps"), "sudo docker ps");
        assert_eq!(DockerCli::plain().cmd("ps"), "docker ps");
        assert_eq!(
            DockerCli::plain().inspect_running("hmsg-staging"),
            "docker inspect -f '{{.State.Running}}' hmsg-staging"
        );
    }

    #[tokio::test]
    async fn resolve_falls_back_to_sudo() {
        let remote = FakeRemote::new()
            .on("sudo -n docker info", CommandOutput::ok(""))
            .on("docker info", CommandOutput::failed(1, "permission denied"));
        let docker = DockerCli::resolve(&remote).await.unwrap();
        assert!(docker.is_elevated());
    }

    #[tokio::test]
    async fn resolve_prefers_plain() {
        let remote = FakeRemote::new();
        let docker = DockerCli::resolve(&remote).await.unwrap();
        assert!(!docker.is_elevated());
        assert_eq!(remote.count("sudo"), 0);
    }

    #[tokio::test]
    async fn installs_docker_when_missing() {
        let remote = FakeRemote::new().on("command -v docker", CommandOutput::failed(1, ""));
        ensure_docker(&remote).await.unwrap();
        assert_eq!(remote.count("get.docker.com"), 1);
    }

    #[tokio::test]
    async fn docker_group_failure_is_not_fatal() {
        let remote = FakeRemote::new()
            .on("command -v docker", CommandOutput::failed(1, ""))
            .on("usermod", CommandOutput::failed(6, "usermod: group 'docker' does not exist"));
        ensure_docker(&remote).await.unwrap();
        assert_eq!(remote.count("usermod -aG docker"), 1);
    }
}
