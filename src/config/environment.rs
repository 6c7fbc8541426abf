use crate::error::{DeployError, DeployResult};

pub const FRONTEND_CONTAINER_PORT: u16 = 3000;
pub const BACKEND_CONTAINER_PORT: u16 = 8000;

/// A named deployment environment. Naming and ports derive purely from `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub name: String,
    pub container_name: String,
    pub frontend_container_port: u16,
    pub backend_container_port: u16,
    pub host_frontend_port: u16,
    pub host_backend_port: u16,
}

/// Host (frontend, backend) ports for an environment name.
pub fn default_host_ports(name: &str) -> (u16, u16) {
    match name {
        "production" => (80, 8080),
        _ => (FRONTEND_CONTAINER_PORT, BACKEND_CONTAINER_PORT),
    }
}

pub fn container_name(name: &str) -> String {
    format!("hmsg-{}", name)
}

impl Environment {
    pub fn new(name: &str) -> DeployResult<Self> {
        Self::with_ports(name, None, None)
    }

    pub fn with_ports(
        name: &str,
        host_frontend_port: Option<u16>,
        host_backend_port: Option<u16>,
    ) -> DeployResult<Self> {
        // Same alphabet Docker accepts for container names.
        let valid = name.starts_with(|c: char| c.is_ascii_alphanumeric())
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
        if !valid {
            return Err(DeployError::Invalid(format!(
                "environment '{}' must start with a letter or digit and contain only letters, digits, '_', '.' and '-'",
                name
            )));
        }

        let (frontend, backend) = default_host_ports(name);
        let host_frontend_port = host_frontend_port.unwrap_or(frontend);
        let host_backend_port = host_backend_port.unwrap_or(backend);

        if host_frontend_port == host_backend_port {
            return Err(DeployError::Invalid(format!(
                "frontend and backend cannot share host port {}",
                host_frontend_port
            )));
        }

        Ok(Self {
            name: name.to_string(),
            container_name: container_name(name),
            frontend_container_port: FRONTEND_CONTAINER_PORT,
            backend_container_port: BACKEND_CONTAINER_PORT,
            host_frontend_port,
            host_backend_port,
        })
    }

    pub fn frontend_url(&self, host: &str) -> String {
        url_for(host, self.host_frontend_port)
    }

    pub fn backend_url(&self, host: &str) -> String {
        url_for(host, self.host_backend_port)
    }
}

fn url_for(host: &str, port: u16) -> String {
    if port == 80 {
        format!("http://{}", host)
    } else {
        format!("http://{}:{}", host, port)
    }
}
