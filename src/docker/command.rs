//! Builds the `docker` command lines sent to a managed host.
//!
//! Every interpolated value goes through [`quote`], so user-supplied names,
//! images, port mappings, environment entries and extra arguments cannot
//! escape into the remote shell.

use std::collections::BTreeMap;
use std::fmt;

/// Parameters for `docker run`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSpec {
    pub name: String,
    pub image: String,
    /// Comma separated `host:container` mappings, e.g. `80:80,443:443`.
    pub ports: Option<String>,
    pub env: BTreeMap<String, String>,
    /// Whitespace separated extra `docker run` arguments. Each token is quoted
    /// individually.
    pub extra_args: Option<String>,
}

impl RunSpec {
    pub fn port_mappings(&self) -> Vec<&str> {
        self.ports
            .as_deref()
            .map(|ports| {
                ports
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerAction {
    Start,
    Stop,
    Restart,
}

impl ContainerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerAction::Start => "start",
            ContainerAction::Stop => "stop",
            ContainerAction::Restart => "restart",
        }
    }

    /// The status recorded once the action has succeeded remotely.
    pub fn resulting_status(&self) -> &'static str {
        match self {
            ContainerAction::Start | ContainerAction::Restart => "running",
            ContainerAction::Stop => "exited",
        }
    }

    /// Progressive form used in API acknowledgements.
    pub fn progress_label(&self) -> &'static str {
        match self {
            ContainerAction::Start => "starting",
            ContainerAction::Stop => "stopping",
            ContainerAction::Restart => "restarting",
        }
    }
}

impl fmt::Display for ContainerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContainerAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(ContainerAction::Start),
            "stop" => Ok(ContainerAction::Stop),
            "restart" => Ok(ContainerAction::Restart),
            other => Err(format!("Unknown container action: {other}")),
        }
    }
}

/// POSIX shell quoting. Tokens made only of safe characters pass through
/// unchanged; anything else is wrapped in single quotes with embedded single
/// quotes rewritten as `'"'"'`.
pub fn quote(token: &str) -> String {
    let is_safe = |c: char| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c);
    if !token.is_empty() && token.chars().all(is_safe) {
        return token.to_string();
    }
    format!("'{}'", token.replace('\'', r#"'"'"'"#))
}

/// Lists every container, stopped ones included, one JSON object per line.
pub fn list_all() -> String {
    "docker ps -a --format '{{json .}}'".to_string()
}

pub fn control(action: ContainerAction, docker_id: &str) -> String {
    format!("docker {} {}", action.as_str(), quote(docker_id))
}

/// Best-effort stop, then an unconditional remove. The exit status is that
/// of `docker rm`, so an already stopped container is still removed.
pub fn remove(docker_id: &str) -> String {
    let id = quote(docker_id);
    format!("docker stop {id} >/dev/null 2>&1; docker rm {id}")
}

/// Force removal used to undo a create whose database write failed.
pub fn force_remove(docker_id: &str) -> String {
    format!("docker rm -f {}", quote(docker_id))
}

/// `docker run -d --name <name> [-p ..]* [-e K=V]* [extra..]* <image>`
pub fn run(spec: &RunSpec) -> String {
    let mut parts = vec![
        "docker".to_string(),
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        quote(&spec.name),
    ];

    for mapping in spec.port_mappings() {
        parts.push("-p".to_string());
        parts.push(quote(mapping));
    }

    for (key, value) in &spec.env {
        parts.push("-e".to_string());
        parts.push(quote(&format!("{key}={value}")));
    }

    if let Some(extra) = &spec.extra_args {
        parts.extend(extra.split_whitespace().map(quote));
    }

    parts.push(quote(&spec.image));
    parts.join(" ")
}
