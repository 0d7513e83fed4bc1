//! Docker control over an SSH executor.

pub mod command;
pub mod parser;
pub mod sync;

use std::sync::Arc;

use crate::ssh::{RemoteError, RemoteExecutor, SshTarget};

pub use command::{ContainerAction, RunSpec};
pub use parser::{RemoteContainer, parse_ps_output};
pub use sync::{SyncReport, reconcile, short_id};

/// Thin adapter turning container operations into remote `docker` invocations.
#[derive(Clone)]
pub struct DockerClient {
    executor: Arc<dyn RemoteExecutor>,
}

impl DockerClient {
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { executor }
    }

    /// Raw `docker ps -a` JSON lines; see [`parse_ps_output`].
    pub async fn list_all(&self, target: &SshTarget) -> Result<String, RemoteError> {
        self.executor.run(target, &command::list_all()).await
    }

    /// Runs a container and returns its short engine id.
    pub async fn create(&self, target: &SshTarget, spec: &RunSpec) -> Result<String, RemoteError> {
        let output = self.executor.run(target, &command::run(spec)).await?;
        // `docker run -d` may print pull progress before the id; the id is the last line.
        let engine_id = output.lines().last().unwrap_or_default().trim();
        Ok(short_id(engine_id))
    }

    pub async fn control(
        &self,
        target: &SshTarget,
        action: ContainerAction,
        docker_id: &str,
    ) -> Result<(), RemoteError> {
        self.executor
            .run(target, &command::control(action, docker_id))
            .await
            .map(|_| ())
    }

    pub async fn start(&self, target: &SshTarget, docker_id: &str) -> Result<(), RemoteError> {
        self.control(target, ContainerAction::Start, docker_id).await
    }

    pub async fn stop(&self, target: &SshTarget, docker_id: &str) -> Result<(), RemoteError> {
        self.control(target, ContainerAction::Stop, docker_id).await
    }

    pub async fn restart(&self, target: &SshTarget, docker_id: &str) -> Result<(), RemoteError> {
        self.control(target, ContainerAction::Restart, docker_id).await
    }

    /// Stops (ignoring failure) then removes, in one command line.
    pub async fn remove(&self, target: &SshTarget, docker_id: &str) -> Result<(), RemoteError> {
        self.executor
            .run(target, &command::remove(docker_id))
            .await
            .map(|_| ())
    }

    pub async fn force_remove(&self, target: &SshTarget, docker_id: &str) -> Result<(), RemoteError> {
        self.executor
            .run(target, &command::force_remove(docker_id))
            .await
            .map(|_| ())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{ScriptedExecutor, failed};
    use super::*;

    fn target() -> SshTarget {
        SshTarget {
            host: "h".to_string(),
            port: 22,
            username: "u".to_string(),
            private_key: "k".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_returns_short_id_from_last_line() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.reply_ok(
            "Unable to find image 'nginx:latest' locally\nlatest: Pulling from library/nginx\n3f4e8a1b2c9d7e6f5a4b3c2d1e0f\n",
        );
        let client = DockerClient::new(executor.clone());

        let spec = RunSpec {
            name: "web".to_string(),
            image: "nginx:latest".to_string(),
            ..Default::default()
        };
        let id = client.create(&target(), &spec).await.unwrap();

        assert_eq!(id, "3f4e8a1b2c9d");
        assert_eq!(executor.commands(), vec!["docker run -d --name web nginx:latest"]);
    }

    #[tokio::test]
    async fn test_control_surfaces_remote_failure() {
        let executor = Arc::new(ScriptedExecutor::new());
        executor.reply_err(failed("Error: No such container: abc"));
        let client = DockerClient::new(executor.clone());

        let err = client.stop(&target(), "abc").await.unwrap_err();

        assert!(err.to_string().contains("No such container"));
        assert_eq!(executor.commands(), vec!["docker stop abc"]);
    }

    #[tokio::test]
    async fn test_remove_and_restart_commands() {
        let executor = Arc::new(ScriptedExecutor::new());
        let client = DockerClient::new(executor.clone());

        client.restart(&target(), "abc").await.unwrap();
        client.start(&target(), "abc").await.unwrap();
        client.remove(&target(), "abc").await.unwrap();
        client.force_remove(&target(), "abc").await.unwrap();

        assert_eq!(
            executor.commands(),
            vec![
                "docker restart abc",
                "docker start abc",
                "docker stop abc >/dev/null 2>&1; docker rm abc",
                "docker rm -f abc",
            ]
        );
    }
}
