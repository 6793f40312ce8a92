//! Health polling for a compose service.
//!
//! `start -> polling -> {healthy | timeout | not-found}`. Only the deadline ends polling;
//! individual inspect failures count as "not healthy yet".

use crate::compose::Compose;
use crate::error::{OpsError, Result};
use crate::poll::{poll_until, PollOutcome};
use crate::process::{CommandSpec, Executor};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(180);
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthState {
    Unknown,
    NotFound,
    Starting,
    Healthy,
    Timeout,
}

impl HealthState {
    /// Reads the output of `docker inspect --format {{.State.Health.Status}}`.
    ///
    /// Engines may wrap the value in quotes or JSON, so any occurrence of `healthy` counts.
    pub fn from_inspect(output: &str) -> Self {
        if output.contains("healthy") {
            HealthState::Healthy
        } else if output.trim().is_empty() {
            HealthState::Unknown
        } else {
            HealthState::Starting
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthState,
    pub container: String,
    pub waited_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub struct HealthWaiter<'a> {
    exec: &'a dyn Executor,
    compose: &'a Compose,
    docker_bin: &'a str,
    interval: Duration,
}

impl<'a> HealthWaiter<'a> {
    pub fn new(exec: &'a dyn Executor, compose: &'a Compose, docker_bin: &'a str) -> Self {
        Self {
            exec,
            compose,
            docker_bin,
            interval: HEALTH_POLL_INTERVAL,
        }
    }

    fn inspect_command(&self, container: &str) -> CommandSpec {
        CommandSpec::new(
            self.docker_bin,
            ["inspect", "--format", "{{.State.Health.Status}}", container],
        )
    }

    pub async fn wait(
        &self,
        project: &str,
        compose_file: Option<&str>,
        service: &str,
        timeout: Duration,
    ) -> Result<HealthReport> {
        let container = self
            .compose
            .container_id(self.exec, project, compose_file, service)
            .await?;

        if self.exec.dry_run() {
            // Nothing was started, so there is nothing to poll.
            let detail = self.exec.run(&self.inspect_command(&container)).await?;
            return Ok(HealthReport {
                status: HealthState::Unknown,
                container,
                waited_secs: 0,
                detail: Some(detail),
            });
        }

        info!(%service, %container, timeout_secs = timeout.as_secs(), "waiting for health");
        let started = tokio::time::Instant::now();
        let exec = self.exec;

        let outcome = poll_until(self.interval, timeout, || {
            let cmd = self.inspect_command(&container);
            async move {
                let out = exec.run(&cmd).await?;
                let state = HealthState::from_inspect(&out);
                debug!(?state, raw = %out.trim(), "health poll");
                Ok::<_, OpsError>((state == HealthState::Healthy).then_some(()))
            }
        })
        .await;

        let waited_secs = started.elapsed().as_secs();
        match outcome {
            PollOutcome::Ready(()) => {
                info!(%service, waited_secs, "service healthy");
                Ok(HealthReport {
                    status: HealthState::Healthy,
                    container,
                    waited_secs,
                    detail: None,
                })
            }
            PollOutcome::TimedOut | PollOutcome::Exhausted(_) => {
                warn!(%service, waited_secs, "service not healthy before deadline");
                Err(OpsError::HealthTimeout {
                    service: service.to_string(),
                    waited_secs: timeout.as_secs(),
                })
            }
        }
    }
}
