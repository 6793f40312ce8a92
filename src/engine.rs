use crate::config::Config;
use crate::error::{OpsError, Result};
use crate::poll::{poll_until, PollOutcome};
use crate::process::{CommandSpec, Executor};
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{info, warn};

pub const ENGINE_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const ENGINE_START_DEADLINE: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Engine already answered.
    Ok,
    /// Engine answered after the bootstrapper started it.
    Started,
}

/// Makes sure the docker daemon answers, starting the VM-backed engine if needed.
///
/// Assumes a single caller at a time; two concurrent recoveries would both run `start`.
pub async fn ensure_engine_ready(exec: &dyn Executor, cfg: &Config) -> Result<EngineStatus> {
    let docker = cfg.docker_bin.as_str();
    let bootstrapper = cfg.engine_bootstrapper.as_str();

    if exec.probe(docker, &["info"]).await {
        return Ok(EngineStatus::Ok);
    }

    if !exec.probe(bootstrapper, &["version"]).await {
        return Err(OpsError::EngineUnavailable {
            bootstrapper: bootstrapper.to_string(),
        });
    }

    warn!(bootstrapper, "docker daemon not reachable, starting engine");
    exec.run(&CommandSpec::new(bootstrapper, ["start"])).await?;

    let outcome: PollOutcome<(), Infallible> =
        poll_until(ENGINE_POLL_INTERVAL, ENGINE_START_DEADLINE, move || async move {
            Ok(exec.probe(docker, &["info"]).await.then_some(()))
        })
        .await;

    if outcome.is_ready() {
        info!(bootstrapper, "docker daemon is up");
        Ok(EngineStatus::Started)
    } else {
        Err(OpsError::EngineStartTimeout {
            bootstrapper: bootstrapper.to_string(),
            waited_secs: ENGINE_START_DEADLINE.as_secs(),
        })
    }
}
