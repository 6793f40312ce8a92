use super::{require_file, Toolbox};
use crate::error::Result;
use crate::health::{HealthWaiter, DEFAULT_HEALTH_TIMEOUT};
use crate::process::CommandSpec;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_LOG_TAIL: u64 = 200;

/// Any JSON number, since models send `60.0` as readily as `60`. Negatives become 0.
fn lenient_count<'de, D>(d: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let n = Option::<serde_json::Number>::deserialize(d)?;
    Ok(n.and_then(|n| n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))))
}

#[derive(Debug, Deserialize)]
pub(super) struct UpArgs {
    project: String,
    compose_file: String,
    #[serde(default)]
    build: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct DownArgs {
    project: String,
    compose_file: String,
    remove_volumes: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WaitArgs {
    project: String,
    service: String,
    #[serde(default, deserialize_with = "lenient_count")]
    timeout_sec: Option<u64>,
    compose_file: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LogsArgs {
    project: String,
    service: String,
    compose_file: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    tail: Option<u64>,
}

impl Toolbox {
    pub(super) async fn compose_up(&self, a: UpArgs) -> Result<Value> {
        let target = self.target(&a.project, Some(require_file(&a.compose_file)?), None)?;
        self.ensure_ready().await?;

        let mut args = target.scope();
        args.extend(["up".to_string(), "-d".to_string()]);
        if a.build {
            args.push("--build".to_string());
        }

        let out = self
            .exec
            .run(&self.compose.command_with_env(&args, target.env))
            .await?;
        Ok(json!({ "output": out }))
    }

    pub(super) async fn compose_down(&self, a: DownArgs) -> Result<Value> {
        let target = self.target(&a.project, Some(require_file(&a.compose_file)?), None)?;

        let remove_volumes = match a.remove_volumes {
            Some(v) => v,
            None => self
                .prompter
                .ask_yes_no("Also delete named volumes? [y/N]: ", self.cfg.remove_volumes_default),
        };

        self.ensure_ready().await?;

        let mut args = target.scope();
        args.push("down".to_string());
        if remove_volumes {
            args.push("-v".to_string());
        }
        let out = self
            .exec
            .run(&self.compose.command_with_env(&args, target.env.clone()))
            .await?;

        if !remove_volumes {
            return Ok(json!({ "output": out, "volumes_removed": false }));
        }

        // `down -v` skips volumes declared external; remove the data volume by name if it survived.
        let volume = self.cfg.volume_name(&target.project);
        let docker = self.cfg.docker_bin.as_str();
        let leftover = self
            .exec
            .run(&CommandSpec::new(docker, ["volume", "inspect", volume.as_str()]))
            .await
            .is_ok();
        let mut volume_out = None;
        if leftover {
            info!(%volume, "removing leftover data volume");
            volume_out = Some(
                self.exec
                    .run(&CommandSpec::new(docker, ["volume", "rm", "-f", volume.as_str()]))
                    .await?,
            );
        }

        Ok(json!({
            "output": out,
            "volumes_removed": true,
            "volume": volume,
            "volume_output": volume_out,
        }))
    }

    pub(super) async fn wait_healthy(&self, a: WaitArgs) -> Result<Value> {
        let target = self.target(&a.project, a.compose_file.as_deref(), Some(a.service.as_str()))?;
        self.ensure_ready().await?;

        let timeout = match a.timeout_sec {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => DEFAULT_HEALTH_TIMEOUT,
        };
        let report = HealthWaiter::new(self.exec.as_ref(), &self.compose, &self.cfg.docker_bin)
            .wait(&target.project, target.compose_file.as_deref(), target.service(), timeout)
            .await?;
        Ok(json!(report))
    }

    pub(super) async fn service_logs(&self, a: LogsArgs) -> Result<Value> {
        let target = self.target(&a.project, a.compose_file.as_deref(), Some(a.service.as_str()))?;
        self.ensure_ready().await?;

        let id = self
            .compose
            .container_id(self.exec.as_ref(), &target.project, target.compose_file.as_deref(), target.service())
            .await?;
        let tail = a.tail.filter(|t| *t > 0).unwrap_or(DEFAULT_LOG_TAIL).to_string();
        let logs = self
            .exec
            .run(&CommandSpec::new(
                self.cfg.docker_bin.as_str(),
                ["logs", "--tail", tail.as_str(), id.as_str()],
            ))
            .await?;
        Ok(json!({ "logs": logs }))
    }
}
