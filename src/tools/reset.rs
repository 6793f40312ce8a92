//! Confirmation-gated database reset.
//!
//! `down -v` -> `up -d` -> wait healthy -> optional seed. Each step must succeed before the
//! next starts. Nothing is rolled back: once the first step ran the volume data is gone, which
//! is exactly what the confirmation phrase is for.

use super::{require_file, Toolbox};
use crate::error::Result;
use crate::guard;
use crate::health::{HealthWaiter, DEFAULT_HEALTH_TIMEOUT};
use chrono::Local;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Deserialize)]
pub(super) struct ResetArgs {
    project: String,
    compose_file: String,
    db_service: String,
    /// Absent means mismatch, not a malformed call.
    #[serde(default)]
    confirm_phrase: String,
    seed_cmd: Option<String>,
}

impl Toolbox {
    pub(super) async fn db_reset(&self, a: ResetArgs) -> Result<Value> {
        let target = self.target(
            &a.project,
            Some(require_file(&a.compose_file)?),
            Some(a.db_service.as_str()),
        )?;
        guard::check_confirmation(&target.project, &a.confirm_phrase)?;
        self.ensure_ready().await?;

        let scope = target.scope();
        let mut steps = Vec::new();

        info!(project = %target.project, "reset: tearing down with volumes");
        let mut down = scope.clone();
        down.extend(["down".to_string(), "-v".to_string()]);
        self.exec
            .run(&self.compose.command_with_env(&down, target.env.clone()))
            .await?;
        steps.push("down -v");

        info!(project = %target.project, "reset: bringing up");
        let mut up = scope.clone();
        up.extend(["up".to_string(), "-d".to_string()]);
        self.exec
            .run(&self.compose.command_with_env(&up, target.env.clone()))
            .await?;
        steps.push("up -d");

        let health = HealthWaiter::new(self.exec.as_ref(), &self.compose, &self.cfg.docker_bin)
            .wait(
                &target.project,
                target.compose_file.as_deref(),
                target.service(),
                DEFAULT_HEALTH_TIMEOUT,
            )
            .await?;
        steps.push("wait healthy");

        let mut seed_out = String::new();
        if let Some(seed) = a.seed_cmd.as_deref().filter(|s| !s.trim().is_empty()) {
            info!(service = target.service(), "reset: seeding");
            let mut exec_args = scope;
            exec_args.extend(
                ["exec", "-T", target.service(), "sh", "-lc", seed]
                    .into_iter()
                    .map(str::to_string),
            );
            seed_out = self
                .exec
                .run(&self.compose.command_with_env(&exec_args, target.env.clone()))
                .await?;
            steps.push("seed");
        }

        Ok(json!({
            "status": "reset-complete",
            "steps": steps,
            "health": health,
            "seed_out": seed_out,
            "completed_at": Local::now().to_rfc3339(),
        }))
    }
}
