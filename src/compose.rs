use crate::config::Config;
use crate::error::{OpsError, Result};
use crate::process::{CommandSpec, Executor};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

/// How compose is invoked on this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeShape {
    /// `docker compose ...`
    Plugin,
    /// `docker-compose ...`
    Standalone,
}

impl ComposeShape {
    pub fn from_override(value: &str) -> Option<Self> {
        match value.trim() {
            "docker-compose" => Some(ComposeShape::Standalone),
            "docker compose" | "docker" => Some(ComposeShape::Plugin),
            _ => None,
        }
    }

    /// Override first, then the plugin, then the legacy binary; plugin if nothing answers.
    pub async fn detect(exec: &dyn Executor, docker_bin: &str, override_cmd: Option<&str>) -> Self {
        if let Some(shape) = override_cmd.and_then(Self::from_override) {
            info!(?shape, "compose shape from override");
            return shape;
        }
        let shape = if exec.probe(docker_bin, &["compose", "version"]).await {
            ComposeShape::Plugin
        } else if exec.probe("docker-compose", &["version"]).await {
            ComposeShape::Standalone
        } else {
            ComposeShape::Plugin
        };
        info!(?shape, "compose shape detected");
        shape
    }
}

/// Builds compose invocations for one configured machine.
#[derive(Debug, Clone)]
pub struct Compose {
    shape: ComposeShape,
    docker_bin: String,
    project_dir: Option<PathBuf>,
}

impl Compose {
    pub fn new(shape: ComposeShape, cfg: &Config) -> Self {
        Self {
            shape,
            docker_bin: cfg.docker_bin.clone(),
            project_dir: cfg.app_dir.clone(),
        }
    }

    pub fn shape(&self) -> ComposeShape {
        self.shape
    }

    pub fn command(&self, args: &[String]) -> CommandSpec {
        self.command_with_env(args, BTreeMap::new())
    }

    pub fn command_with_env(&self, args: &[String], env: BTreeMap<String, String>) -> CommandSpec {
        let (program, mut full) = match self.shape {
            ComposeShape::Plugin => (self.docker_bin.clone(), vec!["compose".to_string()]),
            ComposeShape::Standalone => ("docker-compose".to_string(), Vec::new()),
        };

        if let Some(dir) = &self.project_dir {
            if !args.iter().any(|a| a == "--project-directory") {
                full.push("--project-directory".to_string());
                full.push(dir.display().to_string());
            }
        }
        full.extend(args.iter().cloned());

        CommandSpec::new(program, full).with_env(env)
    }

    /// Resolves the container id for a service, with or without an explicit container_name.
    pub async fn container_id(
        &self,
        exec: &dyn Executor,
        project: &str,
        compose_file: Option<&str>,
        service: &str,
    ) -> Result<String> {
        let mut args = scope_args(project, compose_file);
        args.extend(["ps".to_string(), "-q".to_string(), service.to_string()]);

        let out = exec.run(&self.command(&args)).await?;
        if exec.dry_run() {
            return Ok(format!("<{project}-{service}>"));
        }

        // Several replicas print several ids; the first one is enough to follow health.
        let id = out.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
        if id.is_empty() {
            return Err(OpsError::ServiceNotFound {
                service: service.to_string(),
                project: project.to_string(),
            });
        }
        Ok(id.to_string())
    }
}

/// `-p <project> [-f <file>]`
pub fn scope_args(project: &str, compose_file: Option<&str>) -> Vec<String> {
    let mut args = vec!["-p".to_string(), project.to_string()];
    if let Some(file) = compose_file.filter(|f| !f.is_empty()) {
        args.push("-f".to_string());
        args.push(file.to_string());
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeExecutor;

    fn cfg(app_dir: Option<&str>) -> Config {
        let mut cfg = Config::from_lookup(|_| None);
        cfg.app_dir = app_dir.map(PathBuf::from);
        cfg
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn override_wins_over_probes() {
        let exec = FakeExecutor::new().on_probe("docker compose version", vec![true]);
        let shape = ComposeShape::detect(&exec, "docker", Some("docker-compose")).await;
        assert_eq!(shape, ComposeShape::Standalone);
        assert!(exec.probe_lines().is_empty());
    }

    #[tokio::test]
    async fn detection_prefers_plugin_then_legacy() {
        let exec = FakeExecutor::new()
            .on_probe("docker compose version", vec![false])
            .on_probe("docker-compose version", vec![true]);
        assert_eq!(ComposeShape::detect(&exec, "docker", None).await, ComposeShape::Standalone);

        let exec = FakeExecutor::new().on_probe("docker compose version", vec![true]);
        assert_eq!(ComposeShape::detect(&exec, "docker", None).await, ComposeShape::Plugin);

        let exec = FakeExecutor::new();
        assert_eq!(ComposeShape::detect(&exec, "docker", None).await, ComposeShape::Plugin);
        assert_eq!(exec.probe_lines().len(), 2);
    }

    #[test]
    fn project_directory_inserted_before_logical_args() {
        let compose = Compose::new(ComposeShape::Plugin, &cfg(Some("/srv/app")));
        let cmd = compose.command(&strings(&["-p", "demo", "up", "-d"]));
        assert_eq!(cmd.command_line(), "docker compose --project-directory /srv/app -p demo up -d");

        let compose = Compose::new(ComposeShape::Standalone, &cfg(Some("/srv/app")));
        let cmd = compose.command(&strings(&["--project-directory", "/x", "down"]));
        assert_eq!(cmd.command_line(), "docker-compose --project-directory /x down");

        let compose = Compose::new(ComposeShape::Standalone, &cfg(None));
        let cmd = compose.command(&strings(&["-p", "demo", "ps"]));
        assert_eq!(cmd.command_line(), "docker-compose -p demo ps");
    }

    #[tokio::test]
    async fn container_id_resolution() {
        let compose = Compose::new(ComposeShape::Plugin, &cfg(None));

        let exec = FakeExecutor::new().on_run("ps -q db", vec![Ok("abc123\n".into())]);
        let id = compose.container_id(&exec, "demo", Some("compose.yml"), "db").await.unwrap();
        assert_eq!(id, "abc123");
        assert_eq!(exec.lines(), vec!["docker compose -p demo -f compose.yml ps -q db"]);

        let exec = FakeExecutor::new().on_run("ps -q db", vec![Ok("  \n".into())]);
        let err = compose.container_id(&exec, "demo", None, "db").await.unwrap_err();
        assert!(matches!(err, OpsError::ServiceNotFound { .. }));
    }
}
