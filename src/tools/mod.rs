//! The fixed catalogue of operations the model may invoke.
//!
//! Every tool validates its own target and re-checks engine readiness before it touches
//! anything, whatever order the model calls them in.

mod ops;
mod reset;

use crate::compose::{scope_args, Compose};
use crate::config::Config;
use crate::confirm::Prompter;
use crate::engine::ensure_engine_ready;
use crate::env::read_app_env;
use crate::error::{OpsError, Result};
use crate::guard;
use crate::health::HealthState;
use crate::process::Executor;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    EnsureDocker,
    ComposeUp,
    ComposeDown,
    WaitHealthy,
    ServiceLogs,
    DbReset,
}

impl Tool {
    pub const ALL: [Tool; 6] = [
        Tool::EnsureDocker,
        Tool::ComposeUp,
        Tool::ComposeDown,
        Tool::WaitHealthy,
        Tool::ServiceLogs,
        Tool::DbReset,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tool::EnsureDocker => "ensureDocker",
            Tool::ComposeUp => "composeUp",
            Tool::ComposeDown => "composeDown",
            Tool::WaitHealthy => "waitHealthy",
            Tool::ServiceLogs => "serviceLogs",
            Tool::DbReset => "dbReset",
        }
    }

    pub fn from_name(name: &str) -> Option<Tool> {
        Tool::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            Tool::EnsureDocker => {
                "Ensure Docker is reachable. If not, start the VM-backed engine and wait until Docker responds."
            }
            Tool::ComposeUp => "Start docker compose detached. Required: project, compose_file. Optional: build (bool).",
            Tool::ComposeDown => {
                "Stop compose. Required: project, compose_file. Optional: remove_volumes (bool); when omitted the operator is asked."
            }
            Tool::WaitHealthy => {
                "Poll container health until healthy. Required: project, service. Optional: timeout_sec, compose_file."
            }
            Tool::ServiceLogs => {
                "Return the last N lines of logs for a service. Required: project, service. Optional: compose_file, tail (default 200)."
            }
            Tool::DbReset => {
                "Destructive: reset the DB with 'compose down -v' then 'up -d'. Removes containers, network and named volumes (data is lost). Requires confirm_phrase=\"RESET <project>\". Waits for the service to become healthy, then runs the optional seed_cmd inside it."
            }
        }
    }

    /// (parameter, JSON type, required)
    fn parameters(self) -> &'static [(&'static str, &'static str, bool)] {
        match self {
            Tool::EnsureDocker => &[],
            Tool::ComposeUp => &[
                ("project", "string", true),
                ("compose_file", "string", true),
                ("build", "boolean", false),
            ],
            Tool::ComposeDown => &[
                ("project", "string", true),
                ("compose_file", "string", true),
                ("remove_volumes", "boolean", false),
            ],
            Tool::WaitHealthy => &[
                ("project", "string", true),
                ("service", "string", true),
                ("timeout_sec", "integer", false),
                ("compose_file", "string", false),
            ],
            Tool::ServiceLogs => &[
                ("project", "string", true),
                ("service", "string", true),
                ("compose_file", "string", false),
                ("tail", "integer", false),
            ],
            Tool::DbReset => &[
                ("project", "string", true),
                ("compose_file", "string", true),
                ("db_service", "string", true),
                ("confirm_phrase", "string", true),
                ("seed_cmd", "string", false),
            ],
        }
    }

    pub fn input_schema(self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for (name, ty, req) in self.parameters() {
            properties.insert(name.to_string(), json!({ "type": ty }));
            if *req {
                required.push(*name);
            }
        }
        let mut schema = json!({
            "type": "object",
            "properties": properties,
            "additionalProperties": false,
        });
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        schema
    }

    pub fn declaration(self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// What the model sees of a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

pub fn catalogue() -> Vec<ToolDeclaration> {
    Tool::ALL.into_iter().map(Tool::declaration).collect()
}

/// Outcome of one invocation, fed back to the model.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
    pub error: Option<OpsError>,
}

impl ToolResult {
    fn success(payload: Value) -> Self {
        Self {
            content: payload.to_string(),
            is_error: false,
            error: None,
        }
    }

    fn failure(err: OpsError) -> Self {
        let mut payload = json!({ "error": err.to_string() });
        let status = match &err {
            OpsError::ServiceNotFound { .. } => Some(HealthState::NotFound),
            OpsError::HealthTimeout { .. } => Some(HealthState::Timeout),
            _ => None,
        };
        if let Some(status) = status {
            payload["status"] = json!(status);
        }
        if err.is_terminal() {
            payload["terminal"] = json!(true);
        }
        Self {
            content: payload.to_string(),
            is_error: true,
            error: Some(err),
        }
    }
}

/// A validated operation scope: one project, optionally one file and one service.
#[derive(Debug, Clone)]
pub struct Target {
    pub project: String,
    pub compose_file: Option<String>,
    pub service: Option<String>,
    /// Variables from the application's env file, injected for compose substitution.
    pub env: BTreeMap<String, String>,
}

impl Target {
    fn scope(&self) -> Vec<String> {
        scope_args(&self.project, self.compose_file.as_deref())
    }

    fn service(&self) -> &str {
        self.service.as_deref().unwrap_or_default()
    }
}

/// Runs tools against the configured machine.
pub struct Toolbox {
    cfg: Config,
    exec: Arc<dyn Executor>,
    compose: Compose,
    prompter: Arc<dyn Prompter>,
}

impl Toolbox {
    pub fn new(cfg: Config, exec: Arc<dyn Executor>, compose: Compose, prompter: Arc<dyn Prompter>) -> Self {
        Self {
            cfg,
            exec,
            compose,
            prompter,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Never fails: every problem comes back as an error-flagged result.
    pub async fn invoke(&self, name: &str, args: Value) -> ToolResult {
        let Some(tool) = Tool::from_name(name) else {
            warn!(tool = name, "model asked for an unknown tool");
            return ToolResult {
                content: json!({ "error": format!("unknown tool {name:?}") }).to_string(),
                is_error: true,
                error: Some(OpsError::UnknownTool(name.to_string())),
            };
        };

        info!(tool = name, "invoking");
        let result = match self.execute(tool, args).await {
            Ok(payload) => ToolResult::success(payload),
            Err(err) => {
                warn!(tool = name, error = %err, "tool failed");
                ToolResult::failure(err)
            }
        };
        info!(tool = name, is_error = result.is_error, "tool finished");
        result
    }

    async fn execute(&self, tool: Tool, args: Value) -> Result<Value> {
        let args = self.backfill(tool, args)?;
        match tool {
            Tool::EnsureDocker => {
                let status = ensure_engine_ready(self.exec.as_ref(), &self.cfg).await?;
                Ok(json!({ "status": status }))
            }
            Tool::ComposeUp => self.compose_up(decode(args)?).await,
            Tool::ComposeDown => self.compose_down(decode(args)?).await,
            Tool::WaitHealthy => self.wait_healthy(decode(args)?).await,
            Tool::ServiceLogs => self.service_logs(decode(args)?).await,
            Tool::DbReset => self.db_reset(decode(args)?).await,
        }
    }

    /// Fills parameters the model left out from the process configuration.
    fn backfill(&self, tool: Tool, args: Value) -> Result<Map<String, Value>> {
        let mut map = match args {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(OpsError::InvalidInput(format!(
                    "arguments for {} must be an object, got {other}",
                    tool.name()
                )))
            }
        };

        for (name, _, _) in tool.parameters() {
            let fallback = match *name {
                "project" => &self.cfg.project,
                "compose_file" => &self.cfg.compose_file,
                "service" | "db_service" => &self.cfg.db_service,
                _ => continue,
            };
            let missing = map.get(*name).map_or(true, Value::is_null);
            if missing && !fallback.is_empty() {
                map.insert(name.to_string(), json!(fallback));
            }
        }
        Ok(map)
    }

    /// Guard checks plus env loading. Runs on every tool call.
    fn target(&self, project: &str, compose_file: Option<&str>, service: Option<&str>) -> Result<Target> {
        guard::validate_project(project, &self.cfg.env_mode)?;
        let compose_file = compose_file.filter(|f| !f.is_empty());
        if let Some(file) = compose_file {
            guard::validate_path(file, &self.cfg.compose_file)?;
        }
        if service.is_some_and(str::is_empty) {
            return Err(OpsError::InvalidInput("service must not be empty".into()));
        }

        Ok(Target {
            project: project.to_string(),
            compose_file: compose_file.map(str::to_string),
            service: service.map(str::to_string),
            env: read_app_env(self.cfg.app_env_file.as_deref()),
        })
    }

    async fn ensure_ready(&self) -> Result<()> {
        if self.cfg.ensure_docker_auto {
            ensure_engine_ready(self.exec.as_ref(), &self.cfg).await?;
        }
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(args: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(args)).map_err(|e| OpsError::InvalidInput(e.to_string()))
}

fn require_file(file: &str) -> Result<&str> {
    if file.trim().is_empty() {
        return Err(OpsError::InvalidInput("compose_file is required".into()));
    }
    Ok(file)
}
