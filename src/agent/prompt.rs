use crate::config::Config;
use crate::guard::expected_confirmation;

/// System framing with the bound defaults, so the model can fill arguments sensibly.
pub fn system_prompt(cfg: &Config) -> String {
    let project = if cfg.project.is_empty() {
        "unknown-project"
    } else {
        cfg.project.as_str()
    };

    format!(
        "You are a cautious project-scoped Dev DB agent for {project:?}.
You manage docker compose for the database only.

Defaults:
- project = {project}
- compose_file = {compose_file}
- db_service = {service}

Rules:
- Use ensureDocker/composeUp/composeDown/waitHealthy/serviceLogs/dbReset tools as needed.
- For destructive resets, require confirm_phrase = \"{phrase}\". Never invent it; ask the operator.
- When a tool fails, read its error and either fix the arguments or explain what is needed.
- Keep responses short and actionable.",
        compose_file = cfg.compose_file,
        service = cfg.db_service,
        phrase = expected_confirmation(project),
    )
}
