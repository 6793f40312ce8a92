//! Validation applied before any tool touches external state.

use crate::error::{OpsError, Result};
use regex::Regex;
use std::sync::OnceLock;

fn project_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9._-]+$").expect("static pattern"))
}

/// Checks a compose project name. The production guard is checked here so every tool repeats it.
pub fn validate_project(name: &str, env_mode: &str) -> Result<()> {
    if env_mode == "production" {
        return Err(OpsError::EnvironmentRefused);
    }
    if !project_pattern().is_match(name) {
        return Err(OpsError::InvalidInput(format!("invalid project name: {name:?}")));
    }
    Ok(())
}

/// Paths with a `..` are only accepted when they are exactly the configured compose file.
pub fn validate_path(path: &str, canonical: &str) -> Result<()> {
    if path.contains("..") && path != canonical {
        return Err(OpsError::PathDisallowed {
            path: path.to_string(),
            allowed: canonical.to_string(),
        });
    }
    Ok(())
}

/// Exact, case-sensitive confirmation for destructive operations.
pub fn expected_confirmation(project: &str) -> String {
    format!("RESET {project}")
}

pub fn check_confirmation(project: &str, phrase: &str) -> Result<()> {
    let expected = expected_confirmation(project);
    if phrase != expected {
        return Err(OpsError::ConfirmationMismatch { expected });
    }
    Ok(())
}
