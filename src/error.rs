/// Failures produced by guards, external commands, tools and the conversation driver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpsError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("refusing to run in production ENV")]
    EnvironmentRefused,

    #[error("disallowed path: {path:?} (only allowed: {allowed:?})")]
    PathDisallowed { path: String, allowed: String },

    #[error("docker daemon not reachable and '{bootstrapper}' not found; start Docker/{bootstrapper} manually")]
    EngineUnavailable { bootstrapper: String },

    #[error("docker did not become ready after starting {bootstrapper} ({waited_secs}s)")]
    EngineStartTimeout { bootstrapper: String, waited_secs: u64 },

    #[error("no container for service {service:?} (project {project:?})")]
    ServiceNotFound { service: String, project: String },

    #[error("{command}: {reason}\n{output}")]
    CommandFailed {
        command: String,
        reason: String,
        output: String,
    },

    #[error("service {service:?} not healthy in time ({waited_secs}s)")]
    HealthTimeout { service: String, waited_secs: u64 },

    #[error("confirmation mismatch; expected {expected:?}")]
    ConfirmationMismatch { expected: String },

    #[error("unknown tool {0:?}")]
    UnknownTool(String),

    #[error("provider request failed: {0}")]
    ProviderRequestFailed(String),

    #[error("stopped after too many tool steps ({0} rounds)")]
    RoundBudgetExhausted(usize),
}

impl OpsError {
    /// Errors that cannot be fixed by retrying within the same run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OpsError::EnvironmentRefused
                | OpsError::EngineUnavailable { .. }
                | OpsError::EngineStartTimeout { .. }
                | OpsError::ProviderRequestFailed(_)
                | OpsError::RoundBudgetExhausted(_)
        )
    }
}

pub type Result<T> = core::result::Result<T, OpsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_classification() {
        assert!(OpsError::EnvironmentRefused.is_terminal());
        assert!(OpsError::EngineUnavailable {
            bootstrapper: "colima".into()
        }
        .is_terminal());
        assert!(OpsError::RoundBudgetExhausted(8).is_terminal());
        assert!(!OpsError::InvalidInput("x".into()).is_terminal());
        assert!(!OpsError::ConfirmationMismatch {
            expected: "RESET p".into()
        }
        .is_terminal());
    }

    #[test]
    fn command_failure_keeps_output() {
        let err = OpsError::CommandFailed {
            command: "docker compose up -d".into(),
            reason: "exit status: 1".into(),
            output: "no such service: db".into(),
        };
        assert!(err.to_string().contains("no such service: db"));
        assert!(err.to_string().starts_with("docker compose up -d"));
    }
}
