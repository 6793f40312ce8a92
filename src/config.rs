use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_INSTRUCTION: &str = "Ramp up the DB and wait until it's ready.";

/// Process-wide settings, read once at start and threaded through every component.
#[derive(Debug, Clone)]
pub struct Config {
    pub project: String,
    pub compose_file: String,
    pub db_service: String,
    /// When set, compose runs as if launched from this directory.
    pub app_dir: Option<PathBuf>,
    /// dotenv file whose variables are injected for compose substitution.
    pub app_env_file: Option<PathBuf>,
    pub env_mode: String,
    pub ensure_docker_auto: bool,
    pub dry_run: bool,

    pub docker_bin: String,
    pub engine_bootstrapper: String,
    pub compose_cmd: Option<String>,
    pub volume_key: String,
    pub remove_volumes_default: bool,

    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub max_rounds: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Config {
            project: get("PROJECT").unwrap_or_default(),
            compose_file: get("COMPOSE_FILE").unwrap_or_default(),
            db_service: get("DB_SERVICE").unwrap_or_default(),
            app_dir: get("APP_DIR").map(PathBuf::from),
            app_env_file: get("APP_ENV_FILE").map(PathBuf::from),
            env_mode: get("ENV").unwrap_or_default(),
            ensure_docker_auto: !get("ENSURE_DOCKER_AUTO").is_some_and(|v| flag_disabled(&v)),
            dry_run: get("DRY_RUN").is_some_and(|v| flag_enabled(&v)),

            docker_bin: get("DOCKER_BIN").unwrap_or_else(|| "docker".to_string()),
            engine_bootstrapper: get("ENGINE_BOOTSTRAPPER").unwrap_or_else(|| "colima".to_string()),
            compose_cmd: get("COMPOSE_CMD"),
            volume_key: get("VOLUME_KEY").unwrap_or_else(|| "db_data".to_string()),
            remove_volumes_default: get("REMOVE_VOLUMES_DEFAULT").is_some_and(|v| flag_enabled(&v)),

            api_key: get("ANTHROPIC_API_KEY"),
            model: get("ANTHROPIC_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: get("ANTHROPIC_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            max_tokens: get("MAX_TOKENS").and_then(|s| s.parse().ok()).unwrap_or(700),
            max_rounds: get("MAX_ROUNDS").and_then(|s| s.parse().ok()).unwrap_or(8),
        }
    }

    /// Name of the named volume holding the database data for `project`.
    pub fn volume_name(&self, project: &str) -> String {
        format!("{project}_{}", self.volume_key)
    }
}

fn flag_enabled(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn flag_disabled(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off")
}

pub fn find_project_root(start_dir: &Path) -> PathBuf {
    // Walk up until we find a compose file or a .env; fall back to the start directory.
    let mut dir = start_dir.to_path_buf();

    for _ in 0..12 {
        let markers = ["docker-compose.yml", "compose.yml", ".env"];
        if markers.iter().any(|m| dir.join(m).exists()) {
            return dir;
        }

        match dir.parent() {
            Some(parent) if parent != dir => dir = parent.to_path_buf(),
            _ => break,
        }
    }

    start_dir.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]);
        assert_eq!(cfg.docker_bin, "docker");
        assert_eq!(cfg.engine_bootstrapper, "colima");
        assert_eq!(cfg.model, DEFAULT_MODEL);
        assert_eq!(cfg.max_rounds, 8);
        assert_eq!(cfg.max_tokens, 700);
        assert!(cfg.ensure_docker_auto);
        assert!(!cfg.dry_run);
        assert!(cfg.app_dir.is_none());
    }

    #[test]
    fn flags_parse() {
        let cfg = config(&[("DRY_RUN", "1"), ("ENSURE_DOCKER_AUTO", "0"), ("ENV", "production")]);
        assert!(cfg.dry_run);
        assert!(!cfg.ensure_docker_auto);
        assert_eq!(cfg.env_mode, "production");

        let cfg = config(&[("DRY_RUN", "0"), ("ENSURE_DOCKER_AUTO", "1")]);
        assert!(!cfg.dry_run);
        assert!(cfg.ensure_docker_auto);
    }

    #[test]
    fn volume_name_joins_project_and_key() {
        let cfg = config(&[("VOLUME_KEY", "db_data")]);
        assert_eq!(cfg.volume_name("myproj"), "myproj_db_data");
    }

    #[test]
    fn project_root_found_from_subdirectory() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("docker-compose.yml"), "services: {}\n").unwrap();
        let nested = tmp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(&nested), tmp.path());
    }
}
