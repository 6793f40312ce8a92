use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;

/// Load `<root>/.env` into the process environment. Variables already set win.
pub fn load_env(root: &Path) -> Result<Option<String>> {
    let base = root.join(".env");
    if !base.exists() {
        return Ok(None);
    }
    dotenvy::from_path(&base)?;
    Ok(Some(base.display().to_string()))
}

/// Parse the application's own env file into a variable map for compose substitution.
///
/// A missing or unreadable file yields an empty map; malformed lines are skipped.
pub fn read_app_env(path: Option<&Path>) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    let Some(path) = path else {
        return vars;
    };

    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "app env file not loaded");
            return vars;
        }
    };

    for item in iter {
        match item {
            Ok((k, v)) => {
                vars.insert(k, v);
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping malformed env line"),
        }
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_keys_and_strips_quotes() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join(".env.app");
        std::fs::write(
            &file,
            "# app settings\nPOSTGRES_USER=app\nPOSTGRES_PASSWORD=\"s3cret\"\n\nPOSTGRES_DB='appdb'\n",
        )
        .unwrap();

        let vars = read_app_env(Some(&file));
        assert_eq!(vars.get("POSTGRES_USER").map(String::as_str), Some("app"));
        assert_eq!(vars.get("POSTGRES_PASSWORD").map(String::as_str), Some("s3cret"));
        assert_eq!(vars.get("POSTGRES_DB").map(String::as_str), Some("appdb"));
        assert_eq!(vars.len(), 3);
    }

    #[test]
    fn missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(read_app_env(Some(&tmp.path().join("nope.env"))).is_empty());
        assert!(read_app_env(None).is_empty());
    }

    #[test]
    fn load_env_without_file_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_env(tmp.path()).unwrap().is_none());
    }
}
