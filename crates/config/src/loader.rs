use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::NudgeConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["nudge.toml", "nudge.yaml", "nudge.yml", "nudge.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<NudgeConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./nudge.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/nudge/nudge.{toml,yaml,yml,json}` (user-global)
///
/// Returns `NudgeConfig::default()` if no config file is found or the file
/// fails to load. Environment overrides are applied in both cases.
pub fn discover_and_load() -> NudgeConfig {
    let mut config = if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                NudgeConfig::default()
            },
        }
    } else {
        debug!("no config file found, using defaults");
        NudgeConfig::default()
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    config
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/nudge/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "nudge").map(|d| d.config_dir().to_path_buf())
}

/// Returns the user data directory where the flag store lives by default.
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "nudge")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".nudge"))
}

/// Apply `NUDGE_BIND`, `NUDGE_PORT` and `NUDGE_ROOT` on top of a loaded config.
///
/// An unparseable `NUDGE_PORT` is ignored with a warning.
pub fn apply_env_overrides(config: &mut NudgeConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(bind) = lookup("NUDGE_BIND") {
        config.server.bind = bind;
    }
    if let Some(port) = lookup("NUDGE_PORT") {
        match port.parse() {
            Ok(port) => config.server.port = port,
            Err(e) => warn!(value = %port, error = %e, "ignoring invalid NUDGE_PORT"),
        }
    }
    if let Some(root) = lookup("NUDGE_ROOT") {
        config.server.root = PathBuf::from(root);
    }
}

fn parse_config(raw: &str, path: &Path) -> Result<NudgeConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => Err(Error::UnsupportedFormat(other.to_string())),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_toml_with_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nudge.toml");
        std::fs::write(
            &path,
            "[server]\nport = 8181\n\n[banner]\nprobe_timeout_ms = 250\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.server.port, 8181);
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert_eq!(cfg.banner.probe_timeout_ms, Some(250));
        assert_eq!(cfg.banner.mount_points, 3);
    }

    #[test]
    fn loads_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("nudge.yaml");
        std::fs::write(&yaml, "banner:\n  default_template: mobile-template\n").unwrap();
        assert_eq!(
            load_config(&yaml).unwrap().banner.default_template,
            "mobile-template"
        );

        let json = dir.path().join("nudge.json");
        std::fs::write(&json, r#"{"server": {"cors": false}}"#).unwrap();
        assert!(!load_config(&json).unwrap().server.cors);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nudge.ini");
        std::fs::write(&path, "port=1").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(ref ext) if ext == "ini"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config(Path::new("/nonexistent/nudge.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/nudge.toml"));
    }

    #[test]
    fn env_overrides_apply_and_skip_bad_port() {
        let mut cfg = NudgeConfig::default();
        apply_env_overrides(&mut cfg, |name| match name {
            "NUDGE_BIND" => Some("0.0.0.0".into()),
            "NUDGE_PORT" => Some("not-a-port".into()),
            "NUDGE_ROOT" => Some("/srv/banner".into()),
            _ => None,
        });
        assert_eq!(cfg.server.bind, "0.0.0.0");
        assert_eq!(cfg.server.port, 3000);
        assert_eq!(cfg.server.root, PathBuf::from("/srv/banner"));
    }
}
