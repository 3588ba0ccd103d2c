//! Configuration loading, validation, and env substitution.
//!
//! Config files: `nudge.toml`, `nudge.yaml`, `nudge.yml` or `nudge.json`
//! Searched in `./` then `~/.config/nudge/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution in all
//! string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{
        apply_env_overrides, config_dir, data_dir, discover_and_load, find_config_file,
        load_config,
    },
    schema::{BannerConfig, NudgeConfig, ServerConfig},
    validate::{Diagnostic, Severity, ValidationResult, suggest},
};
