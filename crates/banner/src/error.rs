//! Banner error types.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while loading, building, or probing a banner.
#[derive(Debug, Error)]
pub enum Error {
    /// The banner description could not be fetched, read, or parsed.
    /// Fatal: the banner does not render.
    #[error("failed to load banner description from {origin}: {source}")]
    ConfigLoad {
        origin: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("unknown click handler \"{name}\" at {path}{}", suggestion_suffix(.suggestion))]
    UnknownHandler {
        name: String,
        path: String,
        suggestion: Option<&'static str>,
    },

    #[error("element at {path} has no string \"type\" field")]
    MissingType { path: String },

    #[error("invalid banner description at {path}: {reason}")]
    InvalidSpec { path: String, reason: String },

    #[error("description has {segments} segments but the banner only has {mounts} mount points")]
    MountPointMissing { segments: usize, mounts: usize },

    /// The host bridge did not answer within the configured deadline. The
    /// banner stays in its pre-probe state.
    #[error("host bridge did not respond within {0:?}")]
    BridgeTimeout(Duration),

    #[error("host probe cancelled")]
    ProbeCancelled,
}

fn suggestion_suffix(suggestion: &Option<&'static str>) -> String {
    suggestion
        .map(|s| format!(" (did you mean \"{s}\"?)"))
        .unwrap_or_default()
}

impl Error {
    #[must_use]
    pub fn config_load(
        origin: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ConfigLoad {
            origin: origin.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSpec {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
