//! Configuration validation engine.
//!
//! Validates TOML, YAML and JSON configuration files against the known
//! schema, detects
//! unknown/misspelled fields, and flags settings that will misbehave at
//! runtime. The [`Diagnostic`] type is shared with banner-description checks.

use std::{collections::HashMap, path::Path};

use serde_json::Value;

use crate::{error::Context, schema::NudgeConfig};

/// Config file syntax, picked from the file extension the same way the
/// loader picks its parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Yaml,
    Json,
}

impl Format {
    /// `None` for an extension the loader cannot read either.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()).unwrap_or("toml") {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Yaml => "YAML",
            Self::Json => "JSON",
        }
    }

    /// Parse into one value tree so every format is checked the same way.
    fn parse(self, raw: &str) -> Result<Value, String> {
        let value = match self {
            Self::Toml => toml::from_str::<toml::Value>(raw)
                .map_err(|e| e.to_string())
                .and_then(|v| serde_json::to_value(v).map_err(|e| e.to_string()))?,
            Self::Yaml => serde_yaml::from_str(raw).map_err(|e| e.to_string())?,
            Self::Json => serde_json::from_str(raw).map_err(|e| e.to_string())?,
        };
        // An empty YAML document is an empty config.
        Ok(match value {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other,
        })
    }
}

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "network",
    /// "file-ref", "handler", "storage-key", "layout"
    pub category: &'static str,
    /// Dotted path, e.g. "server.prot" or "elements[1][0].onclick"
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{} [{}] {}", self.severity, self.category, self.message)
        } else {
            write!(
                f,
                "{} [{}] {}: {}",
                self.severity, self.category, self.path, self.message
            )
        }
    }
}

/// Result of validating a configuration file or banner description.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

/// Represents the expected shape of the configuration schema.
enum KnownKeys {
    /// A struct with fixed field names.
    Struct(HashMap<&'static str, KnownKeys>),
    /// Scalar value, stop recursion.
    Leaf,
}

/// Build the schema map mirroring every field in `schema.rs`.
fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Struct};

    Struct(HashMap::from([
        (
            "server",
            Struct(HashMap::from([
                ("bind", Leaf),
                ("port", Leaf),
                ("root", Leaf),
                ("cors", Leaf),
            ])),
        ),
        (
            "banner",
            Struct(HashMap::from([
                ("promotions_dir", Leaf),
                ("default_template", Leaf),
                ("store_path", Leaf),
                ("bridge_target_id", Leaf),
                ("probe_timeout_ms", Leaf),
                ("mount_points", Leaf),
                ("container_id", Leaf),
            ])),
        ),
    ]))
}

// ── Levenshtein distance ────────────────────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Find the closest of `candidates` to `needle`, if within `max_distance`
/// edits. Exact matches are not suggestions.
#[must_use]
pub fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    let mut best: Option<(&'a str, usize)> = None;
    for &candidate in candidates {
        let d = levenshtein(needle, candidate);
        if d > 0 && d <= max_distance && best.as_ref().is_none_or(|(_, bd)| d < *bd) {
            best = Some((candidate, d));
        }
    }
    best.map(|(s, _)| s)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or discover the default config
/// file location if `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(),
    };

    let Some(ref actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Info,
                category: "file-ref",
                path: String::new(),
                message: "no config file found; using defaults".into(),
            }],
            config_path: None,
        };
    };

    let Some(format) = Format::from_path(actual_path) else {
        return ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!(
                    "unsupported config format: {} (use .toml, .yaml, .yml or .json)",
                    actual_path.display()
                ),
            }],
            config_path: Some(actual_path.clone()),
        };
    };

    let content = std::fs::read_to_string(actual_path)
        .with_context(|| format!("failed to read config file {}", actual_path.display()));
    match content {
        Ok(content) => {
            let mut result = validate_str(&content, format);
            result.config_path = Some(actual_path.clone());
            result
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: e.to_string(),
            }],
            config_path: Some(actual_path.clone()),
        },
    }
}

/// Validate a TOML string without file-system side effects.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    validate_str(toml_str, Format::Toml)
}

/// Validate config text in the given format without file-system side effects.
#[must_use]
pub fn validate_str(raw: &str, format: Format) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let value = match format.parse(raw) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("{} syntax error: {e}", format.label()),
            });
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    let schema = build_schema_map();
    check_unknown_fields(&value, &schema, "", &mut diagnostics);

    match serde_json::from_value::<NudgeConfig>(value) {
        Ok(config) => check_semantic_warnings(&config, &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: String::new(),
            message: format!("type error: {e}"),
        }),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Walk the value tree against the schema tree and flag unknown keys.
fn check_unknown_fields(
    value: &Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (Value::Object(table), KnownKeys::Struct(fields)) = (value, schema) else {
        return;
    };
    let known_keys: Vec<&str> = fields.keys().copied().collect();
    for (key, child_value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if let Some(child_schema) = fields.get(key.as_str()) {
            check_unknown_fields(child_value, child_schema, &path, diagnostics);
            continue;
        }
        let level = if prefix.is_empty() {
            " at top level"
        } else {
            ""
        };
        let message = match suggest(key, &known_keys, 3) {
            Some(s) => format!("unknown field{level} (did you mean \"{s}\"?)"),
            None => format!("unknown field{level}"),
        };
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "unknown-field",
            path,
            message,
        });
    }
}

/// Run semantic checks on a successfully parsed config.
fn check_semantic_warnings(config: &NudgeConfig, diagnostics: &mut Vec<Diagnostic>) {
    let is_localhost = matches!(
        config.server.bind.as_str(),
        "127.0.0.1" | "localhost" | "::1"
    );
    if !is_localhost {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "network",
            path: "server.bind".into(),
            message: format!(
                "serving every file under the root on {}; make sure nothing private lives there",
                config.server.bind
            ),
        });
    }

    if config.server.port == 0 {
        diagnostics.push(Diagnostic {
            severity: Severity::Info,
            category: "network",
            path: "server.port".into(),
            message: "port 0 picks a random free port on each start".into(),
        });
    }

    if !config.server.root.is_dir() {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "file-ref",
            path: "server.root".into(),
            message: format!("{} is not a directory", config.server.root.display()),
        });
    }

    if config.banner.mount_points == 0 {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "layout",
            path: "banner.mount_points".into(),
            message: "the banner needs at least one mount point".into(),
        });
    }

    if config.banner.container_id.trim().is_empty() {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "layout",
            path: "banner.container_id".into(),
            message: "container id must not be empty".into(),
        });
    }

    if config.banner.probe_timeout_ms == Some(0) {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "network",
            path: "banner.probe_timeout_ms".into(),
            message: "a zero timeout abandons every extension probe immediately".into(),
        });
    }
}
