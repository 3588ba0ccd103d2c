//! Banner description documents: loading, parsing and diagnostics.
//!
//! ```json
//! {
//!   "type": "extension",
//!   "storageKeys": { "declineClick": "ext_decline", ... },
//!   "elements": [[{ "type": "a", "onclick": "addClicked", ... }], ...]
//! }
//! ```

use std::path::Path;

use {
    nudge_config::{Diagnostic, Severity, ValidationResult, suggest},
    serde_json::Value,
    tracing::{debug, info, warn},
};

use crate::{
    client::MobileOs,
    element::{ElementSpec, is_valid_name, ordered_values, parse_segments},
    error::{Error, Result},
    keys::{InsightEvent, StorageKeyMap},
};

/// Declared banner type. Only extension banners probe the host bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BannerType {
    Extension,
    Other(String),
}

impl BannerType {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw == "extension" {
            Self::Extension
        } else {
            Self::Other(raw.to_string())
        }
    }

    #[must_use]
    pub fn is_extension(&self) -> bool {
        matches!(self, Self::Extension)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Extension => "extension",
            Self::Other(raw) => raw,
        }
    }
}

/// A parsed, validated banner description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerDescription {
    pub banner_type: BannerType,
    pub storage_keys: StorageKeyMap,
    pub elements: Vec<Vec<ElementSpec>>,
}

impl BannerDescription {
    pub fn from_json_str(raw: &str, origin: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| Error::config_load(origin, e))?;
        Self::from_value(&value)
    }

    /// Parse an already-decoded document. Handler names and element shapes
    /// are checked here so a bad description never reaches the builder.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(doc) = value else {
            return Err(Error::invalid("$", "banner description must be an object"));
        };

        let banner_type = match doc.get("type") {
            Some(Value::String(raw)) => BannerType::parse(raw),
            Some(other) => {
                warn!(value = %other, "banner type is not a string, treating as untyped");
                BannerType::Other(String::new())
            },
            None => BannerType::Other(String::new()),
        };

        let mut storage_keys = StorageKeyMap::new();
        match doc.get("storageKeys") {
            Some(Value::Object(raw)) => {
                storage_keys.bind(raw.iter().filter_map(|(name, key)| match key.as_str() {
                    Some(key) => Some((name.clone(), key.to_string())),
                    None => {
                        warn!(name, "storage key is not a string, leaving unbound");
                        None
                    },
                }));
            },
            Some(_) => return Err(Error::invalid("storageKeys", "expected an object")),
            None => debug!("description has no storageKeys, using logical names"),
        }

        let elements = match doc.get("elements") {
            Some(raw) => parse_segments(raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            banner_type,
            storage_keys,
            elements,
        })
    }

    /// Fetch `source` over HTTP(S) or read it from disk, then parse it.
    pub async fn load(source: &str) -> Result<Self> {
        let raw = fetch(source).await?;
        let description = Self::from_json_str(&raw, source)?;
        info!(
            source,
            banner_type = description.banner_type.as_str(),
            segments = description.elements.len(),
            "banner description loaded"
        );
        Ok(description)
    }
}

/// Convenience wrapper for [`BannerDescription::load`].
pub async fn load(source: &str) -> Result<BannerDescription> {
    BannerDescription::load(source).await
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Raw text of a description, from a URL or a file.
pub async fn fetch(source: &str) -> Result<String> {
    if is_url(source) {
        debug!(url = source, "fetching banner description");
        let response = reqwest::get(source)
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::config_load(source, e))?;
        response
            .text()
            .await
            .map_err(|e| Error::config_load(source, e))
    } else {
        tokio::fs::read_to_string(Path::new(source))
            .await
            .map_err(|e| Error::config_load(source, e))
    }
}

// ── Diagnostics ─────────────────────────────────────────────────────────────

/// Check a raw description without stopping at the first problem.
///
/// Errors are what [`BannerDescription::from_value`] would reject; warnings
/// flag documents that load but probably do not do what their author meant.
#[must_use]
pub fn diagnose(raw: &str, mount_points: usize) -> ValidationResult {
    let mut result = ValidationResult::default();
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            push(&mut result, Severity::Error, "syntax", "", e.to_string());
            return result;
        },
    };
    let Value::Object(doc) = &value else {
        push(
            &mut result,
            Severity::Error,
            "type-error",
            "",
            "banner description must be an object",
        );
        return result;
    };

    match doc.get("type") {
        Some(Value::String(_)) => {},
        Some(_) => push(
            &mut result,
            Severity::Warning,
            "type-error",
            "type",
            "banner type should be a string",
        ),
        None => push(
            &mut result,
            Severity::Info,
            "unknown-field",
            "type",
            "no banner type; the host bridge will not be probed",
        ),
    }

    check_storage_keys(doc.get("storageKeys"), &mut result);

    match doc.get("elements") {
        Some(elements) => check_elements(elements, mount_points, &mut result),
        None => push(
            &mut result,
            Severity::Warning,
            "layout",
            "elements",
            "no elements; the banner will be empty",
        ),
    }

    result
}

fn check_storage_keys(keys: Option<&Value>, result: &mut ValidationResult) {
    let Some(keys) = keys else {
        push(
            result,
            Severity::Warning,
            "storage-key",
            "storageKeys",
            "no storageKeys; flags will be stored under their logical names",
        );
        return;
    };
    let Value::Object(keys) = keys else {
        push(
            result,
            Severity::Error,
            "type-error",
            "storageKeys",
            "storageKeys must be an object",
        );
        return;
    };

    let known = InsightEvent::known_names();
    for (name, key) in keys {
        let path = format!("storageKeys.{name}");
        if !known.contains(&name.as_str()) {
            let message = match suggest(name, &known, 3) {
                Some(s) => format!("unknown event name (did you mean \"{s}\"?)"),
                None => "unknown event name".to_string(),
            };
            push(result, Severity::Warning, "storage-key", &path, message);
        }
        if !key.is_string() {
            push(
                result,
                Severity::Warning,
                "type-error",
                &path,
                "storage key must be a string; it will be ignored",
            );
        }
    }

    for event in InsightEvent::BOUND {
        if !keys.contains_key(event.name()) {
            push(
                result,
                Severity::Warning,
                "storage-key",
                &format!("storageKeys.{}", event.name()),
                "not bound; the logical name is used as the storage key",
            );
        }
    }
}

fn check_elements(elements: &Value, mount_points: usize, result: &mut ValidationResult) {
    let segments = match ordered_values(elements, "elements") {
        Ok(s) => s,
        Err(e) => {
            push(result, Severity::Error, "type-error", "elements", e.to_string());
            return;
        },
    };

    if segments.len() > mount_points {
        push(
            result,
            Severity::Error,
            "layout",
            "elements",
            format!(
                "{} segments but only {mount_points} mount points",
                segments.len()
            ),
        );
    }

    for (i, segment) in segments.into_iter().enumerate() {
        let path = format!("elements[{i}]");
        let specs = match ordered_values(segment, &path) {
            Ok(s) => s,
            Err(e) => {
                push(result, Severity::Error, "type-error", &path, e.to_string());
                continue;
            },
        };
        if specs.is_empty() {
            push(
                result,
                Severity::Warning,
                "layout",
                &path,
                "empty segment renders an empty container",
            );
        }
        for (j, spec) in specs.into_iter().enumerate() {
            let spec_path = format!("{path}[{j}]");
            if check_names(spec, &spec_path, result) {
                continue;
            }
            if let Err(e) = ElementSpec::from_value(spec, &spec_path) {
                let category = match e {
                    Error::UnknownHandler { .. } => "handler",
                    _ => "type-error",
                };
                push(result, Severity::Error, category, &spec_path, e.to_string());
                continue;
            }
            check_mobile_keys(spec, &spec_path, result);
        }
    }
}

/// Report every tag or attribute name that could not appear in markup.
/// Returns whether any was found.
fn check_names(spec: &Value, path: &str, result: &mut ValidationResult) -> bool {
    let Value::Object(fields) = spec else {
        return false;
    };
    let before = result.diagnostics.len();
    if let Some(Value::String(tag)) = fields.get("type")
        && !tag.trim().is_empty()
        && !is_valid_name(tag)
    {
        push(
            result,
            Severity::Error,
            "markup",
            &format!("{path}.type"),
            format!("\"{tag}\" is not a valid tag name"),
        );
    }
    for name in fields.keys().filter(|name| !is_valid_name(name)) {
        push(
            result,
            Severity::Error,
            "markup",
            &format!("{path}.{name}"),
            format!("\"{name}\" is not a valid attribute name"),
        );
    }
    result.diagnostics.len() > before
}

fn check_mobile_keys(spec: &Value, path: &str, result: &mut ValidationResult) {
    let Some(Value::Object(variants)) = spec.get("mobile") else {
        return;
    };
    let known = [MobileOs::Ios.as_str(), MobileOs::Android.as_str()];
    for os in variants.keys() {
        if !known.contains(&os.as_str()) {
            push(
                result,
                Severity::Warning,
                "unknown-field",
                &format!("{path}.mobile.{os}"),
                "no device resolves to this OS name",
            );
        }
    }
}

fn push(
    result: &mut ValidationResult,
    severity: Severity,
    category: &'static str,
    path: &str,
    message: impl Into<String>,
) {
    result.diagnostics.push(Diagnostic {
        severity,
        category,
        path: path.to_string(),
        message: message.into(),
    });
}
