//! Static file serving: the configured root directory, then embedded defaults.
//!
//! Every request path maps to a file under the root. Directory paths serve
//! their `index.html`. Files missing from disk fall back to the copies
//! embedded in the binary via `include_dir!`, so a bare `nudge serve` still
//! has a demo page and both promotion templates.

use std::path::{Component, Path, PathBuf};

use {
    axum::{
        extract::State,
        http::{Method, StatusCode, Uri, header},
        response::{IntoResponse, Response},
    },
    tracing::debug,
};

// ── Embedded assets ──────────────────────────────────────────────────────────

static ASSETS: include_dir::Dir = include_dir::include_dir!("$CARGO_MANIFEST_DIR/src/assets");

/// Contents of an embedded asset, e.g. `promotions/mobile-template-banner.json`.
#[must_use]
pub fn embedded_file(path: &str) -> Option<&'static [u8]> {
    ASSETS.get_file(path).map(include_dir::File::contents)
}

/// Shared handler state: the directory files are served from.
#[derive(Debug, Clone)]
pub struct StaticRoot {
    root: PathBuf,
}

impl StaticRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }
}

pub(crate) fn mime_for_path(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or("") {
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "html" | "htm" => "text/html; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "json" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "woff2" => "font/woff2",
        "woff" => "font/woff",
        _ => "application/octet-stream",
    }
}

/// Request path → relative file path. `None` for anything that would escape
/// the root.
pub(crate) fn resolve_request_path(uri_path: &str) -> Option<String> {
    if uri_path.contains('\\') {
        return None;
    }
    let trimmed = uri_path.trim_start_matches('/');
    let file = if trimmed.is_empty() || trimmed.ends_with('/') {
        format!("{trimmed}index.html")
    } else {
        trimmed.to_string()
    };

    let mut parts = Vec::new();
    for component in Path::new(&file).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Read a file from `root`, falling back to the embedded copy.
async fn read_file(root: &Path, file: &str) -> Option<Vec<u8>> {
    let on_disk = root.join(file);
    match tokio::fs::read(&on_disk).await {
        Ok(bytes) => return Some(bytes),
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            debug!(path = %on_disk.display(), error = %e, "static file unreadable");
        },
        Err(_) => {},
    }
    embedded_file(file).map(<[u8]>::to_vec)
}

/// Fallback handler: serves every GET/HEAD path as a static file.
pub async fn static_handler(
    State(root): State<StaticRoot>,
    method: Method,
    uri: Uri,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    let Some(file) = resolve_request_path(uri.path()) else {
        debug!(path = uri.path(), "rejected path outside static root");
        return (StatusCode::NOT_FOUND, "not found").into_response();
    };

    match read_file(root.path(), &file).await {
        Some(body) => {
            debug!(%file, bytes = body.len(), "serving static file");
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, mime_for_path(&file)),
                    (header::CACHE_CONTROL, "no-cache"),
                    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
                ],
                body,
            )
                .into_response()
        },
        None => (StatusCode::NOT_FOUND, "not found").into_response(),
    }
}
