/// Config schema types (static server and banner behaviour).
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Extension id the companion bridge answers to.
pub const DEFAULT_BRIDGE_TARGET_ID: &str = "acehchockcmgigjilbjhecnepiohkfld";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NudgeConfig {
    pub server: ServerConfig,
    pub banner: BannerConfig,
}

/// Static asset server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    /// Port to listen on. Defaults to 3000.
    pub port: u16,
    /// Directory whose files are served. Defaults to the working directory.
    pub root: PathBuf,
    /// Send permissive CORS headers on every response.
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 3000,
            root: PathBuf::from("."),
            cors: true,
        }
    }
}

/// Banner behaviour: where descriptions live, where flags persist, and how
/// the host bridge is addressed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BannerConfig {
    /// Directory holding `<template>-banner.json` descriptions, relative to
    /// `server.root` unless absolute.
    pub promotions_dir: PathBuf,
    /// Template used when none is given on the command line.
    pub default_template: String,
    /// Flag store file. `None` means `<data_dir>/flags.json`.
    pub store_path: Option<PathBuf>,
    /// Target id sent with every bridge request.
    pub bridge_target_id: String,
    /// Give up on the bridge after this many milliseconds. `None` waits
    /// forever, matching a browser that never calls back.
    pub probe_timeout_ms: Option<u64>,
    /// Number of mount points inside the banner container.
    pub mount_points: usize,
    /// DOM id of the banner container.
    pub container_id: String,
}

impl Default for BannerConfig {
    fn default() -> Self {
        Self {
            promotions_dir: PathBuf::from("promotions"),
            default_template: "extension-template".into(),
            store_path: None,
            bridge_target_id: DEFAULT_BRIDGE_TARGET_ID.into(),
            probe_timeout_ms: None,
            mount_points: 3,
            container_id: "generic-banner".into(),
        }
    }
}

impl BannerConfig {
    /// Path of the description file for `template`, resolved against `root`.
    ///
    /// Template names are case-insensitive: `Mobile-Template` and
    /// `mobile-template` select the same file.
    #[must_use]
    pub fn template_path(&self, root: &std::path::Path, template: &str) -> PathBuf {
        let file = format!("{}-banner.json", template.trim().to_lowercase());
        let dir = if self.promotions_dir.is_absolute() {
            self.promotions_dir.clone()
        } else {
            root.join(&self.promotions_dir)
        };
        dir.join(file)
    }
}
