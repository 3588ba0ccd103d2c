//! Logical insight events and the storage keys they persist under.

use std::{collections::HashMap, fmt};

use {
    serde::{Deserialize, Serialize},
    tracing::debug,
};

/// Events the banner records. The first seven are the logical names a
/// banner description binds to storage keys; the last is a diagnostic the
/// host probe emits when the bridge answers with something unrecognisable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InsightEvent {
    DeclineClick,
    AddClick,
    InstalledClick,
    DisplayBanner,
    DeclinedPreviously,
    DeclineTimeout,
    AlreadyInstalled,
    UnexpectedApiResponse,
}

impl InsightEvent {
    /// Logical names a description is expected to bind.
    pub const BOUND: [Self; 7] = [
        Self::DeclineClick,
        Self::AddClick,
        Self::InstalledClick,
        Self::DisplayBanner,
        Self::DeclinedPreviously,
        Self::DeclineTimeout,
        Self::AlreadyInstalled,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::DeclineClick => "declineClick",
            Self::AddClick => "addClick",
            Self::InstalledClick => "installedClick",
            Self::DisplayBanner => "displayBanner",
            Self::DeclinedPreviously => "declinedPreviously",
            Self::DeclineTimeout => "declineTimeout",
            Self::AlreadyInstalled => "alreadyInstalled",
            Self::UnexpectedApiResponse => "unexpectedApiResponse",
        }
    }

    /// The three user conversions: decline, add, already-installed.
    /// Repeats of these get a second diagnostic record with client context.
    #[must_use]
    pub fn is_conversion(self) -> bool {
        matches!(
            self,
            Self::DeclineClick | Self::AddClick | Self::InstalledClick
        )
    }

    /// All logical names, for typo suggestions.
    #[must_use]
    pub fn known_names() -> Vec<&'static str> {
        Self::BOUND
            .iter()
            .chain(std::iter::once(&Self::UnexpectedApiResponse))
            .map(|e| e.name())
            .collect()
    }
}

impl fmt::Display for InsightEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Logical event name → storage key, bound once from a banner description.
///
/// Names outside [`InsightEvent`] are accepted and kept; nothing reads them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKeyMap {
    keys: HashMap<String, String>,
}

impl StorageKeyMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `raw` into the map. Later bindings for the same logical name
    /// overwrite earlier ones; there is no removal.
    pub fn bind<K, V>(&mut self, raw: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (name, key) in raw {
            let (name, key) = (name.into(), key.into());
            debug!(name = %name, key = %key, "binding storage key");
            self.keys.insert(name, key);
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.keys.get(name).map(String::as_str)
    }

    /// Storage key for `event`. Unbound events fall back to their logical
    /// name so two banners without bindings still share sensible keys.
    #[must_use]
    pub fn key_for(&self, event: InsightEvent) -> &str {
        self.get(event.name()).unwrap_or(event.name())
    }
}
