//! Click handlers a banner description may reference by name.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::keys::InsightEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Handler {
    AddClicked,
    AlreadyInstalledClicked,
    NoThanksClicked,
}

/// What a handler does when its element is clicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerAction {
    /// Slide the banner away and drop it from the page.
    pub removes_banner: bool,
    pub records: InsightEvent,
}

impl Handler {
    pub const ALL: [Self; 3] = [
        Self::AddClicked,
        Self::AlreadyInstalledClicked,
        Self::NoThanksClicked,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::AddClicked => "addClicked",
            Self::AlreadyInstalledClicked => "alreadyInstalledClicked",
            Self::NoThanksClicked => "noThanksClicked",
        }
    }

    #[must_use]
    pub fn names() -> [&'static str; 3] {
        Self::ALL.map(Self::name)
    }

    /// Dispatch table.
    #[must_use]
    pub fn action(self) -> HandlerAction {
        match self {
            Self::AddClicked => HandlerAction {
                removes_banner: false,
                records: InsightEvent::AddClick,
            },
            Self::AlreadyInstalledClicked => HandlerAction {
                removes_banner: true,
                records: InsightEvent::InstalledClick,
            },
            Self::NoThanksClicked => HandlerAction {
                removes_banner: true,
                records: InsightEvent::DeclineClick,
            },
        }
    }
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unregistered handler name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no click handler named \"{0}\"")]
pub struct UnknownHandler(pub String);

impl FromStr for Handler {
    type Err = UnknownHandler;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|h| h.name() == s)
            .ok_or_else(|| UnknownHandler(s.to_string()))
    }
}
