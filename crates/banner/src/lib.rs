//! Promotional banner engine: decides per page visit whether to show the
//! install banner, builds it from a declarative description, and records
//! user choices in a persistent flag store so people are not nagged twice.
//!
//! Flow: [`client::ClientContext::detect`] classifies the visitor →
//! [`description::load`] fetches the banner description → [`page::BannerPage`]
//! binds the storage keys, builds the element tree, probes the host bridge
//! when the banner promotes an extension, and applies the
//! [`visibility::VisibilityEngine`] verdict.

pub mod client;
pub mod clock;
pub mod description;
pub mod dom;
pub mod element;
pub mod error;
pub mod handlers;
pub mod insight;
pub mod keys;
pub mod page;
pub mod probe;
pub mod store;
pub mod visibility;

pub use {
    client::{BrowserFamily, ClientContext, MobileOs},
    clock::{Clock, ManualClock, SystemClock},
    description::{BannerDescription, BannerType},
    error::{Error, Result},
    handlers::Handler,
    insight::{InsightLogger, Recorded, RepeatReport},
    keys::{InsightEvent, StorageKeyMap},
    page::{BannerPage, host_probe},
    probe::{BridgeError, HostBridge, HostProbe, ProbeOutcome, StaticBridge},
    store::{FileStore, FlagStore, MemoryStore},
    visibility::{Decision, Outcome, Verdict, Visibility, VisibilityEngine},
};
