//! Visibility decision engine.
//!
//! The priority chain runs against two flags, `installedClick` and
//! `declineClick`, in strict order:
//!
//! 1. installed → hide
//! 2. never declined → show, record `displayBanner`
//! 3. decline older than [`DECLINE_EXPIRATION_SECONDS`] → clear the decline,
//!    show, record `declineTimeout`
//! 4. otherwise → hide, record `declinedPreviously`
//!
//! Extension banners probe the host bridge first; a confirmed install hides
//! the banner without running the chain. Desktop rules are applied last and
//! win over everything else.

use {tokio_util::sync::CancellationToken, tracing::{debug, info, warn}};

use crate::{
    client::{BrowserFamily, ClientContext},
    description::BannerType,
    insight::InsightLogger,
    keys::InsightEvent,
    probe::{HostProbe, ProbeOutcome},
};

/// A decline stops the banner for 30 days.
pub const DECLINE_EXPIRATION_SECONDS: f64 = 2_592_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// No decision applied yet; the page's own styling rules.
    Undecided,
    Shown,
    Hidden,
}

/// Result of the priority chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Installed,
    NeverShown,
    DeclineExpired,
    RecentlyDeclined,
}

impl Outcome {
    #[must_use]
    pub fn visibility(self) -> Visibility {
        match self {
            Self::NeverShown | Self::DeclineExpired => Visibility::Shown,
            Self::Installed | Self::RecentlyDeclined => Visibility::Hidden,
        }
    }
}

/// How the verdict was reached.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Decision {
    Chain { outcome: Outcome },
    /// The bridge confirmed the extension is installed.
    ExtensionDetected { version: String },
    /// The bridge answered with something unrecognisable. Visibility is left
    /// alone and the chain never runs.
    ProbeIndeterminate,
    /// The probe was cancelled or timed out before answering.
    ProbeUnresolved { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Verdict {
    pub visibility: Visibility,
    pub decision: Decision,
    /// Reveal the "already have it" link (desktop Firefox after an add click).
    pub already_have_affordance: bool,
    /// Desktop browser other than Chrome/Firefox; forced hidden.
    pub unsupported_browser: bool,
}

/// Decides banner visibility from persisted flags, the clock and the host probe.
#[derive(Clone)]
pub struct VisibilityEngine {
    insights: InsightLogger,
}

impl VisibilityEngine {
    #[must_use]
    pub fn new(insights: InsightLogger) -> Self {
        Self { insights }
    }

    /// Run the priority chain and its logging side effects.
    pub fn run_chain(&self) -> Outcome {
        let insights = &self.insights;

        if insights.has_flag(InsightEvent::InstalledClick) {
            debug!("installed flag present, hiding banner");
            return Outcome::Installed;
        }

        let Some(declined_at) = insights.flag_seconds(InsightEvent::DeclineClick) else {
            insights.record_daily(InsightEvent::DisplayBanner);
            return Outcome::NeverShown;
        };

        let age = insights.clock().now_seconds() - declined_at;
        if age > DECLINE_EXPIRATION_SECONDS {
            info!(age_secs = age, "decline expired, showing banner again");
            insights.clear(InsightEvent::DeclineClick);
            insights.record_daily(InsightEvent::DeclineTimeout);
            Outcome::DeclineExpired
        } else {
            insights.record_daily(InsightEvent::DeclinedPreviously);
            Outcome::RecentlyDeclined
        }
    }

    /// Full decision for one page visit.
    pub async fn decide(
        &self,
        banner_type: &BannerType,
        client: &ClientContext,
        probe: &HostProbe,
        cancel: &CancellationToken,
    ) -> Verdict {
        let (mut visibility, decision) = if banner_type.is_extension() {
            self.decide_with_probe(client, probe, cancel).await
        } else {
            let outcome = self.run_chain();
            (outcome.visibility(), Decision::Chain { outcome })
        };

        let mut already_have_affordance = false;
        let mut unsupported_browser = false;
        if client.is_desktop_path() {
            if client.browser == BrowserFamily::Firefox
                && self.insights.has_flag(InsightEvent::AddClick)
                && !self.insights.has_flag(InsightEvent::InstalledClick)
            {
                already_have_affordance = true;
            }
            if client.browser == BrowserFamily::Other {
                debug!("unsupported desktop browser, forcing banner hidden");
                unsupported_browser = true;
                visibility = Visibility::Hidden;
            }
        }

        Verdict {
            visibility,
            decision,
            already_have_affordance,
            unsupported_browser,
        }
    }

    async fn decide_with_probe(
        &self,
        client: &ClientContext,
        probe: &HostProbe,
        cancel: &CancellationToken,
    ) -> (Visibility, Decision) {
        match probe.probe(client, cancel).await {
            Ok(ProbeOutcome::NotPresent) => {
                let outcome = self.run_chain();
                (outcome.visibility(), Decision::Chain { outcome })
            },
            Ok(ProbeOutcome::Present { version }) => {
                self.insights.record_daily(InsightEvent::AlreadyInstalled);
                (Visibility::Hidden, Decision::ExtensionDetected { version })
            },
            Ok(ProbeOutcome::Indeterminate { .. }) => {
                self.insights
                    .record_daily(InsightEvent::UnexpectedApiResponse);
                (Visibility::Undecided, Decision::ProbeIndeterminate)
            },
            Err(e) => {
                warn!(error = %e, "host probe did not resolve, leaving banner undecided");
                (Visibility::Undecided, Decision::ProbeUnresolved {
                    reason: e.to_string(),
                })
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use {rstest::rstest, serde_json::json};

    use {
        super::*,
        crate::{
            clock::ManualClock,
            keys::StorageKeyMap,
            probe::StaticBridge,
            store::{FlagStore, MemoryStore},
        },
    };

    const NOW: i64 = 1_700_000_000;
    const CHROME: &str = "Mozilla/5.0 (X11; Linux x86_64) Chrome/120.0 Safari/537.36";
    const FIREFOX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
    const SAFARI: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2) Version/17.2 Safari/605.1.15";
    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) Mobile/15E148";

    struct Fixture {
        store: Arc<MemoryStore>,
        engine: VisibilityEngine,
    }

    fn fixture(client: &ClientContext) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let mut keys = StorageKeyMap::new();
        keys.bind([
            ("declineClick", "d"),
            ("addClick", "a"),
            ("installedClick", "i"),
            ("displayBanner", "show"),
            ("declinedPreviously", "prev"),
            ("declineTimeout", "timeout"),
            ("alreadyInstalled", "already"),
        ]);
        let insights = InsightLogger::new(
            store.clone(),
            Arc::new(keys),
            Arc::new(ManualClock::at_seconds(NOW)),
            Arc::new(client.clone()),
        );
        Fixture {
            store,
            engine: VisibilityEngine::new(insights),
        }
    }

    fn chrome() -> ClientContext {
        ClientContext::detect(CHROME, Some("Google Inc."))
    }

    fn promo() -> BannerType {
        BannerType::Other("promo".into())
    }

    async fn decide(fx: &Fixture, client: &ClientContext, kind: &BannerType, probe: &HostProbe) -> Verdict {
        fx.engine
            .decide(kind, client, probe, &CancellationToken::new())
            .await
    }

    #[rstest]
    #[case(None)]
    #[case(Some(NOW))]
    #[case(Some(NOW - 3_000_000))]
    fn installed_wins_over_every_decline_state(#[case] declined_at: Option<i64>) {
        let fx = fixture(&chrome());
        fx.store.set("i", &NOW.to_string());
        if let Some(at) = declined_at {
            fx.store.set("d", &at.to_string());
        }
        assert_eq!(fx.engine.run_chain(), Outcome::Installed);
        assert_eq!(fx.store.get("show"), None);
    }

    #[rstest]
    #[case(2_592_000, Outcome::RecentlyDeclined)]
    #[case(2_591_999, Outcome::RecentlyDeclined)]
    #[case(2_592_001, Outcome::DeclineExpired)]
    #[case(0, Outcome::RecentlyDeclined)]
    fn decline_expiry_boundary(#[case] age: i64, #[case] expected: Outcome) {
        let fx = fixture(&chrome());
        fx.store.set("d", &(NOW - age).to_string());

        assert_eq!(fx.engine.run_chain(), expected);
        let cleared = fx.store.get("d").is_none();
        assert_eq!(cleared, expected == Outcome::DeclineExpired);
    }

    #[test]
    fn fractional_decline_timestamp_compared_unrounded() {
        let fx = fixture(&chrome());
        fx.store.set("d", &format!("{}.5", NOW - 2_592_001));
        // 2_592_000.5 seconds old: strictly greater than the limit.
        assert_eq!(fx.engine.run_chain(), Outcome::DeclineExpired);
    }

    #[test]
    fn unparseable_decline_never_expires() {
        let fx = fixture(&chrome());
        fx.store.set("d", "not-a-number");
        assert_eq!(fx.engine.run_chain(), Outcome::RecentlyDeclined);
        assert!(fx.store.get("prev").is_some());
    }

    #[tokio::test]
    async fn no_flags_shows_and_records_display() {
        let client = chrome();
        let fx = fixture(&client);
        let verdict = decide(&fx, &client, &promo(), &HostProbe::unavailable()).await;

        assert_eq!(verdict.visibility, Visibility::Shown);
        assert_eq!(verdict.decision, Decision::Chain {
            outcome: Outcome::NeverShown
        });
        assert_eq!(fx.store.get("show").as_deref(), Some("1700000000"));
    }

    #[tokio::test]
    async fn expired_decline_shows_clears_and_records_timeout() {
        let client = chrome();
        let fx = fixture(&client);
        fx.store.set("d", &(NOW - 2_600_000).to_string());

        let verdict = decide(&fx, &client, &promo(), &HostProbe::unavailable()).await;

        assert_eq!(verdict.visibility, Visibility::Shown);
        assert_eq!(fx.store.get("d"), None);
        assert_eq!(fx.store.get("timeout").as_deref(), Some("1700000000"));
    }

    #[tokio::test]
    async fn recent_decline_hides_and_records() {
        let client = chrome();
        let fx = fixture(&client);
        fx.store.set("d", &(NOW - 60).to_string());

        let verdict = decide(&fx, &client, &promo(), &HostProbe::unavailable()).await;

        assert_eq!(verdict.visibility, Visibility::Hidden);
        assert!(fx.store.get("prev").is_some());
        assert!(fx.store.get("show").is_none());
    }

    #[tokio::test]
    async fn unsupported_desktop_browser_forced_hidden() {
        let client = ClientContext::detect(SAFARI, Some("Apple Computer, Inc."));
        let fx = fixture(&client);

        let verdict = decide(&fx, &client, &promo(), &HostProbe::unavailable()).await;

        assert_eq!(verdict.visibility, Visibility::Hidden);
        assert!(verdict.unsupported_browser);
        // The chain still ran and logged before the override.
        assert_eq!(verdict.decision, Decision::Chain {
            outcome: Outcome::NeverShown
        });
    }

    #[tokio::test]
    async fn unsupported_browser_override_skipped_on_mobile() {
        let client = ClientContext::detect(IPHONE, Some("Apple Computer, Inc."));
        let fx = fixture(&client);

        let verdict = decide(&fx, &client, &promo(), &HostProbe::unavailable()).await;

        assert_eq!(verdict.visibility, Visibility::Shown);
        assert!(!verdict.unsupported_browser);
    }

    #[tokio::test]
    async fn firefox_add_click_reveals_affordance() {
        let client = ClientContext::detect(FIREFOX, None);
        let fx = fixture(&client);
        fx.store.set("a", &NOW.to_string());

        let verdict = decide(&fx, &client, &promo(), &HostProbe::unavailable()).await;
        assert!(verdict.already_have_affordance);

        fx.store.set("i", &NOW.to_string());
        let verdict = decide(&fx, &client, &promo(), &HostProbe::unavailable()).await;
        assert!(!verdict.already_have_affordance);
        assert_eq!(verdict.visibility, Visibility::Hidden);
    }

    #[tokio::test]
    async fn extension_detected_hides_without_chain() {
        let client = chrome();
        let fx = fixture(&client);
        let probe = HostProbe::new(
            Some(Arc::new(StaticBridge::Reply(json!({"version": "1.0.3"})))),
            "ext",
        );

        let verdict = decide(&fx, &client, &BannerType::Extension, &probe).await;

        assert_eq!(verdict.visibility, Visibility::Hidden);
        assert_eq!(verdict.decision, Decision::ExtensionDetected {
            version: "1.0.3".into()
        });
        assert!(fx.store.get("already").is_some());
        assert!(fx.store.get("show").is_none());
    }

    #[tokio::test]
    async fn extension_absent_falls_back_to_chain() {
        let client = chrome();
        let fx = fixture(&client);
        let probe = HostProbe::new(Some(Arc::new(StaticBridge::Empty)), "ext");

        let verdict = decide(&fx, &client, &BannerType::Extension, &probe).await;

        assert_eq!(verdict.visibility, Visibility::Shown);
        assert!(fx.store.get("show").is_some());
    }

    // The bridge answered but without a version: nothing decides visibility
    // and the chain never runs. Kept fail-open on purpose.
    #[tokio::test]
    async fn indeterminate_probe_leaves_banner_undecided() {
        let client = chrome();
        let fx = fixture(&client);
        let probe = HostProbe::new(
            Some(Arc::new(StaticBridge::Reply(json!({"ok": true})))),
            "ext",
        );

        let verdict = decide(&fx, &client, &BannerType::Extension, &probe).await;

        assert_eq!(verdict.visibility, Visibility::Undecided);
        assert_eq!(verdict.decision, Decision::ProbeIndeterminate);
        assert!(fx.store.get("show").is_none());
        assert!(fx.store.get("unexpectedApiResponse").is_some());
    }

    #[tokio::test]
    async fn timed_out_probe_leaves_banner_undecided() {
        let client = chrome();
        let fx = fixture(&client);
        let probe = HostProbe::new(Some(Arc::new(StaticBridge::Silent)), "ext")
            .with_timeout(Some(Duration::from_millis(5)));

        let verdict = decide(&fx, &client, &BannerType::Extension, &probe).await;

        assert_eq!(verdict.visibility, Visibility::Undecided);
        assert!(matches!(verdict.decision, Decision::ProbeUnresolved { .. }));
        assert!(fx.store.entries().is_empty());
    }
}
