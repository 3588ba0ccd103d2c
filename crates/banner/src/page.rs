//! One page visit: the banner's DOM, its decision, and its click handlers.

use std::{sync::Arc, time::Duration};

use {
    nudge_config::BannerConfig,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info},
};

use crate::{
    client::ClientContext,
    clock::Clock,
    description::{BannerDescription, BannerType},
    dom::BannerDom,
    element::ElementBuilder,
    error::Result,
    handlers::Handler,
    insight::{InsightLogger, Recorded},
    probe::{HostBridge, HostProbe},
    store::FlagStore,
    visibility::{Verdict, VisibilityEngine},
};

/// Build a [`HostProbe`] from the `[banner]` settings.
pub fn host_probe(config: &BannerConfig, bridge: Option<Arc<dyn HostBridge>>) -> HostProbe {
    HostProbe::new(bridge, config.bridge_target_id.as_str())
        .with_timeout(config.probe_timeout_ms.map(Duration::from_millis))
}

pub struct BannerPage {
    client: Arc<ClientContext>,
    banner_type: BannerType,
    dom: BannerDom,
    insights: InsightLogger,
    engine: VisibilityEngine,
    verdict: Option<Verdict>,
}

impl BannerPage {
    /// Bind the description's storage keys and build its elements into a
    /// fresh container. Fails without side effects when the description has
    /// more segments than the container has mount points.
    pub fn new(
        config: &BannerConfig,
        store: Arc<dyn FlagStore>,
        clock: Arc<dyn Clock>,
        client: ClientContext,
        description: BannerDescription,
    ) -> Result<Self> {
        let BannerDescription {
            banner_type,
            storage_keys,
            elements,
        } = description;

        let mut dom = BannerDom::new(config.container_id.as_str(), config.mount_points);
        ElementBuilder::new(&client).build(&elements, &mut dom)?;
        debug!(
            container = %dom.container_id,
            segments = elements.len(),
            "banner elements built"
        );

        let client = Arc::new(client);
        let insights = InsightLogger::new(store, Arc::new(storage_keys), clock, client.clone());
        let engine = VisibilityEngine::new(insights.clone());

        Ok(Self {
            client,
            banner_type,
            dom,
            insights,
            engine,
            verdict: None,
        })
    }

    /// Decide visibility and apply it to the DOM.
    pub async fn show(&mut self, probe: &HostProbe, cancel: &CancellationToken) -> &Verdict {
        let verdict = self
            .engine
            .decide(&self.banner_type, &self.client, probe, cancel)
            .await;
        info!(
            visibility = ?verdict.visibility,
            decision = ?verdict.decision,
            "banner visibility decided"
        );

        self.dom.visibility = verdict.visibility;
        self.dom.already_have_visible = verdict.already_have_affordance;
        self.verdict.insert(verdict)
    }

    /// Run a click handler: dismiss the banner if the handler does, then
    /// record its event.
    pub fn click(&mut self, handler: Handler) -> Recorded {
        let action = handler.action();
        if action.removes_banner {
            debug!(%handler, "removing banner");
            self.dom.removed = true;
        }
        self.insights.record(action.records)
    }

    #[must_use]
    pub fn render(&self) -> String {
        self.dom.to_html()
    }

    #[must_use]
    pub fn verdict(&self) -> Option<&Verdict> {
        self.verdict.as_ref()
    }

    #[must_use]
    pub fn dom(&self) -> &BannerDom {
        &self.dom
    }

    #[must_use]
    pub fn insights(&self) -> &InsightLogger {
        &self.insights
    }
}
