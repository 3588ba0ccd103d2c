//! Host capability probe: asks a companion extension whether it is installed.
//!
//! Only Chrome clients with a bridge attached are probed; everyone else is
//! reported as [`ProbeOutcome::NotPresent`] straight away so the normal
//! visibility chain runs.
//!
//! A bridge that never answers is a liveness gap: without a configured
//! timeout the probe waits until cancelled, and the banner stays in its
//! pre-probe state. Nothing is retried.

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    serde_json::Value,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    client::{BrowserFamily, ClientContext},
    error::{Error, Result},
};

/// Message the extension understands as "report your version".
pub const VERSION_MESSAGE: &str = "version";

/// Request sent over the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeRequest {
    pub message: String,
}

impl BridgeRequest {
    #[must_use]
    pub fn version() -> Self {
        Self {
            message: VERSION_MESSAGE.into(),
        }
    }
}

/// The bridge reported an error instead of a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("bridge error: {0}")]
pub struct BridgeError(pub String);

/// Message channel to a host integration such as a browser extension.
#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Send `request` to `target_id`. `Ok(None)` is an empty response.
    async fn send_message(
        &self,
        target_id: &str,
        request: &BridgeRequest,
    ) -> std::result::Result<Option<Value>, BridgeError>;
}

/// What the probe learned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// No bridge, a bridge error, or an empty response.
    NotPresent,
    /// The extension answered with its version.
    Present { version: String },
    /// A response without a version and without an error.
    Indeterminate { response: Value },
}

/// Probes a [`HostBridge`] on behalf of one page visit.
#[derive(Clone)]
pub struct HostProbe {
    bridge: Option<Arc<dyn HostBridge>>,
    target_id: String,
    timeout: Option<Duration>,
}

impl HostProbe {
    pub fn new(bridge: Option<Arc<dyn HostBridge>>, target_id: impl Into<String>) -> Self {
        Self {
            bridge,
            target_id: target_id.into(),
            timeout: None,
        }
    }

    /// A probe with no bridge; every client is reported as not present.
    pub fn unavailable() -> Self {
        Self::new(None, "")
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ask the bridge whether the extension is installed.
    ///
    /// Returns [`Error::ProbeCancelled`] when `cancel` fires first and
    /// [`Error::BridgeTimeout`] when a configured deadline passes.
    pub async fn probe(
        &self,
        client: &ClientContext,
        cancel: &CancellationToken,
    ) -> Result<ProbeOutcome> {
        let bridge = match (&self.bridge, client.browser) {
            (Some(bridge), BrowserFamily::Chrome) => bridge,
            (None, _) => {
                debug!("no host bridge attached, skipping probe");
                return Ok(ProbeOutcome::NotPresent);
            },
            (Some(_), browser) => {
                debug!(?browser, "host bridge only reachable from Chrome, skipping probe");
                return Ok(ProbeOutcome::NotPresent);
            },
        };

        let request = BridgeRequest::version();
        let send = bridge.send_message(&self.target_id, &request);
        let reply = match self.timeout {
            Some(limit) => tokio::select! {
                () = cancel.cancelled() => return Err(Error::ProbeCancelled),
                reply = tokio::time::timeout(limit, send) => {
                    reply.map_err(|_| Error::BridgeTimeout(limit))?
                },
            },
            None => tokio::select! {
                () = cancel.cancelled() => return Err(Error::ProbeCancelled),
                reply = send => reply,
            },
        };

        Ok(classify(reply))
    }
}

fn classify(reply: std::result::Result<Option<Value>, BridgeError>) -> ProbeOutcome {
    match reply {
        Err(e) => {
            debug!(error = %e, "bridge error, treating extension as absent");
            ProbeOutcome::NotPresent
        },
        Ok(None) | Ok(Some(Value::Null)) => {
            debug!("empty bridge response, treating extension as absent");
            ProbeOutcome::NotPresent
        },
        Ok(Some(response)) => match version_of(&response) {
            Some(version) => {
                info!(%version, "extension already installed");
                ProbeOutcome::Present { version }
            },
            None => {
                warn!(%response, "unexpected bridge response");
                ProbeOutcome::Indeterminate { response }
            },
        },
    }
}

/// A usable `version` field: non-empty string, non-zero number, or `true`.
fn version_of(response: &Value) -> Option<String> {
    match response.get("version")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64().is_some_and(|v| v != 0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".into()),
        Value::Array(_) | Value::Object(_) => Some(response["version"].to_string()),
        _ => None,
    }
}

/// Bridge with a canned reply, for the CLI and tests.
#[derive(Debug, Clone)]
pub enum StaticBridge {
    Reply(Value),
    Empty,
    Fail(String),
    /// Never answers.
    Silent,
}

#[async_trait]
impl HostBridge for StaticBridge {
    async fn send_message(
        &self,
        target_id: &str,
        request: &BridgeRequest,
    ) -> std::result::Result<Option<Value>, BridgeError> {
        debug!(target_id, message = %request.message, "static bridge received message");
        match self {
            Self::Reply(value) => Ok(Some(value.clone())),
            Self::Empty => Ok(None),
            Self::Fail(reason) => Err(BridgeError(reason.clone())),
            Self::Silent => std::future::pending().await,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json, std::sync::Mutex};

    const CHROME: &str = "Mozilla/5.0 (X11; Linux x86_64) Chrome/120.0 Safari/537.36";

    fn chrome() -> ClientContext {
        ClientContext::detect(CHROME, Some("Google Inc."))
    }

    fn probe_with(bridge: StaticBridge) -> HostProbe {
        HostProbe::new(Some(Arc::new(bridge)), "ext-id")
    }

    #[derive(Default)]
    struct RecordingBridge {
        seen: Mutex<Vec<(String, BridgeRequest)>>,
    }

    #[async_trait]
    impl HostBridge for RecordingBridge {
        async fn send_message(
            &self,
            target_id: &str,
            request: &BridgeRequest,
        ) -> std::result::Result<Option<Value>, BridgeError> {
            self.seen
                .lock()
                .unwrap()
                .push((target_id.to_string(), request.clone()));
            Ok(Some(json!({"version": "2.4.1"})))
        }
    }

    #[tokio::test]
    async fn sends_version_request_to_target() {
        let bridge = Arc::new(RecordingBridge::default());
        let probe = HostProbe::new(Some(bridge.clone()), "acehchockcmgigjilbjhecnepiohkfld");

        let outcome = probe
            .probe(&chrome(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, ProbeOutcome::Present {
            version: "2.4.1".into()
        });
        let seen = bridge.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "acehchockcmgigjilbjhecnepiohkfld");
        assert_eq!(
            serde_json::to_value(&seen[0].1).unwrap(),
            json!({"message": "version"})
        );
    }

    #[tokio::test]
    async fn error_and_empty_mean_not_present() {
        let cancel = CancellationToken::new();
        for bridge in [
            StaticBridge::Fail("no receiving end".into()),
            StaticBridge::Empty,
            StaticBridge::Reply(Value::Null),
        ] {
            let outcome = probe_with(bridge).probe(&chrome(), &cancel).await.unwrap();
            assert_eq!(outcome, ProbeOutcome::NotPresent);
        }
    }

    #[tokio::test]
    async fn malformed_response_is_indeterminate() {
        let outcome = probe_with(StaticBridge::Reply(json!({"status": "ok"})))
            .probe(&chrome(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, ProbeOutcome::Indeterminate { .. }));

        let outcome = probe_with(StaticBridge::Reply(json!({"version": ""})))
            .probe(&chrome(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(outcome, ProbeOutcome::Indeterminate { .. }));
    }

    #[tokio::test]
    async fn non_chrome_skips_bridge() {
        let firefox = ClientContext::detect("Gecko/20100101 Firefox/121.0", None);
        let outcome = probe_with(StaticBridge::Silent)
            .probe(&firefox, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, ProbeOutcome::NotPresent);
    }

    #[tokio::test]
    async fn missing_bridge_is_not_present() {
        let outcome = HostProbe::unavailable()
            .probe(&chrome(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, ProbeOutcome::NotPresent);
    }

    #[tokio::test]
    async fn silent_bridge_waits_until_cancelled() {
        let cancel = CancellationToken::new();
        let probe = probe_with(StaticBridge::Silent);
        let client = chrome();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = probe.probe(&client, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::ProbeCancelled));
    }

    #[tokio::test]
    async fn silent_bridge_times_out_when_configured() {
        let probe = probe_with(StaticBridge::Silent).with_timeout(Some(Duration::from_millis(10)));
        let err = probe
            .probe(&chrome(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BridgeTimeout(d) if d == Duration::from_millis(10)));
    }
}
