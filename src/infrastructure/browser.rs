//! Scripted stand-ins for the browser and the provider SDKs.
//!
//! They drive the orchestrator without a real page: the CLI `simulate`
//! command and the test-suite both run payment attempts through them.

use super::message_bus::ChannelMessageBus;
use crate::config::HostedConfig;
use crate::domain::message::{MessageEnvelope, MessageOrigin, session_event_name};
use crate::domain::ports::{EmbeddedSdk, HostedSurface, PopupBlocked, ScriptHost};
use crate::domain::session::SessionToken;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use url::Url;

/// What the hosted checkout page posts once it is shown.
#[derive(Debug, Clone, PartialEq)]
pub struct HostedReply {
    /// `SUCCESS`, `HIDE` or `ABORTED`, or anything else to test rejection.
    pub status: String,
    pub message: Value,
    pub delay: Duration,
}

impl HostedReply {
    pub fn success(transaction_id: &str) -> Self {
        Self {
            status: "SUCCESS".to_string(),
            message: json!({
                "data": {"transactionId": transaction_id, "approvalCode": "T3E5ST"},
                "hash": format!("hash-{transaction_id}"),
            }),
            delay: Duration::from_millis(300),
        }
    }

    pub fn hide() -> Self {
        Self {
            status: "HIDE".to_string(),
            message: Value::String(String::new()),
            delay: Duration::from_millis(300),
        }
    }

    pub fn aborted(message: &str) -> Self {
        Self {
            status: "ABORTED".to_string(),
            message: Value::String(message.to_string()),
            delay: Duration::from_millis(300),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct BrowserBehavior {
    /// Script tag and runtime are on the page before the first attempt.
    pub script_preloaded: bool,
    /// The script request errors, as with an ad blocker.
    pub script_blocked: bool,
    /// The script loads but never defines its global.
    pub runtime_never_ready: bool,
    /// The iframe renders nothing and posts nothing.
    pub iframe_blocked: bool,
    /// The page refuses to create the iframe at all.
    pub iframe_refused: bool,
    pub popup_blocked: bool,
    pub hosted_reply: Option<HostedReply>,
}

/// A page hosting the hosted-window provider.
pub struct SimulatedBrowser {
    bus: ChannelMessageBus,
    behavior: BrowserBehavior,
    message_prefix: String,
    script_present: AtomicBool,
    injected: AtomicUsize,
    probes: AtomicUsize,
    embedded_opened: AtomicUsize,
    popups: Mutex<Vec<String>>,
    closed: AtomicUsize,
}

impl SimulatedBrowser {
    pub fn new(bus: ChannelMessageBus, behavior: BrowserBehavior) -> Self {
        Self {
            bus,
            script_present: AtomicBool::new(behavior.script_preloaded),
            behavior,
            message_prefix: HostedConfig::default().message_prefix,
            injected: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
            embedded_opened: AtomicUsize::new(0),
            popups: Mutex::new(Vec::new()),
            closed: AtomicUsize::new(0),
        }
    }

    pub fn with_message_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.message_prefix = prefix.into();
        self
    }

    pub fn injected_scripts(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }

    pub fn readiness_probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn embedded_opened(&self) -> usize {
        self.embedded_opened.load(Ordering::SeqCst)
    }

    pub fn popups_opened(&self) -> Vec<String> {
        self.popups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn surfaces_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn post_reply_later(&self, origin: MessageOrigin, session_token: &str) {
        let Some(reply) = self.behavior.hosted_reply.clone() else {
            return;
        };
        let bus = self.bus.clone();
        let data = json!({
            "eventName": session_event_name(&self.message_prefix, session_token),
            "eventStatus": reply.status,
            "eventMessage": reply.message,
        });
        tokio::spawn(async move {
            tokio::time::sleep(reply.delay).await;
            bus.publish(MessageEnvelope::new(origin, data));
        });
    }
}

#[async_trait]
impl ScriptHost for SimulatedBrowser {
    fn has_script(&self, _marker: &str) -> bool {
        self.script_present.load(Ordering::SeqCst)
    }

    async fn inject_script(&self, src: &str, _marker: &str) -> Result<(), String> {
        self.injected.fetch_add(1, Ordering::SeqCst);
        if self.behavior.script_blocked {
            return Err(format!("net::ERR_BLOCKED_BY_CLIENT loading {src}"));
        }
        self.script_present.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn runtime_ready(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.script_present.load(Ordering::SeqCst) && !self.behavior.runtime_never_ready
    }
}

impl HostedSurface for SimulatedBrowser {
    fn open_embedded(&self, session_token: &SessionToken) -> Result<(), String> {
        if self.behavior.iframe_refused {
            return Err("frame-src blocked by content security policy".to_string());
        }
        self.embedded_opened.fetch_add(1, Ordering::SeqCst);
        if !self.behavior.iframe_blocked {
            self.post_reply_later(MessageOrigin::Embedded, session_token.as_str());
        }
        Ok(())
    }

    fn open_popup(&self, url: &str) -> Result<(), PopupBlocked> {
        if self.behavior.popup_blocked {
            return Err(PopupBlocked);
        }
        self.popups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());

        let token = Url::parse(url).ok().and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "checkoutToken")
                .map(|(_, v)| v.into_owned())
        });
        if let Some(token) = token {
            self.post_reply_later(MessageOrigin::Popup, &token);
        }
        Ok(())
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddedBehavior {
    pub mount_error: Option<String>,
    pub mount_delay: Duration,
    /// `None` echoes the client secret back, as the SDK does on success.
    pub confirm_outcome: Option<Result<String, String>>,
    pub confirm_delay: Duration,
}

impl Default for EmbeddedBehavior {
    fn default() -> Self {
        Self {
            mount_error: None,
            mount_delay: Duration::from_millis(50),
            confirm_outcome: None,
            confirm_delay: Duration::from_millis(200),
        }
    }
}

/// The embedded-form provider SDK.
#[derive(Default)]
pub struct SimulatedEmbeddedSdk {
    behavior: EmbeddedBehavior,
    mounts: AtomicUsize,
    confirms: AtomicUsize,
    unmounts: AtomicUsize,
}

impl SimulatedEmbeddedSdk {
    pub fn new(behavior: EmbeddedBehavior) -> Self {
        Self {
            behavior,
            ..Self::default()
        }
    }

    pub fn mounts(&self) -> usize {
        self.mounts.load(Ordering::SeqCst)
    }

    pub fn confirms(&self) -> usize {
        self.confirms.load(Ordering::SeqCst)
    }

    pub fn unmounts(&self) -> usize {
        self.unmounts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddedSdk for SimulatedEmbeddedSdk {
    async fn mount(&self, _client_secret: &str) -> Result<(), String> {
        self.mounts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.behavior.mount_delay).await;
        match &self.behavior.mount_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn confirm(&self, client_secret: &str) -> Result<String, String> {
        self.confirms.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.behavior.confirm_delay).await;
        match &self.behavior.confirm_outcome {
            Some(outcome) => outcome.clone(),
            None => Ok(client_secret.to_string()),
        }
    }

    fn unmount(&self) {
        self.unmounts.fetch_add(1, Ordering::SeqCst);
    }
}
