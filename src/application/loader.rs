use crate::config::HostedConfig;
use crate::domain::ports::SharedScriptHost;
use crate::error::PROVIDER_LOAD_GUIDANCE;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderState {
    Idle,
    Loading,
    Ready,
    /// Loading ended without the runtime; carries the message for the customer.
    Failed(String),
}

/// Loads the hosted provider's runtime script once per page.
///
/// Clones share the same underlying state, so every attempt in a page load
/// probes the same runtime. Loading is serialized: concurrent callers wait
/// for the first one and then observe its outcome.
#[derive(Clone)]
pub struct ScriptLoader {
    inner: Arc<LoaderInner>,
}

struct LoaderInner {
    host: SharedScriptHost,
    script_url: String,
    marker: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
    state: watch::Sender<LoaderState>,
    load_lock: Mutex<()>,
}

impl ScriptLoader {
    pub fn new(host: SharedScriptHost, config: &HostedConfig) -> Self {
        let (state, _) = watch::channel(LoaderState::Idle);
        Self {
            inner: Arc::new(LoaderInner {
                host,
                script_url: config.script_url.clone(),
                marker: config.script_marker.clone(),
                poll_interval: config.poll_interval(),
                max_poll_attempts: config.max_poll_attempts.max(1),
                state,
                load_lock: Mutex::new(()),
            }),
        }
    }

    pub fn state(&self) -> LoaderState {
        self.inner.state.borrow().clone()
    }

    /// Makes sure the runtime is available and returns the final state,
    /// which is always `Ready` or `Failed`.
    pub async fn ensure_loaded(&self) -> LoaderState {
        let inner = &self.inner;
        let _guard = inner.load_lock.lock().await;

        if inner.host.runtime_ready() {
            inner.state.send_replace(LoaderState::Ready);
            return LoaderState::Ready;
        }

        inner.state.send_replace(LoaderState::Loading);

        if inner.host.has_script(&inner.marker) {
            tracing::debug!(marker = %inner.marker, "provider script already present");
        } else {
            tracing::debug!(src = %inner.script_url, "injecting provider script");
            if let Err(reason) = inner.host.inject_script(&inner.script_url, &inner.marker).await {
                tracing::warn!(%reason, "provider script failed to load");
                return self.finish(LoaderState::Failed(PROVIDER_LOAD_GUIDANCE.to_string()));
            }
        }

        let mut ticker = tokio::time::interval(inner.poll_interval);
        for _ in 0..inner.max_poll_attempts {
            ticker.tick().await;
            if inner.host.runtime_ready() {
                return self.finish(LoaderState::Ready);
            }
        }

        tracing::warn!(
            attempts = inner.max_poll_attempts,
            "provider runtime never signalled readiness"
        );
        self.finish(LoaderState::Failed(PROVIDER_LOAD_GUIDANCE.to_string()))
    }

    fn finish(&self, state: LoaderState) -> LoaderState {
        self.inner.state.send_replace(state.clone());
        state
    }
}
