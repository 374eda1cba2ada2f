use crate::domain::session::{AttemptId, Provider};
use tokio::sync::watch;

/// Whether the checkout page may enable its "place order" button.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Readiness {
    pub attempt: Option<AttemptId>,
    pub provider: Option<Provider>,
    pub ready: bool,
    /// Set when the provider UI failed to load, to tell it apart from
    /// "still loading".
    pub load_error: Option<String>,
}

/// Holds the readiness of the current attempt.
///
/// Updates carry the attempt they belong to and are ignored unless that
/// attempt is still the current one, so a slow provider from an abandoned
/// attempt can never flip the new attempt to ready.
#[derive(Debug)]
pub struct ReadinessTracker {
    tx: watch::Sender<Readiness>,
}

impl Default for ReadinessTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Readiness::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<Readiness> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Readiness {
        self.tx.borrow().clone()
    }

    /// Starts tracking a new attempt, discarding the previous one's state.
    pub fn begin(&self, attempt: AttemptId, provider: Provider) {
        self.tx.send_replace(Readiness {
            attempt: Some(attempt),
            provider: Some(provider),
            ready: false,
            load_error: None,
        });
    }

    pub fn mark_ready(&self, attempt: AttemptId) -> bool {
        self.update(attempt, |r| {
            r.ready = true;
            r.load_error = None;
        })
    }

    pub fn mark_failed(&self, attempt: AttemptId, message: impl Into<String>) -> bool {
        let message = message.into();
        self.update(attempt, move |r| {
            r.ready = false;
            r.load_error = Some(message);
        })
    }

    /// The attempt ended or was torn down; the button goes back to disabled.
    pub fn clear(&self, attempt: AttemptId) -> bool {
        self.update(attempt, |r| r.ready = false)
    }

    fn update(&self, attempt: AttemptId, apply: impl FnOnce(&mut Readiness)) -> bool {
        self.tx.send_if_modified(|state| {
            if state.attempt != Some(attempt) {
                tracing::debug!(%attempt, "ignoring readiness update from a stale attempt");
                return false;
            }
            apply(state);
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_for_current_attempt() {
        let tracker = ReadinessTracker::new();
        tracker.begin(AttemptId(1), Provider::HostedWindow);
        assert!(tracker.mark_ready(AttemptId(1)));
        assert!(tracker.current().ready);
    }

    #[test]
    fn test_stale_attempt_cannot_mark_ready() {
        let tracker = ReadinessTracker::new();
        tracker.begin(AttemptId(1), Provider::HostedWindow);
        tracker.begin(AttemptId(2), Provider::EmbeddedForm);

        assert!(!tracker.mark_ready(AttemptId(1)));
        let state = tracker.current();
        assert!(!state.ready);
        assert_eq!(state.provider, Some(Provider::EmbeddedForm));
    }

    #[test]
    fn test_failure_is_distinguishable_from_loading() {
        let tracker = ReadinessTracker::new();
        tracker.begin(AttemptId(3), Provider::HostedWindow);
        assert_eq!(tracker.current().load_error, None);

        tracker.mark_failed(AttemptId(3), "could not load");
        let state = tracker.current();
        assert!(!state.ready);
        assert_eq!(state.load_error.as_deref(), Some("could not load"));
    }

    #[tokio::test]
    async fn test_subscribers_observe_changes() {
        let tracker = ReadinessTracker::new();
        let mut rx = tracker.subscribe();
        tracker.begin(AttemptId(1), Provider::EmbeddedForm);
        tracker.mark_ready(AttemptId(1));

        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().ready);
    }
}
