use crate::config::HostedConfig;
use crate::domain::message::{
    CompletionPayload, EventStatus, HostedMessage, MessageEnvelope, MessageOrigin,
    session_event_name,
};
use crate::domain::ports::{SharedMessageBus, SharedSurface};
use crate::domain::session::SessionToken;
use crate::error::{GENERIC_DECLINE, PaymentError, Result};
use std::time::Duration;
use url::Url;

/// Drives the hosted-window completion protocol for one session.
///
/// The adapter subscribes to the message bus before showing the hosted UI,
/// waits for the first terminal event tagged with the session, and falls back
/// to a popup if the iframe stays silent. Returning, or being dropped
/// mid-wait, releases the subscription, the fallback timer and the open
/// surface.
pub struct HostedWindowAdapter {
    surface: SharedSurface,
    bus: SharedMessageBus,
    message_prefix: String,
    popup_url: Url,
    fallback_delay: Duration,
}

impl HostedWindowAdapter {
    pub fn new(
        surface: SharedSurface,
        bus: SharedMessageBus,
        config: &HostedConfig,
    ) -> std::result::Result<Self, url::ParseError> {
        Ok(Self {
            surface,
            bus,
            message_prefix: config.message_prefix.clone(),
            popup_url: Url::parse(&config.popup_url)?,
            fallback_delay: config.fallback_delay(),
        })
    }

    pub fn popup_url(&self, session_token: &SessionToken) -> Url {
        let mut url = self.popup_url.clone();
        url.query_pairs_mut()
            .append_pair("checkoutToken", session_token.as_str());
        url
    }

    /// Waits for the customer to finish the hosted checkout and returns the
    /// payload to validate.
    pub async fn await_completion(&self, session_token: &SessionToken) -> Result<CompletionPayload> {
        let expected = session_event_name(&self.message_prefix, session_token.as_str());
        let mut subscription = self.bus.subscribe();
        let _surface = SurfaceGuard(&self.surface);

        let mut accepted = MessageOrigin::Embedded;
        let mut fallback_armed = true;
        let fallback = tokio::time::sleep(self.fallback_delay);
        tokio::pin!(fallback);

        if let Err(reason) = self.surface.open_embedded(session_token) {
            tracing::warn!(%reason, "hosted iframe could not be opened, using popup");
            self.open_popup(session_token)?;
            accepted = MessageOrigin::Popup;
            fallback_armed = false;
        }

        loop {
            tokio::select! {
                _ = &mut fallback, if fallback_armed => {
                    fallback_armed = false;
                    tracing::warn!(
                        session = %session_token,
                        delay_ms = self.fallback_delay.as_millis() as u64,
                        "no response from hosted iframe, falling back to popup"
                    );
                    self.open_popup(session_token)?;
                    accepted = MessageOrigin::Popup;
                }
                envelope = subscription.recv() => {
                    let Some(envelope) = envelope else {
                        return Err(PaymentError::Closed);
                    };
                    if let Some(outcome) = interpret(&envelope, &expected, accepted) {
                        return outcome;
                    }
                }
            }
        }
    }

    fn open_popup(&self, session_token: &SessionToken) -> Result<()> {
        let url = self.popup_url(session_token);
        self.surface.open_popup(url.as_str()).map_err(|_| {
            tracing::warn!(session = %session_token, "fallback popup was blocked");
            PaymentError::PopupBlocked
        })
    }
}

struct SurfaceGuard<'a>(&'a SharedSurface);

impl Drop for SurfaceGuard<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// `None` means the message does not concern this session and is dropped.
fn interpret(
    envelope: &MessageEnvelope,
    expected: &str,
    accepted: MessageOrigin,
) -> Option<Result<CompletionPayload>> {
    let message = HostedMessage::from_value(&envelope.data)?;

    if message.event_name != expected {
        tracing::debug!(event = %message.event_name, "dropping message for another session");
        return None;
    }
    if envelope.origin != accepted {
        tracing::debug!(origin = ?envelope.origin, "dropping message from superseded surface");
        return None;
    }

    Some(match message.event_status {
        EventStatus::Hide => Err(PaymentError::Cancelled),
        EventStatus::Aborted => Err(PaymentError::Declined(
            message
                .message_text()
                .unwrap_or_else(|| GENERIC_DECLINE.to_string()),
        )),
        EventStatus::Success => CompletionPayload::extract(&message.event_message)
            .ok_or(PaymentError::InvalidProviderResponse),
    })
}
