use crate::domain::ports::SharedEmbeddedSdk;
use crate::domain::session::SessionToken;
use crate::error::{GENERIC_DECLINE, PROVIDER_LOAD_GUIDANCE, PaymentError, Result};
use std::time::Duration;

const INTENT_PREFIX: &str = "pi_";
const SECRET_SEPARATOR: &str = "_secret_";

/// Drives the embedded-form provider: mount the form element, then run the
/// SDK's confirm call when the customer places the order.
pub struct EmbeddedFormAdapter {
    sdk: SharedEmbeddedSdk,
    mount_timeout: Duration,
}

impl EmbeddedFormAdapter {
    pub fn new(sdk: SharedEmbeddedSdk, mount_timeout: Duration) -> Self {
        Self { sdk, mount_timeout }
    }

    /// Mounts the form for `client_secret`; ready once this returns `Ok`.
    pub async fn prepare(&self, client_secret: &SessionToken) -> Result<()> {
        match tokio::time::timeout(self.mount_timeout, self.sdk.mount(client_secret.as_str())).await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => {
                tracing::warn!(%reason, "payment form failed to mount");
                Err(PaymentError::ProviderLoadFailed(PROVIDER_LOAD_GUIDANCE.to_string()))
            }
            Err(_) => {
                tracing::warn!("payment form did not report mounted in time");
                Err(PaymentError::ProviderLoadFailed(PROVIDER_LOAD_GUIDANCE.to_string()))
            }
        }
    }

    /// Runs the SDK confirm and returns the provider's raw payment identifier.
    pub async fn confirm(&self, client_secret: &SessionToken) -> Result<String> {
        self.sdk
            .confirm(client_secret.as_str())
            .await
            .map_err(|message| {
                tracing::info!(%message, "provider declined payment");
                let message = message.trim();
                if message.is_empty() {
                    PaymentError::Declined(GENERIC_DECLINE.to_string())
                } else {
                    PaymentError::Declined(message.to_string())
                }
            })
    }

    pub fn release(&self) {
        self.sdk.unmount();
    }
}

/// Recovers the payment intent id from the identifier the SDK returns.
///
/// Accepts `pi_<id>_secret_<secret>` and a bare `pi_<id>`.
pub fn parse_intent_id(identifier: &str) -> Result<String> {
    let identifier = identifier.trim();
    let intent = identifier
        .split_once(SECRET_SEPARATOR)
        .map_or(identifier, |(intent, _)| intent);

    match intent.strip_prefix(INTENT_PREFIX) {
        Some(rest) if !rest.is_empty() && !rest.contains(char::is_whitespace) => {
            Ok(intent.to_string())
        }
        _ => Err(PaymentError::InvalidProviderResponse),
    }
}
