use super::amount::Amount;
use super::message::MessageEnvelope;
use super::session::{AuthToken, Provider, SecondaryToken, SessionToken};
use crate::error::BackendError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateSessionRequest {
    pub amount: Amount,
    pub provider: Provider,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_token: SessionToken,
    #[serde(default)]
    pub secondary_token: Option<SecondaryToken>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub raw_data: Value,
    pub session_token: SessionToken,
    pub secondary_token: SecondaryToken,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Which payment methods the store currently accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfig {
    #[serde(rename = "providerA_enabled", default)]
    pub hosted_window_enabled: bool,
    #[serde(rename = "providerB_enabled", default)]
    pub embedded_form_enabled: bool,
    #[serde(default)]
    pub payments_suspended: bool,
}

impl PaymentConfig {
    pub fn allows(&self, provider: Provider) -> bool {
        !self.payments_suspended
            && match provider {
                Provider::HostedWindow => self.hosted_window_enabled,
                Provider::EmbeddedForm => self.embedded_form_enabled,
            }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            hosted_window_enabled: true,
            embedded_form_enabled: true,
            payments_suspended: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSubmission {
    pub items: Vec<OrderItem>,
    pub payment_method: Provider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    pub order_id: String,
}

/// The REST backend that owns payment sessions and orders.
#[async_trait]
pub trait PaymentBackend: Send + Sync {
    async fn create_payment_session(
        &self,
        auth: &AuthToken,
        request: &CreateSessionRequest,
    ) -> BackendResult<CreateSessionResponse>;
    async fn validate_provider_response(
        &self,
        request: &ValidationRequest,
    ) -> BackendResult<ValidationResponse>;
    async fn payment_config(&self) -> BackendResult<PaymentConfig>;
    async fn submit_order(
        &self,
        auth: &AuthToken,
        order: &OrderSubmission,
    ) -> BackendResult<OrderReceipt>;
}

/// Document access needed to load the hosted provider's runtime script.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// Whether a script carrying `marker` is already in the document.
    fn has_script(&self, marker: &str) -> bool;
    /// Appends the script and resolves on its load (`Ok`) or error (`Err`) event.
    async fn inject_script(&self, src: &str, marker: &str) -> Result<(), String>;
    /// Probes the global the runtime defines once it has initialised.
    fn runtime_ready(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupBlocked;

/// Presentation surfaces for the hosted checkout.
pub trait HostedSurface: Send + Sync {
    /// Asks the provider runtime to render the checkout in an in-page iframe.
    fn open_embedded(&self, session_token: &SessionToken) -> Result<(), String>;
    /// Opens a new top-level browsing context at `url`.
    fn open_popup(&self, url: &str) -> Result<(), PopupBlocked>;
    /// Removes whatever surface is open.
    fn close(&self);
}

/// A live listener on the page's message channel. Dropping it unsubscribes.
pub struct MessageSubscription {
    receiver: mpsc::UnboundedReceiver<MessageEnvelope>,
    _guard: Box<dyn Send + Sync>,
}

impl MessageSubscription {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<MessageEnvelope>,
        guard: impl Send + Sync + 'static,
    ) -> Self {
        Self {
            receiver,
            _guard: Box::new(guard),
        }
    }

    /// Next message, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<MessageEnvelope> {
        self.receiver.recv().await
    }
}

pub trait MessageBus: Send + Sync {
    fn subscribe(&self) -> MessageSubscription;
}

/// The embedded form provider's client SDK.
#[async_trait]
pub trait EmbeddedSdk: Send + Sync {
    /// Mounts the form element; resolves once the SDK reports it mounted.
    async fn mount(&self, client_secret: &str) -> Result<(), String>;
    /// Runs the SDK confirm call. `Ok` carries the provider's payment
    /// identifier, `Err` the provider's error message.
    async fn confirm(&self, client_secret: &str) -> Result<String, String>;
    fn unmount(&self);
}

pub type SharedBackend = Arc<dyn PaymentBackend>;
pub type SharedScriptHost = Arc<dyn ScriptHost>;
pub type SharedSurface = Arc<dyn HostedSurface>;
pub type SharedMessageBus = Arc<dyn MessageBus>;
pub type SharedEmbeddedSdk = Arc<dyn EmbeddedSdk>;
