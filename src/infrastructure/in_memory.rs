use crate::domain::ports::{
    BackendResult, CreateSessionRequest, CreateSessionResponse, OrderReceipt, OrderSubmission,
    PaymentBackend, PaymentConfig, ValidationRequest, ValidationResponse,
};
use crate::domain::session::{AuthToken, Provider, SecondaryToken, SessionToken};
use crate::error::BackendError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Default)]
struct Recorded {
    sessions: Vec<CreateSessionRequest>,
    validations: Vec<ValidationRequest>,
    orders: Vec<OrderSubmission>,
}

/// A scripted payments backend kept entirely in memory.
///
/// Issues deterministic tokens (`chk_<n>` plus `sec_<n>` for the hosted
/// provider, `pi_<n>_secret_<n>` for the embedded one), approves every
/// validation unless told otherwise, and records every request it sees.
#[derive(Default, Clone)]
pub struct InMemoryPaymentBackend {
    config: PaymentConfig,
    session_failure: Option<BackendError>,
    validation_failure: Option<BackendError>,
    validation_reply: Option<ValidationResponse>,
    session_delay: Duration,
    validation_delay: Duration,
    recorded: Arc<RwLock<Recorded>>,
}

impl InMemoryPaymentBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: PaymentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn failing_sessions(mut self, err: BackendError) -> Self {
        self.session_failure = Some(err);
        self
    }

    pub fn failing_validation(mut self, err: BackendError) -> Self {
        self.validation_failure = Some(err);
        self
    }

    pub fn with_validation_reply(mut self, reply: ValidationResponse) -> Self {
        self.validation_reply = Some(reply);
        self
    }

    pub fn with_session_delay(mut self, delay: Duration) -> Self {
        self.session_delay = delay;
        self
    }

    pub fn with_validation_delay(mut self, delay: Duration) -> Self {
        self.validation_delay = delay;
        self
    }

    pub async fn session_requests(&self) -> Vec<CreateSessionRequest> {
        self.recorded.read().await.sessions.clone()
    }

    pub async fn validation_requests(&self) -> Vec<ValidationRequest> {
        self.recorded.read().await.validations.clone()
    }

    pub async fn orders(&self) -> Vec<OrderSubmission> {
        self.recorded.read().await.orders.clone()
    }
}

#[async_trait]
impl PaymentBackend for InMemoryPaymentBackend {
    async fn create_payment_session(
        &self,
        _auth: &AuthToken,
        request: &CreateSessionRequest,
    ) -> BackendResult<CreateSessionResponse> {
        let n = {
            let mut recorded = self.recorded.write().await;
            recorded.sessions.push(request.clone());
            recorded.sessions.len()
        };
        tokio::time::sleep(self.session_delay).await;

        if let Some(err) = &self.session_failure {
            return Err(err.clone());
        }

        Ok(match request.provider {
            Provider::HostedWindow => CreateSessionResponse {
                session_token: SessionToken::new(format!("chk_{n}")),
                secondary_token: Some(SecondaryToken::new(format!("sec_{n}"))),
            },
            Provider::EmbeddedForm => CreateSessionResponse {
                session_token: SessionToken::new(format!("pi_{n}_secret_{n}")),
                secondary_token: None,
            },
        })
    }

    async fn validate_provider_response(
        &self,
        request: &ValidationRequest,
    ) -> BackendResult<ValidationResponse> {
        let n = {
            let mut recorded = self.recorded.write().await;
            recorded.validations.push(request.clone());
            recorded.validations.len()
        };
        tokio::time::sleep(self.validation_delay).await;

        if let Some(err) = &self.validation_failure {
            return Err(err.clone());
        }

        Ok(self.validation_reply.clone().unwrap_or(ValidationResponse {
            status: Some("success".to_string()),
            transaction_id: Some(format!("txn-{n}")),
            message: None,
        }))
    }

    async fn payment_config(&self) -> BackendResult<PaymentConfig> {
        Ok(self.config)
    }

    async fn submit_order(
        &self,
        _auth: &AuthToken,
        order: &OrderSubmission,
    ) -> BackendResult<OrderReceipt> {
        let mut recorded = self.recorded.write().await;
        recorded.orders.push(order.clone());
        Ok(OrderReceipt {
            order_id: format!("order-{}", recorded.orders.len()),
        })
    }
}
