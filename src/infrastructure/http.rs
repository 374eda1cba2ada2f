use crate::config::OrchestratorConfig;
use crate::domain::ports::{
    BackendResult, CreateSessionRequest, CreateSessionResponse, OrderReceipt, OrderSubmission,
    PaymentBackend, PaymentConfig, ValidationRequest, ValidationResponse,
};
use crate::domain::session::AuthToken;
use crate::error::{BackendError, Error};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

const CREATE_SESSION_PATH: &str = "payments/create-session";
const VALIDATE_PATH: &str = "payments/validate";
const CONFIG_PATH: &str = "payments/config";
const ORDERS_PATH: &str = "orders";

/// The payments REST backend.
#[derive(Debug, Clone)]
pub struct HttpPaymentBackend {
    client: reqwest::Client,
    base_url: Url,
}

/// Error bodies carry the reason under `detail` or `message`.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
    message: Option<String>,
}

impl HttpPaymentBackend {
    pub fn new(config: &OrchestratorConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(config.request_timeout())
            .build()
            .map_err(BackendError::from)?;
        Self::with_client(client, &config.api_base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, Error> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> BackendResult<Url> {
        self.base_url
            .join(path)
            .map_err(|err| BackendError::Transport(err.to_string()))
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> BackendResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
            let message = parsed
                .detail
                .or(parsed.message)
                .filter(|m| !m.trim().is_empty());
            tracing::warn!(status = status.as_u16(), ?message, "backend rejected request");
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| BackendError::Decode(err.to_string()))
    }
}

#[async_trait]
impl PaymentBackend for HttpPaymentBackend {
    #[instrument(skip(self, auth), fields(provider = %request.provider))]
    async fn create_payment_session(
        &self,
        auth: &AuthToken,
        request: &CreateSessionRequest,
    ) -> BackendResult<CreateSessionResponse> {
        let response = self
            .client
            .post(self.endpoint(CREATE_SESSION_PATH)?)
            .bearer_auth(auth.as_str())
            .json(request)
            .send()
            .await?;
        Self::read(response).await
    }

    #[instrument(skip(self, request), fields(session = %request.session_token))]
    async fn validate_provider_response(
        &self,
        request: &ValidationRequest,
    ) -> BackendResult<ValidationResponse> {
        let response = self
            .client
            .post(self.endpoint(VALIDATE_PATH)?)
            .json(request)
            .send()
            .await?;
        Self::read(response).await
    }

    #[instrument(skip(self))]
    async fn payment_config(&self) -> BackendResult<PaymentConfig> {
        let response = self
            .client
            .get(self.endpoint(CONFIG_PATH)?)
            .send()
            .await?;
        Self::read(response).await
    }

    #[instrument(skip(self, auth, order), fields(items = order.items.len()))]
    async fn submit_order(
        &self,
        auth: &AuthToken,
        order: &OrderSubmission,
    ) -> BackendResult<OrderReceipt> {
        let response = self
            .client
            .post(self.endpoint(ORDERS_PATH)?)
            .bearer_auth(auth.as_str())
            .json(order)
            .send()
            .await?;
        Self::read(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let backend =
            HttpPaymentBackend::with_client(reqwest::Client::new(), "http://shop.test/api").unwrap();
        assert_eq!(
            backend.endpoint(CONFIG_PATH).unwrap().as_str(),
            "http://shop.test/api/payments/config"
        );
    }

    #[test]
    fn test_rejects_malformed_base_url() {
        let err = HttpPaymentBackend::with_client(reqwest::Client::new(), "not a url").unwrap_err();
        assert!(matches!(err, Error::Url(_)));
    }
}
