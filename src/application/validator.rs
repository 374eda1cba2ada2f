use crate::domain::message::CompletionPayload;
use crate::domain::ports::{SharedBackend, ValidationRequest, ValidationResponse};
use crate::domain::session::{SecondaryToken, SessionToken};
use crate::error::{GENERIC_VALIDATION_FAILURE, PaymentError, Result};
use std::time::Duration;

/// Exchanges a hosted-window completion payload for a backend-confirmed
/// transaction id. One request per call, never retried.
#[derive(Clone)]
pub struct SessionValidator {
    backend: SharedBackend,
    timeout: Duration,
}

impl SessionValidator {
    pub fn new(backend: SharedBackend, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub async fn validate(
        &self,
        payload: CompletionPayload,
        session_token: &SessionToken,
        secondary_token: &SecondaryToken,
    ) -> Result<String> {
        let request = ValidationRequest {
            raw_data: payload.raw_data,
            session_token: session_token.clone(),
            secondary_token: secondary_token.clone(),
            hash: payload.hash,
        };

        let response = tokio::time::timeout(
            self.timeout,
            self.backend.validate_provider_response(&request),
        )
        .await;

        match response {
            Err(_) => {
                tracing::warn!(%session_token, "validation request timed out");
                Err(PaymentError::ValidationFailed(
                    GENERIC_VALIDATION_FAILURE.to_string(),
                ))
            }
            Ok(Err(err)) => {
                tracing::warn!(%session_token, error = %err, "validation request failed");
                Err(PaymentError::ValidationFailed(
                    err.detail().unwrap_or(GENERIC_VALIDATION_FAILURE).to_string(),
                ))
            }
            Ok(Ok(response)) => accept(response),
        }
    }
}

/// Only a success status together with a transaction id counts as approval.
fn accept(response: ValidationResponse) -> Result<String> {
    let approved = response
        .status
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case("success"));
    let transaction_id = response
        .transaction_id
        .filter(|id| !id.trim().is_empty());

    match (approved, transaction_id) {
        (true, Some(id)) => Ok(id),
        _ => Err(PaymentError::ValidationFailed(
            response
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| GENERIC_VALIDATION_FAILURE.to_string()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::infrastructure::in_memory::InMemoryPaymentBackend;
    use serde_json::json;
    use std::sync::Arc;

    fn payload() -> CompletionPayload {
        CompletionPayload {
            raw_data: json!({"transactionId": "991"}),
            hash: "h-991".into(),
        }
    }

    fn response(status: &str, id: Option<&str>, message: Option<&str>) -> ValidationResponse {
        ValidationResponse {
            status: Some(status.into()),
            transaction_id: id.map(Into::into),
            message: message.map(Into::into),
        }
    }

    #[test]
    fn test_accepts_success_with_transaction_id() {
        assert_eq!(accept(response("SUCCESS", Some("991"), None)), Ok("991".into()));
    }

    #[test]
    fn test_success_without_transaction_id_is_rejected() {
        assert_eq!(
            accept(response("success", None, None)),
            Err(PaymentError::ValidationFailed(GENERIC_VALIDATION_FAILURE.into()))
        );
    }

    #[test]
    fn test_backend_message_is_surfaced() {
        assert_eq!(
            accept(response("failed", None, Some("card_declined"))),
            Err(PaymentError::ValidationFailed("card_declined".into()))
        );
    }

    #[tokio::test]
    async fn test_sends_all_tokens_once() {
        let backend = Arc::new(InMemoryPaymentBackend::new());
        let validator = SessionValidator::new(backend.clone(), Duration::from_secs(5));

        let id = validator
            .validate(payload(), &SessionToken::new("chk_1"), &SecondaryToken::new("sec_1"))
            .await
            .unwrap();
        assert_eq!(id, "txn-1");

        let requests = backend.validation_requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].secondary_token.expose(), "sec_1");
        assert_eq!(requests[0].hash, "h-991");
    }

    #[tokio::test]
    async fn test_transport_failure_uses_backend_detail() {
        let backend = Arc::new(InMemoryPaymentBackend::new().failing_validation(
            BackendError::Rejected {
                status: 402,
                message: Some("Insufficient funds".into()),
            },
        ));
        let validator = SessionValidator::new(backend, Duration::from_secs(5));

        let err = validator
            .validate(payload(), &SessionToken::new("chk_1"), &SecondaryToken::new("sec_1"))
            .await
            .unwrap_err();
        assert_eq!(err, PaymentError::ValidationFailed("Insufficient funds".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_validation_times_out() {
        let backend = Arc::new(
            InMemoryPaymentBackend::new().with_validation_delay(Duration::from_secs(120)),
        );
        let validator = SessionValidator::new(backend, Duration::from_secs(15));

        let err = validator
            .validate(payload(), &SessionToken::new("chk_1"), &SecondaryToken::new("sec_1"))
            .await
            .unwrap_err();
        assert_eq!(err, PaymentError::ValidationFailed(GENERIC_VALIDATION_FAILURE.into()));
    }
}
