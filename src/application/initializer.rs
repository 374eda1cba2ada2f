use crate::domain::ports::{CreateSessionRequest, CreateSessionResponse, SharedBackend};
use crate::domain::session::{AuthToken, SessionKey};
use crate::error::{GENERIC_SESSION_FAILURE, PaymentError, Result};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug)]
pub enum InitOutcome {
    Created(CreateSessionResponse),
    /// A request for this key is already in flight or done.
    AlreadyRequested,
}

/// Requests payment sessions from the backend, at most once per key until
/// the key is explicitly forgotten.
pub struct SessionInitializer {
    backend: SharedBackend,
    timeout: Duration,
    requested: Mutex<HashSet<SessionKey>>,
}

impl SessionInitializer {
    pub fn new(backend: SharedBackend, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            requested: Mutex::new(HashSet::new()),
        }
    }

    pub async fn initialize(
        &self,
        key: SessionKey,
        auth: Option<&AuthToken>,
    ) -> Result<InitOutcome> {
        let auth = auth.ok_or(PaymentError::NotAuthenticated)?;

        if !self.claim(key) {
            tracing::debug!(provider = %key.provider, amount = %key.amount, "session already requested");
            return Ok(InitOutcome::AlreadyRequested);
        }

        let request = CreateSessionRequest {
            amount: key.amount,
            provider: key.provider,
        };

        match tokio::time::timeout(
            self.timeout,
            self.backend.create_payment_session(auth, &request),
        )
        .await
        {
            Ok(Ok(response)) => {
                tracing::info!(
                    provider = %key.provider,
                    session = %response.session_token,
                    "payment session created"
                );
                Ok(InitOutcome::Created(response))
            }
            Ok(Err(err)) => {
                tracing::warn!(provider = %key.provider, error = %err, "payment session creation failed");
                Err(PaymentError::SessionCreationFailed(
                    err.detail().unwrap_or(GENERIC_SESSION_FAILURE).to_string(),
                ))
            }
            Err(_) => {
                tracing::warn!(provider = %key.provider, "payment session creation timed out");
                Err(PaymentError::SessionCreationFailed(
                    GENERIC_SESSION_FAILURE.to_string(),
                ))
            }
        }
    }

    /// Allows `key` to be requested again. Only an explicit retry or a new
    /// attempt for a different key calls this.
    pub fn forget(&self, key: &SessionKey) {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    fn claim(&self, key: SessionKey) -> bool {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::amount::Amount;
    use crate::domain::session::Provider;
    use crate::error::BackendError;
    use crate::infrastructure::in_memory::InMemoryPaymentBackend;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn key(provider: Provider) -> SessionKey {
        SessionKey {
            amount: Amount::new(dec!(25.00)).unwrap(),
            provider,
        }
    }

    fn auth() -> AuthToken {
        AuthToken::parse("jwt").unwrap()
    }

    #[tokio::test]
    async fn test_missing_auth_never_calls_backend() {
        let backend = Arc::new(InMemoryPaymentBackend::new());
        let init = SessionInitializer::new(backend.clone(), Duration::from_secs(15));

        let err = init
            .initialize(key(Provider::HostedWindow), None)
            .await
            .unwrap_err();
        assert_eq!(err, PaymentError::NotAuthenticated);
        assert!(backend.session_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_key_is_requested_once() {
        let backend = Arc::new(InMemoryPaymentBackend::new());
        let init = SessionInitializer::new(backend.clone(), Duration::from_secs(15));
        let auth = auth();

        let first = init.initialize(key(Provider::EmbeddedForm), Some(&auth)).await;
        let second = init.initialize(key(Provider::EmbeddedForm), Some(&auth)).await;

        assert!(matches!(first, Ok(InitOutcome::Created(_))));
        assert!(matches!(second, Ok(InitOutcome::AlreadyRequested)));
        assert_eq!(backend.session_requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_request_is_not_repeated() {
        let backend = Arc::new(
            InMemoryPaymentBackend::new().with_session_delay(Duration::from_millis(50)),
        );
        let init = SessionInitializer::new(backend.clone(), Duration::from_secs(15));
        let auth = auth();

        let (a, b) = tokio::join!(
            init.initialize(key(Provider::HostedWindow), Some(&auth)),
            init.initialize(key(Provider::HostedWindow), Some(&auth)),
        );
        let created = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Ok(InitOutcome::Created(_))))
            .count();
        assert_eq!(created, 1);
        assert_eq!(backend.session_requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_forget_allows_explicit_retry() {
        let backend = Arc::new(InMemoryPaymentBackend::new());
        let init = SessionInitializer::new(backend.clone(), Duration::from_secs(15));
        let auth = auth();

        init.initialize(key(Provider::HostedWindow), Some(&auth)).await.unwrap();
        init.forget(&key(Provider::HostedWindow));
        let again = init.initialize(key(Provider::HostedWindow), Some(&auth)).await;

        assert!(matches!(again, Ok(InitOutcome::Created(_))));
        assert_eq!(backend.session_requests().await.len(), 2);
    }

    #[tokio::test]
    async fn test_backend_detail_is_surfaced_without_retry() {
        let backend = Arc::new(InMemoryPaymentBackend::new().failing_sessions(
            BackendError::Rejected {
                status: 400,
                message: Some("Store is closed".into()),
            },
        ));
        let init = SessionInitializer::new(backend.clone(), Duration::from_secs(15));

        let err = init
            .initialize(key(Provider::HostedWindow), Some(&auth()))
            .await
            .unwrap_err();
        assert_eq!(err, PaymentError::SessionCreationFailed("Store is closed".into()));
        assert_eq!(backend.session_requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_generic_message_without_detail() {
        let backend = Arc::new(
            InMemoryPaymentBackend::new()
                .failing_sessions(BackendError::Transport("connection reset".into())),
        );
        let init = SessionInitializer::new(backend, Duration::from_secs(15));

        let err = init
            .initialize(key(Provider::EmbeddedForm), Some(&auth()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PaymentError::SessionCreationFailed(GENERIC_SESSION_FAILURE.into())
        );
    }
}
